use crate::category::{Category, Slash};
use crate::semantics::SemanticOp;
use crate::unify::UnifyContext;

pub const FORWARD_APPLICATION: &str = ">";
pub const BACKWARD_APPLICATION: &str = "<";
pub const FORWARD_COMPOSITION: &str = ">B";
pub const BACKWARD_COMPOSITION: &str = "<B";
pub const TYPE_RAISING: &str = ">T";
pub const GLUE: &str = "glue";

/// One result of applying a rule to a pair (or a single) input category.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutput {
    pub rule: &'static str,
    pub category: Category,
    pub op: SemanticOp,
}

/// The grammar's rule set, as seen by the chart.
///
/// Unification failures are not errors: a rule that does not apply simply
/// contributes no output.
pub trait RuleSet: Send + Sync {
    fn apply_unary(&self, ctx: &mut UnifyContext, input: &Category) -> Vec<RuleOutput>;

    fn apply_binary(&self, ctx: &mut UnifyContext, left: &Category, right: &Category) -> Vec<RuleOutput>;

    /// Low-precedence fallback that joins two adjacent fragments.
    fn apply_glue(&self, ctx: &mut UnifyContext, left: &Category, right: &Category) -> Vec<RuleOutput>;
}

impl<T: RuleSet + ?Sized> RuleSet for std::sync::Arc<T> {
    fn apply_unary(&self, ctx: &mut UnifyContext, input: &Category) -> Vec<RuleOutput> {
        (**self).apply_unary(ctx, input)
    }

    fn apply_binary(&self, ctx: &mut UnifyContext, left: &Category, right: &Category) -> Vec<RuleOutput> {
        (**self).apply_binary(ctx, left, right)
    }

    fn apply_glue(&self, ctx: &mut UnifyContext, left: &Category, right: &Category) -> Vec<RuleOutput> {
        (**self).apply_glue(ctx, left, right)
    }
}

/// Application, harmonic composition, optional forward type raising and glue.
#[derive(Debug, Clone)]
pub struct CombinatoryRules {
    composition: bool,
    raisable: Vec<Category>,
    glue_category: Category,
}

impl Default for CombinatoryRules {
    fn default() -> Self {
        Self {
            composition: true,
            raisable: Vec::new(),
            glue_category: Category::atom("Frag"),
        }
    }
}

impl CombinatoryRules {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_composition(mut self, enabled: bool) -> Self {
        self.composition = enabled;
        self
    }

    /// Allows `X => $T/($T\X)` for inputs unifying with `category`.
    #[must_use]
    pub fn with_type_raising(mut self, category: Category) -> Self {
        self.raisable.push(category);
        self
    }

    #[must_use]
    pub fn with_glue_category(mut self, category: Category) -> Self {
        self.glue_category = category;
        self
    }

    pub fn glue_category(&self) -> &Category {
        &self.glue_category
    }

    // X/Y  Y  =>  X
    fn forward_application(ctx: &UnifyContext, left: &Category, right: &Category) -> Option<RuleOutput> {
        let Category::Complex { result, slash: Slash::Forward, arg } = left else { return None };
        let subst = ctx.unify(arg, right)?;
        Some(RuleOutput {
            rule: FORWARD_APPLICATION,
            category: subst.apply(result),
            op: SemanticOp::Apply { functor: 0, argument: 1 },
        })
    }

    // Y  X\Y  =>  X
    fn backward_application(ctx: &UnifyContext, left: &Category, right: &Category) -> Option<RuleOutput> {
        let Category::Complex { result, slash: Slash::Backward, arg } = right else { return None };
        let subst = ctx.unify(arg, left)?;
        Some(RuleOutput {
            rule: BACKWARD_APPLICATION,
            category: subst.apply(result),
            op: SemanticOp::Apply { functor: 1, argument: 0 },
        })
    }

    // X/Y  Y/Z  =>  X/Z
    fn forward_composition(ctx: &UnifyContext, left: &Category, right: &Category) -> Option<RuleOutput> {
        let Category::Complex { result: x, slash: Slash::Forward, arg: y } = left else { return None };
        let Category::Complex { result: y2, slash: Slash::Forward, arg: z } = right else { return None };
        let subst = ctx.unify(y, y2)?;
        Some(RuleOutput {
            rule: FORWARD_COMPOSITION,
            category: Category::forward(subst.apply(x), subst.apply(z)),
            op: SemanticOp::Compose { outer: 0, inner: 1 },
        })
    }

    // Y\Z  X\Y  =>  X\Z
    fn backward_composition(ctx: &UnifyContext, left: &Category, right: &Category) -> Option<RuleOutput> {
        let Category::Complex { result: y2, slash: Slash::Backward, arg: z } = left else { return None };
        let Category::Complex { result: x, slash: Slash::Backward, arg: y } = right else { return None };
        let subst = ctx.unify(y, y2)?;
        Some(RuleOutput {
            rule: BACKWARD_COMPOSITION,
            category: Category::backward(subst.apply(x), subst.apply(z)),
            op: SemanticOp::Compose { outer: 1, inner: 0 },
        })
    }
}

impl RuleSet for CombinatoryRules {
    fn apply_unary(&self, ctx: &mut UnifyContext, input: &Category) -> Vec<RuleOutput> {
        let mut outputs = Vec::new();
        for raisable in &self.raisable {
            let Some(subst) = ctx.unify(raisable, input) else { continue };
            let argument = subst.apply(input);
            let t = Category::Var(ctx.fresh_var());
            outputs.push(RuleOutput {
                rule: TYPE_RAISING,
                category: Category::forward(t.clone(), Category::backward(t, argument)),
                op: SemanticOp::Raise { operand: 0 },
            });
        }
        outputs
    }

    fn apply_binary(&self, ctx: &mut UnifyContext, left: &Category, right: &Category) -> Vec<RuleOutput> {
        let ctx: &UnifyContext = ctx;
        let mut outputs: Vec<RuleOutput> = [
            Self::forward_application(ctx, left, right),
            Self::backward_application(ctx, left, right),
        ]
        .into_iter()
        .flatten()
        .collect();
        if self.composition {
            outputs.extend(Self::forward_composition(ctx, left, right));
            outputs.extend(Self::backward_composition(ctx, left, right));
        }
        outputs
    }

    fn apply_glue(&self, _ctx: &mut UnifyContext, _left: &Category, _right: &Category) -> Vec<RuleOutput> {
        vec![RuleOutput {
            rule: GLUE,
            category: self.glue_category.clone(),
            op: SemanticOp::Glue { left: 0, right: 1 },
        }]
    }
}
