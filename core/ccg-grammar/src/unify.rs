use std::collections::HashMap;

use ccg_protocol::VarId;

use crate::category::Category;

/// Per-attempt unification state.
///
/// Owns the counter that issues fresh variables. Reset with
/// [`UnifyContext::start_sequence`] once per parse attempt so that variable
/// ids stay small and never leak between attempts.
#[derive(Debug, Default, Clone)]
pub struct UnifyContext {
    next_var: u32,
    sequence: u32,
}

impl UnifyContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_sequence(&mut self) {
        self.next_var = 0;
        self.sequence += 1;
    }

    /// Number of sequences started so far.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn fresh_var(&mut self) -> VarId {
        let var = VarId::new(self.next_var);
        self.next_var += 1;
        var
    }

    /// Renames every variable of `category` to a fresh one, consistently,
    /// so categories seeded at different positions cannot capture each
    /// other's variables.
    pub fn reindex(&mut self, category: &Category) -> Category {
        let mut renamed: Vec<(VarId, VarId)> = Vec::new();
        category.map_vars(&mut |old| {
            if let Some((_, new)) = renamed.iter().find(|(o, _)| *o == old) {
                return *new;
            }
            let new = self.fresh_var();
            renamed.push((old, new));
            new
        })
    }

    /// Unifies two categories, returning the bindings that make them equal.
    pub fn unify(&self, left: &Category, right: &Category) -> Option<Substitution> {
        let mut subst = Substitution::default();
        if subst.unify(left, right) {
            Some(subst)
        } else {
            None
        }
    }
}

/// Variable bindings produced by one successful unification.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Substitution {
    bindings: HashMap<VarId, Category>,
}

impl Substitution {
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn binding(&self, var: VarId) -> Option<&Category> {
        self.bindings.get(&var)
    }

    /// Resolves every bound variable in `category`, transitively.
    pub fn apply(&self, category: &Category) -> Category {
        match category {
            Category::Atom { .. } => category.clone(),
            Category::Var(v) => match self.bindings.get(v) {
                Some(bound) => self.apply(bound),
                None => category.clone(),
            },
            Category::Complex { result, slash, arg } => Category::Complex {
                result: Box::new(self.apply(result)),
                slash: *slash,
                arg: Box::new(self.apply(arg)),
            },
        }
    }

    fn head(&self, category: &Category) -> Category {
        let mut current = category;
        while let Category::Var(v) = current {
            match self.bindings.get(v) {
                Some(bound) => current = bound,
                None => break,
            }
        }
        current.clone()
    }

    /// Extends the bindings so that `left` and `right` become equal.
    /// Atoms unify when their bases match and their features are compatible.
    pub fn unify(&mut self, left: &Category, right: &Category) -> bool {
        let left = self.head(left);
        let right = self.head(right);
        match (&left, &right) {
            (Category::Var(x), Category::Var(y)) if x == y => true,
            (Category::Var(x), other) | (other, Category::Var(x)) => {
                if self.apply(other).contains_var(*x) {
                    return false;
                }
                self.bindings.insert(*x, other.clone());
                true
            }
            (
                Category::Atom { base: b1, features: f1 },
                Category::Atom { base: b2, features: f2 },
            ) => b1 == b2 && f1.unify(*f2).is_some(),
            (
                Category::Complex { result: r1, slash: s1, arg: a1 },
                Category::Complex { result: r2, slash: s2, arg: a2 },
            ) => s1 == s2 && self.unify(r1, r2) && self.unify(a1, a2),
            _ => false,
        }
    }
}
