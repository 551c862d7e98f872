use ccg_protocol::{Features, VarId};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slash {
    /// `X/Y` looks for its argument to the right.
    Forward,
    /// `X\Y` looks for its argument to the left.
    Backward,
}

impl Slash {
    pub fn symbol(self) -> char {
        match self {
            Slash::Forward => '/',
            Slash::Backward => '\\',
        }
    }
}

/// A syntactic category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    Atom { base: String, features: Features },
    Var(VarId),
    Complex {
        result: Box<Category>,
        slash: Slash,
        arg: Box<Category>,
    },
}

impl Category {
    pub fn atom(base: &str) -> Self {
        Category::Atom {
            base: base.to_string(),
            features: Features::empty(),
        }
    }

    pub fn atom_with(base: &str, features: Features) -> Self {
        Category::Atom {
            base: base.to_string(),
            features,
        }
    }

    pub fn forward(result: Category, arg: Category) -> Self {
        Category::Complex {
            result: Box::new(result),
            slash: Slash::Forward,
            arg: Box::new(arg),
        }
    }

    pub fn backward(result: Category, arg: Category) -> Self {
        Category::Complex {
            result: Box::new(result),
            slash: Slash::Backward,
            arg: Box::new(arg),
        }
    }

    pub fn is_atomic(&self) -> bool {
        matches!(self, Category::Atom { .. })
    }

    /// Variables in order of first appearance (left to right).
    pub fn vars(&self) -> Vec<VarId> {
        let mut vars = Vec::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars(&self, vars: &mut Vec<VarId>) {
        match self {
            Category::Atom { .. } => {}
            Category::Var(v) => {
                if !vars.contains(v) {
                    vars.push(*v);
                }
            }
            Category::Complex { result, arg, .. } => {
                result.collect_vars(vars);
                arg.collect_vars(vars);
            }
        }
    }

    pub fn contains_var(&self, var: VarId) -> bool {
        match self {
            Category::Atom { .. } => false,
            Category::Var(v) => *v == var,
            Category::Complex { result, arg, .. } => {
                result.contains_var(var) || arg.contains_var(var)
            }
        }
    }

    /// Rewrites every variable through `rename`.
    pub fn map_vars(&self, rename: &mut impl FnMut(VarId) -> VarId) -> Category {
        match self {
            Category::Atom { .. } => self.clone(),
            Category::Var(v) => Category::Var(rename(*v)),
            Category::Complex { result, slash, arg } => Category::Complex {
                result: Box::new(result.map_vars(rename)),
                slash: *slash,
                arg: Box::new(arg.map_vars(rename)),
            },
        }
    }

    /// Canonical text of the category with variables numbered by first
    /// appearance, so alpha-equivalent categories share one signature.
    pub fn signature(&self) -> String {
        let order = self.vars();
        self.map_vars(&mut |v| {
            let position = order.iter().position(|o| *o == v).unwrap_or(0);
            VarId::new(position as u32)
        })
        .to_string()
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Complex { .. } => write!(f, "({})", self),
            _ => write!(f, "{}", self),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Atom { base, features } => {
                write!(f, "{}", base)?;
                if !features.is_empty() {
                    let names: Vec<&str> = features.names().collect();
                    write!(f, "[{}]", names.join(","))?;
                }
                Ok(())
            }
            Category::Var(v) => write!(f, "${}", v.0),
            Category::Complex { result, slash, arg } => {
                result.fmt_operand(f)?;
                write!(f, "{}", slash.symbol())?;
                arg.fmt_operand(f)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_parenthesizes_complex_operands() {
        let np = Category::atom("NP");
        let s = Category::atom_with("S", Features::DECLARATIVE);
        let tv = Category::forward(Category::backward(s, np.clone()), np);
        assert_eq!(tv.to_string(), "(S[dcl]\\NP)/NP");
    }

    #[test]
    fn test_signature_is_alpha_invariant() {
        let a = Category::forward(Category::Var(VarId(7)), Category::backward(Category::Var(VarId(7)), Category::atom("NP")));
        let b = Category::forward(Category::Var(VarId(2)), Category::backward(Category::Var(VarId(2)), Category::atom("NP")));
        assert_ne!(a, b);
        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.signature(), "$0/($0\\NP)");
    }

    #[test]
    fn test_vars_in_order() {
        let c = Category::forward(Category::Var(VarId(4)), Category::backward(Category::Var(VarId(1)), Category::Var(VarId(4))));
        assert_eq!(c.vars(), vec![VarId(4), VarId(1)]);
        assert!(c.contains_var(VarId(1)));
        assert!(!c.contains_var(VarId(9)));
    }
}
