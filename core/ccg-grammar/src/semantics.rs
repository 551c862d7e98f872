use std::fmt;

/// Predicate-argument term built alongside the category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Semantics {
    Pred(String),
    Apply(Box<Semantics>, Box<Semantics>),
    Compose(Box<Semantics>, Box<Semantics>),
    Raise(Box<Semantics>),
    Glue(Box<Semantics>, Box<Semantics>),
}

impl Semantics {
    pub fn pred(name: &str) -> Self {
        Semantics::Pred(name.to_string())
    }

    /// Number of term nodes.
    pub fn size(&self) -> usize {
        match self {
            Semantics::Pred(_) => 1,
            Semantics::Raise(x) => 1 + x.size(),
            Semantics::Apply(a, b) | Semantics::Compose(a, b) | Semantics::Glue(a, b) => {
                1 + a.size() + b.size()
            }
        }
    }

    pub fn mentions(&self, name: &str) -> bool {
        match self {
            Semantics::Pred(p) => p == name,
            Semantics::Raise(x) => x.mentions(name),
            Semantics::Apply(a, b) | Semantics::Compose(a, b) | Semantics::Glue(a, b) => {
                a.mentions(name) || b.mentions(name)
            }
        }
    }
}

impl fmt::Display for Semantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Semantics::Pred(p) => write!(f, "{}", p),
            Semantics::Apply(_, _) => {
                // Curried applications print as one call: likes(mary, john)
                let mut args = Vec::new();
                let mut head = self;
                while let Semantics::Apply(functor, arg) = head {
                    args.push(arg.as_ref());
                    head = functor.as_ref();
                }
                write!(f, "{}(", head)?;
                for (i, arg) in args.iter().rev().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Semantics::Compose(outer, inner) => write!(f, "({} . {})", outer, inner),
            Semantics::Raise(x) => write!(f, "^{}", x),
            Semantics::Glue(l, r) => write!(f, "glue({}, {})", l, r),
        }
    }
}

/// How a rule builds its output's semantics from its inputs' semantics.
/// Indices refer to rule input positions (0 = left, 1 = right).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticOp {
    Apply { functor: usize, argument: usize },
    Compose { outer: usize, inner: usize },
    Raise { operand: usize },
    Glue { left: usize, right: usize },
}

impl SemanticOp {
    /// Builds the output term; `None` when an index is out of range.
    pub fn evaluate(&self, inputs: &[&Semantics]) -> Option<Semantics> {
        let get = |i: usize| inputs.get(i).map(|s| Box::new((*s).clone()));
        Some(match *self {
            SemanticOp::Apply { functor, argument } => Semantics::Apply(get(functor)?, get(argument)?),
            SemanticOp::Compose { outer, inner } => Semantics::Compose(get(outer)?, get(inner)?),
            SemanticOp::Raise { operand } => Semantics::Raise(get(operand)?),
            SemanticOp::Glue { left, right } => Semantics::Glue(get(left)?, get(right)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curried_display() {
        let likes = Semantics::pred("likes");
        let vp = SemanticOp::Apply { functor: 0, argument: 1 }
            .evaluate(&[&likes, &Semantics::pred("mary")])
            .unwrap();
        let s = SemanticOp::Apply { functor: 1, argument: 0 }
            .evaluate(&[&Semantics::pred("john"), &vp])
            .unwrap();
        assert_eq!(s.to_string(), "likes(mary, john)");
        assert_eq!(s.size(), 5);
        assert!(s.mentions("mary"));
    }

    #[test]
    fn test_out_of_range_operand() {
        let op = SemanticOp::Glue { left: 0, right: 1 };
        assert_eq!(op.evaluate(&[&Semantics::pred("a")]), None);
    }
}
