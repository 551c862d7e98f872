//! Categories, unification and combinatory rules consumed by the chart parser.

pub mod category;
pub mod notation;
pub mod rules;
pub mod semantics;
pub mod unify;

pub use category::{Category, Slash};
pub use notation::{parse_category, CategoryError};
pub use rules::{CombinatoryRules, RuleOutput, RuleSet};
pub use semantics::{SemanticOp, Semantics};
pub use unify::{Substitution, UnifyContext};
