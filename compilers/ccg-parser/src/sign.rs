use ccg_grammar::{Category, SemanticOp, Semantics};
use ccg_protocol::SymbolId;
use serde::{Deserialize, Serialize};

/// Inclusive token range `first..=last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Segment {
    pub first: usize,
    pub last: usize,
}

impl Segment {
    pub fn new(first: usize, last: usize) -> Self {
        Self { first, last }
    }

    pub fn token(index: usize) -> Self {
        Self::new(index, index)
    }

    pub fn len(&self) -> usize {
        self.last + 1 - self.first
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.first, self.last)
    }
}

/// How a sign came about.
#[derive(Debug, Clone, PartialEq)]
pub enum History {
    Lexical { word: String },
    Rule {
        rule: &'static str,
        op: SemanticOp,
        inputs: Vec<SymbolId>,
    },
}

/// A category and its semantics over a segment of the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Sign {
    pub category: Category,
    pub semantics: Semantics,
    pub segment: Segment,
    pub history: History,
}

impl Sign {
    pub fn lexical(word: &str, category: Category, semantics: Semantics, index: usize) -> Self {
        Self {
            category,
            semantics,
            segment: Segment::token(index),
            history: History::Lexical { word: word.to_string() },
        }
    }

    /// Symbols this sign was derived from; empty for lexical signs.
    pub fn inputs(&self) -> &[SymbolId] {
        match &self.history {
            History::Lexical { .. } => &[],
            History::Rule { inputs, .. } => inputs,
        }
    }

    pub fn rule(&self) -> Option<&'static str> {
        match &self.history {
            History::Lexical { .. } => None,
            History::Rule { rule, .. } => Some(*rule),
        }
    }

    pub fn word(&self) -> Option<&str> {
        match &self.history {
            History::Lexical { word } => Some(word),
            History::Rule { .. } => None,
        }
    }

    pub fn is_lexical(&self) -> bool {
        matches!(self.history, History::Lexical { .. })
    }
}
