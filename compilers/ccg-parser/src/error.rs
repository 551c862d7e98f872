use std::time::Duration;

use thiserror::Error;

use crate::chart::ChartError;
use crate::completer::Forest;
use crate::lexicon::LexiconError;
use crate::parser::Timing;

/// Which resource bound stopped chart completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Edges(usize),
    Time(Duration),
}

impl std::fmt::Display for Limit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Limit::Edges(n) => write!(f, "more than {} edges", n),
            Limit::Time(t) => write!(f, "more than {} ms", t.as_millis()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    LexiconLookup(#[from] LexiconError),
    #[error("no analysis spans the whole input")]
    NoAnalysis,
    #[error("parse limit exceeded: {0}")]
    LimitExceeded(Limit),
    #[error(transparent)]
    Chart(#[from] ChartError),
}

impl ParseError {
    pub fn is_limit(&self) -> bool {
        matches!(self, ParseError::LimitExceeded(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid parser configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// A parse that produced no analysis. Carries the timing of the failed
/// run and, when chart completion got that far, the chart it left behind.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ParseFailure {
    pub error: ParseError,
    pub timing: Timing,
    pub forest: Option<Forest>,
}
