use ccg_grammar::rules::GLUE;

use crate::sign::Sign;

/// Scores a derived sign from the best scores of its inputs.
///
/// Implementations must be strictly monotone in every input: raising one
/// input's score raises the result. Unpacking relies on this to enumerate
/// analyses best first.
pub trait SymbolScorer: Send + Sync {
    fn score(&self, sign: &Sign, inputs: &[f64]) -> f64;
}

/// Sums input log scores and adds a per-rule penalty.
#[derive(Debug, Clone)]
pub struct LogLinearScorer {
    glue_penalty: f64,
    rule_penalties: Vec<(&'static str, f64)>,
}

impl Default for LogLinearScorer {
    fn default() -> Self {
        Self { glue_penalty: -10.0, rule_penalties: Vec::new() }
    }
}

impl LogLinearScorer {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_glue_penalty(mut self, penalty: f64) -> Self {
        self.glue_penalty = penalty;
        self
    }

    #[must_use]
    pub fn with_rule_penalty(mut self, rule: &'static str, penalty: f64) -> Self {
        self.rule_penalties.retain(|(r, _)| *r != rule);
        self.rule_penalties.push((rule, penalty));
        self
    }

    fn penalty(&self, rule: &str) -> f64 {
        if rule == GLUE {
            return self.glue_penalty;
        }
        self.rule_penalties.iter().find(|(r, _)| *r == rule).map_or(0.0, |(_, p)| *p)
    }
}

impl SymbolScorer for LogLinearScorer {
    fn score(&self, sign: &Sign, inputs: &[f64]) -> f64 {
        let penalty = sign.rule().map_or(0.0, |rule| self.penalty(rule));
        inputs.iter().sum::<f64>() + penalty
    }
}
