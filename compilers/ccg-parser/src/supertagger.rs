use std::collections::HashMap;

use ccg_protocol::{ArchivedTaggerModel, TaggerModel};

use crate::lexicon::LexiconError;
use crate::token::Token;

/// A category the tagger allows at the selected token.
#[derive(Debug, Clone, PartialEq)]
pub struct Supertag {
    /// Category signature, as produced by `Category::signature`.
    pub category: String,
    pub probability: f64,
}

/// Proposes likely categories per token under a beam that can be loosened
/// or tightened between parse attempts.
pub trait Supertagger: Send {
    fn map_tokens(&mut self, tokens: &[Token<'_>]);

    fn select_token(&mut self, index: usize);

    /// Tags within the current beam for the selected token, most probable
    /// first. Empty when the tagger knows nothing about the token.
    fn current_candidates(&self) -> Vec<Supertag>;

    fn loosen_beam(&mut self);

    fn tighten_beam(&mut self);

    fn has_looser_beam(&self) -> bool;

    fn has_tighter_beam(&self) -> bool;

    /// Back to the most restrictive beam.
    fn reset_beam(&mut self);

    fn reset_beam_to_loosest(&mut self);

    fn current_beam_value(&self) -> f64;

    fn clear_tokens(&mut self);
}

/// Keeps the tags whose probability is at least `beta` times the best
/// tag's probability. Betas run from most to least restrictive.
#[derive(Debug, Clone)]
pub struct BetaSupertagger {
    betas: Vec<f64>,
    position: usize,
    distributions: HashMap<String, Vec<Supertag>>,
    mapped: Vec<String>,
    selected: Option<usize>,
}

impl BetaSupertagger {
    pub fn new(betas: Vec<f64>) -> Self {
        Self { betas, position: 0, distributions: HashMap::new(), mapped: Vec::new(), selected: None }
    }

    pub fn from_model(model: &TaggerModel) -> Self {
        let mut tagger = Self::new(model.betas.iter().map(|b| f64::from(*b)).collect());
        for dist in &model.distributions {
            for tag in &dist.tags {
                tagger.add_tag(&dist.form, &tag.category, f64::from(tag.probability));
            }
        }
        tagger
    }

    pub fn from_archived(model: &ArchivedTaggerModel) -> Self {
        let mut tagger = Self::new(model.betas.iter().map(|b| f64::from(*b)).collect());
        for dist in model.distributions.iter() {
            for tag in dist.tags.iter() {
                tagger.add_tag(dist.form.as_str(), tag.category.as_str(), f64::from(tag.probability));
            }
        }
        tagger
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LexiconError> {
        let mut aligned = rkyv::AlignedVec::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        let archived = rkyv::check_archived_root::<TaggerModel>(&aligned)
            .map_err(|e| LexiconError::Corrupt(format!("{:?}", e)))?;
        Ok(Self::from_archived(archived))
    }

    pub fn add_tag(&mut self, form: &str, category: &str, probability: f64) {
        let tags = self.distributions.entry(form.to_string()).or_default();
        tags.push(Supertag { category: category.to_string(), probability });
        tags.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    }

    #[must_use]
    pub fn with_tag(mut self, form: &str, category: &str, probability: f64) -> Self {
        self.add_tag(form, category, probability);
        self
    }

    fn tags_for(&self, form: &str) -> Option<&Vec<Supertag>> {
        self.distributions.get(form).or_else(|| self.distributions.get(&form.to_lowercase()))
    }
}

impl Supertagger for BetaSupertagger {
    fn map_tokens(&mut self, tokens: &[Token<'_>]) {
        self.mapped = tokens.iter().map(|t| t.text.to_string()).collect();
        self.selected = None;
    }

    fn select_token(&mut self, index: usize) {
        self.selected = Some(index);
    }

    fn current_candidates(&self) -> Vec<Supertag> {
        let Some(form) = self.selected.and_then(|i| self.mapped.get(i)) else { return Vec::new() };
        let Some(tags) = self.tags_for(form) else { return Vec::new() };
        let best = tags.first().map_or(0.0, |t| t.probability);
        let cutoff = best * self.current_beam_value();
        tags.iter().filter(|t| t.probability >= cutoff).cloned().collect()
    }

    fn loosen_beam(&mut self) {
        if self.has_looser_beam() {
            self.position += 1;
        }
    }

    fn tighten_beam(&mut self) {
        if self.has_tighter_beam() {
            self.position -= 1;
        }
    }

    fn has_looser_beam(&self) -> bool {
        self.position + 1 < self.betas.len()
    }

    fn has_tighter_beam(&self) -> bool {
        self.position > 0
    }

    fn reset_beam(&mut self) {
        self.position = 0;
    }

    fn reset_beam_to_loosest(&mut self) {
        self.position = self.betas.len().saturating_sub(1);
    }

    fn current_beam_value(&self) -> f64 {
        self.betas.get(self.position).copied().unwrap_or(0.0)
    }

    fn clear_tokens(&mut self) {
        self.mapped.clear();
        self.selected = None;
    }
}
