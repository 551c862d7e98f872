use std::collections::HashMap;
use std::sync::Arc;

use ccg_grammar::{parse_category, Category, CategoryError};
use ccg_protocol::{ArchivedLexiconData, LexiconData};
use thiserror::Error;
use tracing::debug;

use crate::token::Token;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexiconError {
    #[error("no lexical entry for `{form}` at position {index}")]
    UnknownForm { form: String, index: usize },
    #[error("every entry for `{form}` at position {index} was filtered out at beam {beam}")]
    Filtered { form: String, index: usize, beam: f64 },
    #[error("entry for `{form}` has a bad category")]
    BadCategory {
        form: String,
        #[source]
        source: CategoryError,
    },
    #[error("corrupt lexicon archive: {0}")]
    Corrupt(String),
}

/// A category the lexicon proposes for a token, with its predicate and a
/// log weight added to the token's lexical score.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalEntry {
    pub category: Category,
    pub predicate: String,
    pub weight: f64,
}

pub trait Lexicon: Send + Sync {
    /// Candidate entries for the token at `index`. An empty result is an
    /// error: every token needs at least one category.
    fn recognize(&self, token: &Token<'_>, index: usize) -> Result<Vec<LexicalEntry>, LexiconError>;
}

impl<T: Lexicon + ?Sized> Lexicon for Arc<T> {
    fn recognize(&self, token: &Token<'_>, index: usize) -> Result<Vec<LexicalEntry>, LexiconError> {
        (**self).recognize(token, index)
    }
}

/// Form-keyed lexicon with a lowercase fallback and default entries for
/// unknown forms.
#[derive(Debug, Clone, Default)]
pub struct DictionaryLexicon {
    entries: HashMap<String, Vec<LexicalEntry>>,
    defaults: Vec<(Category, f64)>,
}

impl DictionaryLexicon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: &LexiconData) -> Result<Self, LexiconError> {
        let mut lexicon = Self::new();
        for entry in &data.entries {
            lexicon.insert(&entry.form, &entry.category, &entry.predicate, f64::from(entry.weight))?;
        }
        for entry in &data.defaults {
            lexicon.insert_default(&entry.category, f64::from(entry.weight))?;
        }
        Ok(lexicon)
    }

    /// Builds the lookup tables straight from an archived lexicon.
    pub fn from_archived(data: &ArchivedLexiconData) -> Result<Self, LexiconError> {
        let mut lexicon = Self::new();
        for entry in data.entries.iter() {
            lexicon.insert(
                entry.form.as_str(),
                entry.category.as_str(),
                entry.predicate.as_str(),
                f64::from(entry.weight),
            )?;
        }
        for entry in data.defaults.iter() {
            lexicon.insert_default(entry.category.as_str(), f64::from(entry.weight))?;
        }
        debug!(forms = lexicon.entries.len(), defaults = lexicon.defaults.len(), "loaded lexicon");
        Ok(lexicon)
    }

    /// Validates and loads bytes written by the lexicon compiler.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LexiconError> {
        // Callers may hand over slices at any offset; validation needs the archive alignment.
        let mut aligned = rkyv::AlignedVec::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        let archived = rkyv::check_archived_root::<LexiconData>(&aligned)
            .map_err(|e| LexiconError::Corrupt(format!("{:?}", e)))?;
        Self::from_archived(archived)
    }

    pub fn insert(&mut self, form: &str, category: &str, predicate: &str, weight: f64) -> Result<(), LexiconError> {
        let category = parse_category(category)
            .map_err(|source| LexiconError::BadCategory { form: form.to_string(), source })?;
        self.entries.entry(form.to_string()).or_default().push(LexicalEntry {
            category,
            predicate: predicate.to_string(),
            weight,
        });
        Ok(())
    }

    /// Adds a category proposed for every form the lexicon does not know.
    /// Its predicate is the lowercased form.
    pub fn insert_default(&mut self, category: &str, weight: f64) -> Result<(), LexiconError> {
        let category = parse_category(category)
            .map_err(|source| LexiconError::BadCategory { form: "<default>".to_string(), source })?;
        self.defaults.push((category, weight));
        Ok(())
    }

    pub fn with_entry(mut self, form: &str, category: &str, predicate: &str) -> Result<Self, LexiconError> {
        self.insert(form, category, predicate, 0.0)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Lexicon for DictionaryLexicon {
    fn recognize(&self, token: &Token<'_>, index: usize) -> Result<Vec<LexicalEntry>, LexiconError> {
        let lower = token.text.to_lowercase();
        if let Some(found) = self.entries.get(token.text).or_else(|| self.entries.get(&lower)) {
            return Ok(found.clone());
        }
        if self.defaults.is_empty() {
            return Err(LexiconError::UnknownForm { form: token.text.to_string(), index });
        }
        Ok(self
            .defaults
            .iter()
            .map(|(category, weight)| LexicalEntry {
                category: category.clone(),
                predicate: lower.clone(),
                weight: *weight,
            })
            .collect())
    }
}
