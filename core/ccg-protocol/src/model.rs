use rkyv::{Archive, Deserialize, Serialize};
use crate::ids::EntryId;
use alloc::string::String;
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// One lexical entry: a surface form paired with a category and a predicate.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[cfg_attr(feature = "serde", derive(SerdeDeserialize, SerdeSerialize))]
#[archive(check_bytes)]
pub struct LexEntry {
    pub id: EntryId,
    pub form: String,
    /// Category in slash notation, e.g. `(S[dcl]\NP)/NP`.
    pub category: String,
    pub predicate: String,
    /// Log weight added to the lexical score.
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[cfg_attr(feature = "serde", derive(SerdeDeserialize, SerdeSerialize))]
#[archive(check_bytes)]
pub struct LexiconData {
    pub version: u32,
    pub entries: Vec<LexEntry>,
    /// Entries proposed for any form missing from `entries`; the entry's
    /// `form` field is ignored.
    pub defaults: Vec<LexEntry>,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[cfg_attr(feature = "serde", derive(SerdeDeserialize, SerdeSerialize))]
#[archive(check_bytes)]
pub struct WeightedTag {
    /// Category signature, variables numbered by first appearance.
    pub category: String,
    pub probability: f32,
}

/// Supertag probabilities observed for one surface form.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[cfg_attr(feature = "serde", derive(SerdeDeserialize, SerdeSerialize))]
#[archive(check_bytes)]
pub struct TagDistribution {
    pub form: String,
    pub tags: Vec<WeightedTag>,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[cfg_attr(feature = "serde", derive(SerdeDeserialize, SerdeSerialize))]
#[archive(check_bytes)]
pub struct TaggerModel {
    pub version: u32,
    /// Beam values ordered from most to least restrictive.
    pub betas: Vec<f32>,
    pub distributions: Vec<TagDistribution>,
}
