use bitflags::bitflags;

#[cfg(feature = "serde")]
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

bitflags! {
    /// Feature bundle carried by an atomic category, e.g. `NP[sg,3rd]`.
    ///
    /// Features are grouped into dimensions. Two bundles unify when, for every
    /// dimension both of them specify, they share at least one value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[cfg_attr(feature = "serde", derive(SerdeDeserialize, SerdeSerialize))]
    pub struct Features: u32 {
        // Number (Bits 0-1)
        const SINGULAR = 1;
        const PLURAL = 2;

        // Person (Bits 2-4)
        const FIRST_PERSON = 4;
        const SECOND_PERSON = 8;
        const THIRD_PERSON = 16;

        // Case (Bits 5-6)
        const NOMINATIVE = 32;
        const ACCUSATIVE = 64;

        // Clause form (Bits 7-10)
        const DECLARATIVE = 128;
        const QUESTION = 256;
        const INFINITIVE = 512;
        const BARE = 1024;
    }
}

/// Masks of mutually exclusive feature values.
pub const FEATURE_DIMENSIONS: [Features; 4] = [
    Features::SINGULAR.union(Features::PLURAL),
    Features::FIRST_PERSON
        .union(Features::SECOND_PERSON)
        .union(Features::THIRD_PERSON),
    Features::NOMINATIVE.union(Features::ACCUSATIVE),
    Features::DECLARATIVE
        .union(Features::QUESTION)
        .union(Features::INFINITIVE)
        .union(Features::BARE),
];

/// Notation names, in display order.
pub const FEATURE_NAMES: [(&str, Features); 11] = [
    ("sg", Features::SINGULAR),
    ("pl", Features::PLURAL),
    ("1st", Features::FIRST_PERSON),
    ("2nd", Features::SECOND_PERSON),
    ("3rd", Features::THIRD_PERSON),
    ("nom", Features::NOMINATIVE),
    ("acc", Features::ACCUSATIVE),
    ("dcl", Features::DECLARATIVE),
    ("q", Features::QUESTION),
    ("inf", Features::INFINITIVE),
    ("b", Features::BARE),
];

impl Features {
    /// Unifies two bundles dimension by dimension.
    ///
    /// An unspecified dimension takes the other side's values; a dimension
    /// specified on both sides keeps the shared values and fails when there
    /// are none.
    pub fn unify(self, other: Features) -> Option<Features> {
        let mut unified = Features::empty();
        for mask in FEATURE_DIMENSIONS {
            let left = self.intersection(mask);
            let right = other.intersection(mask);
            let merged = if left.is_empty() {
                right
            } else if right.is_empty() {
                left
            } else {
                let shared = left.intersection(right);
                if shared.is_empty() {
                    return None;
                }
                shared
            };
            unified |= merged;
        }
        Some(unified)
    }

    /// Looks up a single feature by its notation name.
    pub fn from_short_name(name: &str) -> Option<Features> {
        FEATURE_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| *f)
    }

    /// Notation names of the set features, in display order.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        FEATURE_NAMES
            .iter()
            .filter(move |(_, f)| self.contains(*f))
            .map(|(n, _)| *n)
    }
}
