#![no_std] // Shared with no_std consumers of compiled lexicons

extern crate alloc;

// Enable std if the feature is active (for tests/tools)
#[cfg(feature = "std")]
extern crate std;

pub mod features;
pub mod ids;

// Re-export core types for convenience
pub use features::{Features, FEATURE_DIMENSIONS};
pub use ids::{EntryId, SymbolId, VarId};

pub mod model;
pub use model::*;
