//! druglink-common: Shared types and traits used across all druglink crates.

pub mod error;
pub mod categories;
pub mod curie;
pub mod synonymizer;
pub mod sandbox;

// Re-export commonly used types
pub use categories::CategoryFilter;
pub use error::{DruglinkError, Result};
pub use synonymizer::{CanonicalNode, InMemorySynonymizer, Synonymizer, SynonymizerResult};
