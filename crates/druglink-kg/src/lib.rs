//! druglink-kg: Knowledge-graph side of the batch:
//! - Synonymizer backends (node-synonymizer SQLite, Node Normalization HTTP)
//! - Identifier extraction by pattern with prefix disambiguation
//! - Drug alignment: indications, mechanistic nodes, cross-references
//! - Targets table resolution
//! - JSON and bincode dumps

pub mod alignment;
pub mod identifiers;
pub mod nodenorm;
pub mod output;
pub mod sqlite;
pub mod targets;

pub use alignment::{AlignedDrug, AlignmentSettings, CrossRefStats, DrugAligner};
pub use nodenorm::NodeNormSynonymizer;
pub use sqlite::SqliteSynonymizer;
