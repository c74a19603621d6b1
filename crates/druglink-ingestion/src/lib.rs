//! druglink-ingestion: Input side of the batch:
//! - DrugBank XML streaming parser
//! - Text flattening and sentence splitting
//! - DrugBank targets table
//! - Provisioning of remote input files with SHA-256 verification

pub mod drugbank;
pub mod models;
pub mod remote;
pub mod targets;
pub mod text;

pub use models::{BioEntityRefs, DrugRecord, ExternalIdentifier, TextField, XrefField};
