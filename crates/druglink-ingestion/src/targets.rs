//! DrugBank targets table (`drugbank_targets.csv`).
//!
//! Columns as distributed by DrugBank:
//! ID, Name, Gene Name, GenBank Protein ID, GenBank Gene ID, UniProt ID,
//! Uniprot Title, PDB ID, GeneCard ID, GenAtlas ID, HGNC ID, Species, Drug IDs

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use druglink_common::curie::namespaced;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
struct RawTargetRow {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Gene Name", default)]
    gene_name: String,
    #[serde(rename = "UniProt ID", default)]
    uniprot_id: String,
    #[serde(rename = "HGNC ID", default)]
    hgnc_id: String,
    #[serde(rename = "Species", default)]
    species: String,
    #[serde(rename = "Drug IDs", default)]
    drug_ids: String,
}

/// A cleaned row of the targets table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRow {
    pub id: String,
    pub name: Option<String>,
    pub gene_name: Option<String>,
    pub uniprot_id: Option<String>,
    pub hgnc_id: Option<String>,
    pub species: Option<String>,
    pub drug_ids: Vec<String>,
}

/// One way of identifying a target, in order of preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKey {
    Curie(String),
    Name(String),
}

impl TargetRow {
    /// Lookup keys in order of preference: HGNC id, UniProt id, name, gene symbol.
    pub fn lookup_keys(&self) -> Vec<TargetKey> {
        let mut keys = Vec::new();
        if let Some(hgnc) = &self.hgnc_id {
            keys.push(TargetKey::Curie(namespaced("HGNC", hgnc)));
        }
        if let Some(uniprot) = &self.uniprot_id {
            keys.push(TargetKey::Curie(namespaced("UNIPROTKB", uniprot)));
        }
        if let Some(name) = &self.name {
            keys.push(TargetKey::Name(name.clone()));
        }
        if let Some(symbol) = &self.gene_name {
            keys.push(TargetKey::Name(symbol.clone()));
        }
        keys
    }

    /// The namespaced identifier of the row, if it carries one.
    pub fn fallback_curie(&self) -> Option<String> {
        self.lookup_keys().into_iter().find_map(|k| match k {
            TargetKey::Curie(c) => Some(c),
            TargetKey::Name(_) => None,
        })
    }
}

/// Empty cells and pandas' "nan" both mean missing.
fn cell(value: String) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(value.to_string())
    }
}

impl From<RawTargetRow> for TargetRow {
    fn from(raw: RawTargetRow) -> Self {
        Self {
            id: raw.id.trim().to_string(),
            name: cell(raw.name),
            gene_name: cell(raw.gene_name),
            uniprot_id: cell(raw.uniprot_id),
            hgnc_id: cell(raw.hgnc_id),
            species: cell(raw.species),
            drug_ids: raw
                .drug_ids
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }
}

pub fn read_targets_csv(path: &Path) -> anyhow::Result<Vec<TargetRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Cannot open targets table at {}", path.display()))?;
    parse_targets(file)
}

pub fn parse_targets<R: Read>(reader: R) -> anyhow::Result<Vec<TargetRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for (line, result) in reader.deserialize::<RawTargetRow>().enumerate() {
        match result {
            Ok(raw) => rows.push(TargetRow::from(raw)),
            Err(e) => warn!("Skipping malformed targets row {}: {}", line + 2, e),
        }
    }

    info!("Loaded {} target rows", rows.len());
    Ok(rows)
}
