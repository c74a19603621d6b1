//! Resolution of the DrugBank targets table to KG CURIEs.

use std::collections::BTreeMap;

use druglink_common::{Result, Synonymizer};
use druglink_ingestion::targets::{TargetKey, TargetRow};
use tracing::{debug, info};

/// DrugBank id -> target CURIEs, in table order.
pub type DrugTargets = BTreeMap<String, Vec<String>>;

/// Preferred CURIE of the first lookup key that resolves (HGNC, UniProt,
/// name, gene symbol). If none resolves, the row's own namespaced id.
pub async fn resolve_target(row: &TargetRow, synonymizer: &dyn Synonymizer) -> Result<Option<String>> {
    for key in row.lookup_keys() {
        let node = match &key {
            TargetKey::Curie(curie) => synonymizer.canonical_curie(curie).await?,
            TargetKey::Name(name) => synonymizer.canonical_name(name).await?,
        };
        if let Some(node) = node {
            return Ok(Some(node.preferred_curie));
        }
    }
    let fallback = row.fallback_curie();
    if fallback.is_none() {
        debug!(target_id = %row.id, "Target has no resolvable key");
    }
    Ok(fallback)
}

pub async fn resolve_targets(rows: &[TargetRow], synonymizer: &dyn Synonymizer) -> Result<DrugTargets> {
    let mut by_drug = DrugTargets::new();
    let mut resolved = 0usize;

    for row in rows {
        let Some(curie) = resolve_target(row, synonymizer).await? else {
            continue;
        };
        resolved += 1;
        for drug_id in &row.drug_ids {
            let targets = by_drug.entry(drug_id.clone()).or_default();
            if !targets.contains(&curie) {
                targets.push(curie.clone());
            }
        }
    }

    info!(
        "Resolved {} of {} targets for {} drugs",
        resolved,
        rows.len(),
        by_drug.len()
    );
    Ok(by_drug)
}
