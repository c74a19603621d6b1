//! Alignment of DrugBank drugs with the knowledge graph.
//!
//! 1. `DRUGBANK:<id>` is canonicalized; drugs unknown to the KG are dropped.
//! 2. The indication text is linked and kept to disease-like categories.
//! 3. Every other text field is linked and kept to mechanistic categories.
//! 4. Cross-reference names and ids (targets, enzymes, ...) and the targets
//!    table add mechanistic nodes that are not present yet.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use druglink_common::curie;
use druglink_common::{CanonicalNode, CategoryFilter, Result, Synonymizer};
use druglink_ingestion::text::{split_sentences, SentenceWindow};
use druglink_ingestion::{BioEntityRefs, DrugRecord, XrefField};
use druglink_ner::{MergedNodes, MultiLinkerMatcher};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::identifiers::{resolve_identifier, resource_to_curie};
use crate::targets::DrugTargets;

/// One drug of the output, keyed by its canonical KG CURIE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedDrug {
    #[serde(rename = "KG2_ID")]
    pub kg2_id: String,
    pub name: String,
    pub category: String,
    pub drug_bank_id: String,
    #[serde(default)]
    pub indications: MergedNodes,
    #[serde(default)]
    pub mechanistic_intermediate_nodes: MergedNodes,
    /// CURIEs built from the drug's own external identifiers.
    #[serde(default)]
    pub cross_references: Vec<String>,
    /// Structured cross-reference sections, aligned by the identifiers step.
    #[serde(default)]
    pub xrefs: BTreeMap<XrefField, BioEntityRefs>,
}

impl AlignedDrug {
    pub fn new(node: &CanonicalNode, record: &DrugRecord) -> Self {
        let mut cross_references: Vec<String> = Vec::new();
        for ext in &record.external_identifiers {
            if let Some(curie) = resource_to_curie(&ext.resource, &ext.identifier) {
                if !cross_references.contains(&curie) {
                    cross_references.push(curie);
                }
            }
        }
        Self {
            kg2_id: node.preferred_curie.clone(),
            name: node.preferred_name.clone(),
            category: node.preferred_category.clone(),
            drug_bank_id: record.drugbank_id.clone(),
            indications: MergedNodes::new(),
            mechanistic_intermediate_nodes: MergedNodes::new(),
            cross_references,
            xrefs: record.xrefs.clone(),
        }
    }
}

/// Canonical drug CURIE -> aligned drug.
pub type AlignedDrugs = BTreeMap<String, AlignedDrug>;

#[derive(Debug, Clone)]
pub struct AlignmentSettings {
    pub indication_window: SentenceWindow,
    pub mechanistic_window: SentenceWindow,
    pub indication_filter: CategoryFilter,
    pub mechanistic_filter: CategoryFilter,
    /// Log a progress line every this many drugs.
    pub progress_every: usize,
}

impl Default for AlignmentSettings {
    fn default() -> Self {
        Self {
            indication_window: SentenceWindow::indication(),
            mechanistic_window: SentenceWindow::mechanistic(),
            indication_filter: CategoryFilter::indications(),
            mechanistic_filter: CategoryFilter::mechanistic(),
            progress_every: 100,
        }
    }
}

pub struct DrugAligner {
    synonymizer: Arc<dyn Synonymizer>,
    matcher: Arc<MultiLinkerMatcher>,
    settings: AlignmentSettings,
}

/// Outcome of cross-reference alignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrossRefStats {
    pub added: usize,
    /// Names and ids skipped because their lookup failed.
    pub failed: usize,
}

impl DrugAligner {
    pub fn new(synonymizer: Arc<dyn Synonymizer>, matcher: Arc<MultiLinkerMatcher>, settings: AlignmentSettings) -> Self {
        Self { synonymizer, matcher, settings }
    }

    fn log_progress(&self, i: usize, total: usize) {
        if i % self.settings.progress_every.max(1) == 0 {
            info!("Processing drug {} of {}", i, total);
        }
    }

    /// Canonicalize every drug through `DRUGBANK:<id>`. Drugs that do not
    /// resolve are dropped; when two DrugBank ids land on the same KG node
    /// the first one is kept.
    #[instrument(skip_all, fields(drugs = records.len()))]
    pub async fn normalize_drugs(&self, records: &BTreeMap<String, DrugRecord>) -> Result<AlignedDrugs> {
        let queries: Vec<String> = records.keys().map(|id| curie::drugbank(id)).collect();
        let resolved: HashMap<String, CanonicalNode> = self
            .synonymizer
            .canonical_curies(&queries)
            .await?
            .into_iter()
            .filter_map(|(query, node)| node.map(|n| (query, n)))
            .collect();

        let mut drugs = AlignedDrugs::new();
        for (i, (id, record)) in records.iter().enumerate() {
            self.log_progress(i, records.len());
            let Some(node) = resolved.get(&curie::drugbank(id)) else {
                debug!(drug = %id, "Not in the knowledge graph");
                continue;
            };
            if let Some(existing) = drugs.get(&node.preferred_curie) {
                warn!(
                    "{} and {} both normalize to {}; keeping {}",
                    existing.drug_bank_id, id, node.preferred_curie, existing.drug_bank_id
                );
                continue;
            }
            drugs.insert(node.preferred_curie.clone(), AlignedDrug::new(node, record));
        }

        info!("Normalized {} of {} drugs", drugs.len(), records.len());
        Ok(drugs)
    }

    pub async fn align_indications(&self, record: &DrugRecord) -> MergedNodes {
        let sentences = split_sentences(record.indication(), &self.settings.indication_window);
        self.matcher
            .match_text(&sentences, self.synonymizer.as_ref(), &self.settings.indication_filter)
            .await
    }

    /// Each text field is split on its own so sentences never straddle fields.
    pub async fn align_mechanistic(&self, record: &DrugRecord) -> MergedNodes {
        let mut merged = MergedNodes::new();
        for (field, text) in record.mechanistic_texts() {
            let sentences = split_sentences(text, &self.settings.mechanistic_window);
            debug!(drug = %record.drugbank_id, field = field.as_str(), sentences = sentences.len(), "Linking");
            self.matcher
                .match_into(&mut merged, &sentences, self.synonymizer.as_ref(), &self.settings.mechanistic_filter)
                .await;
        }
        merged
    }

    /// Normalize, then link indications and mechanistic text of every drug.
    pub async fn align_all(&self, records: &BTreeMap<String, DrugRecord>) -> Result<AlignedDrugs> {
        let mut drugs = self.normalize_drugs(records).await?;
        let total = drugs.len();

        for (i, drug) in drugs.values_mut().enumerate() {
            self.log_progress(i, total);
            let Some(record) = records.get(&drug.drug_bank_id) else {
                continue;
            };
            drug.indications = self.align_indications(record).await;
            drug.mechanistic_intermediate_nodes = self.align_mechanistic(record).await;
        }

        let indications: usize = drugs.values().map(|d| d.indications.len()).sum();
        let mechanistic: usize = drugs.values().map(|d| d.mechanistic_intermediate_nodes.len()).sum();
        info!(
            "Aligned {} drugs: {} indications, {} mechanistic nodes",
            total, indications, mechanistic
        );
        Ok(drugs)
    }

    /// Add mechanistic nodes found through cross-reference names (by name)
    /// and ids (by pattern). Existing entries are never renamed. A name or id
    /// whose lookup fails is logged, counted and skipped.
    pub async fn align_cross_references(&self, drug: &mut AlignedDrug) -> CrossRefStats {
        let filter = &self.settings.mechanistic_filter;
        let nodes = &mut drug.mechanistic_intermediate_nodes;
        let mut stats = CrossRefStats::default();

        for refs in drug.xrefs.values() {
            let mut found: Vec<CanonicalNode> = Vec::new();

            if !refs.names.is_empty() {
                match self.synonymizer.canonical_names(&refs.names).await {
                    Ok(res) => found.extend(res.into_iter().filter_map(|(_, node)| node)),
                    Err(e) => {
                        debug!(drug = %drug.kg2_id, "Batch name lookup failed, retrying one at a time: {}", e);
                        for name in &refs.names {
                            match self.synonymizer.canonical_name(name).await {
                                Ok(node) => found.extend(node),
                                Err(e) => {
                                    warn!(drug = %drug.kg2_id, name = %name, "Name lookup failed, skipping: {}", e);
                                    stats.failed += 1;
                                }
                            }
                        }
                    }
                }
            }

            for id in &refs.ids {
                match resolve_identifier(id, self.synonymizer.as_ref()).await {
                    Ok(resolved) => found.extend(resolved),
                    Err(e) => {
                        warn!(drug = %drug.kg2_id, id = %id, "Identifier lookup failed, skipping: {}", e);
                        stats.failed += 1;
                    }
                }
            }

            for node in found {
                if nodes.insert_if_absent(&node.preferred_curie, &node.preferred_name, &node.preferred_category, filter) {
                    stats.added += 1;
                }
            }
        }
        stats
    }

    /// [`align_cross_references`](Self::align_cross_references) for every drug.
    pub async fn align_all_cross_references(&self, drugs: &mut AlignedDrugs) -> CrossRefStats {
        let total = drugs.len();
        let mut stats = CrossRefStats::default();
        for (i, drug) in drugs.values_mut().enumerate() {
            self.log_progress(i, total);
            let drug_stats = self.align_cross_references(drug).await;
            stats.added += drug_stats.added;
            stats.failed += drug_stats.failed;
        }
        if stats.failed > 0 {
            warn!("{} cross-reference lookups failed and were skipped", stats.failed);
        }
        info!("Added {} nodes from cross-references", stats.added);
        stats
    }

    /// Add resolved targets-table CURIEs to each drug's mechanistic nodes.
    pub async fn merge_targets(&self, drugs: &mut AlignedDrugs, targets: &DrugTargets) -> Result<usize> {
        let curies: Vec<String> = targets.values().flatten().cloned().collect();
        let resolved: HashMap<String, CanonicalNode> = self
            .synonymizer
            .canonical_curies(&curies)
            .await?
            .into_iter()
            .filter_map(|(query, node)| node.map(|n| (query, n)))
            .collect();

        let mut added = 0;
        for drug in drugs.values_mut() {
            let Some(curies) = targets.get(&drug.drug_bank_id) else {
                continue;
            };
            for curie in curies {
                let Some(node) = resolved.get(curie) else {
                    continue;
                };
                if drug.mechanistic_intermediate_nodes.insert_if_absent(
                    &node.preferred_curie,
                    &node.preferred_name,
                    &node.preferred_category,
                    &self.settings.mechanistic_filter,
                ) {
                    added += 1;
                }
            }
        }
        info!("Added {} nodes from the targets table", added);
        Ok(added)
    }
}
