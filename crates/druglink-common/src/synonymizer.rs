//! The node synonymizer seam: maps CURIEs and names to canonical KG nodes.
//!
//! Backends live in `druglink-kg`; the in-memory table here is used for
//! fixtures and offline runs.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::categories::with_biolink_prefix;
use crate::error::Result;

/// The preferred (canonical) node of a synonym cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalNode {
    pub preferred_curie: String,
    pub preferred_name: String,
    pub preferred_category: String,
}

/// One entry per distinct query, in query order. `None` means not found.
pub type SynonymizerResult = Vec<(String, Option<CanonicalNode>)>;

#[async_trait]
pub trait Synonymizer: Send + Sync {
    /// Canonicalize a batch of CURIEs.
    async fn canonical_curies(&self, curies: &[String]) -> Result<SynonymizerResult>;

    /// Canonicalize a batch of names (exact, case-insensitive).
    async fn canonical_names(&self, names: &[String]) -> Result<SynonymizerResult>;

    async fn canonical_curie(&self, curie: &str) -> Result<Option<CanonicalNode>> {
        let res = self.canonical_curies(&[curie.to_string()]).await?;
        Ok(res.into_iter().next().and_then(|(_, node)| node))
    }

    async fn canonical_name(&self, name: &str) -> Result<Option<CanonicalNode>> {
        let res = self.canonical_names(&[name.to_string()]).await?;
        Ok(res.into_iter().next().and_then(|(_, node)| node))
    }
}

/// Drop repeated queries while keeping first-seen order.
pub fn dedup_queries(queries: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    queries
        .iter()
        .filter(|q| seen.insert(q.as_str()))
        .cloned()
        .collect()
}

/// A synonym cluster as stored in a JSON fixture / export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynonymCluster {
    pub preferred_curie: String,
    pub preferred_name: String,
    pub preferred_category: String,
    /// Equivalent CURIEs (the preferred CURIE is always included).
    #[serde(default)]
    pub curies: Vec<String>,
    /// Synonyms (the preferred name is always included).
    #[serde(default)]
    pub names: Vec<String>,
}

/// In-memory synonymizer keyed by upper-cased CURIE and lower-cased name.
#[derive(Debug, Clone, Default)]
pub struct InMemorySynonymizer {
    by_curie: HashMap<String, CanonicalNode>,
    by_name: HashMap<String, CanonicalNode>,
}

impl InMemorySynonymizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON array of [`SynonymCluster`].
    pub fn from_json(json: &str) -> Result<Self> {
        let clusters: Vec<SynonymCluster> = serde_json::from_str(json)?;
        Ok(Self::from_clusters(clusters))
    }

    pub fn from_clusters(clusters: impl IntoIterator<Item = SynonymCluster>) -> Self {
        let mut table = Self::new();
        for cluster in clusters {
            table.insert_cluster(cluster);
        }
        tracing::info!(
            "In-memory synonymizer built: {} CURIEs, {} names",
            table.by_curie.len(),
            table.by_name.len()
        );
        table
    }

    pub fn insert_cluster(&mut self, cluster: SynonymCluster) {
        let node = CanonicalNode {
            preferred_curie: cluster.preferred_curie.clone(),
            preferred_name: cluster.preferred_name.clone(),
            preferred_category: with_biolink_prefix(&cluster.preferred_category),
        };

        self.by_curie.insert(curie_key(&cluster.preferred_curie), node.clone());
        for curie in &cluster.curies {
            self.by_curie.entry(curie_key(curie)).or_insert_with(|| node.clone());
        }

        self.by_name.insert(name_key(&cluster.preferred_name), node.clone());
        for name in &cluster.names {
            self.by_name.entry(name_key(name)).or_insert_with(|| node.clone());
        }
    }

    /// Builder-style insert for tests.
    pub fn with(
        mut self,
        preferred_curie: &str,
        preferred_name: &str,
        preferred_category: &str,
        curies: &[&str],
        names: &[&str],
    ) -> Self {
        self.insert_cluster(SynonymCluster {
            preferred_curie: preferred_curie.to_string(),
            preferred_name: preferred_name.to_string(),
            preferred_category: preferred_category.to_string(),
            curies: curies.iter().map(|s| s.to_string()).collect(),
            names: names.iter().map(|s| s.to_string()).collect(),
        });
        self
    }
}

fn curie_key(curie: &str) -> String {
    curie.trim().to_uppercase()
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[async_trait]
impl Synonymizer for InMemorySynonymizer {
    async fn canonical_curies(&self, curies: &[String]) -> Result<SynonymizerResult> {
        Ok(dedup_queries(curies)
            .into_iter()
            .map(|c| {
                let node = self.by_curie.get(&curie_key(&c)).cloned();
                (c, node)
            })
            .collect())
    }

    async fn canonical_names(&self, names: &[String]) -> Result<SynonymizerResult> {
        Ok(dedup_queries(names)
            .into_iter()
            .map(|n| {
                let node = self.by_name.get(&name_key(&n)).cloned();
                (n, node)
            })
            .collect())
    }
}
