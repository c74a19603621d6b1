//! Synonymizer backed by the Translator Node Normalization and Name
//! Resolution services.
//!
//! CURIEs: `POST {nodenorm}/get_normalized_nodes` in chunks.
//! Names: `GET {nameres}/lookup`, keeping only hits whose label or synonym
//! equals the query, then normalizing the hit's CURIE.

use std::collections::HashMap;

use async_trait::async_trait;
use druglink_common::sandbox::SandboxClient;
use druglink_common::synonymizer::dedup_queries;
use druglink_common::{CanonicalNode, DruglinkError, Result, Synonymizer, SynonymizerResult};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

pub const DEFAULT_NODENORM_URL: &str = "https://nodenormalization-sri.renci.org";
pub const DEFAULT_NAMERES_URL: &str = "https://name-resolution-sri.renci.org";

const CHUNK_SIZE: usize = 1000;
const LOOKUP_LIMIT: usize = 10;
const NAMED_THING: &str = "biolink:NamedThing";

#[derive(Debug, Deserialize)]
struct Identifier {
    identifier: String,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NormalizedNode {
    id: Identifier,
    #[serde(rename = "type", default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LookupHit {
    curie: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    synonyms: Vec<String>,
}

impl From<NormalizedNode> for CanonicalNode {
    fn from(node: NormalizedNode) -> Self {
        CanonicalNode {
            preferred_name: node.id.label.unwrap_or_else(|| node.id.identifier.clone()),
            preferred_curie: node.id.identifier,
            preferred_category: node.types.into_iter().next().unwrap_or_else(|| NAMED_THING.to_string()),
        }
    }
}

/// Map a `get_normalized_nodes` response back onto the queried CURIEs, in query order.
fn parse_normalized(queries: &[String], body: serde_json::Value) -> Result<SynonymizerResult> {
    let mut by_curie: HashMap<String, Option<NormalizedNode>> = serde_json::from_value(body)?;
    Ok(queries
        .iter()
        .map(|q| (q.clone(), by_curie.remove(q).flatten().map(CanonicalNode::from)))
        .collect())
}

/// First hit whose label or one of its synonyms is the query (case-insensitive).
fn exact_hit(name: &str, hits: Vec<LookupHit>) -> Option<String> {
    let name = name.trim();
    hits.into_iter()
        .find(|h| h.label.eq_ignore_ascii_case(name) || h.synonyms.iter().any(|s| s.eq_ignore_ascii_case(name)))
        .map(|h| h.curie)
}

pub struct NodeNormSynonymizer {
    client: SandboxClient,
    nodenorm_url: String,
    nameres_url: String,
    conflate: bool,
}

impl NodeNormSynonymizer {
    pub fn new(nodenorm_url: &str, nameres_url: &str) -> Result<Self> {
        let mut client = SandboxClient::new()?;
        client.allow_url_host(nodenorm_url);
        client.allow_url_host(nameres_url);
        Ok(Self {
            client,
            nodenorm_url: nodenorm_url.trim_end_matches('/').to_string(),
            nameres_url: nameres_url.trim_end_matches('/').to_string(),
            conflate: true,
        })
    }

    pub fn with_conflation(mut self, conflate: bool) -> Self {
        self.conflate = conflate;
        self
    }

    async fn normalize_chunk(&self, chunk: &[String]) -> Result<SynonymizerResult> {
        let url = format!("{}/get_normalized_nodes", self.nodenorm_url);
        let resp = self
            .client
            .post(&url)?
            .json(&json!({ "curies": chunk, "conflate": self.conflate }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(DruglinkError::Synonymizer(format!(
                "Node Normalization returned {}",
                resp.status()
            )));
        }
        let body: serde_json::Value = resp.json().await?;
        parse_normalized(chunk, body)
    }

    async fn lookup_name(&self, name: &str) -> Result<Option<String>> {
        let url = format!("{}/lookup", self.nameres_url);
        let limit = LOOKUP_LIMIT.to_string();
        let resp = self
            .client
            .get(&url)?
            .query(&[("string", name), ("autocomplete", "false"), ("limit", limit.as_str())])
            .send()
            .await?;
        if !resp.status().is_success() {
            warn!("Name Resolution returned {} for {:?}", resp.status(), name);
            return Ok(None);
        }
        let hits: Vec<LookupHit> = resp.json().await?;
        Ok(exact_hit(name, hits))
    }
}

#[async_trait]
impl Synonymizer for NodeNormSynonymizer {
    async fn canonical_curies(&self, curies: &[String]) -> Result<SynonymizerResult> {
        let queries = dedup_queries(curies);
        let mut out = Vec::with_capacity(queries.len());
        for chunk in queries.chunks(CHUNK_SIZE) {
            out.extend(self.normalize_chunk(chunk).await?);
        }
        debug!("Normalized {} CURIEs", out.len());
        Ok(out)
    }

    async fn canonical_names(&self, names: &[String]) -> Result<SynonymizerResult> {
        let mut out = Vec::new();
        for name in dedup_queries(names) {
            let node = match self.lookup_name(&name).await? {
                Some(curie) => self.canonical_curie(&curie).await?,
                None => None,
            };
            out.push((name, node));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalized_response() {
        let body = json!({
            "HGNC:3535": {
                "id": {"identifier": "NCBIGene:2147", "label": "F2"},
                "equivalent_identifiers": [{"identifier": "NCBIGene:2147"}, {"identifier": "HGNC:3535"}],
                "type": ["biolink:Gene", "biolink:GeneOrGeneProduct"]
            },
            "FOO:1": null
        });
        let queries = vec!["HGNC:3535".to_string(), "FOO:1".to_string(), "BAR:2".to_string()];
        let res = parse_normalized(&queries, body).unwrap();
        assert_eq!(res.len(), 3);
        let node = res[0].1.as_ref().unwrap();
        assert_eq!(node.preferred_curie, "NCBIGene:2147");
        assert_eq!(node.preferred_name, "F2");
        assert_eq!(node.preferred_category, "biolink:Gene");
        assert!(res[1].1.is_none());
        assert!(res[2].1.is_none());
    }

    #[test]
    fn test_unlabelled_node_falls_back_to_identifier() {
        let body = json!({"X:1": {"id": {"identifier": "X:1"}, "type": []}});
        let res = parse_normalized(&["X:1".to_string()], body).unwrap();
        let node = res[0].1.as_ref().unwrap();
        assert_eq!(node.preferred_name, "X:1");
        assert_eq!(node.preferred_category, NAMED_THING);
    }

    #[test]
    fn test_exact_hit_requires_label_or_synonym() {
        let hits: Vec<LookupHit> = serde_json::from_value(json!([
            {"curie": "MONDO:0005044", "label": "hypertensive disorder", "synonyms": ["Hypertension", "HTN"]},
            {"curie": "HP:0000822", "label": "Hypertension"}
        ]))
        .unwrap();
        assert_eq!(exact_hit("hypertension", hits).as_deref(), Some("MONDO:0005044"));

        let hits: Vec<LookupHit> =
            serde_json::from_value(json!([{"curie": "X:1", "label": "hypertensive crisis"}])).unwrap();
        assert_eq!(exact_hit("hypertension", hits), None);
    }

    #[tokio::test]
    #[ignore] // Requires network access to the Translator services
    async fn test_live_normalization() {
        let syn = NodeNormSynonymizer::new(DEFAULT_NODENORM_URL, DEFAULT_NAMERES_URL).unwrap();
        let node = syn.canonical_curie("HGNC:3535").await.unwrap().unwrap();
        assert_eq!(node.preferred_curie, "NCBIGene:2147");
    }
}
