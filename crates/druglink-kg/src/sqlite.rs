//! Node synonymizer backed by the KG's SQLite synonymizer database.
//!
//! Schema used (node synonymizer v1.0):
//! - `nodes(id, cluster_id, name, name_simplified, category, ...)`
//! - `clusters(cluster_id, name, category, ...)`
//!
//! A cluster id is the preferred CURIE of its cluster; categories are stored
//! without the `biolink:` prefix.

use std::path::Path;

use async_trait::async_trait;
use druglink_common::categories::with_biolink_prefix;
use druglink_common::synonymizer::dedup_queries;
use druglink_common::{CanonicalNode, DruglinkError, Result, Synonymizer, SynonymizerResult};
use libsql::{params, Builder, Connection, Value};
use tracing::{debug, info, instrument};

const BY_CURIE: &str = "SELECT N.id, C.cluster_id, C.name, C.category \
     FROM nodes AS N INNER JOIN clusters AS C ON C.cluster_id = N.cluster_id \
     WHERE N.id = ?1 LIMIT 1";

const BY_NAME: &str = "SELECT N.name, C.cluster_id, C.name, C.category \
     FROM nodes AS N INNER JOIN clusters AS C ON C.cluster_id = N.cluster_id \
     WHERE N.name_simplified = ?1 LIMIT 1";

fn db_err(e: libsql::Error) -> DruglinkError {
    DruglinkError::Synonymizer(e.to_string())
}

pub struct SqliteSynonymizer {
    conn: Connection,
}

impl SqliteSynonymizer {
    #[instrument]
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DruglinkError::Config(format!(
                "node synonymizer database not found at {} (run `druglink fetch` first)",
                path.display()
            )));
        }
        let db = Builder::new_local(path).build().await.map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;
        info!("Opened node synonymizer {}", path.display());
        Ok(Self { conn })
    }

    async fn lookup(&self, sql: &str, key: String) -> Result<Option<CanonicalNode>> {
        let mut rows = self.conn.query(sql, params![key]).await.map_err(db_err)?;
        let Some(row) = rows.next().await.map_err(db_err)? else {
            return Ok(None);
        };
        let preferred_curie = text(row.get_value(1).map_err(db_err)?);
        if preferred_curie.is_empty() {
            return Ok(None);
        }
        Ok(Some(CanonicalNode {
            preferred_curie,
            preferred_name: text(row.get_value(2).map_err(db_err)?),
            preferred_category: with_biolink_prefix(&text(row.get_value(3).map_err(db_err)?)),
        }))
    }
}

fn text(value: Value) -> String {
    match value {
        Value::Text(s) => s,
        Value::Integer(i) => i.to_string(),
        _ => String::new(),
    }
}

/// Upper-case the prefix of a CURIE, leaving the local part alone.
pub fn capitalize_prefix(curie: &str) -> String {
    match curie.split_once(':') {
        Some((prefix, local)) => format!("{}:{}", prefix.to_uppercase(), local),
        None => curie.to_string(),
    }
}

#[async_trait]
impl Synonymizer for SqliteSynonymizer {
    async fn canonical_curies(&self, curies: &[String]) -> Result<SynonymizerResult> {
        let mut out = Vec::with_capacity(curies.len());
        for curie in dedup_queries(curies) {
            let mut node = self.lookup(BY_CURIE, curie.trim().to_string()).await?;
            let capitalized = capitalize_prefix(curie.trim());
            if node.is_none() && capitalized != curie.trim() {
                node = self.lookup(BY_CURIE, capitalized).await?;
            }
            out.push((curie, node));
        }
        debug!("Resolved {} CURIEs", out.iter().filter(|(_, n)| n.is_some()).count());
        Ok(out)
    }

    async fn canonical_names(&self, names: &[String]) -> Result<SynonymizerResult> {
        let mut out = Vec::with_capacity(names.len());
        for name in dedup_queries(names) {
            let node = self.lookup(BY_NAME, name.trim().to_lowercase()).await?;
            out.push((name, node));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    async fn fixture_db(dir: &Path) -> PathBuf {
        let path = dir.join("node_synonymizer_test.sqlite");
        let db = Builder::new_local(&path).build().await.unwrap();
        let conn = db.connect().unwrap();
        conn.execute_batch(
            "CREATE TABLE clusters (cluster_id TEXT PRIMARY KEY, name TEXT, category TEXT);
             CREATE TABLE nodes (id TEXT PRIMARY KEY, cluster_id TEXT, name TEXT,
                                 name_simplified TEXT, category TEXT);
             INSERT INTO clusters VALUES ('NCBIGene:2147', 'F2', 'Gene');
             INSERT INTO clusters VALUES ('MONDO:0005044', 'hypertension', 'Disease');
             INSERT INTO nodes VALUES ('NCBIGene:2147', 'NCBIGene:2147', 'F2', 'f2', 'Gene');
             INSERT INTO nodes VALUES ('HGNC:3535', 'NCBIGene:2147', 'F2', 'f2', 'Gene');
             INSERT INTO nodes VALUES ('UNIPROTKB:P00734', 'NCBIGene:2147', 'Prothrombin', 'prothrombin', 'Protein');
             INSERT INTO nodes VALUES ('MONDO:0005044', 'MONDO:0005044', 'hypertension', 'hypertension', 'Disease');",
        )
        .await
        .unwrap();
        path
    }

    #[tokio::test]
    async fn test_curie_lookup_via_cluster() {
        let dir = tempfile::tempdir().unwrap();
        let syn = SqliteSynonymizer::open(&fixture_db(dir.path()).await).await.unwrap();

        let node = syn.canonical_curie("HGNC:3535").await.unwrap().unwrap();
        assert_eq!(node.preferred_curie, "NCBIGene:2147");
        assert_eq!(node.preferred_name, "F2");
        assert_eq!(node.preferred_category, "biolink:Gene");

        // lower-case prefix retried upper-cased
        let node = syn.canonical_curie("uniprotkb:P00734").await.unwrap().unwrap();
        assert_eq!(node.preferred_curie, "NCBIGene:2147");
        assert!(syn.canonical_curie("HGNC:0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_name_lookup_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let syn = SqliteSynonymizer::open(&fixture_db(dir.path()).await).await.unwrap();

        let res = syn
            .canonical_names(&["Prothrombin".to_string(), "nothing".to_string()])
            .await
            .unwrap();
        assert_eq!(res[0].1.as_ref().unwrap().preferred_curie, "NCBIGene:2147");
        assert!(res[1].1.is_none());
    }

    #[tokio::test]
    async fn test_missing_database_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteSynonymizer::open(&dir.path().join("absent.sqlite")).await.err().unwrap();
        assert!(matches!(err, DruglinkError::Config(_)));
    }

    #[test]
    fn test_capitalize_prefix() {
        assert_eq!(capitalize_prefix("uniprotkb:P00734"), "UNIPROTKB:P00734");
        assert_eq!(capitalize_prefix("P00734"), "P00734");
    }
}
