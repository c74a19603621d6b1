//! Identifier extraction by pattern.
//!
//! DrugBank cross-references often carry bare local ids ("P00734",
//! "SMP0000278") with no database prefix. Every database pattern that
//! matches proposes a CURIE; the synonymizer decides which ones exist.

use std::collections::HashSet;
use std::sync::OnceLock;

use druglink_common::curie::namespaced;
use druglink_common::{CanonicalNode, Result, Synonymizer};
use regex::Regex;
use tracing::debug;

/// (database, CURIE prefix, pattern). An empty prefix means the database
/// has no KG namespace and its matches are not proposed. Patterns only see
/// bare identifiers, so none of them may contain ':'.
pub const IDENTIFIER_PATTERNS: &[(&str, &str, &str)] = &[
    ("DrugBank", "DRUGBANK", r"DB\d+"),
    ("CAS", "CAS", r"\d{2,7}-\d{2}-\d"),
    ("KEGG Compound", "KEGG.COMPOUND", r"C\d{5}"),
    ("KEGG Drug", "KEGG.DRUG", r"D\d{5}"),
    ("PubChem Compound", "PUBCHEM.COMPOUND", r"\d{4,9}"),
    ("PubChem Substance", "PUBCHEM.SUBSTANCE", r"\d{4,9}"),
    ("ChEBI", "CHEBI", r"\d+"),
    ("PharmGKB", "PHARMGKB", r"PA\d+"),
    ("HET", "", r"\w{3}"),
    ("UniProt", "UNIPROTKB", r"[OPQ][0-9][A-Z0-9]{3}[0-9]"),
    ("GenBank", "GENBANK", r"\w{2}\d{6}"),
    ("DPD", "", r"\d+"),
    ("NDC", "NDC", r"\d{4}-\d{4}-\d{2}"),
    ("SMPDB", "SMPDB", r"SMP\d+"),
];

/// Resource names used in DrugBank `<external-identifiers>` that are not
/// already database names of [`IDENTIFIER_PATTERNS`].
const RESOURCE_ALIASES: &[(&str, &str)] = &[
    ("UniProtKB", "UNIPROTKB"),
    ("RxCUI", "RXNORM"),
    ("ChEMBL", "CHEMBL.COMPOUND"),
    ("Therapeutic Targets Database", "ttd.target"),
    ("Guide to Pharmacology", "GTOPDB"),
    ("HUGO Gene Nomenclature Committee (HGNC)", "HGNC"),
];

fn compiled_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        IDENTIFIER_PATTERNS
            .iter()
            .filter(|(_, prefix, _)| !prefix.is_empty())
            .map(|(_, prefix, pattern)| (*prefix, Regex::new(pattern).unwrap()))
            .collect()
    })
}

/// CURIE proposals for a bare identifier, in table order, without repeats.
///
/// Each match proposes `PREFIX:<match>`; a match that does not cover the
/// whole identifier also proposes `PREFIX:<identifier>`.
pub fn propose_curies(identifier: &str) -> Vec<String> {
    let identifier = identifier.trim();
    let mut seen = HashSet::new();
    let mut proposals = Vec::new();
    let mut propose = |curie: String| {
        if seen.insert(curie.clone()) {
            proposals.push(curie);
        }
    };

    for (prefix, re) in compiled_patterns() {
        for m in re.find_iter(identifier) {
            propose(format!("{}:{}", prefix, m.as_str()));
            if m.as_str() != identifier {
                propose(format!("{prefix}:{identifier}"));
            }
        }
    }
    proposals
}

/// CURIE for an identifier listed under a known resource name.
pub fn resource_to_curie(resource: &str, identifier: &str) -> Option<String> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return None;
    }
    let prefix = IDENTIFIER_PATTERNS
        .iter()
        .find(|(db, _, _)| db.eq_ignore_ascii_case(resource))
        .map(|(_, prefix, _)| *prefix)
        .or_else(|| {
            RESOURCE_ALIASES
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(resource))
                .map(|(_, prefix)| *prefix)
        })?;
    if prefix.is_empty() {
        return None;
    }
    Some(namespaced(prefix, identifier))
}

/// Canonical nodes for one identifier. Prefixed identifiers are resolved
/// as given; bare ones through [`propose_curies`]. Deduplicated by preferred CURIE.
pub async fn resolve_identifier(identifier: &str, synonymizer: &dyn Synonymizer) -> Result<Vec<CanonicalNode>> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Ok(Vec::new());
    }
    let queries = if identifier.contains(':') {
        vec![identifier.to_string()]
    } else {
        propose_curies(identifier)
    };
    if queries.is_empty() {
        return Ok(Vec::new());
    }

    let mut seen = HashSet::new();
    let nodes: Vec<CanonicalNode> = synonymizer
        .canonical_curies(&queries)
        .await?
        .into_iter()
        .filter_map(|(_, node)| node)
        .filter(|node| seen.insert(node.preferred_curie.clone()))
        .collect();
    debug!(identifier, proposals = queries.len(), resolved = nodes.len(), "Identifier resolved");
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use druglink_common::InMemorySynonymizer;

    use super::*;

    #[test]
    fn test_uniprot_and_partial_proposals() {
        let proposals = propose_curies("P00734");
        assert!(proposals.contains(&"UNIPROTKB:P00734".to_string()));
        // "00734" matches ChEBI-style digits partially -> both forms proposed
        assert!(proposals.contains(&"CHEBI:00734".to_string()));
        assert!(proposals.contains(&"CHEBI:P00734".to_string()));
        assert!(!proposals.iter().any(|p| p.starts_with(':')));
    }

    #[test]
    fn test_smpdb_and_drugbank() {
        let proposals = propose_curies("SMP0000278");
        assert!(proposals.contains(&"SMPDB:SMP0000278".to_string()));
        assert!(proposals.contains(&"PUBCHEM.COMPOUND:0000278".to_string()));
        assert!(propose_curies("DB00001").contains(&"DRUGBANK:DB00001".to_string()));
    }

    #[test]
    fn test_empty_prefix_databases_are_skipped() {
        // only HET (\w{3}) and nothing else would match "abc"
        assert!(propose_curies("abc").is_empty());
    }

    #[test]
    fn test_no_duplicate_proposals() {
        let proposals = propose_curies("12345");
        let unique: HashSet<_> = proposals.iter().collect();
        assert_eq!(unique.len(), proposals.len());
        assert!(proposals.contains(&"PUBCHEM.COMPOUND:12345".to_string()));
        assert!(proposals.contains(&"PUBCHEM.SUBSTANCE:12345".to_string()));
    }

    #[test]
    fn test_resource_to_curie() {
        assert_eq!(resource_to_curie("KEGG Drug", "D06880").as_deref(), Some("KEGG.DRUG:D06880"));
        assert_eq!(resource_to_curie("ChEBI", "CHEBI:4031").as_deref(), Some("CHEBI:4031"));
        assert_eq!(resource_to_curie("RxCUI", "237057").as_deref(), Some("RXNORM:237057"));
        assert_eq!(resource_to_curie("DPD", "11916"), None);
        assert_eq!(resource_to_curie("Wikipedia", "Lepirudin"), None);
    }

    #[test]
    fn test_patterns_match_bare_identifiers_only() {
        assert!(IDENTIFIER_PATTERNS.iter().all(|(_, _, pattern)| !pattern.contains(':')));
    }

    #[tokio::test]
    async fn test_resolve_dedups_by_preferred_curie() {
        let syn = InMemorySynonymizer::new().with(
            "NCBIGene:2147",
            "F2",
            "Gene",
            &["UNIPROTKB:P00734", "CHEBI:P00734"],
            &[],
        );
        let nodes = resolve_identifier("P00734", &syn).await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].preferred_curie, "NCBIGene:2147");
    }

    #[tokio::test]
    async fn test_prefixed_identifier_resolved_directly() {
        let syn = InMemorySynonymizer::new().with("NCBIGene:2147", "F2", "Gene", &["HGNC:3535"], &[]);
        let nodes = resolve_identifier("HGNC:3535", &syn).await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].preferred_curie, "NCBIGene:2147");
        assert!(resolve_identifier("ZZ:0", &syn).await.unwrap().is_empty());
        assert!(resolve_identifier("", &syn).await.unwrap().is_empty());
    }
}
