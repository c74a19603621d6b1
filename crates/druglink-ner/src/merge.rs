//! Longest-name-wins reduction of matches into one node set.
//!
//! One entry per canonical CURIE. A later mention replaces the stored name
//! only when it is strictly longer (in characters); the category recorded
//! with the first accepted mention is kept.

use std::collections::BTreeMap;

use druglink_common::CategoryFilter;
use serde::{Deserialize, Serialize};

use crate::matcher::KgMatch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedNode {
    pub name: String,
    pub category: String,
}

/// Canonical CURIE -> merged node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergedNodes(BTreeMap<String, MergedNode>);

/// What [`MergedNodes::offer`] did with a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Inserted,
    Renamed,
    Kept,
    Filtered,
}

impl MergedNodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a mention of `curie`.
    pub fn offer(&mut self, curie: &str, mention: &str, category: &str, filter: &CategoryFilter) -> Offer {
        if !filter.accepts(category) {
            return Offer::Filtered;
        }
        match self.0.get_mut(curie) {
            None => {
                self.0.insert(
                    curie.to_string(),
                    MergedNode { name: mention.to_string(), category: category.to_string() },
                );
                Offer::Inserted
            }
            Some(node) if mention.chars().count() > node.name.chars().count() => {
                node.name = mention.to_string();
                Offer::Renamed
            }
            Some(_) => Offer::Kept,
        }
    }

    /// Add `curie` only if it is not present yet; existing names are never touched.
    pub fn insert_if_absent(&mut self, curie: &str, name: &str, category: &str, filter: &CategoryFilter) -> bool {
        if !filter.accepts(category) || self.0.contains_key(curie) {
            return false;
        }
        self.0.insert(
            curie.to_string(),
            MergedNode { name: name.to_string(), category: category.to_string() },
        );
        true
    }

    /// Fold every candidate of every mention of one pass into the set.
    pub fn absorb(&mut self, kg_match: &KgMatch, filter: &CategoryFilter) {
        for (mention, ranked) in kg_match {
            for (curie, info) in ranked {
                self.offer(curie, mention, &info.preferred_category, filter);
            }
        }
    }

    pub fn get(&self, curie: &str) -> Option<&MergedNode> {
        self.0.get(curie)
    }

    pub fn contains(&self, curie: &str) -> bool {
        self.0.contains_key(curie)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, MergedNode)> for MergedNodes {
    fn from_iter<I: IntoIterator<Item = (String, MergedNode)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use druglink_common::categories::{DISEASE, PHENOTYPIC_FEATURE};

    use super::*;
    use crate::matcher::CuriesInfo;

    const GENE: &str = "biolink:Gene";

    #[test]
    fn test_longer_mention_replaces_name() {
        let mut nodes = MergedNodes::new();
        let any = CategoryFilter::any();
        assert_eq!(nodes.offer("MONDO:1", "HTN", DISEASE, &any), Offer::Inserted);
        assert_eq!(nodes.offer("MONDO:1", "hypertension", DISEASE, &any), Offer::Renamed);
        assert_eq!(nodes.get("MONDO:1").unwrap().name, "hypertension");
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_equal_or_shorter_keeps_first() {
        let mut nodes = MergedNodes::new();
        let any = CategoryFilter::any();
        nodes.offer("X:1", "abcd", GENE, &any);
        assert_eq!(nodes.offer("X:1", "wxyz", GENE, &any), Offer::Kept);
        assert_eq!(nodes.offer("X:1", "ab", GENE, &any), Offer::Kept);
        assert_eq!(nodes.get("X:1").unwrap().name, "abcd");
    }

    #[test]
    fn test_length_is_counted_in_characters() {
        let mut nodes = MergedNodes::new();
        let any = CategoryFilter::any();
        nodes.offer("X:1", "abc", GENE, &any);
        // 3 characters, 6 bytes
        assert_eq!(nodes.offer("X:1", "αβγ", GENE, &any), Offer::Kept);
    }

    #[test]
    fn test_first_category_is_kept() {
        let mut nodes = MergedNodes::new();
        let any = CategoryFilter::any();
        nodes.offer("X:1", "fever", PHENOTYPIC_FEATURE, &any);
        nodes.offer("X:1", "high fever", DISEASE, &any);
        let node = nodes.get("X:1").unwrap();
        assert_eq!(node.name, "high fever");
        assert_eq!(node.category, PHENOTYPIC_FEATURE);
    }

    #[test]
    fn test_category_filter_excludes() {
        let mut nodes = MergedNodes::new();
        let filter = CategoryFilter::indications();
        assert_eq!(nodes.offer("NCBIGene:2147", "thrombin", GENE, &filter), Offer::Filtered);
        assert!(nodes.is_empty());
        assert!(!nodes.insert_if_absent("NCBIGene:2147", "F2", GENE, &filter));
    }

    #[test]
    fn test_insert_if_absent_never_renames() {
        let mut nodes = MergedNodes::new();
        let any = CategoryFilter::any();
        nodes.offer("X:1", "F2", GENE, &any);
        assert!(!nodes.insert_if_absent("X:1", "Prothrombin", GENE, &any));
        assert_eq!(nodes.get("X:1").unwrap().name, "F2");
        assert!(nodes.insert_if_absent("X:2", "Prothrombin", GENE, &any));
    }

    #[test]
    fn test_absorb_all_candidates_of_all_mentions() {
        let info = |category: &str| CuriesInfo {
            preferred_name: String::new(),
            preferred_category: category.to_string(),
            matched_synonyms: vec![],
        };
        let kg_match: KgMatch = vec![
            ("blood pressure".into(), vec![("HP:1".into(), info(PHENOTYPIC_FEATURE)), ("X:9".into(), info(GENE))]),
            ("high blood pressure".into(), vec![("HP:1".into(), info(PHENOTYPIC_FEATURE))]),
        ];
        let mut nodes = MergedNodes::new();
        nodes.absorb(&kg_match, &CategoryFilter::indications());
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes.get("HP:1").unwrap().name, "high blood pressure");
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut nodes = MergedNodes::new();
        nodes.offer("X:1", "F2", GENE, &CategoryFilter::any());
        let json = serde_json::to_value(&nodes).unwrap();
        assert_eq!(json, serde_json::json!({"X:1": {"name": "F2", "category": "biolink:Gene"}}));
    }
}
