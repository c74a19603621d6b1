//! Biolink categories and the category sets that gate inclusion of matched nodes.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub const DISEASE: &str = "biolink:Disease";
pub const PHENOTYPIC_FEATURE: &str = "biolink:PhenotypicFeature";
pub const DISEASE_OR_PHENOTYPIC_FEATURE: &str = "biolink:DiseaseOrPhenotypicFeature";

/// Categories accepted for indications.
pub const INDICATION_CATEGORIES: &[&str] = &[
    DISEASE,
    PHENOTYPIC_FEATURE,
    DISEASE_OR_PHENOTYPIC_FEATURE,
];

/// Categories accepted for mechanistic intermediate nodes.
pub const MECHANISTIC_CATEGORIES: &[&str] = &[
    "biolink:BiologicalProcess",
    "biolink:BiologicalProcessOrActivity",
    "biolink:Cell",
    "biolink:CellularComponent",
    "biolink:Drug",
    DISEASE,
    DISEASE_OR_PHENOTYPIC_FEATURE,
    "biolink:Gene",
    "biolink:GeneProduct",
    "biolink:GeneFamily",
    "biolink:GeneGroupingMixin",
    "biolink:GeneOrGeneProduct",
    "biolink:MolecularActivity",
    "biolink:NoncodingRNAProduct",
    "biolink:PathologicalProcess",
    PHENOTYPIC_FEATURE,
    "biolink:Pathway",
    "biolink:Protein",
    "biolink:ProteinDomain",
    "biolink:ProteinFamily",
    "biolink:PhysiologicalProcess",
    "biolink:RNAProduct",
    "biolink:SmallMolecule",
    "biolink:Transcript",
];

/// A set of biolink categories used as a membership test.
///
/// An empty filter accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryFilter(HashSet<String>);

impl CategoryFilter {
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(categories.into_iter().map(Into::into).collect())
    }

    /// Accepts every category.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn indications() -> Self {
        Self::new(INDICATION_CATEGORIES.iter().copied())
    }

    pub fn mechanistic() -> Self {
        Self::new(MECHANISTIC_CATEGORIES.iter().copied())
    }

    pub fn accepts(&self, category: &str) -> bool {
        self.0.is_empty() || self.0.contains(category)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Add the `biolink:` prefix to a bare category name.
pub fn with_biolink_prefix(category: &str) -> String {
    if category.starts_with("biolink:") || category.is_empty() {
        category.to_string()
    } else {
        format!("biolink:{category}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mechanistic_set_has_no_duplicates() {
        let filter = CategoryFilter::mechanistic();
        assert_eq!(filter.len(), MECHANISTIC_CATEGORIES.len());
        assert!(filter.accepts("biolink:Protein"));
        assert!(!filter.accepts("biolink:Publication"));
    }

    #[test]
    fn test_indication_set() {
        let filter = CategoryFilter::indications();
        assert!(filter.accepts(DISEASE));
        assert!(filter.accepts(PHENOTYPIC_FEATURE));
        assert!(!filter.accepts("biolink:Gene"));
    }

    #[test]
    fn test_empty_filter_accepts_all() {
        assert!(CategoryFilter::any().accepts("biolink:NamedThing"));
    }

    #[test]
    fn test_biolink_prefix() {
        assert_eq!(with_biolink_prefix("Protein"), "biolink:Protein");
        assert_eq!(with_biolink_prefix("biolink:Gene"), "biolink:Gene");
    }
}
