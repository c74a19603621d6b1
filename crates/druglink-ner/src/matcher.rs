//! Multi-linker matching of sentences against the knowledge graph.
//!
//! A [`NerPass`] is one or more linkers sharing a configuration. Each pass
//! turns a sentence into a [`KgMatch`]: mention text mapped to canonical KG
//! nodes ranked by how many of the linker's candidate CURIEs collapsed onto
//! them. [`MultiLinkerMatcher`] runs every pass over every sentence and
//! folds the results into [`MergedNodes`].

use std::sync::Arc;

use druglink_common::{CategoryFilter, Synonymizer, SynonymizerResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::linker::EntityLinker;
use crate::merge::MergedNodes;
use crate::Result;

/// Characters removed from a sentence before linking.
pub const PUNCTUATION_MARKS: &[char] = &['.', ',', ';', ':', '?', '!'];

pub fn strip_punctuation(text: &str) -> String {
    text.chars().filter(|c| !PUNCTUATION_MARKS.contains(c)).collect()
}

/// Canonical node details for one preferred CURIE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuriesInfo {
    pub preferred_name: String,
    pub preferred_category: String,
    /// The queried CURIEs (or name) that resolved to this node.
    pub matched_synonyms: Vec<String>,
}

/// Mention text -> `(preferred_curie, info)` ranked by matched synonyms, in detection order.
pub type KgMatch = Vec<(String, Vec<(String, CuriesInfo)>)>;

/// One independently configured linking pass.
pub struct NerPass {
    name: String,
    linkers: Vec<Arc<dyn EntityLinker>>,
}

impl NerPass {
    pub fn new(name: impl Into<String>, linkers: Vec<Arc<dyn EntityLinker>>) -> Self {
        Self { name: name.into(), linkers }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Link a sentence and canonicalize every mention through the synonymizer.
    ///
    /// Mentions with candidate CURIEs are resolved by CURIE, the others by
    /// their text. When nothing is detected the whole sentence is looked up
    /// as a name.
    pub async fn get_kg_match(&self, sentence: &str, synonymizer: &dyn Synonymizer) -> Result<KgMatch> {
        if sentence.is_empty() {
            return Ok(Vec::new());
        }
        let sentence = strip_punctuation(sentence);

        // mention text -> candidate CURIEs, unioned across linkers
        let mut detected: Vec<(String, Vec<String>)> = Vec::new();
        for linker in &self.linkers {
            for mention in linker.link(&sentence)? {
                let slot = match detected.iter().position(|(text, _)| *text == mention.text) {
                    Some(i) => i,
                    None => {
                        detected.push((mention.text, Vec::new()));
                        detected.len() - 1
                    }
                };
                for candidate in mention.candidates {
                    if !detected[slot].1.contains(&candidate.curie) {
                        detected[slot].1.push(candidate.curie);
                    }
                }
            }
        }

        let mut matched = Vec::new();
        if detected.is_empty() {
            let whole = sentence.trim().to_string();
            if whole.is_empty() {
                return Ok(matched);
            }
            let ranked = rank_by_matched_synonyms(synonymizer.canonical_names(&[whole.clone()]).await?);
            if !ranked.is_empty() {
                matched.push((whole, ranked));
            }
            return Ok(matched);
        }

        for (mention, curies) in detected {
            let res = if curies.is_empty() {
                synonymizer.canonical_names(&[mention.clone()]).await?
            } else {
                synonymizer.canonical_curies(&curies).await?
            };
            let ranked = rank_by_matched_synonyms(res);
            if !ranked.is_empty() {
                matched.push((mention, ranked));
            }
        }

        debug!(pass = %self.name, mentions = matched.len(), "Sentence matched");
        Ok(matched)
    }
}

/// Group synonymizer hits by preferred CURIE and order them by the number
/// of queries that landed on each (descending, stable).
pub fn rank_by_matched_synonyms(res: SynonymizerResult) -> Vec<(String, CuriesInfo)> {
    let mut grouped: Vec<(String, CuriesInfo)> = Vec::new();
    for (query, node) in res {
        let Some(node) = node else { continue };
        match grouped.iter_mut().find(|(curie, _)| *curie == node.preferred_curie) {
            Some((_, info)) => info.matched_synonyms.push(query),
            None => grouped.push((
                node.preferred_curie,
                CuriesInfo {
                    preferred_name: node.preferred_name,
                    preferred_category: node.preferred_category,
                    matched_synonyms: vec![query],
                },
            )),
        }
    }
    grouped.sort_by(|a, b| b.1.matched_synonyms.len().cmp(&a.1.matched_synonyms.len()));
    grouped
}

/// Runs every pass over every sentence and merges the results.
pub struct MultiLinkerMatcher {
    passes: Vec<NerPass>,
}

impl MultiLinkerMatcher {
    pub fn new(passes: Vec<NerPass>) -> Self {
        Self { passes }
    }

    /// Merge the matches of all passes over `sentences`, keeping only
    /// categories accepted by `filter`. A pass that fails on a sentence is
    /// logged and skipped.
    pub async fn match_text(
        &self,
        sentences: &[String],
        synonymizer: &dyn Synonymizer,
        filter: &CategoryFilter,
    ) -> MergedNodes {
        let mut merged = MergedNodes::new();
        self.match_into(&mut merged, sentences, synonymizer, filter).await;
        merged
    }

    /// Like [`match_text`](Self::match_text) but accumulates into an existing set.
    pub async fn match_into(
        &self,
        merged: &mut MergedNodes,
        sentences: &[String],
        synonymizer: &dyn Synonymizer,
        filter: &CategoryFilter,
    ) {
        for sentence in sentences {
            for pass in &self.passes {
                match pass.get_kg_match(sentence, synonymizer).await {
                    Ok(kg_match) => merged.absorb(&kg_match, filter),
                    Err(e) => warn!(pass = %pass.name(), "Linking failed, skipping sentence: {}", e),
                }
            }
        }
    }
}
