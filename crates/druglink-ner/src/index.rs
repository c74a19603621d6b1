//! Alias index over one lexicon, shared by every linker built on it.
//!
//! The exact-match automaton is built eagerly. The trigram index used for
//! approximate matching is built the first time a fuzzy linker asks for it.
//!
//! Approximate lookup is a cosine set-similarity search. For a query with
//! `q` distinct trigrams and threshold `t`, an alias with `a` trigrams and
//! `c` shared trigrams qualifies only if `c / sqrt(q * a) >= t`, which gives
//! - `t² q <= a <= q / t²` (length filter, postings are sorted by `a`);
//! - `c >= t² q`, so a qualifying alias shares at least one of the
//!   `q - ceil(t² q) + 1` rarest query trigrams (prefix filter).
//!
//! Only the postings of that rare prefix are scanned.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use aho_corasick::{AhoCorasick, MatchKind};
use tracing::info;

use crate::lexicon::Lexicon;
use crate::{NerError, Result};

const MIN_ALIAS_LEN: usize = 2;

/// Slack for float rounding in the filter bounds; errs towards scanning more.
const EPSILON: f32 = 1e-4;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "by", "for", "from", "has", "have",
    "in", "into", "is", "it", "its", "of", "on", "or", "that", "the", "their", "these",
    "this", "to", "was", "were", "which", "with",
];

pub(crate) fn is_stopword(word: &str) -> bool {
    STOPWORDS.iter().any(|s| s.eq_ignore_ascii_case(word))
}

pub struct LexiconIndex {
    name: String,
    automaton: AhoCorasick,
    /// ASCII-lowercased aliases; index = automaton pattern id.
    aliases: Vec<String>,
    /// alias index -> concept indices
    alias_concepts: Vec<Vec<usize>>,
    /// concept index -> CURIE
    curies: Vec<String>,
    trigrams: OnceLock<TrigramIndex>,
}

impl LexiconIndex {
    pub fn new(lexicon: &Lexicon) -> Result<Self> {
        let mut alias_ids: HashMap<String, usize> = HashMap::new();
        let mut aliases: Vec<String> = Vec::new();
        let mut alias_concepts: Vec<Vec<usize>> = Vec::new();
        let mut curies = Vec::with_capacity(lexicon.len());

        for entry in lexicon.entries() {
            let concept = curies.len();
            curies.push(lexicon.curie(entry));

            for form in entry.surface_forms() {
                let key = form.to_ascii_lowercase();
                if key.chars().count() < MIN_ALIAS_LEN || is_stopword(&key) {
                    continue;
                }
                let id = match alias_ids.get(&key) {
                    Some(&id) => id,
                    None => {
                        alias_ids.insert(key.clone(), aliases.len());
                        aliases.push(key);
                        alias_concepts.push(Vec::new());
                        aliases.len() - 1
                    }
                };
                if !alias_concepts[id].contains(&concept) {
                    alias_concepts[id].push(concept);
                }
            }
        }

        if aliases.is_empty() {
            return Err(NerError::LexiconLoad(format!(
                "lexicon {} has no usable aliases",
                lexicon.name()
            )));
        }

        // Standard semantics are required for overlapping iteration.
        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::Standard)
            .build(&aliases)?;

        info!(
            "Lexicon index {} ready: {} concepts, {} aliases",
            lexicon.name(),
            curies.len(),
            aliases.len()
        );

        Ok(Self {
            name: lexicon.name().to_string(),
            automaton,
            aliases,
            alias_concepts,
            curies,
            trigrams: OnceLock::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn automaton(&self) -> &AhoCorasick {
        &self.automaton
    }

    pub(crate) fn alias_concepts(&self, alias: usize) -> &[usize] {
        &self.alias_concepts[alias]
    }

    pub(crate) fn curie(&self, concept: usize) -> &str {
        &self.curies[concept]
    }

    pub(crate) fn trigram_index(&self) -> &TrigramIndex {
        self.trigrams.get_or_init(|| {
            let index = TrigramIndex::build(&self.aliases);
            info!("Trigram index {} ready: {} trigrams", self.name, index.postings.len());
            index
        })
    }
}

pub(crate) struct TrigramIndex {
    vocab: HashMap<String, u32>,
    /// alias -> sorted trigram ids
    alias_grams: Vec<Vec<u32>>,
    /// trigram id -> alias ids ordered by (trigram count, alias id)
    postings: Vec<Vec<u32>>,
}

impl TrigramIndex {
    fn build(aliases: &[String]) -> Self {
        let mut vocab: HashMap<String, u32> = HashMap::new();
        let mut alias_grams = Vec::with_capacity(aliases.len());
        let mut postings: Vec<Vec<u32>> = Vec::new();

        for (alias, text) in aliases.iter().enumerate() {
            let mut ids: Vec<u32> = trigrams(text)
                .into_iter()
                .map(|gram| {
                    let next = vocab.len() as u32;
                    *vocab.entry(gram).or_insert(next)
                })
                .collect();
            ids.sort_unstable();
            for &id in &ids {
                if id as usize == postings.len() {
                    postings.push(Vec::new());
                }
                postings[id as usize].push(alias as u32);
            }
            alias_grams.push(ids);
        }

        for posting in &mut postings {
            posting.sort_by_key(|&a| (alias_grams[a as usize].len(), a));
        }

        Self { vocab, alias_grams, postings }
    }

    fn gram_count(&self, alias: u32) -> usize {
        self.alias_grams[alias as usize].len()
    }

    /// Aliases with trigram cosine similarity of at least `threshold`, best
    /// first, at most `k`.
    pub(crate) fn search(&self, text: &str, threshold: f32, k: usize) -> Vec<(usize, f32)> {
        let grams = trigrams(&text.to_ascii_lowercase());
        let nq = grams.len();
        if nq == 0 || k == 0 {
            return Vec::new();
        }

        let t2 = threshold.clamp(0.0, 1.0).powi(2);
        let min_overlap = ((t2 * nq as f32 - EPSILON).ceil() as usize).max(1);
        let min_len = (t2 * nq as f32 - EPSILON).ceil().max(0.0) as usize;
        let max_len = if t2 > 0.0 {
            (nq as f32 / t2 + EPSILON).floor() as usize
        } else {
            usize::MAX
        };

        let mut known: Vec<u32> = grams.iter().filter_map(|g| self.vocab.get(g).copied()).collect();
        if known.len() < min_overlap {
            return Vec::new();
        }

        // Unknown trigrams are the rarest of all and take the first prefix slots.
        let unknown = nq - known.len();
        let prefix_len = (nq - min_overlap + 1).saturating_sub(unknown);
        known.sort_by_key(|&g| (self.postings[g as usize].len(), g));

        let mut candidates: Vec<u32> = Vec::new();
        for &gram in known.iter().take(prefix_len) {
            let posting = &self.postings[gram as usize];
            let from = posting.partition_point(|&a| self.gram_count(a) < min_len);
            let to = posting.partition_point(|&a| self.gram_count(a) <= max_len);
            candidates.extend_from_slice(&posting[from..to]);
        }
        candidates.sort_unstable();
        candidates.dedup();

        known.sort_unstable();
        let mut scored: Vec<(usize, f32)> = candidates
            .into_iter()
            .filter_map(|alias| {
                let alias_grams = &self.alias_grams[alias as usize];
                let common = sorted_overlap(&known, alias_grams);
                let score = common as f32 / ((nq * alias_grams.len()) as f32).sqrt();
                (score >= threshold).then_some((alias as usize, score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }
}

fn sorted_overlap(a: &[u32], b: &[u32]) -> usize {
    let (mut i, mut j, mut n) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                n += 1;
                i += 1;
                j += 1;
            }
        }
    }
    n
}

/// Distinct character trigrams of ` s ` (space padded).
fn trigrams(s: &str) -> HashSet<String> {
    let padded: Vec<char> = std::iter::once(' ')
        .chain(s.chars())
        .chain(std::iter::once(' '))
        .collect();
    padded.windows(3).map(|w| w.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::LexiconEntry;

    fn lexicon(names: &[&str]) -> Lexicon {
        Lexicon::from_entries(
            "test",
            names
                .iter()
                .enumerate()
                .map(|(i, name)| LexiconEntry {
                    concept_id: format!("C{i:07}"),
                    canonical_name: name.to_string(),
                    aliases: Vec::new(),
                    types: Vec::new(),
                    definition: None,
                })
                .collect(),
        )
    }

    /// Scores every alias without any filtering.
    fn exhaustive(index: &LexiconIndex, text: &str, threshold: f32) -> Vec<(usize, f32)> {
        let query = trigrams(&text.to_ascii_lowercase());
        let mut scored: Vec<(usize, f32)> = index
            .aliases
            .iter()
            .enumerate()
            .filter_map(|(i, alias)| {
                let grams = trigrams(alias);
                let common = query.intersection(&grams).count();
                let score = common as f32 / ((query.len() * grams.len()) as f32).sqrt();
                (score >= threshold).then_some((i, score))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored
    }

    #[test]
    fn test_filtered_search_matches_exhaustive_scoring() {
        let index = LexiconIndex::new(&lexicon(&[
            "hypertension",
            "hypertensive disease",
            "hypertensive diseases",
            "pulmonary hypertension",
            "hypotension",
            "tension",
            "thrombin",
            "prothrombin",
            "thrombocytopenia",
            "heparin-induced thrombocytopenia",
            "type 2 diabetes mellitus",
            "diabetes",
        ]))
        .unwrap();
        let queries = [
            "hypertensive diseases",
            "hypertension",
            "thrombocytopenia induced",
            "type 2 diabetes",
            "zzzz",
            "prothrombin time",
        ];
        for threshold in [0.3f32, 0.5, 0.7, 0.75, 0.9] {
            for query in queries {
                let found = index.trigram_index().search(query, threshold, usize::MAX);
                let expected = exhaustive(&index, query, threshold);
                assert_eq!(found, expected, "{query:?} at {threshold}");
            }
        }
    }

    #[test]
    fn test_search_truncates_to_k() {
        let index = LexiconIndex::new(&lexicon(&["thrombin", "thrombins", "prothrombin"])).unwrap();
        let hits = index.trigram_index().search("thrombin", 0.5, 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(index.aliases[hits[0].0], "thrombin");
        assert_eq!(hits[0].1, 1.0);
    }

    #[test]
    fn test_large_lexicon_scans_only_rare_postings() {
        // every alias shares the "prot" prefix; only one is close to the query
        let names: Vec<String> = (0..20_000).map(|i| format!("protein kinase {i}")).collect();
        let mut refs: Vec<&str> = names.iter().map(String::as_str).collect();
        refs.push("prothrombin activator");
        let index = LexiconIndex::new(&lexicon(&refs)).unwrap();

        let hits = index.trigram_index().search("prothrombin activators", 0.7, 15);
        assert_eq!(hits.len(), 1);
        assert_eq!(index.aliases[hits[0].0], "prothrombin activator");
    }

    #[test]
    fn test_trigram_index_is_built_once() {
        let index = LexiconIndex::new(&lexicon(&["thrombin"])).unwrap();
        let first: *const TrigramIndex = index.trigram_index();
        let second: *const TrigramIndex = index.trigram_index();
        assert_eq!(first, second);
    }

    #[test]
    fn test_trigram_padding() {
        let grams = trigrams("ab");
        assert_eq!(grams.len(), 2);
        assert!(grams.contains(" ab") && grams.contains("ab "));
    }
}
