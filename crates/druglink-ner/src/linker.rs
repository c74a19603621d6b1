//! Entity linkers: detect mentions in a sentence and propose candidate CURIEs.
//!
//! [`LexiconLinker`] is a dictionary linker over one [`LexiconIndex`]:
//! - exact alias hits through an Aho-Corasick automaton (ASCII
//!   case-insensitive, word-bounded), scored 1.0;
//! - when the threshold is below 1.0, token windows of up to
//!   [`MAX_WINDOW_TOKENS`] tokens are scored against the aliases by
//!   character-trigram cosine similarity.
//!
//! Overlapping spans are resolved by score, then by length.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::index::{is_stopword, LexiconIndex};
use crate::lexicon::Lexicon;
use crate::Result;

/// Longest token window considered for approximate matches.
pub const MAX_WINDOW_TOKENS: usize = 6;

const MIN_FUZZY_LEN: usize = 4;

/// Per-linker knobs, mirroring the scispacy linker options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkerConfig {
    /// Minimum similarity for a candidate to be kept.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Number of nearest aliases considered per mention.
    #[serde(default = "default_k", alias = "num_neighbors")]
    pub k: usize,
    /// Candidates reported per mention after ranking.
    #[serde(default = "default_max_entities")]
    pub max_entities_per_mention: usize,
}

fn default_threshold() -> f32 {
    0.7
}
fn default_k() -> usize {
    15
}
fn default_max_entities() -> usize {
    1
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            k: default_k(),
            max_entities_per_mention: default_max_entities(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkCandidate {
    pub curie: String,
    pub score: f32,
}

/// A detected mention; `start`/`end` are byte offsets into the linked text.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedMention {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub candidates: Vec<LinkCandidate>,
}

/// Anything that can find mentions in a sentence and propose CURIEs for them.
pub trait EntityLinker: Send + Sync {
    fn name(&self) -> &str;

    fn link(&self, text: &str) -> Result<Vec<LinkedMention>>;
}

#[derive(Debug, Clone)]
struct Span {
    start: usize,
    end: usize,
    score: f32,
    candidates: Vec<LinkCandidate>,
}

pub struct LexiconLinker {
    index: Arc<LexiconIndex>,
    config: LinkerConfig,
}

impl LexiconLinker {
    pub fn new(lexicon: &Lexicon, config: LinkerConfig) -> Result<Self> {
        Ok(Self::with_index(Arc::new(LexiconIndex::new(lexicon)?), config))
    }

    /// A linker over an index that other linkers may share.
    pub fn with_index(index: Arc<LexiconIndex>, config: LinkerConfig) -> Self {
        info!(
            "LexiconLinker {} ready (threshold {}, k {})",
            index.name(),
            config.threshold,
            config.k
        );
        Self { index, config }
    }

    fn fuzzy_enabled(&self) -> bool {
        self.config.threshold < 1.0
    }

    /// Concept CURIEs for a set of scored aliases, best first, deduplicated, at most k.
    fn candidates(&self, scored_aliases: &[(usize, f32)]) -> Vec<LinkCandidate> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for &(alias, score) in scored_aliases {
            for &concept in self.index.alias_concepts(alias) {
                if out.len() >= self.config.k {
                    return out;
                }
                if seen.insert(concept) {
                    out.push(LinkCandidate { curie: self.index.curie(concept).to_string(), score });
                }
            }
        }
        out
    }

    fn exact_spans(&self, text: &str) -> Vec<Span> {
        self.index
            .automaton()
            .find_overlapping_iter(text)
            .filter(|m| is_word_bounded(text, m.start(), m.end()))
            .map(|m| Span {
                start: m.start(),
                end: m.end(),
                score: 1.0,
                candidates: self.candidates(&[(m.pattern().as_usize(), 1.0)]),
            })
            .collect()
    }

    fn fuzzy_spans(&self, text: &str) -> Vec<Span> {
        let trigram_index = self.index.trigram_index();
        let tokens = tokenize(text);
        let mut spans = Vec::new();

        for i in 0..tokens.len() {
            if is_stopword(&text[tokens[i].0..tokens[i].1]) {
                continue;
            }
            for j in i..tokens.len().min(i + MAX_WINDOW_TOKENS) {
                let (start, end) = (tokens[i].0, tokens[j].1);
                let window = &text[start..end];
                if is_stopword(&text[tokens[j].0..tokens[j].1])
                    || window.chars().count() < MIN_FUZZY_LEN
                    || !window.chars().any(char::is_alphabetic)
                {
                    continue;
                }
                let scored = trigram_index.search(window, self.config.threshold, self.config.k);
                if let Some(&(_, best)) = scored.first() {
                    spans.push(Span { start, end, score: best, candidates: self.candidates(&scored) });
                }
            }
        }
        spans
    }
}

impl EntityLinker for LexiconLinker {
    fn name(&self) -> &str {
        self.index.name()
    }

    fn link(&self, text: &str) -> Result<Vec<LinkedMention>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut spans = self.exact_spans(text);
        if self.fuzzy_enabled() {
            spans.extend(self.fuzzy_spans(text));
        }

        let max = self.config.max_entities_per_mention;
        Ok(remove_overlapping(spans)
            .into_iter()
            .filter(|s| !s.candidates.is_empty())
            .map(|mut s| {
                s.candidates.truncate(max);
                LinkedMention {
                    text: text[s.start..s.end].to_string(),
                    start: s.start,
                    end: s.end,
                    candidates: s.candidates,
                }
            })
            .collect())
    }
}

/// Keep the best scored (then longest) spans that do not overlap, in text order.
fn remove_overlapping(mut spans: Vec<Span>) -> Vec<Span> {
    spans.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| (b.end - b.start).cmp(&(a.end - a.start)))
            .then_with(|| a.start.cmp(&b.start))
    });

    let mut kept: Vec<Span> = Vec::new();
    for span in spans {
        if kept.iter().all(|k| span.end <= k.start || span.start >= k.end) {
            kept.push(span);
        }
    }
    kept.sort_by_key(|s| s.start);
    kept
}

fn is_word_bounded(text: &str, start: usize, end: usize) -> bool {
    if !text.is_char_boundary(start) || !text.is_char_boundary(end) {
        return false;
    }
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

/// Whitespace tokens with leading/trailing non-alphanumerics trimmed, as byte ranges.
fn tokenize(text: &str) -> Vec<(usize, usize)> {
    let mut tokens = Vec::new();
    let mut token_start = None;
    for (i, c) in text.char_indices().chain(std::iter::once((text.len(), ' '))) {
        match (token_start, c.is_whitespace()) {
            (None, false) => token_start = Some(i),
            (Some(start), true) => {
                let raw = &text[start..i];
                let trimmed = raw.trim_start_matches(|c: char| !c.is_alphanumeric());
                let start = start + (raw.len() - trimmed.len());
                let trimmed = trimmed.trim_end_matches(|c: char| !c.is_alphanumeric());
                if !trimmed.is_empty() {
                    tokens.push((start, start + trimmed.len()));
                }
                token_start = None;
            }
            _ => {}
        }
    }
    tokens
}
