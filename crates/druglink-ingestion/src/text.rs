//! Sentence splitting and clean-up ahead of entity linking.
//!
//! DrugBank prose is littered with inline references (`[A1234]`), amino-acid
//! sequences and SMILES strings. Sentence detection with an NLP model gets
//! confused by `.[reference]`, so sentences are cut on `.` and then filtered
//! by length.

use serde::{Deserialize, Serialize};

/// Length window (in characters) for sentences handed to the linkers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceWindow {
    /// Sentences shorter than this are skipped.
    pub min_len: usize,
    /// Sentences longer than this are skipped.
    pub max_len: usize,
    /// Tokens of this length or more are deleted.
    pub max_token_len: usize,
}

impl SentenceWindow {
    /// Window used for descriptive (mechanistic) text.
    pub const fn mechanistic() -> Self {
        Self { min_len: 15, max_len: 1000, max_token_len: 100 }
    }

    /// Indications are often a single short clause ("Hypertension."), so no minimum.
    pub const fn indication() -> Self {
        Self { min_len: 1, max_len: 1000, max_token_len: 100 }
    }

    pub fn accepts(&self, sentence: &str) -> bool {
        let len = sentence.chars().count();
        len >= self.min_len && len <= self.max_len
    }
}

impl Default for SentenceWindow {
    fn default() -> Self {
        Self::mechanistic()
    }
}

/// Split text on `.` and keep the sentences that fit the window,
/// with over-long tokens removed.
pub fn split_sentences(text: &str, window: &SentenceWindow) -> Vec<String> {
    text.split('.')
        .filter(|s| !s.trim().is_empty() && window.accepts(s))
        .map(|s| delete_long_tokens(s, window.max_token_len))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Drop space-separated tokens of `max_len` characters or more.
pub fn delete_long_tokens(text: &str, max_len: usize) -> String {
    text.split(' ')
        .filter(|token| token.chars().count() < max_len)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_filters_short_and_long() {
        let long = "x".repeat(1001);
        let text = format!("Too short. Lepirudin binds to thrombin directly. {long}. Ok");
        let sentences = split_sentences(&text, &SentenceWindow::mechanistic());
        assert_eq!(sentences, vec!["Lepirudin binds to thrombin directly"]);
    }

    #[test]
    fn test_indication_window_keeps_short_sentences() {
        let sentences = split_sentences("Hypertension. Angina", &SentenceWindow::indication());
        assert_eq!(sentences, vec!["Hypertension", "Angina"]);
    }

    #[test]
    fn test_delete_long_tokens() {
        let seq = "M".repeat(100);
        let out = delete_long_tokens(&format!("sequence {seq} ends"), 100);
        assert_eq!(out, "sequence ends");
        let seq = "M".repeat(99);
        assert!(delete_long_tokens(&seq, 100).len() == 99);
    }
}
