//! Dictionary entity linking for biomedical free text.
//!
//! Lexicon linkers find mentions and candidate CURIEs; the matcher runs
//! several linker passes and canonicalizes their output through a
//! synonymizer; the merge reducer folds everything into one node set per drug.

pub mod index;
pub mod lexicon;
pub mod linker;
pub mod matcher;
pub mod merge;

pub use index::LexiconIndex;
pub use lexicon::{Lexicon, LexiconEntry};
pub use linker::{EntityLinker, LexiconLinker, LinkCandidate, LinkedMention, LinkerConfig};
pub use matcher::{CuriesInfo, KgMatch, MultiLinkerMatcher, NerPass};
pub use merge::{MergedNode, MergedNodes, Offer};

pub type Result<T> = std::result::Result<T, NerError>;

#[derive(Debug, thiserror::Error)]
pub enum NerError {
    #[error("Lexicon loading failed: {0}")]
    LexiconLoad(String),

    #[error("Automaton build failed: {0}")]
    Automaton(String),

    #[error("Linking failed: {0}")]
    Linking(String),

    #[error("Synonymizer lookup failed: {0}")]
    Synonymizer(#[from] druglink_common::DruglinkError),
}

impl From<std::io::Error> for NerError {
    fn from(e: std::io::Error) -> Self {
        NerError::LexiconLoad(e.to_string())
    }
}

impl From<aho_corasick::BuildError> for NerError {
    fn from(e: aho_corasick::BuildError) -> Self {
        NerError::Automaton(e.to_string())
    }
}
