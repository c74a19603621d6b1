//! Concept lexicons in scispacy knowledge-base JSONL form.
//!
//! One JSON object per line:
//! `{"concept_id": "C0020538", "canonical_name": "Hypertensive disease",
//!   "aliases": ["hypertension", "high blood pressure"], "types": ["T047"]}`

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{NerError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub concept_id: String,
    pub canonical_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub definition: Option<String>,
}

impl LexiconEntry {
    /// The canonical name followed by the aliases, blanks and repeats removed.
    pub fn surface_forms(&self) -> Vec<&str> {
        let mut forms: Vec<&str> = Vec::with_capacity(self.aliases.len() + 1);
        for form in std::iter::once(&self.canonical_name).chain(self.aliases.iter()) {
            let form = form.trim();
            if !form.is_empty() && !forms.iter().any(|f| f.eq_ignore_ascii_case(form)) {
                forms.push(form);
            }
        }
        forms
    }
}

/// A named collection of concepts; the name doubles as the CURIE prefix.
#[derive(Debug, Clone)]
pub struct Lexicon {
    name: String,
    entries: Vec<LexiconEntry>,
}

impl Lexicon {
    pub fn from_entries(name: impl Into<String>, entries: Vec<LexiconEntry>) -> Self {
        Self { name: name.into(), entries }
    }

    pub fn load_jsonl(name: &str, path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            NerError::LexiconLoad(format!("cannot open {}: {}", path.display(), e))
        })?;
        let lexicon = Self::parse_jsonl(name, BufReader::new(file))?;
        info!("Loaded lexicon {} from {}: {} concepts", name, path.display(), lexicon.len());
        Ok(lexicon)
    }

    /// Blank lines are ignored; malformed lines are logged and skipped.
    pub fn parse_jsonl<R: BufRead>(name: &str, reader: R) -> Result<Self> {
        let mut entries = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LexiconEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("{}: skipping malformed line {}: {}", name, line_no + 1, e),
            }
        }
        if entries.is_empty() {
            return Err(NerError::LexiconLoad(format!("lexicon {name} has no concepts")));
        }
        Ok(Self::from_entries(name, entries))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[LexiconEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `<NAME>:<concept_id>`, unless the concept id is already namespaced.
    pub fn curie(&self, entry: &LexiconEntry) -> String {
        if entry.concept_id.contains(':') {
            entry.concept_id.clone()
        } else {
            format!("{}:{}", self.name.to_uppercase(), entry.concept_id)
        }
    }
}
