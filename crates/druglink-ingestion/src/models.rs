//! Data models for the DrugBank side of the pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Free-text sections of a `<drug>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextField {
    Description,
    Indication,
    Pharmacodynamics,
    MechanismOfAction,
    Metabolism,
    ProteinBinding,
}

impl TextField {
    pub const ALL: [TextField; 6] = [
        TextField::Description,
        TextField::Indication,
        TextField::Pharmacodynamics,
        TextField::MechanismOfAction,
        TextField::Metabolism,
        TextField::ProteinBinding,
    ];

    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"description"         => Some(TextField::Description),
            b"indication"          => Some(TextField::Indication),
            b"pharmacodynamics"    => Some(TextField::Pharmacodynamics),
            b"mechanism-of-action" => Some(TextField::MechanismOfAction),
            b"metabolism"          => Some(TextField::Metabolism),
            b"protein-binding"     => Some(TextField::ProteinBinding),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TextField::Description       => "description",
            TextField::Indication        => "indication",
            TextField::Pharmacodynamics  => "pharmacodynamics",
            TextField::MechanismOfAction => "mechanism-of-action",
            TextField::Metabolism        => "metabolism",
            TextField::ProteinBinding    => "protein-binding",
        }
    }
}

/// Structured cross-reference sections of a `<drug>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum XrefField {
    Targets,
    Enzymes,
    Carriers,
    Transporters,
    Pathways,
}

impl XrefField {
    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"targets"      => Some(XrefField::Targets),
            b"enzymes"      => Some(XrefField::Enzymes),
            b"carriers"     => Some(XrefField::Carriers),
            b"transporters" => Some(XrefField::Transporters),
            b"pathways"     => Some(XrefField::Pathways),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            XrefField::Targets      => "targets",
            XrefField::Enzymes      => "enzymes",
            XrefField::Carriers     => "carriers",
            XrefField::Transporters => "transporters",
            XrefField::Pathways     => "pathways",
        }
    }
}

/// Names and identifiers of the bioentities listed in one cross-reference section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BioEntityRefs {
    pub names: Vec<String>,
    pub ids: Vec<String>,
}

impl BioEntityRefs {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.ids.is_empty()
    }

    pub(crate) fn push_name(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() && !self.names.iter().any(|n| n == name) {
            self.names.push(name.to_string());
        }
    }

    pub(crate) fn push_id(&mut self, id: &str) {
        let id = id.trim();
        if !id.is_empty() && !self.ids.iter().any(|i| i == id) {
            self.ids.push(id.to_string());
        }
    }
}

/// An entry of a drug's own `<external-identifiers>` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentifier {
    pub resource: String,
    pub identifier: String,
}

/// One DrugBank drug, keyed by its primary DrugBank id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrugRecord {
    pub drugbank_id: String,
    pub name: Option<String>,
    pub text: BTreeMap<TextField, String>,
    pub xrefs: BTreeMap<XrefField, BioEntityRefs>,
    pub external_identifiers: Vec<ExternalIdentifier>,
}

impl DrugRecord {
    pub fn text(&self, field: TextField) -> &str {
        self.text.get(&field).map(String::as_str).unwrap_or("")
    }

    pub fn indication(&self) -> &str {
        self.text(TextField::Indication)
    }

    /// Every non-empty text section except the indication.
    pub fn mechanistic_texts(&self) -> impl Iterator<Item = (TextField, &str)> {
        self.text
            .iter()
            .filter(|(field, text)| **field != TextField::Indication && !text.is_empty())
            .map(|(field, text)| (*field, text.as_str()))
    }

    /// A drug is kept only if some section carries content.
    pub fn has_info(&self) -> bool {
        self.text.values().any(|t| !t.is_empty()) || self.xrefs.values().any(|x| !x.is_empty())
    }
}
