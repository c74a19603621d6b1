//! DrugBank full-database XML parser.
//!
//! The dump is well over a gigabyte, so it is streamed with a quick-xml
//! state machine instead of being loaded as a tree. Only top-level `<drug>`
//! elements (direct children of `<drugbank>`) produce records; the nested
//! `<drug>` summaries inside `<pathways>` are ignored. A pathway contributes
//! its SMPDB id and name only, not its `<enzymes>` UniProt ids.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use druglink_common::curie::has_known_prefix;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, info, instrument};

use crate::models::{BioEntityRefs, DrugRecord, ExternalIdentifier, TextField, XrefField};

/// Parse a DrugBank XML file into records keyed by primary DrugBank id.
#[instrument]
pub fn parse_drugbank_file(path: &Path) -> anyhow::Result<BTreeMap<String, DrugRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open DrugBank XML at {}", path.display()))?;
    parse_drugbank(Reader::from_reader(BufReader::new(file)))
}

/// Parse DrugBank XML held in memory.
pub fn parse_drugbank_str(xml: &str) -> anyhow::Result<BTreeMap<String, DrugRecord>> {
    parse_drugbank(Reader::from_reader(xml.as_bytes()))
}

fn parse_drugbank<R: BufRead>(mut reader: Reader<R>) -> anyhow::Result<BTreeMap<String, DrugRecord>> {
    reader.config_mut().trim_text(true);

    let mut drugs = BTreeMap::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<DrugBuilder> = None;
    let mut skipped = 0usize;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .with_context(|| format!("XML parse error at byte {}", reader.buffer_position()))?;

        match event {
            Event::Start(ref e) => {
                stack.push(e.name().as_ref().to_vec());
                if is_top_level_drug(&stack) {
                    current = Some(DrugBuilder::default());
                } else if let Some(builder) = current.as_mut() {
                    builder.on_start(&relative_path(&stack), e);
                }
            }
            Event::Text(ref e) => {
                if let Some(builder) = current.as_mut() {
                    let text = e.unescape().context("Invalid XML text")?;
                    builder.on_text(&relative_path(&stack), &text);
                }
            }
            Event::CData(ref e) => {
                if let Some(builder) = current.as_mut() {
                    let text = String::from_utf8_lossy(e);
                    builder.on_text(&relative_path(&stack), text.trim());
                }
            }
            Event::End(_) => {
                if is_top_level_drug(&stack) {
                    if let Some(builder) = current.take() {
                        match builder.finish() {
                            Some(record) => {
                                debug!(drug = %record.drugbank_id, "Parsed drug");
                                drugs.insert(record.drugbank_id.clone(), record);
                            }
                            None => skipped += 1,
                        }
                    }
                } else if let Some(builder) = current.as_mut() {
                    builder.on_end(&relative_path(&stack));
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    info!("Number of drugs with info: {} ({} skipped)", drugs.len(), skipped);
    Ok(drugs)
}

fn is_top_level_drug(stack: &[Vec<u8>]) -> bool {
    stack.len() == 2 && stack[1] == b"drug"
}

/// Element path below the current top-level `<drug>`.
fn relative_path(stack: &[Vec<u8>]) -> Vec<&[u8]> {
    stack.iter().skip(2).map(Vec::as_slice).collect()
}

fn attribute(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

#[derive(Default)]
struct DrugBuilder {
    primary_id: Option<String>,
    in_primary_id: bool,
    name: Option<String>,
    text_parts: BTreeMap<TextField, Vec<String>>,
    xrefs: BTreeMap<XrefField, BioEntityRefs>,
    external_identifiers: Vec<ExternalIdentifier>,
    ext_resource: Option<String>,
    ext_identifier: Option<String>,
}

impl DrugBuilder {
    fn xref(&mut self, tag: &[u8]) -> Option<&mut BioEntityRefs> {
        XrefField::from_tag(tag).map(|field| self.xrefs.entry(field).or_default())
    }

    fn on_start(&mut self, path: &[&[u8]], e: &BytesStart) {
        match path {
            [b"drugbank-id"] => {
                self.in_primary_id = attribute(e, b"primary").as_deref() == Some("true");
            }
            [b"external-identifiers", b"external-identifier"] => {
                self.ext_resource = None;
                self.ext_identifier = None;
            }
            [section, _entity, b"polypeptide"] => {
                if let Some(id) = attribute(e, b"id") {
                    if let Some(refs) = self.xref(section) {
                        refs.push_id(&id);
                    }
                }
            }
            _ => {}
        }
    }

    fn on_text(&mut self, path: &[&[u8]], text: &str) {
        if text.is_empty() {
            return;
        }
        match path {
            [b"drugbank-id"] => {
                if self.in_primary_id && self.primary_id.is_none() {
                    self.primary_id = Some(text.to_string());
                }
            }
            [b"name"] => self.name = Some(text.to_string()),
            [field, ..] if TextField::from_tag(field).is_some() => {
                if let Some(field) = TextField::from_tag(field) {
                    self.text_parts.entry(field).or_default().push(text.to_string());
                }
            }
            [b"external-identifiers", b"external-identifier", b"resource"] => {
                self.ext_resource = Some(text.to_string());
            }
            [b"external-identifiers", b"external-identifier", b"identifier"] => {
                self.ext_identifier = Some(text.to_string());
            }
            [b"pathways", b"pathway", b"smpdb-id"] => {
                self.xrefs.entry(XrefField::Pathways).or_default().push_id(text);
            }
            [section, _entity, b"name"] | [section, _entity, b"polypeptide", b"gene-name"] => {
                if let Some(refs) = self.xref(section) {
                    refs.push_name(text);
                }
            }
            [section, _entity, b"polypeptide", b"external-identifiers", b"external-identifier", b"identifier"] => {
                // Only already-namespaced ids (e.g. "HGNC:3535"); bare ones repeat the polypeptide id.
                if has_known_prefix(text) {
                    if let Some(refs) = self.xref(section) {
                        refs.push_id(text);
                    }
                }
            }
            _ => {}
        }
    }

    fn on_end(&mut self, path: &[&[u8]]) {
        match path {
            [b"drugbank-id"] => self.in_primary_id = false,
            [b"external-identifiers", b"external-identifier"] => {
                if let (Some(resource), Some(identifier)) = (self.ext_resource.take(), self.ext_identifier.take()) {
                    self.external_identifiers.push(ExternalIdentifier { resource, identifier });
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> Option<DrugRecord> {
        let drugbank_id = self.primary_id?;
        let text = self
            .text_parts
            .into_iter()
            .map(|(field, parts)| (field, parts.join(" ")))
            .collect();
        let xrefs = self.xrefs.into_iter().filter(|(_, refs)| !refs.is_empty()).collect();

        let record = DrugRecord {
            drugbank_id,
            name: self.name,
            text,
            xrefs,
            external_identifiers: self.external_identifiers,
        };
        record.has_info().then_some(record)
    }
}
