//! Batch steps. Each step reads the previous step's dump from the data
//! directory, so they can be run one at a time or chained by `run`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use druglink_common::Synonymizer;
use druglink_ingestion::drugbank::parse_drugbank_file;
use druglink_ingestion::remote::{ensure_downloaded_and_verified, FetchOutcome};
use druglink_ingestion::targets::read_targets_csv;
use druglink_ingestion::DrugRecord;
use druglink_kg::alignment::AlignedDrugs;
use druglink_kg::output::{self, ALIGNED_STEM, DRUG_INFO_STEM, RECORDS_STEM, TARGETS_STEM};
use druglink_kg::targets::{resolve_targets, DrugTargets};
use druglink_kg::{DrugAligner, NodeNormSynonymizer, SqliteSynonymizer};
use druglink_ner::{EntityLinker, Lexicon, LexiconIndex, LexiconLinker, LinkerConfig, MultiLinkerMatcher, NerPass};
use tracing::info;

use crate::config::{Config, SynonymizerBackend};

pub async fn build_synonymizer(config: &Config) -> anyhow::Result<Arc<dyn Synonymizer>> {
    match config.synonymizer.backend {
        SynonymizerBackend::Sqlite => {
            let path = config.sqlite_path();
            let syn = SqliteSynonymizer::open(&path).await.with_context(|| {
                format!("Cannot open node synonymizer {} (run `druglink fetch` first)", path.display())
            })?;
            info!("Using node synonymizer {}", path.display());
            Ok(Arc::new(syn))
        }
        SynonymizerBackend::Nodenorm => {
            let syn = NodeNormSynonymizer::new(&config.synonymizer.nodenorm_url, &config.synonymizer.nameres_url)?
                .with_conflation(config.synonymizer.conflate);
            info!("Using Node Normalization at {}", config.synonymizer.nodenorm_url);
            Ok(Arc::new(syn))
        }
    }
}

/// Lexicon indexes and linkers built so far. Each lexicon file is read and
/// indexed once; passes with the same linker settings over the same lexicon
/// share one linker.
#[derive(Default)]
struct LinkerCache {
    indexes: HashMap<String, Arc<LexiconIndex>>,
    linkers: HashMap<(String, u32, usize, usize), Arc<LexiconLinker>>,
}

impl LinkerCache {
    fn index(&mut self, config: &Config, name: &str) -> anyhow::Result<Arc<LexiconIndex>> {
        if let Some(index) = self.indexes.get(name) {
            return Ok(index.clone());
        }
        let path = config.lexicon_path(name);
        let lexicon = Lexicon::load_jsonl(name, &path)
            .with_context(|| format!("Failed to load lexicon {} from {}", name, path.display()))?;
        let index = Arc::new(
            LexiconIndex::new(&lexicon).with_context(|| format!("Failed to index lexicon {}", name))?,
        );
        self.indexes.insert(name.to_string(), index.clone());
        Ok(index)
    }

    fn linker(&mut self, config: &Config, name: &str, settings: LinkerConfig) -> anyhow::Result<Arc<LexiconLinker>> {
        let key = (
            name.to_string(),
            settings.threshold.to_bits(),
            settings.k,
            settings.max_entities_per_mention,
        );
        if let Some(linker) = self.linkers.get(&key) {
            return Ok(linker.clone());
        }
        let index = self.index(config, name)?;
        let linker = Arc::new(LexiconLinker::with_index(index, settings));
        self.linkers.insert(key, linker.clone());
        Ok(linker)
    }
}

pub fn build_matcher(config: &Config) -> anyhow::Result<MultiLinkerMatcher> {
    let mut cache = LinkerCache::default();
    let mut passes = Vec::with_capacity(config.passes.len());

    for pass in &config.passes {
        let mut linkers: Vec<Arc<dyn EntityLinker>> = Vec::with_capacity(pass.lexicons.len());
        for name in &pass.lexicons {
            let linker = cache
                .linker(config, name, pass.linker)
                .with_context(|| format!("Failed to build linker for {} in pass {}", name, pass.name))?;
            linkers.push(linker);
        }
        info!(pass = %pass.name, linkers = linkers.len(), threshold = pass.linker.threshold, "NER pass ready");
        passes.push(NerPass::new(pass.name.clone(), linkers));
    }
    info!(lexicons = cache.indexes.len(), linkers = cache.linkers.len(), "Matcher ready");

    Ok(MultiLinkerMatcher::new(passes))
}

pub async fn fetch(config: &Config) -> anyhow::Result<()> {
    let remote = config.remote_database();
    let local = config.sqlite_path();
    match ensure_downloaded_and_verified(&remote, &local).await? {
        FetchOutcome::AlreadyVerified => info!("✅ {} is up to date", local.display()),
        FetchOutcome::Downloaded => info!("✅ Downloaded and verified {}", local.display()),
    }
    Ok(())
}

pub fn extract(config: &Config, xml: &Path) -> anyhow::Result<BTreeMap<String, DrugRecord>> {
    info!("Parsing {}", xml.display());
    let records = parse_drugbank_file(xml)?;
    info!("{} drugs with information", records.len());
    output::write_dump(&config.data_dir, RECORDS_STEM, &records)?;
    Ok(records)
}

pub async fn align(
    config: &Config,
    synonymizer: Arc<dyn Synonymizer>,
    records: &BTreeMap<String, DrugRecord>,
) -> anyhow::Result<AlignedDrugs> {
    let matcher = build_matcher(config)?;
    let aligner = DrugAligner::new(synonymizer, Arc::new(matcher), config.alignment_settings());
    let drugs = aligner.align_all(records).await?;
    output::write_dump(&config.data_dir, DRUG_INFO_STEM, &drugs)?;
    Ok(drugs)
}

pub async fn identifiers(
    config: &Config,
    synonymizer: Arc<dyn Synonymizer>,
    drugs: &mut AlignedDrugs,
    targets: Option<&DrugTargets>,
) -> anyhow::Result<()> {
    // text linking is done by now; only lookups remain
    let aligner = DrugAligner::new(
        synonymizer,
        Arc::new(MultiLinkerMatcher::new(Vec::new())),
        config.alignment_settings(),
    );
    aligner.align_all_cross_references(drugs).await;
    if let Some(targets) = targets {
        aligner.merge_targets(drugs, targets).await?;
    }
    output::write_dump(&config.data_dir, ALIGNED_STEM, drugs)?;
    Ok(())
}

pub async fn targets(config: &Config, synonymizer: Arc<dyn Synonymizer>, csv: &Path) -> anyhow::Result<DrugTargets> {
    let rows = read_targets_csv(csv)?;
    let by_drug = resolve_targets(&rows, synonymizer.as_ref()).await?;
    output::write_dump(&config.data_dir, TARGETS_STEM, &by_drug)?;
    Ok(by_drug)
}

pub fn load_records(config: &Config) -> anyhow::Result<BTreeMap<String, DrugRecord>> {
    Ok(output::read_dump(&config.data_dir, RECORDS_STEM)?)
}

pub fn load_drug_info(config: &Config) -> anyhow::Result<AlignedDrugs> {
    Ok(output::read_dump(&config.data_dir, DRUG_INFO_STEM)?)
}

pub fn load_targets(config: &Config) -> anyhow::Result<DrugTargets> {
    Ok(output::read_dump(&config.data_dir, TARGETS_STEM)?)
}

#[cfg(test)]
mod tests {
    use druglink_common::InMemorySynonymizer;

    use super::*;
    use crate::config::PassConfig;

    const XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<drugbank xmlns="http://www.drugbank.ca" version="5.1">
  <drug type="small molecule">
    <drugbank-id primary="true">DB00331</drugbank-id>
    <name>Metformin</name>
    <indication>Type 2 diabetes mellitus.</indication>
    <mechanism-of-action>Metformin decreases hepatic gluconeogenesis in the liver.</mechanism-of-action>
  </drug>
</drugbank>"#;

    const LEXICON: &str = r#"{"concept_id": "C0011860", "canonical_name": "Type 2 diabetes mellitus", "aliases": ["T2DM"], "types": ["T047"]}
{"concept_id": "C0017715", "canonical_name": "Gluconeogenesis", "aliases": [], "types": ["T044"]}
"#;

    fn config(dir: &Path) -> Config {
        let mut config = Config { data_dir: dir.to_path_buf(), ..Config::default() };
        config.passes = vec![PassConfig {
            name: "umls".into(),
            lexicons: vec!["umls".into()],
            linker: druglink_ner::LinkerConfig { threshold: 1.0, ..Default::default() },
        }];
        let lexicon = dir.join("umls.jsonl");
        std::fs::write(&lexicon, LEXICON).unwrap();
        config.lexicons.insert("umls".into(), lexicon);
        config
    }

    fn synonymizer() -> Arc<dyn Synonymizer> {
        Arc::new(
            InMemorySynonymizer::new()
                .with("CHEBI:6801", "metformin", "SmallMolecule", &["DRUGBANK:DB00331"], &[])
                .with("MONDO:0005148", "type 2 diabetes mellitus", "Disease", &["UMLS:C0011860"], &[])
                .with("GO:0006094", "gluconeogenesis", "BiologicalProcess", &["UMLS:C0017715"], &[]),
        )
    }

    #[test]
    fn test_missing_lexicon_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.lexicons.clear();
        assert!(build_matcher(&config).is_err());
    }

    #[test]
    fn test_lexicons_and_linkers_are_shared_across_passes() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let strict = LinkerConfig { threshold: 1.0, ..Default::default() };
        let fuzzy = LinkerConfig { threshold: 0.7, ..Default::default() };

        let mut cache = LinkerCache::default();
        let first = cache.linker(&config, "umls", strict).unwrap();
        let again = cache.linker(&config, "umls", strict).unwrap();
        let other = cache.linker(&config, "umls", fuzzy).unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(cache.linkers.len(), 2);
        // the cache plus one per distinct linker
        assert_eq!(Arc::strong_count(&cache.indexes["umls"]), 3);
    }

    #[tokio::test]
    async fn test_steps_chain_through_dumps() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let xml = dir.path().join("drugbank.xml");
        std::fs::write(&xml, XML).unwrap();

        extract(&config, &xml).unwrap();
        let records = load_records(&config).unwrap();
        assert_eq!(records.len(), 1);

        align(&config, synonymizer(), &records).await.unwrap();
        let mut drugs = load_drug_info(&config).unwrap();
        let drug = &drugs["CHEBI:6801"];
        assert!(drug.indications.contains("MONDO:0005148"));
        assert!(drug.mechanistic_intermediate_nodes.contains("GO:0006094"));

        identifiers(&config, synonymizer(), &mut drugs, None).await.unwrap();
        assert!(dir.path().join("DrugBank_aligned_with_KG2.json").is_file());
        assert!(dir.path().join("DrugBank_aligned_with_KG2.bin").is_file());
    }
}
