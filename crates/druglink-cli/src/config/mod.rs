//! Configuration loading for druglink.
//! Reads druglink.toml from the path given on the command line, the path in
//! the DRUGLINK_CONFIG env var, or the current directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{bail, Context};
use druglink_common::categories::with_biolink_prefix;
use druglink_common::CategoryFilter;
use druglink_ingestion::remote::RemoteFile;
use druglink_ingestion::text::SentenceWindow;
use druglink_kg::nodenorm::{DEFAULT_NAMERES_URL, DEFAULT_NODENORM_URL};
use druglink_kg::AlignmentSettings;
use druglink_ner::LinkerConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_kg_version")]
    pub kg_version: String,
    #[serde(default)]
    pub inputs: InputConfig,
    #[serde(default)]
    pub synonymizer: SynonymizerConfig,
    #[serde(default = "default_passes")]
    pub passes: Vec<PassConfig>,
    /// Lexicon name -> JSONL path. Unlisted lexicons are looked up as
    /// `<data_dir>/lexicons/<name>.jsonl`.
    #[serde(default)]
    pub lexicons: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub sentences: SentenceConfig,
    #[serde(default)]
    pub categories: CategoryConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

fn default_data_dir()   -> PathBuf { PathBuf::from("data") }
fn default_kg_version() -> String { "2.10.1".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_drugbank_xml")]
    pub drugbank_xml: PathBuf,
    #[serde(default = "default_targets_csv")]
    pub targets_csv: PathBuf,
}

fn default_drugbank_xml() -> PathBuf { PathBuf::from("full database.xml") }
fn default_targets_csv()  -> PathBuf { PathBuf::from("drugbank_targets.csv") }

impl Default for InputConfig {
    fn default() -> Self {
        Self { drugbank_xml: default_drugbank_xml(), targets_csv: default_targets_csv() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SynonymizerBackend {
    #[default]
    Sqlite,
    Nodenorm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynonymizerConfig {
    #[serde(default)]
    pub backend: SynonymizerBackend,
    /// Overrides the database path derived from the KG version.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
    #[serde(default = "default_nodenorm_url")]
    pub nodenorm_url: String,
    #[serde(default = "default_nameres_url")]
    pub nameres_url: String,
    #[serde(default = "default_conflate")]
    pub conflate: bool,
}

fn default_nodenorm_url() -> String { DEFAULT_NODENORM_URL.to_string() }
fn default_nameres_url()  -> String { DEFAULT_NAMERES_URL.to_string() }
fn default_conflate()     -> bool { true }

impl Default for SynonymizerConfig {
    fn default() -> Self {
        Self {
            backend: SynonymizerBackend::default(),
            sqlite_path: None,
            nodenorm_url: default_nodenorm_url(),
            nameres_url: default_nameres_url(),
            conflate: default_conflate(),
        }
    }
}

/// One NER pass: linkers over the listed lexicons sharing one configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassConfig {
    pub name: String,
    pub lexicons: Vec<String>,
    #[serde(flatten)]
    pub linker: LinkerConfig,
}

fn pass(name: &str, lexicons: &[&str], threshold: f32, k: usize) -> PassConfig {
    PassConfig {
        name: name.to_string(),
        lexicons: lexicons.iter().map(|s| s.to_string()).collect(),
        linker: LinkerConfig { threshold, k, max_entities_per_mention: 1 },
    }
}

fn default_passes() -> Vec<PassConfig> {
    vec![
        pass("umls_mesh", &["umls", "mesh"], 0.70, 15),
        pass("umls_mesh_strict", &["umls", "mesh"], 0.75, 10),
        pass("rxnorm", &["rxnorm"], 0.70, 15),
        pass("go", &["go"], 0.70, 15),
        pass("hpo", &["hpo"], 0.70, 15),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceConfig {
    #[serde(default = "default_min_len")]
    pub min_len: usize,
    #[serde(default = "default_max_len")]
    pub max_len: usize,
    #[serde(default = "default_max_token_len")]
    pub max_token_len: usize,
    /// Minimum sentence length for indication text.
    #[serde(default = "default_indication_min_len")]
    pub indication_min_len: usize,
}

fn default_min_len()            -> usize { SentenceWindow::mechanistic().min_len }
fn default_max_len()            -> usize { SentenceWindow::mechanistic().max_len }
fn default_max_token_len()      -> usize { SentenceWindow::mechanistic().max_token_len }
fn default_indication_min_len() -> usize { SentenceWindow::indication().min_len }

impl Default for SentenceConfig {
    fn default() -> Self {
        Self {
            min_len: default_min_len(),
            max_len: default_max_len(),
            max_token_len: default_max_token_len(),
            indication_min_len: default_indication_min_len(),
        }
    }
}

/// Category overrides; unset lists keep the built-in sets.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CategoryConfig {
    #[serde(default)]
    pub indications: Option<Vec<String>>,
    #[serde(default)]
    pub mechanistic: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub ssh_key: Option<PathBuf>,
    #[serde(default = "default_ssh_program")]
    pub ssh_program: PathBuf,
}

fn default_host()     -> String { "arax-databases.rtx.ai".to_string() }
fn default_username() -> String { "rtxconfig".to_string() }
fn default_port()     -> u16 { 22 }
fn default_ssh_program() -> PathBuf { PathBuf::from("ssh") }

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            username: default_username(),
            port: default_port(),
            ssh_key: None,
            ssh_program: default_ssh_program(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            kg_version: default_kg_version(),
            inputs: InputConfig::default(),
            synonymizer: SynonymizerConfig::default(),
            passes: default_passes(),
            lexicons: BTreeMap::new(),
            sentences: SentenceConfig::default(),
            categories: CategoryConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

fn kg_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+\.\d+$").unwrap())
}

/// KG versions look like `2.10.1`.
pub fn validate_kg_version(version: &str) -> anyhow::Result<()> {
    if !kg_version_re().is_match(version) {
        bail!("Invalid KG version {:?}: expected X.Y.Z", version);
    }
    Ok(())
}

fn filter_from(categories: &Option<Vec<String>>, default: fn() -> CategoryFilter) -> CategoryFilter {
    match categories {
        Some(list) => CategoryFilter::new(list.iter().map(|c| with_biolink_prefix(c))),
        None => default(),
    }
}

impl Config {
    /// Load configuration from `path`, else from DRUGLINK_CONFIG, else from
    /// ./druglink.toml. Only an explicitly named file must exist; otherwise
    /// the defaults are used.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match std::env::var("DRUGLINK_CONFIG") {
                Ok(p) => (PathBuf::from(p), true),
                Err(_) => (PathBuf::from("druglink.toml"), false),
            },
        };

        if !path.exists() {
            if explicit {
                bail!(
                    "Config file not found: {}\n\
                     Copy druglink.example.toml to druglink.toml and edit it.",
                    path.display()
                );
            }
            info!("No {} found, using defaults", path.display());
            let config = Config::default();
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        validate_kg_version(&self.kg_version)?;
        for pass in &self.passes {
            if pass.lexicons.is_empty() {
                bail!("Pass {:?} has no lexicons", pass.name);
            }
            if !(0.0..=1.0).contains(&pass.linker.threshold) {
                bail!("Pass {:?}: threshold must be within 0..=1", pass.name);
            }
        }
        if self.sentences.min_len > self.sentences.max_len {
            bail!("sentences.min_len is larger than sentences.max_len");
        }
        Ok(())
    }

    pub fn sqlite_file_name(&self) -> String {
        format!("node_synonymizer_v1.0_KG{}.sqlite", self.kg_version)
    }

    /// Local node-synonymizer database.
    pub fn sqlite_path(&self) -> PathBuf {
        self.synonymizer
            .sqlite_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(self.sqlite_file_name()))
    }

    /// The node-synonymizer database on the remote host.
    pub fn remote_database(&self) -> RemoteFile {
        RemoteFile {
            host: self.remote.host.clone(),
            username: self.remote.username.clone(),
            port: self.remote.port,
            key_path: self.remote.ssh_key.clone(),
            ssh_program: self.remote.ssh_program.clone(),
            remote_path: format!("~/KG{}/{}", self.kg_version, self.sqlite_file_name()),
        }
    }

    pub fn lexicon_path(&self, name: &str) -> PathBuf {
        self.lexicons
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.data_dir.join("lexicons").join(format!("{name}.jsonl")))
    }

    /// Input paths are relative to the data directory unless absolute.
    pub fn input_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn alignment_settings(&self) -> AlignmentSettings {
        let s = &self.sentences;
        AlignmentSettings {
            indication_window: SentenceWindow {
                min_len: s.indication_min_len,
                max_len: s.max_len,
                max_token_len: s.max_token_len,
            },
            mechanistic_window: SentenceWindow {
                min_len: s.min_len,
                max_len: s.max_len,
                max_token_len: s.max_token_len,
            },
            indication_filter: filter_from(&self.categories.indications, CategoryFilter::indications),
            mechanistic_filter: filter_from(&self.categories.mechanistic, CategoryFilter::mechanistic),
            ..AlignmentSettings::default()
        }
    }
}

#[cfg(test)]
mod tests;
