//! Result dumps: pretty JSON for people, bincode for the next step.

use std::fs;
use std::path::{Path, PathBuf};

use druglink_common::{DruglinkError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

pub const RECORDS_STEM: &str = "drugbank_records";
pub const DRUG_INFO_STEM: &str = "kg2_drug_info";
pub const ALIGNED_STEM: &str = "DrugBank_aligned_with_KG2";
pub const TARGETS_STEM: &str = "drugbank_targets";

pub fn json_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}.json"))
}

pub fn bin_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}.bin"))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    info!("Wrote {}", path.display());
    Ok(())
}

pub fn write_bincode<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = bincode::serialize(value).map_err(|e| DruglinkError::Encoding(e.to_string()))?;
    fs::write(path, bytes)?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Write `<stem>.json` and `<stem>.bin` into `dir`.
pub fn write_dump<T: Serialize>(dir: &Path, stem: &str, value: &T) -> Result<()> {
    write_json(&json_path(dir, stem), value)?;
    write_bincode(&bin_path(dir, stem), value)
}

/// Read a dump written by [`write_dump`], preferring the binary form.
pub fn read_dump<T: DeserializeOwned>(dir: &Path, stem: &str) -> Result<T> {
    let bin = bin_path(dir, stem);
    if bin.is_file() {
        let bytes = fs::read(&bin)?;
        return bincode::deserialize(&bytes).map_err(|e| DruglinkError::Encoding(format!("{}: {}", bin.display(), e)));
    }
    let json = json_path(dir, stem);
    if !json.is_file() {
        return Err(DruglinkError::Pipeline(format!(
            "no {stem} dump in {} (run the previous step first)",
            dir.display()
        )));
    }
    Ok(serde_json::from_str(&fs::read_to_string(&json)?)?)
}
