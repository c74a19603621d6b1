use std::path::Path;

use super::*;

#[test]
fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.synonymizer.backend, SynonymizerBackend::Sqlite);
    assert_eq!(config.passes.len(), 5);
    assert_eq!(config.passes[1].linker.threshold, 0.75);
    assert_eq!(config.passes[1].linker.k, 10);
    assert!(config.passes.iter().all(|p| p.linker.max_entities_per_mention == 1));
    assert_eq!(config.remote.host, "arax-databases.rtx.ai");
    assert_eq!(config.remote.port, 22);
    assert_eq!(config.remote_database().ssh_program, Path::new("ssh"));
    config.validate().unwrap();
}

#[test]
fn test_empty_toml_is_all_defaults() {
    let config = Config::from_toml("").unwrap();
    assert_eq!(config.kg_version, default_kg_version());
    assert_eq!(config.sentences.min_len, 15);
    assert_eq!(config.sentences.max_token_len, 100);
}

#[test]
fn test_parse_toml() {
    let config = Config::from_toml(
        r#"
        data_dir = "/srv/druglink"
        kg_version = "2.8.4"

        [synonymizer]
        backend = "nodenorm"

        [[passes]]
        name = "umls"
        lexicons = ["umls"]
        threshold = 0.8
        num_neighbors = 5

        [lexicons]
        umls = "/srv/lexicons/umls_2022.jsonl"

        [categories]
        indications = ["Disease"]

        [remote]
        username = "me"
        ssh_key = "/home/me/.ssh/id_ed25519"
        "#,
    )
    .unwrap();

    assert_eq!(config.synonymizer.backend, SynonymizerBackend::Nodenorm);
    assert_eq!(config.passes.len(), 1);
    assert_eq!(config.passes[0].linker.k, 5);
    assert_eq!(config.passes[0].linker.max_entities_per_mention, 1);
    assert_eq!(config.lexicon_path("umls"), Path::new("/srv/lexicons/umls_2022.jsonl"));
    assert_eq!(config.lexicon_path("go"), Path::new("/srv/druglink/lexicons/go.jsonl"));
    assert_eq!(config.remote.host, "arax-databases.rtx.ai");

    let settings = config.alignment_settings();
    assert!(settings.indication_filter.accepts("biolink:Disease"));
    assert!(!settings.indication_filter.accepts("biolink:PhenotypicFeature"));
    assert!(settings.mechanistic_filter.accepts("biolink:Gene"));
    assert_eq!(settings.indication_window.min_len, 1);
}

#[test]
fn test_kg_version_validation() {
    validate_kg_version("2.10.1").unwrap();
    assert!(validate_kg_version("2.10").is_err());
    assert!(validate_kg_version("v2.10.1").is_err());
    assert!(validate_kg_version("2.10.1-rc").is_err());
    assert!(Config::from_toml(r#"kg_version = "latest""#).is_err());
}

#[test]
fn test_invalid_pass_is_rejected() {
    let err = Config::from_toml(
        r#"
        [[passes]]
        name = "empty"
        lexicons = []
        "#,
    );
    assert!(err.is_err());
}

#[test]
fn test_database_paths_follow_kg_version() {
    let config = Config::from_toml(r#"kg_version = "2.8.4""#).unwrap();
    assert_eq!(
        config.sqlite_path(),
        Path::new("data/node_synonymizer_v1.0_KG2.8.4.sqlite")
    );
    assert_eq!(
        config.remote_database().remote_path,
        "~/KG2.8.4/node_synonymizer_v1.0_KG2.8.4.sqlite"
    );
}

#[test]
fn test_missing_explicit_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());

    let path = dir.path().join("druglink.toml");
    std::fs::write(&path, "data_dir = \"elsewhere\"\n").unwrap();
    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.data_dir, Path::new("elsewhere"));
}
