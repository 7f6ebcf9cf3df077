use cartograph_core::config::{
    IngestConfig, DEFAULT_BATCH_SIZE, DEFAULT_GRAPH_HOST, DEFAULT_GRAPH_PORT,
    DEFAULT_MACRO_EXPANSION_DEPTH, DEFAULT_MAX_FILE_BYTES, DEFAULT_MMAP_THRESHOLD_BYTES,
};

#[test]
fn test_default_config() {
    let config = IngestConfig::default();
    assert_eq!(config.graph_host, DEFAULT_GRAPH_HOST);
    assert_eq!(config.graph_port, DEFAULT_GRAPH_PORT);
    assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    assert_eq!(config.max_file_bytes, DEFAULT_MAX_FILE_BYTES);
    assert_eq!(config.mmap_threshold_bytes, DEFAULT_MMAP_THRESHOLD_BYTES);
    assert_eq!(config.macro_expansion_depth, DEFAULT_MACRO_EXPANSION_DEPTH);
    assert!(config.parallel);
    assert!(!config.clean);
    assert!(!config.skip_tests);
}

#[test]
fn test_config_from_toml() {
    let toml_str = r#"
repo_path = "/tmp/repo"
clean = true
workers = 4
folder_filter = "src, lib/core"
file_pattern = "*.py,*.c"
graph_host = "graph.internal"
graph_port = 7688
"#;
    let config: IngestConfig = toml::from_str(toml_str).unwrap();
    assert!(config.clean);
    assert_eq!(config.workers, 4);
    assert_eq!(config.graph_host, "graph.internal");
    assert_eq!(config.graph_port, 7688);
    assert_eq!(config.graph_uri(), "graph.internal:7688");
    assert_eq!(config.folder_prefixes(), vec!["src".to_string(), "lib/core".to_string()]);
    assert_eq!(config.file_globs(), vec!["*.py".to_string(), "*.c".to_string()]);
    // unset fields keep their defaults
    assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
}

#[test]
fn test_config_roundtrip() {
    let config = IngestConfig::for_repo("/tmp/x");
    let serialized = toml::to_string_pretty(&config).unwrap();
    let parsed: IngestConfig = toml::from_str(&serialized).unwrap();
    assert_eq!(parsed.repo_path, config.repo_path);
    assert_eq!(parsed.batch_size, config.batch_size);
}

#[test]
fn test_validation_rejects_missing_repo() {
    let config = IngestConfig::default();
    assert!(config.validate().is_err());

    let config = IngestConfig::for_repo("/definitely/not/a/real/path/xyz");
    assert!(config.validate().is_err());
}

#[test]
fn test_validation_rejects_bad_limits() {
    let dir = tempfile::tempdir().unwrap();

    let mut config = IngestConfig::for_repo(dir.path());
    config.batch_size = 0;
    assert!(config.validate().is_err());

    let mut config = IngestConfig::for_repo(dir.path());
    config.mmap_threshold_bytes = config.max_file_bytes + 1;
    assert!(config.validate().is_err());

    let mut config = IngestConfig::for_repo(dir.path());
    config.parallel = false;
    config.workers = 4;
    assert!(config.validate().is_err());

    assert!(IngestConfig::for_repo(dir.path()).validate().is_ok());
}

#[test]
fn test_effective_workers() {
    let mut config = IngestConfig::default();
    config.parallel = false;
    assert_eq!(config.effective_workers(), 1);

    config.parallel = true;
    config.workers = 3;
    assert_eq!(config.effective_workers(), 3);

    config.workers = 0;
    assert!(config.effective_workers() >= 1);
}

#[test]
fn test_project_name_is_repo_basename() {
    let config = IngestConfig::for_repo("/srv/checkouts/acme-api");
    assert_eq!(config.project_name(), "acme-api");
}
