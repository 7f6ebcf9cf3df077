//! Ingestion configuration.
//!
//! Configuration is plain data: build an [`IngestConfig`] in code, or load
//! one from a `cartograph.toml` next to the repository being scanned.
//! Unset fields fall back to the constants in [`defaults`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything an ingestion run needs to know.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Root directory to scan.
    pub repo_path: PathBuf,

    /// Delete the existing project subgraph before writing.
    pub clean: bool,

    /// Run pass-1 on the worker pool.
    pub parallel: bool,

    /// Worker count override; 0 means auto (80% of cores, at least 1).
    pub workers: usize,

    /// Comma-separated relative path prefixes; empty means everything.
    pub folder_filter: String,

    /// Comma-separated globs applied on top of the folder filter.
    pub file_pattern: String,

    /// Exclude test files from extraction.
    pub skip_tests: bool,

    /// Serialize the graph to JSON at this path after the run.
    pub output_json: Option<PathBuf>,

    /// Bolt endpoint.
    pub graph_host: String,
    pub graph_port: u16,

    /// Bolt credentials; empty user means unauthenticated.
    pub graph_user: String,
    pub graph_password: String,

    /// Rows per typed write batch.
    pub batch_size: usize,

    /// Hard skip cap for file size, in bytes.
    pub max_file_bytes: u64,

    /// Memory-map threshold, in bytes.
    pub mmap_threshold_bytes: u64,

    /// Soft per-file parse timeout, in seconds.
    pub parse_timeout_secs: u64,

    /// Per-batch graph client timeout, in seconds.
    pub batch_timeout_secs: u64,

    /// Aggregator memory watermark, in bytes; 0 disables the cap.
    pub memory_cap_bytes: u64,

    /// Include-closure depth for C macro expansion; 0 = translation unit only.
    pub macro_expansion_depth: u32,

    /// Mine git history for Contributor/Commit nodes.
    pub enable_vcs: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::new(),
            clean: false,
            parallel: true,
            workers: 0,
            folder_filter: String::new(),
            file_pattern: String::new(),
            skip_tests: false,
            output_json: None,
            graph_host: DEFAULT_GRAPH_HOST.to_string(),
            graph_port: DEFAULT_GRAPH_PORT,
            graph_user: String::new(),
            graph_password: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            mmap_threshold_bytes: DEFAULT_MMAP_THRESHOLD_BYTES,
            parse_timeout_secs: DEFAULT_PARSE_TIMEOUT_SECS,
            batch_timeout_secs: DEFAULT_BATCH_TIMEOUT_SECS,
            memory_cap_bytes: 0,
            macro_expansion_depth: DEFAULT_MACRO_EXPANSION_DEPTH,
            enable_vcs: true,
        }
    }
}

impl IngestConfig {
    /// Build a config for the given repository root with defaults elsewhere.
    pub fn for_repo(repo_path: impl Into<PathBuf>) -> Self {
        Self { repo_path: repo_path.into(), ..Default::default() }
    }

    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate start-up invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repo_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("repo_path is required".into()));
        }
        if !self.repo_path.is_dir() {
            return Err(ConfigError::Invalid(format!(
                "repo_path is not a directory: {}",
                self.repo_path.display()
            )));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.mmap_threshold_bytes > self.max_file_bytes {
            return Err(ConfigError::Invalid(
                "mmap_threshold_bytes must not exceed max_file_bytes".into(),
            ));
        }
        if !self.parallel && self.workers > 1 {
            return Err(ConfigError::Invalid(
                "workers > 1 requires parallel = true".into(),
            ));
        }
        Ok(())
    }

    /// Effective worker count.
    pub fn effective_workers(&self) -> usize {
        if !self.parallel {
            return 1;
        }
        if self.workers > 0 {
            return self.workers;
        }
        let cores = num_cpus::get();
        ((cores as f64 * DEFAULT_WORKER_FRACTION) as usize).max(1)
    }

    /// The folder filter split into normalized relative prefixes.
    pub fn folder_prefixes(&self) -> Vec<String> {
        self.folder_filter
            .split(',')
            .map(|s| s.trim().trim_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// The file-pattern filter split into glob strings.
    pub fn file_globs(&self) -> Vec<String> {
        self.file_pattern
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Project name: the repository directory's base name.
    pub fn project_name(&self) -> String {
        self.repo_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    }

    /// Bolt URI for the configured endpoint.
    pub fn graph_uri(&self) -> String {
        format!("{}:{}", self.graph_host, self.graph_port)
    }
}
