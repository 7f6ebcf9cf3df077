//! Code knowledge-graph updater.
//!
//! Ingests a multi-language source repository and persists a labeled
//! property graph (code entities as nodes, structural and semantic
//! relations as edges) to a Bolt-speaking graph database.
//!
//! # Pipeline
//!
//! 1. **Discovery** walks the repository deterministically, tagging files
//!    by language and classifying directories as packages or folders.
//! 2. **Extraction** (pass 1) parses each file with tree-sitter on a
//!    worker pool and collects definitions plus unresolved references.
//! 3. **Resolution** (pass 2) turns those references into edges on the
//!    aggregator: imports, calls, inheritance, overrides, test links.
//! 4. **Analyzers** add what generic extraction cannot see: C pointers
//!    and kernel patterns, test suites, Gherkin features, configuration
//!    keys, git history.
//! 5. **Persistence** batches everything into idempotent `MERGE`
//!    statements, behind a fixed phase order so edges never reference
//!    missing nodes.
//!
//! # Example
//!
//! ```ignore
//! use cartograph_core::{GraphUpdater, IngestConfig};
//!
//! let config = IngestConfig::for_repo("/path/to/repo");
//! let mut updater = GraphUpdater::connect(config).await?;
//! let report = updater.ingest().await?;
//! println!("{} nodes, {} relationships", report.nodes_written, report.rels_written);
//! ```

pub mod analyzers;
pub mod config;
pub mod definer;
pub mod definitions;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod lang;
pub mod parser;
mod pipeline;
pub mod progress;
pub mod resolve;
pub mod store;

pub use config::IngestConfig;
pub use error::UpdaterError;
pub use pipeline::{CancelFlag, RunReport};

use std::path::Path;
use std::sync::Arc;

use store::{export_json, BoltGraph, GraphClient, GraphSnapshot, IndexManager};

/// The updater: one instance per target repository and graph endpoint.
pub struct GraphUpdater {
    client: Arc<dyn GraphClient>,
    config: IngestConfig,
    cancel: CancelFlag,
    snapshot: Option<GraphSnapshot>,
}

impl GraphUpdater {
    /// Build an updater over an existing client. Tests pass a
    /// [`store::MemoryGraph`] here.
    pub fn new(client: Arc<dyn GraphClient>, config: IngestConfig) -> Self {
        Self { client, config, cancel: CancelFlag::new(), snapshot: None }
    }

    /// Connect to the Bolt endpoint named by the configuration.
    pub async fn connect(config: IngestConfig) -> Result<Self, UpdaterError> {
        let client = BoltGraph::connect(&config).await?;
        Ok(Self::new(Arc::new(client), config))
    }

    /// Handle for cooperative cancellation from another task or a signal
    /// handler.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Ensure uniqueness constraints and property indexes exist.
    pub async fn ensure_indexes(&self) -> Result<(), UpdaterError> {
        IndexManager::new(Arc::clone(&self.client)).ensure_all().await
    }

    /// Run the full pipeline and return the run report.
    pub async fn ingest(&mut self) -> Result<RunReport, UpdaterError> {
        let output = pipeline::run_ingest(Arc::clone(&self.client), &self.config, &self.cancel).await?;
        if let Some(path) = self.config.output_json.clone() {
            export_json(&output.snapshot, &path)?;
        }
        self.snapshot = Some(output.snapshot);
        Ok(output.report)
    }

    /// Serialize the last run's graph to JSON.
    pub fn export(&self, path: &Path) -> Result<(), UpdaterError> {
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| UpdaterError::Config("nothing ingested yet".into()))?;
        export_json(snapshot, path)
    }

    /// The last run's in-memory graph, if any.
    pub fn snapshot(&self) -> Option<&GraphSnapshot> {
        self.snapshot.as_ref()
    }
}
