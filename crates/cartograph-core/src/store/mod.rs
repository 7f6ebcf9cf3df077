//! Graph persistence: client seam, batch writer, index manager, export.
//!
//! The write path speaks parameterized Cypher over a [`GraphClient`]; the
//! Bolt implementation wraps a real server connection, the in-memory one
//! backs tests. Only the aggregator ever touches a client.

mod bolt;
mod export;
mod indexes;
mod memory;
mod writer;

pub use bolt::BoltGraph;
pub use export::export_json;
pub use indexes::IndexManager;
pub use memory::MemoryGraph;
pub use writer::{GraphSnapshot, GraphWriter, WriteStats};

use async_trait::async_trait;

use crate::error::UpdaterError;
use crate::graph::PropMap;

/// Minimal client surface the writer needs: parameterized statements,
/// optionally carrying an `UNWIND`-able row list.
#[async_trait]
pub trait GraphClient: Send + Sync {
    /// Run a statement with scalar parameters.
    async fn run(&self, statement: &str, params: PropMap) -> Result<(), UpdaterError>;

    /// Run a statement binding `$rows` to a list of maps.
    async fn run_batch(&self, statement: &str, rows: &[PropMap]) -> Result<(), UpdaterError>;
}
