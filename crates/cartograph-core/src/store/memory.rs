//! In-memory graph client for tests and dry runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::UpdaterError;
use crate::graph::PropMap;

use super::GraphClient;

/// Records every statement instead of talking to a server. With
/// `failing()`, every call errors, which exercises the retry path.
#[derive(Default)]
pub struct MemoryGraph {
    statements: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose every call fails with a transport-style error.
    pub fn failing() -> Self {
        let client = Self::default();
        client.fail.store(true, Ordering::Relaxed);
        client
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn statement_count(&self) -> usize {
        self.statements.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn record(&self, statement: &str) -> Result<(), UpdaterError> {
        if let Ok(mut statements) = self.statements.lock() {
            statements.push(statement.to_string());
        }
        if self.fail.load(Ordering::Relaxed) {
            return Err(UpdaterError::Writer("simulated transport failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl GraphClient for MemoryGraph {
    async fn run(&self, statement: &str, _params: PropMap) -> Result<(), UpdaterError> {
        self.record(statement)
    }

    async fn run_batch(&self, statement: &str, _rows: &[PropMap]) -> Result<(), UpdaterError> {
        self.record(statement)
    }
}
