//! Index and constraint management.
//!
//! Runs once at the start of every ingestion, before the first write:
//! uniqueness on the qualified names that MERGE keys on, plus property
//! indexes for the common lookup paths.

use std::sync::Arc;

use tracing::info;

use crate::error::UpdaterError;
use crate::graph::PropMap;

use super::GraphClient;

/// Labels whose qualified name must be unique.
const UNIQUE_QN_LABELS: &[&str] = &["Project", "Module", "Class", "Function", "Method"];

/// `(label, property)` pairs worth an index.
const PROPERTY_INDEXES: &[(&str, &str)] = &[
    ("Function", "name"),
    ("Method", "name"),
    ("Class", "name"),
    ("File", "path"),
    ("Module", "path"),
    ("Folder", "path"),
    ("Module", "language"),
    ("TestCase", "framework"),
    ("TestSuite", "framework"),
    ("Vulnerability", "severity"),
    ("ExternalPackage", "name"),
];

/// Ensures the schema objects exist; safe to run on every start.
pub struct IndexManager {
    client: Arc<dyn GraphClient>,
}

impl IndexManager {
    pub fn new(client: Arc<dyn GraphClient>) -> Self {
        Self { client }
    }

    pub async fn ensure_all(&self) -> Result<(), UpdaterError> {
        for label in UNIQUE_QN_LABELS {
            let name = format!("uniq_{}_qn", label.to_lowercase());
            let statement = format!(
                "CREATE CONSTRAINT {name} IF NOT EXISTS \
                 FOR (n:{label}) REQUIRE n.qualified_name IS UNIQUE"
            );
            self.client.run(&statement, PropMap::new()).await?;
        }

        for (label, property) in PROPERTY_INDEXES {
            let name = format!("idx_{}_{property}", label.to_lowercase());
            let statement = format!(
                "CREATE INDEX {name} IF NOT EXISTS FOR (n:{label}) ON (n.{property})"
            );
            self.client.run(&statement, PropMap::new()).await?;
        }

        info!(
            constraints = UNIQUE_QN_LABELS.len(),
            indexes = PROPERTY_INDEXES.len(),
            "schema objects ensured"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryGraph;

    #[tokio::test]
    async fn ensures_constraints_and_indexes() {
        let client = Arc::new(MemoryGraph::new());
        IndexManager::new(Arc::clone(&client) as Arc<dyn GraphClient>)
            .ensure_all()
            .await
            .unwrap();

        let statements = client.statements();
        assert_eq!(statements.len(), UNIQUE_QN_LABELS.len() + PROPERTY_INDEXES.len());
        assert!(statements
            .iter()
            .any(|s| s.contains("FOR (n:Function) REQUIRE n.qualified_name IS UNIQUE")));
        assert!(statements.iter().any(|s| s.contains("FOR (n:File) ON (n.path)")));
    }
}
