//! Bolt-backed graph client.

use async_trait::async_trait;
use neo4rs::{query, BoltList, BoltMap, BoltString, BoltType, Graph};

use crate::config::IngestConfig;
use crate::error::UpdaterError;
use crate::graph::{PropMap, PropValue};

use super::GraphClient;

/// A connection to a Bolt-speaking graph server.
pub struct BoltGraph {
    graph: Graph,
}

impl BoltGraph {
    /// Connect to the endpoint named by the configuration.
    pub async fn connect(config: &IngestConfig) -> Result<Self, UpdaterError> {
        let graph = Graph::new(config.graph_uri(), &config.graph_user, &config.graph_password)
            .await
            .map_err(|e| UpdaterError::Writer(format!("connect failed: {e}")))?;
        Ok(Self { graph })
    }
}

#[async_trait]
impl GraphClient for BoltGraph {
    async fn run(&self, statement: &str, params: PropMap) -> Result<(), UpdaterError> {
        let mut q = query(statement);
        for (key, value) in &params {
            if let Some(value) = to_bolt(value) {
                q = q.param(key, value);
            }
        }
        self.graph
            .run(q)
            .await
            .map_err(|e| UpdaterError::Writer(format!("statement failed: {e}")))
    }

    async fn run_batch(&self, statement: &str, rows: &[PropMap]) -> Result<(), UpdaterError> {
        let list: Vec<BoltType> = rows.iter().map(|r| BoltType::Map(map_to_bolt(r))).collect();
        let q = query(statement).param("rows", BoltType::List(BoltList::from(list)));
        self.graph
            .run(q)
            .await
            .map_err(|e| UpdaterError::Writer(format!("batch failed: {e}")))
    }
}

/// Nulls are represented by omission, matching what MERGE + SET would do
/// anyway.
fn to_bolt(value: &PropValue) -> Option<BoltType> {
    match value {
        PropValue::Null => None,
        PropValue::Bool(b) => Some(BoltType::from(*b)),
        PropValue::Int(i) => Some(BoltType::from(*i)),
        PropValue::Float(f) => Some(BoltType::from(*f)),
        PropValue::Str(s) => Some(BoltType::from(s.as_str())),
        PropValue::StrList(items) => {
            let list: Vec<BoltType> = items.iter().map(|s| BoltType::from(s.as_str())).collect();
            Some(BoltType::List(BoltList::from(list)))
        }
        PropValue::Map(map) => Some(BoltType::Map(map_to_bolt(map))),
    }
}

fn map_to_bolt(map: &PropMap) -> BoltMap {
    let mut out = BoltMap::default();
    for (key, value) in map {
        if let Some(value) = to_bolt(value) {
            out.put(BoltString::from(key.as_str()), value);
        }
    }
    out
}
