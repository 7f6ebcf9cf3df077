//! Typed batch writer with idempotent MERGE semantics.
//!
//! Rows accumulate into one batch per node label and one per
//! `(source label, relationship type, target label)` triple, and flush
//! when full or at phase boundaries. Every batch is an `UNWIND $rows`
//! MERGE, retried on failure with exponential backoff, under a per-batch
//! timeout. Within one flush, batches go out in key order, so a run's
//! write sequence is a pure function of its input.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{DEFAULT_BACKOFF_BASE_MS, DEFAULT_WRITE_RETRIES};
use crate::error::UpdaterError;
use crate::graph::{NodeLabel, NodeRow, PropMap, PropValue, RelRow, RelType};

use super::GraphClient;

/// Write-side counters for the final report.
#[derive(Debug, Default, Clone)]
pub struct WriteStats {
    pub nodes_written: u64,
    pub rels_written: u64,
    pub batches_flushed: u64,
    pub retries: u64,
}

/// In-memory mirror of everything written, for export and tests.
/// Properties merge the way repeated MERGE + SET would.
#[derive(Debug, Default, Clone)]
pub struct GraphSnapshot {
    pub nodes: BTreeMap<(NodeLabel, String), PropMap>,
    pub rels: BTreeMap<(NodeLabel, String, RelType, NodeLabel, String), PropMap>,
}

impl GraphSnapshot {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn rel_count(&self) -> usize {
        self.rels.len()
    }

    pub fn has_node(&self, label: NodeLabel, key: &str) -> bool {
        self.nodes.contains_key(&(label, key.to_string()))
    }

    pub fn has_rel(&self, src: (NodeLabel, &str), rel: RelType, dst: (NodeLabel, &str)) -> bool {
        self.rels
            .contains_key(&(src.0, src.1.to_string(), rel, dst.0, dst.1.to_string()))
    }

    /// Relationships of one type, as `(src key, dst key)` pairs.
    pub fn rels_of(&self, rel: RelType) -> Vec<(String, String)> {
        self.rels
            .keys()
            .filter(|(_, _, r, _, _)| *r == rel)
            .map(|(_, src, _, _, dst)| (src.clone(), dst.clone()))
            .collect()
    }
}

/// Accumulates rows and flushes them as parameterized MERGE batches.
pub struct GraphWriter {
    client: Arc<dyn GraphClient>,
    batch_size: usize,
    batch_timeout: Duration,
    node_batches: BTreeMap<NodeLabel, Vec<NodeRow>>,
    rel_batches: BTreeMap<(NodeLabel, RelType, NodeLabel), Vec<RelRow>>,
    snapshot: GraphSnapshot,
    sequence: u64,
    pub stats: WriteStats,
}

impl GraphWriter {
    pub fn new(client: Arc<dyn GraphClient>, batch_size: usize, batch_timeout: Duration) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
            batch_timeout,
            node_batches: BTreeMap::new(),
            rel_batches: BTreeMap::new(),
            snapshot: GraphSnapshot::default(),
            sequence: 0,
            stats: WriteStats::default(),
        }
    }

    pub fn snapshot(&self) -> &GraphSnapshot {
        &self.snapshot
    }

    pub async fn push_node(&mut self, row: NodeRow) -> Result<(), UpdaterError> {
        self.snapshot
            .nodes
            .entry((row.label, row.key.clone()))
            .or_default()
            .extend(row.props.clone());

        let label = row.label;
        let batch = self.node_batches.entry(label).or_default();
        batch.push(row);
        if batch.len() >= self.batch_size {
            self.flush_node_label(label).await?;
        }
        Ok(())
    }

    pub async fn push_rel(&mut self, row: RelRow) -> Result<(), UpdaterError> {
        self.snapshot
            .rels
            .entry((
                row.src.label,
                row.src.key.clone(),
                row.rel,
                row.dst.label,
                row.dst.key.clone(),
            ))
            .or_default()
            .extend(row.props.clone());

        let key = (row.src.label, row.rel, row.dst.label);
        let batch = self.rel_batches.entry(key).or_default();
        batch.push(row);
        if batch.len() >= self.batch_size {
            self.flush_rel_key(key).await?;
        }
        Ok(())
    }

    /// Flush everything queued, nodes before relationships.
    pub async fn flush(&mut self) -> Result<(), UpdaterError> {
        let labels: Vec<NodeLabel> = self.node_batches.keys().copied().collect();
        for label in labels {
            self.flush_node_label(label).await?;
        }
        let keys: Vec<(NodeLabel, RelType, NodeLabel)> = self.rel_batches.keys().copied().collect();
        for key in keys {
            self.flush_rel_key(key).await?;
        }
        Ok(())
    }

    async fn flush_node_label(&mut self, label: NodeLabel) -> Result<(), UpdaterError> {
        let Some(rows) = self.node_batches.remove(&label) else {
            return Ok(());
        };
        if rows.is_empty() {
            return Ok(());
        }
        let key = label.merge_key();
        let statement = format!(
            "UNWIND $rows AS r MERGE (n:{} {{{key}: r.{key}}}) SET n += r",
            label.as_str()
        );
        let params: Vec<PropMap> = rows.iter().map(|r| r.props.clone()).collect();
        self.stats.nodes_written += rows.len() as u64;
        self.run_with_retry(&statement, &params).await
    }

    async fn flush_rel_key(
        &mut self,
        key: (NodeLabel, RelType, NodeLabel),
    ) -> Result<(), UpdaterError> {
        let Some(rows) = self.rel_batches.remove(&key) else {
            return Ok(());
        };
        if rows.is_empty() {
            return Ok(());
        }
        let (src_label, rel, dst_label) = key;
        let src_key = src_label.merge_key();
        let dst_key = dst_label.merge_key();
        let statement = format!(
            "UNWIND $rows AS r \
             MERGE (a:{} {{{src_key}: r.src}}) \
             MERGE (b:{} {{{dst_key}: r.dst}}) \
             MERGE (a)-[e:{}]->(b) \
             SET e += r.props",
            src_label.as_str(),
            dst_label.as_str(),
            rel.as_str()
        );
        let params: Vec<PropMap> = rows
            .iter()
            .map(|r| {
                let mut map = PropMap::new();
                map.insert("src".into(), PropValue::Str(r.src.key.clone()));
                map.insert("dst".into(), PropValue::Str(r.dst.key.clone()));
                map.insert("props".into(), PropValue::Map(r.props.clone()));
                map
            })
            .collect();
        self.stats.rels_written += rows.len() as u64;
        self.run_with_retry(&statement, &params).await
    }

    /// Retry with exponential backoff. The jitter is derived from the
    /// batch sequence number, not a clock, so runs stay reproducible.
    async fn run_with_retry(&mut self, statement: &str, rows: &[PropMap]) -> Result<(), UpdaterError> {
        self.sequence += 1;
        self.stats.batches_flushed += 1;

        let mut last_error = None;
        for attempt in 0..=DEFAULT_WRITE_RETRIES {
            if attempt > 0 {
                let base = DEFAULT_BACKOFF_BASE_MS << (attempt - 1);
                let jitter_pct =
                    (self.sequence.wrapping_mul(2_654_435_761).wrapping_add(attempt as u64) % 41)
                        as i64
                        - 20;
                let delay = base as i64 + (base as i64 * jitter_pct) / 100;
                tokio::time::sleep(Duration::from_millis(delay.max(1) as u64)).await;
                self.stats.retries += 1;
            }

            let attempt_result = tokio::time::timeout(
                self.batch_timeout,
                self.client.run_batch(statement, rows),
            )
            .await;

            match attempt_result {
                Ok(Ok(())) => {
                    debug!(rows = rows.len(), "batch committed");
                    return Ok(());
                }
                Ok(Err(e)) => {
                    warn!(attempt, "batch write failed: {e}");
                    last_error = Some(e);
                }
                Err(_) => {
                    warn!(attempt, "batch write timed out");
                    last_error = Some(UpdaterError::Writer("batch timeout".into()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| UpdaterError::Writer("write failed".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeRef;
    use crate::store::MemoryGraph;

    fn writer_with(client: Arc<MemoryGraph>) -> GraphWriter {
        GraphWriter::new(client, 2, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn batches_flush_when_full() {
        let client = Arc::new(MemoryGraph::default());
        let mut writer = writer_with(Arc::clone(&client));

        writer.push_node(NodeRow::new(NodeLabel::Function, "p.a")).await.unwrap();
        assert_eq!(client.statement_count(), 0);
        writer.push_node(NodeRow::new(NodeLabel::Function, "p.b")).await.unwrap();
        assert_eq!(client.statement_count(), 1);
    }

    #[tokio::test]
    async fn snapshot_merges_repeated_rows() {
        let client = Arc::new(MemoryGraph::default());
        let mut writer = writer_with(client);

        writer
            .push_node(NodeRow::new(NodeLabel::Function, "p.f").prop("start_line", 1u32))
            .await
            .unwrap();
        writer
            .push_node(NodeRow::new(NodeLabel::Function, "p.f").prop("is_module_init", true))
            .await
            .unwrap();

        assert_eq!(writer.snapshot().node_count(), 1);
        let props = &writer.snapshot().nodes[&(NodeLabel::Function, "p.f".to_string())];
        assert!(props.contains_key("start_line"));
        assert!(props.contains_key("is_module_init"));
    }

    #[tokio::test]
    async fn rel_statement_shape_follows_merge_pattern() {
        let client = Arc::new(MemoryGraph::default());
        let mut writer = writer_with(Arc::clone(&client));

        writer
            .push_rel(RelRow::new(
                NodeRef::new(NodeLabel::Module, "p.m"),
                RelType::Defines,
                NodeRef::new(NodeLabel::Function, "p.m.f"),
            ))
            .await
            .unwrap();
        writer.flush().await.unwrap();

        let statements = client.statements();
        assert!(statements.iter().any(|s| {
            s.contains("UNWIND $rows AS r")
                && s.contains("MERGE (a:Module {qualified_name: r.src})")
                && s.contains("MERGE (a)-[e:DEFINES]->(b)")
        }));
    }

    #[tokio::test]
    async fn retries_exhaust_into_writer_error() {
        let client = Arc::new(MemoryGraph::failing());
        let mut writer = writer_with(Arc::clone(&client));

        writer.push_node(NodeRow::new(NodeLabel::Function, "p.f")).await.unwrap();
        let result = writer.flush().await;
        assert!(matches!(result, Err(UpdaterError::Writer(_))));
        assert_eq!(client.statement_count() as u64, 1 + DEFAULT_WRITE_RETRIES as u64);
    }
}
