//! JSON export of the written graph.
//!
//! One object: `{"nodes": [...], "relationships": [...]}`. Node ids hash
//! the `(label, merge key)` pair, so an unchanged input produces
//! byte-identical ids across runs.

use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::UpdaterError;
use crate::graph::{NodeLabel, PropMap};

use super::GraphSnapshot;

#[derive(Serialize)]
struct ExportNode<'a> {
    id: String,
    labels: Vec<&'a str>,
    properties: &'a PropMap,
}

#[derive(Serialize)]
struct ExportRel<'a> {
    source: String,
    target: String,
    #[serde(rename = "type")]
    rel_type: &'a str,
    properties: &'a PropMap,
}

#[derive(Serialize)]
struct ExportDoc<'a> {
    nodes: Vec<ExportNode<'a>>,
    relationships: Vec<ExportRel<'a>>,
}

/// Stable node id: truncated sha256 over label + merge key.
fn node_id(label: NodeLabel, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(label.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(key.as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

/// Serialize the snapshot to pretty JSON at the given path.
pub fn export_json(snapshot: &GraphSnapshot, path: &Path) -> Result<(), UpdaterError> {
    let nodes: Vec<ExportNode<'_>> = snapshot
        .nodes
        .iter()
        .map(|((label, key), props)| ExportNode {
            id: node_id(*label, key),
            labels: vec![label.as_str()],
            properties: props,
        })
        .collect();

    let relationships: Vec<ExportRel<'_>> = snapshot
        .rels
        .iter()
        .map(|((src_label, src_key, rel, dst_label, dst_key), props)| ExportRel {
            source: node_id(*src_label, src_key),
            target: node_id(*dst_label, dst_key),
            rel_type: rel.as_str(),
            properties: props,
        })
        .collect();

    let doc = ExportDoc { nodes, relationships };
    let json = serde_json::to_string_pretty(&doc)
        .map_err(|e| UpdaterError::Writer(format!("export serialization failed: {e}")))?;
    std::fs::write(path, json).map_err(|e| UpdaterError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_and_distinct() {
        let a1 = node_id(NodeLabel::Function, "p.m.f");
        let a2 = node_id(NodeLabel::Function, "p.m.f");
        let b = node_id(NodeLabel::Method, "p.m.f");
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(a1.len(), 32);
    }
}
