//! Graph ontology for the code knowledge graph.
//!
//! Defines the schema every other subsystem speaks:
//!
//! - `nodes/`: node labels, merge keys and the entity structs produced by
//!   extraction (Module, Class, Function, Method, ...)
//! - `edges/`: relationship types and the `(source, type, target)` rows
//!   the writer batches
//!
//! Nodes are merged by a single key property per label (`qualified_name`
//! for code entities, `path` for files and folders, `name` for the project
//! and external packages). Re-emitting a node or edge with the same key is
//! idempotent.

pub mod edges;
pub mod nodes;

pub use edges::{RelRow, RelType};
pub use nodes::{
    ClassEntity, ClassKind, FunctionEntity, MethodEntity, ModuleEntity, NodeLabel, NodeRow,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A property value carried on a node or relationship.
///
/// Deliberately small: the wire protocol and the JSON export both speak
/// this set and nothing more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    StrList(Vec<String>),
    /// Nested map; used for the `props` column of relationship rows.
    Map(BTreeMap<String, PropValue>),
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Str(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::Str(v)
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        PropValue::Int(v)
    }
}

impl From<u32> for PropValue {
    fn from(v: u32) -> Self {
        PropValue::Int(v as i64)
    }
}

impl From<u64> for PropValue {
    fn from(v: u64) -> Self {
        PropValue::Int(v as i64)
    }
}

impl From<Vec<String>> for PropValue {
    fn from(v: Vec<String>) -> Self {
        PropValue::StrList(v)
    }
}

/// Ordered property map. BTreeMap keeps emission deterministic.
pub type PropMap = BTreeMap<String, PropValue>;

/// Reference to a node by label and merge-key value.
///
/// Relationships address their endpoints this way so edges can be written
/// without knowing anything else about the node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    pub label: NodeLabel,
    pub key: String,
}

impl NodeRef {
    pub fn new(label: NodeLabel, key: impl Into<String>) -> Self {
        Self { label, key: key.into() }
    }
}
