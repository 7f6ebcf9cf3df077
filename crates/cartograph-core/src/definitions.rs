//! The definition registry: every definition the run has seen, by
//! qualified name.
//!
//! Built by the aggregator while pass-1 results stream in, then read-only
//! during resolution. Lives for one run and is dropped at teardown.

use std::collections::{BTreeMap, BTreeSet};

use crate::definer::DefRecord;
use crate::graph::NodeLabel;

/// Qualified-name index over all definitions in the project.
#[derive(Default)]
pub struct DefinitionRegistry {
    by_qn: BTreeMap<String, DefRecord>,
    /// Short name -> every QN that ends in it.
    by_simple_name: BTreeMap<String, BTreeSet<String>>,
    duplicate_count: u64,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one definition. The first emission of a qualified name wins;
    /// later ones are counted and dropped.
    pub fn insert(&mut self, record: DefRecord) -> bool {
        if self.by_qn.contains_key(&record.qualified_name) {
            self.duplicate_count += 1;
            return false;
        }
        self.by_simple_name
            .entry(record.name.clone())
            .or_default()
            .insert(record.qualified_name.clone());
        self.by_qn.insert(record.qualified_name.clone(), record);
        true
    }

    pub fn get(&self, qualified_name: &str) -> Option<&DefRecord> {
        self.by_qn.get(qualified_name)
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.by_qn.contains_key(qualified_name)
    }

    /// All QNs sharing a short name, in lexicographic order.
    pub fn with_simple_name(&self, name: &str) -> impl Iterator<Item = &str> {
        self.by_simple_name
            .get(name)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Callable definitions (functions and methods) sharing a short name.
    pub fn callables_with_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DefRecord> {
        self.with_simple_name(name)
            .filter_map(|qn| self.by_qn.get(qn))
            .filter(|d| d.label.is_callable())
    }

    /// Class-like definitions sharing a short name.
    pub fn classes_with_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DefRecord> {
        self.with_simple_name(name)
            .filter_map(|qn| self.by_qn.get(qn))
            .filter(|d| {
                matches!(
                    d.label,
                    NodeLabel::Class | NodeLabel::Struct | NodeLabel::Union | NodeLabel::Enum
                )
            })
    }

    pub fn len(&self) -> usize {
        self.by_qn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_qn.is_empty()
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicate_count
    }

    /// Iterate all records in QN order.
    pub fn iter(&self) -> impl Iterator<Item = &DefRecord> {
        self.by_qn.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(qn: &str, label: NodeLabel) -> DefRecord {
        let name = qn.rsplit('.').next().unwrap_or(qn).to_string();
        DefRecord { qualified_name: qn.to_string(), label, name }
    }

    #[test]
    fn first_insert_wins() {
        let mut registry = DefinitionRegistry::new();
        assert!(registry.insert(record("p.m.f", NodeLabel::Function)));
        assert!(!registry.insert(record("p.m.f", NodeLabel::Method)));
        assert_eq!(registry.get("p.m.f").unwrap().label, NodeLabel::Function);
        assert_eq!(registry.duplicates(), 1);
    }

    #[test]
    fn simple_name_lookup_is_sorted() {
        let mut registry = DefinitionRegistry::new();
        registry.insert(record("p.z.f", NodeLabel::Function));
        registry.insert(record("p.a.f", NodeLabel::Function));
        let qns: Vec<&str> = registry.with_simple_name("f").collect();
        assert_eq!(qns, vec!["p.a.f", "p.z.f"]);
    }

    #[test]
    fn callables_exclude_classes() {
        let mut registry = DefinitionRegistry::new();
        registry.insert(record("p.m.X", NodeLabel::Class));
        registry.insert(record("p.n.X", NodeLabel::Function));
        let found: Vec<&str> =
            registry.callables_with_name("X").map(|d| d.qualified_name.as_str()).collect();
        assert_eq!(found, vec!["p.n.X"]);
    }
}
