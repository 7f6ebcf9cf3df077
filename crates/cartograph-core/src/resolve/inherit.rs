//! Inheritance resolution: base classes, cycles and method overrides.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;

use crate::graph::{NodeLabel, NodeRef, RelRow, RelType};
use crate::lang::{BaseKind, CallKind};

use super::imports::{ImportTables, ImportTarget};
use super::{Resolution, Resolver};

/// Resolved base classes per class QN, in declaration order.
pub(super) type BaseMap = BTreeMap<String, Vec<String>>;

pub(super) fn resolve_inheritance(
    r: &Resolver<'_>,
    tables: &ImportTables,
    out: &mut Resolution,
) -> BaseMap {
    let mut base_map: BaseMap = BTreeMap::new();

    for outline in r.outlines() {
        let table = tables.get(&outline.module_qn);
        for class_bases in &outline.bases {
            for base in &class_bases.bases {
                let Some(base_qn) = resolve_base(r, &outline.module_qn, table, &base.name) else {
                    out.stats.inherits_dropped += 1;
                    continue;
                };
                if base_qn == class_bases.class_qn {
                    continue;
                }
                out.stats.inherits_resolved += 1;
                let base_label =
                    r.registry().get(&base_qn).map(|d| d.label).unwrap_or(NodeLabel::Class);
                let rel = match base.kind {
                    BaseKind::Extends => RelType::InheritsFrom,
                    BaseKind::Implements => RelType::Implements,
                };
                out.edges.push(RelRow::new(
                    NodeRef::new(class_bases.class_label, class_bases.class_qn.clone()),
                    rel,
                    NodeRef::new(base_label, base_qn.clone()),
                ));
                if base.kind == BaseKind::Extends {
                    base_map
                        .entry(class_bases.class_qn.clone())
                        .or_default()
                        .push(base_qn);
                }
            }
        }
    }

    emit_inheritance_cycles(&base_map, r, out);
    base_map
}

/// Resolve one base-class identifier: local module scope, then imports,
/// then same-package, then the project FQN table.
fn resolve_base(
    r: &Resolver<'_>,
    module_qn: &str,
    table: Option<&BTreeMap<String, ImportTarget>>,
    name: &str,
) -> Option<String> {
    let dotted = name.replace("::", ".");
    let short = dotted.rsplit('.').next().unwrap_or(&dotted);

    // local definition
    let local = format!("{module_qn}.{dotted}");
    if r.registry().contains(&local) {
        return Some(local);
    }

    // import table: the root segment may be an alias
    if let Some(table) = table {
        let root = dotted.split('.').next().unwrap_or(&dotted);
        match table.get(root) {
            Some(ImportTarget::Symbol(qn)) if dotted == root => return Some(qn.clone()),
            Some(ImportTarget::Module(module)) => {
                let rest: Vec<&str> = dotted.split('.').skip(1).collect();
                let candidate = if rest.is_empty() {
                    module.clone()
                } else {
                    format!("{module}.{}", rest.join("."))
                };
                if r.registry().contains(&candidate) {
                    return Some(candidate);
                }
            }
            _ => {}
        }
        // `from m import *` style bindings land under the short name too
        if let Some(ImportTarget::Symbol(qn)) = table.get(short) {
            return Some(qn.clone());
        }
    }

    // same-package classes
    let mut candidates: Vec<&str> = Vec::new();
    for sibling in r.sibling_modules(module_qn) {
        let candidate = format!("{sibling}.{short}");
        if let Some(def) = r.registry().get(&candidate) {
            if matches!(
                def.label,
                NodeLabel::Class | NodeLabel::Struct | NodeLabel::Union | NodeLabel::Enum
            ) {
                candidates.push(def.qualified_name.as_str());
            }
        }
    }
    if let Some(qn) = super::pick_candidate(&dotted, candidates) {
        return Some(qn.to_string());
    }

    // project-wide, for qualified names
    if dotted.contains('.') {
        let rooted = format!("{}.{dotted}", r.project());
        if r.registry().contains(&rooted) {
            return Some(rooted);
        }
    }

    None
}

/// Cycles are kept as edges and reported: tarjan over INHERITS_FROM, one
/// CIRCULAR_DEPENDENCY per adjacent pair around each non-trivial ring.
fn emit_inheritance_cycles(base_map: &BaseMap, r: &Resolver<'_>, out: &mut Resolution) {
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut indices = BTreeMap::new();
    for (class, bases) in base_map {
        for qn in std::iter::once(class).chain(bases.iter()) {
            indices.entry(qn.clone()).or_insert_with(|| graph.add_node(qn.clone()));
        }
    }
    for (class, bases) in base_map {
        for base in bases {
            graph.add_edge(indices[class], indices[base], ());
        }
    }

    let mut cycle_id: i64 = 0;
    for component in tarjan_scc(&graph) {
        if component.len() < 2 {
            continue;
        }
        cycle_id += 1;
        out.stats.inheritance_cycles += 1;
        let mut members: Vec<&String> = component.iter().map(|ix| &graph[*ix]).collect();
        members.sort();
        let label_of = |qn: &str| {
            r.registry().get(qn).map(|d| d.label).unwrap_or(NodeLabel::Class)
        };
        let edges = if members.len() == 2 { 1 } else { members.len() };
        for pair in 0..edges {
            let src = members[pair];
            let dst = members[(pair + 1) % members.len()];
            out.edges.push(
                RelRow::new(
                    NodeRef::new(label_of(src), src.clone()),
                    RelType::CircularDependency,
                    NodeRef::new(label_of(dst), dst.clone()),
                )
                .prop("cycle_id", cycle_id),
            );
        }
    }
}

/// OVERRIDES: a method shadows the first same-named method found walking
/// the base chain depth-first in declaration order (leftmost base first).
/// Diamonds are visited once.
pub(super) fn resolve_overrides(r: &Resolver<'_>, base_map: &BaseMap, out: &mut Resolution) {
    // super() call sites, for the calls_super flag
    let mut super_calls: BTreeSet<(String, String)> = BTreeSet::new();
    for outline in r.outlines() {
        for call in &outline.calls {
            if call.kind == CallKind::Super {
                super_calls.insert((call.caller_qn.clone(), call.name.clone()));
            }
        }
    }

    for def in r.registry().iter() {
        if def.label != NodeLabel::Method {
            continue;
        }
        let Some((class_qn, method_name)) = def.qualified_name.rsplit_once('.') else {
            continue;
        };
        let Some(overridden) = find_in_bases(r, base_map, class_qn, method_name) else {
            continue;
        };
        out.stats.overrides += 1;
        let calls_super =
            super_calls.contains(&(def.qualified_name.clone(), method_name.to_string()));
        out.edges.push(
            RelRow::new(
                NodeRef::new(NodeLabel::Method, def.qualified_name.clone()),
                RelType::Overrides,
                NodeRef::new(NodeLabel::Method, overridden),
            )
            .prop("calls_super", calls_super),
        );
    }
}

fn find_in_bases(
    r: &Resolver<'_>,
    base_map: &BaseMap,
    class_qn: &str,
    method_name: &str,
) -> Option<String> {
    let mut visited = BTreeSet::new();
    let mut stack: Vec<String> = base_map
        .get(class_qn)
        .map(|bases| bases.iter().rev().cloned().collect())
        .unwrap_or_default();

    while let Some(base) = stack.pop() {
        if !visited.insert(base.clone()) {
            continue;
        }
        let candidate = format!("{base}.{method_name}");
        if let Some(def) = r.registry().get(&candidate) {
            if def.label == NodeLabel::Method {
                return Some(candidate);
            }
        }
        if let Some(next) = base_map.get(&base) {
            for b in next.iter().rev() {
                stack.push(b.clone());
            }
        }
    }
    None
}
