//! Call-site resolution, and the test-to-code links that ride on it.
//!
//! Lookup order for a free call in file F: (1) F's local scopes, (2) F's
//! import table, (3) same-package definitions, (4) assume builtin and
//! drop. Method calls resolve only when the receiver's class is known
//! from a constructor site in the same file (or is `self`/`this`);
//! anything else is dropped rather than guessed.

use std::collections::{BTreeMap, BTreeSet};

use crate::definer::{FileOutline, RawCall};
use crate::graph::{NodeLabel, NodeRef, RelRow, RelType};
use crate::lang::CallKind;

use super::imports::{ImportTables, ImportTarget};
use super::{Resolution, Resolver};

pub(super) fn resolve_calls(r: &Resolver<'_>, tables: &ImportTables, out: &mut Resolution) {
    // (test case, target) dedup across every call inside the test body
    let mut test_links: BTreeSet<(String, String, NodeLabel)> = BTreeSet::new();

    for outline in r.outlines() {
        let table = tables.get(&outline.module_qn);
        for call in &outline.calls {
            if call.kind == CallKind::Super {
                // consumed by override resolution
                continue;
            }
            let Some((target_label, target_qn)) = resolve_call(r, outline, table, call) else {
                out.stats.calls_dropped += 1;
                continue;
            };
            if target_qn == call.caller_qn {
                // self-recursion is real, keep it; but a test "calling"
                // itself is registry noise
                if call.caller_label == NodeLabel::TestCase {
                    continue;
                }
            }

            if call.caller_label == NodeLabel::TestCase {
                test_links.insert((call.caller_qn.clone(), target_qn, target_label));
            } else {
                out.stats.calls_resolved += 1;
                out.edges.push(
                    RelRow::new(
                        NodeRef::new(call.caller_label, call.caller_qn.clone()),
                        RelType::Calls,
                        NodeRef::new(target_label, target_qn),
                    )
                    .prop("line", call.line),
                );
            }
        }
    }

    for (test_qn, target_qn, target_label) in test_links {
        out.stats.tests_linked += 1;
        out.edges.push(RelRow::new(
            NodeRef::new(NodeLabel::TestCase, test_qn),
            RelType::Tests,
            NodeRef::new(target_label, target_qn),
        ));
    }
}

fn resolve_call(
    r: &Resolver<'_>,
    outline: &FileOutline,
    table: Option<&BTreeMap<String, ImportTarget>>,
    call: &RawCall,
) -> Option<(NodeLabel, String)> {
    match call.kind {
        CallKind::Free => resolve_free(r, outline, table, call),
        CallKind::Method => resolve_method(r, outline, table, call),
        CallKind::Qualified => resolve_qualified(r, outline, table, call),
        CallKind::Super => None,
    }
}

/// Bare-identifier call.
fn resolve_free(
    r: &Resolver<'_>,
    outline: &FileOutline,
    table: Option<&BTreeMap<String, ImportTarget>>,
    call: &RawCall,
) -> Option<(NodeLabel, String)> {
    // (1) local scopes: the caller's own nesting chain, innermost first,
    // down to module scope
    let mut scope = call.caller_qn.as_str();
    loop {
        let candidate = format!("{scope}.{}", call.name);
        if let Some(def) = r.registry().get(&candidate) {
            if def.label.is_callable() {
                return Some((def.label, candidate));
            }
        }
        if scope == outline.module_qn {
            break;
        }
        match scope.rsplit_once('.') {
            Some((parent, _)) if parent.len() >= outline.module_qn.len() => scope = parent,
            _ => break,
        }
    }

    // constructor call on a locally known class: not a CALLS target
    let local_class = format!("{}.{}", outline.module_qn, call.name);
    if r.registry().get(&local_class).map(|d| !d.label.is_callable()).unwrap_or(false) {
        return None;
    }

    // (2) import table
    if let Some(table) = table {
        if let Some(ImportTarget::Symbol(qn)) = table.get(&call.name) {
            if let Some(def) = r.registry().get(qn) {
                if def.label.is_callable() {
                    return Some((def.label, qn.clone()));
                }
            }
        }
    }

    // (3) same-package definitions
    let mut candidates: Vec<&str> = Vec::new();
    for sibling in r.sibling_modules(&outline.module_qn) {
        let candidate = format!("{sibling}.{}", call.name);
        if let Some(def) = r.registry().get(&candidate) {
            if def.label.is_callable() {
                candidates.push(def.qualified_name.as_str());
            }
        }
    }
    if let Some(qn) = super::pick_candidate(&call.name, candidates) {
        let label = r.registry().get(qn)?.label;
        return Some((label, qn.to_string()));
    }

    // (4) builtin or unknown
    None
}

/// Receiver call: `x.m()`. Resolves only through a receiver type known in
/// this file.
fn resolve_method(
    r: &Resolver<'_>,
    outline: &FileOutline,
    table: Option<&BTreeMap<String, ImportTarget>>,
    call: &RawCall,
) -> Option<(NodeLabel, String)> {
    let receiver = call.receiver.as_deref()?;

    // the receiver may be an imported module or class rather than a value
    if let Some(table) = table {
        match table.get(receiver) {
            Some(ImportTarget::Module(module)) => {
                let candidate = format!("{module}.{}", call.name);
                if let Some(def) = r.registry().get(&candidate) {
                    if def.label.is_callable() {
                        return Some((def.label, candidate));
                    }
                }
            }
            Some(ImportTarget::Symbol(symbol)) => {
                let candidate = format!("{symbol}.{}", call.name);
                if let Some(def) = r.registry().get(&candidate) {
                    if def.label.is_callable() {
                        return Some((def.label, candidate));
                    }
                }
            }
            _ => {}
        }
    }

    if receiver == "self" || receiver == "this" {
        // enclosing class: the caller must itself be a method
        if call.caller_label != NodeLabel::Method {
            return None;
        }
        let (class_qn, _) = call.caller_qn.rsplit_once('.')?;
        let candidate = format!("{class_qn}.{}", call.name);
        let def = r.registry().get(&candidate)?;
        return def.label.is_callable().then(|| (def.label, candidate));
    }

    // constructor-site tracking: receiver variable with a known class
    let class_name = outline.constructed.get(receiver)?;
    let class_qn = resolve_class_name(r, outline, table, class_name)?;
    let candidate = format!("{class_qn}.{}", call.name);
    let def = r.registry().get(&candidate)?;
    def.label.is_callable().then(|| (def.label, candidate))
}

/// Dotted-path call: `a.b.c()`. Walk the import table, then the project
/// FQN table.
fn resolve_qualified(
    r: &Resolver<'_>,
    outline: &FileOutline,
    table: Option<&BTreeMap<String, ImportTarget>>,
    call: &RawCall,
) -> Option<(NodeLabel, String)> {
    let qualifier = call.qualifier.as_deref()?.replace("::", ".");
    let root = qualifier.split('.').next().unwrap_or(&qualifier);
    let rest: Vec<&str> = qualifier.split('.').skip(1).collect();

    let mut candidates: Vec<String> = Vec::new();

    if let Some(table) = table {
        match table.get(root) {
            Some(ImportTarget::Module(module)) => {
                let mut qn = module.clone();
                for part in &rest {
                    qn.push('.');
                    qn.push_str(part);
                }
                candidates.push(format!("{qn}.{}", call.name));
            }
            Some(ImportTarget::Symbol(symbol)) => {
                // alias of a class: Class.method style
                let mut qn = symbol.clone();
                for part in &rest {
                    qn.push('.');
                    qn.push_str(part);
                }
                candidates.push(format!("{qn}.{}", call.name));
            }
            _ => {}
        }
    }

    // local class static call: `C.m()` with C in this module
    candidates.push(format!("{}.{qualifier}.{}", outline.module_qn, call.name));
    // project-rooted path
    candidates.push(format!("{}.{qualifier}.{}", r.project(), call.name));
    // already-rooted path
    if qualifier.starts_with(r.project()) {
        candidates.push(format!("{qualifier}.{}", call.name));
    }

    let hits: Vec<&str> = candidates
        .iter()
        .filter(|qn| r.registry().get(qn).map(|d| d.label.is_callable()).unwrap_or(false))
        .map(String::as_str)
        .collect();
    let reference = format!("{qualifier}.{}", call.name);
    let qn = super::pick_candidate(&reference, hits)?.to_string();
    let label = r.registry().get(&qn)?.label;
    Some((label, qn))
}

/// Resolve a class name seen at a constructor site to a class QN.
fn resolve_class_name(
    r: &Resolver<'_>,
    outline: &FileOutline,
    table: Option<&BTreeMap<String, ImportTarget>>,
    name: &str,
) -> Option<String> {
    let dotted = name.replace("::", ".");

    let local = format!("{}.{dotted}", outline.module_qn);
    if r.registry().contains(&local) {
        return Some(local);
    }

    if let Some(table) = table {
        if let Some(ImportTarget::Symbol(qn)) = table.get(dotted.as_str()) {
            return Some(qn.clone());
        }
    }

    let short = dotted.rsplit('.').next().unwrap_or(&dotted);
    let mut candidates: Vec<&str> = Vec::new();
    for sibling in r.sibling_modules(&outline.module_qn) {
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
    super::pick_candidate(&dotted, candidates).map(String::from)
}
