//! Import resolution: from raw textual targets to module qualified names,
//! per the source language's resolution rules.
//!
//! Produces the per-module alias tables used by call and inheritance
//! resolution, the `IMPORTS` edge set, the derived `CIRCULAR_DEPENDENCY`
//! set and the `ExternalPackage` nodes.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;

use crate::definer::FileOutline;
use crate::graph::{NodeLabel, NodeRef, NodeRow, RelRow, RelType};
use crate::lang::{Lang, RawImport};

use super::{Resolution, Resolver};

/// What a local name binds to after import resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    /// A project module.
    Module(String),
    /// A definition inside a project module.
    Symbol(String),
    /// A package outside the project, by root identifier.
    External(String),
}

/// Alias tables for every module, keyed by module QN then local name.
pub type ImportTables = BTreeMap<String, BTreeMap<String, ImportTarget>>;

pub(super) fn resolve_imports(r: &Resolver<'_>, out: &mut Resolution) -> ImportTables {
    let mut tables: ImportTables = BTreeMap::new();
    let mut module_deps: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut externals: BTreeMap<String, Option<String>> = BTreeMap::new();

    for outline in r.outlines() {
        let table = tables.entry(outline.module_qn.clone()).or_default();
        for imp in &outline.imports {
            match resolve_one(r, outline, imp) {
                Resolved::Module(target_qn) => {
                    out.stats.imports_resolved += 1;
                    bind_module(r, table, imp, &target_qn);
                    if target_qn != outline.module_qn {
                        module_deps
                            .entry(outline.module_qn.clone())
                            .or_default()
                            .insert(target_qn.clone());
                        out.edges.push(
                            RelRow::new(
                                outline.module_ref(),
                                RelType::Imports,
                                NodeRef::new(NodeLabel::Module, target_qn),
                            )
                            .prop("line", imp.line),
                        );
                    }
                }
                Resolved::External(root) => {
                    out.stats.imports_external += 1;
                    let local = imp.alias.clone().unwrap_or_else(|| root.clone());
                    table.insert(local, ImportTarget::External(root.clone()));
                    for item in &imp.items {
                        table.insert(item.clone(), ImportTarget::External(root.clone()));
                    }
                    if r.has_manifest_dep(&root) {
                        externals
                            .entry(root.clone())
                            .or_insert_with(|| r.manifest_version(&root).map(String::from));
                    }
                }
                Resolved::Dropped => out.stats.imports_dropped += 1,
            }
        }

        // Exports become EXPORTS edges when the symbol resolved in pass-1.
        for export in &outline.exports {
            let symbol_qn = format!("{}.{export}", outline.module_qn);
            if let Some(def) = r.registry().get(&symbol_qn) {
                out.edges.push(RelRow::new(
                    outline.module_ref(),
                    RelType::Exports,
                    NodeRef::new(def.label, symbol_qn),
                ));
            }
        }
    }

    emit_externals(r, externals, out);
    emit_import_cycles(module_deps, out);
    tables
}

/// Bind the names an import introduces into the module's alias table.
fn bind_module(
    r: &Resolver<'_>,
    table: &mut BTreeMap<String, ImportTarget>,
    imp: &RawImport,
    target_qn: &str,
) {
    let local = imp.alias.clone().unwrap_or_else(|| {
        imp.target
            .replace("::", ".")
            .rsplit('.')
            .next()
            .unwrap_or(&imp.target)
            .trim_start_matches('.')
            .to_string()
    });
    if !local.is_empty() {
        table.insert(local, ImportTarget::Module(target_qn.to_string()));
    }

    for item in &imp.items {
        let submodule = format!("{target_qn}.{item}");
        let target = if r.module_exists(&submodule) {
            ImportTarget::Module(submodule)
        } else if r.registry().contains(&submodule) {
            ImportTarget::Symbol(submodule)
        } else {
            continue;
        };
        table.insert(item.clone(), target);
    }
}

enum Resolved {
    Module(String),
    External(String),
    Dropped,
}

fn resolve_one(r: &Resolver<'_>, outline: &FileOutline, imp: &RawImport) -> Resolved {
    match outline.language {
        Some(Lang::Python) => resolve_python(r, outline, imp),
        Some(Lang::JavaScript | Lang::TypeScript) => resolve_js(r, outline, imp),
        Some(Lang::Rust) => resolve_rust(r, outline, imp),
        Some(Lang::Go) => resolve_go(r, imp),
        Some(Lang::Java | Lang::Scala) => resolve_jvm(r, imp),
        Some(Lang::C | Lang::Cpp) => resolve_c(r, outline, imp),
        _ => Resolved::Dropped,
    }
}

// --- Python -----------------------------------------------------------------

fn resolve_python(r: &Resolver<'_>, outline: &FileOutline, imp: &RawImport) -> Resolved {
    let target = imp.target.as_str();

    if let Some(stripped) = target.strip_prefix('.') {
        // relative: one dot = containing package, each further dot one up
        let extra_level = stripped.len() - stripped.trim_start_matches('.').len();
        let rest = stripped.trim_start_matches('.');
        let mut parts: Vec<&str> = outline.module_qn.split('.').collect();
        for _ in 0..=extra_level {
            if parts.len() > 1 {
                parts.pop();
            }
        }
        let mut candidate = parts.join(".");
        if !rest.is_empty() {
            candidate = format!("{candidate}.{rest}");
        }
        return match_python_module(r, &candidate);
    }

    // absolute: rooted at the project, or already project-rooted
    let rooted = format!("{}.{target}", r.project());
    if let Resolved::Module(qn) = match_python_module(r, &rooted) {
        return Resolved::Module(qn);
    }
    if target.starts_with(r.project()) {
        if let Resolved::Module(qn) = match_python_module(r, target) {
            return Resolved::Module(qn);
        }
    }

    let root = target.split('.').next().unwrap_or(target);
    Resolved::External(root.to_string())
}

/// Exact module, or a module one segment up (`from a.b import name`).
fn match_python_module(r: &Resolver<'_>, candidate: &str) -> Resolved {
    if r.module_exists(candidate) {
        return Resolved::Module(candidate.to_string());
    }
    if let Some((parent, _)) = candidate.rsplit_once('.') {
        if r.module_exists(parent) {
            return Resolved::Module(parent.to_string());
        }
    }
    Resolved::Dropped
}

// --- JavaScript / TypeScript ------------------------------------------------

fn resolve_js(r: &Resolver<'_>, outline: &FileOutline, imp: &RawImport) -> Resolved {
    if !imp.target.starts_with('.') {
        // bare specifier: external package; scoped names keep their scope
        let root = if imp.target.starts_with('@') {
            imp.target.splitn(3, '/').take(2).collect::<Vec<_>>().join("/")
        } else {
            imp.target.split('/').next().unwrap_or(&imp.target).to_string()
        };
        return Resolved::External(root);
    }

    let Some(normalized) = normalize_relative(&outline.relative_path, &imp.target) else {
        return Resolved::Dropped;
    };
    // extension-less resolution and index fallback both land on the same
    // dotted name, because module names collapse `index.*` already
    let candidate = format!("{}.{}", r.project(), normalized.replace('/', "."));
    if r.module_exists(&candidate) {
        return Resolved::Module(candidate);
    }
    Resolved::Dropped
}

/// Apply `./` and `../` segments of a specifier against the importing
/// file's directory.
fn normalize_relative(importing_path: &str, specifier: &str) -> Option<String> {
    let mut parts: Vec<&str> = importing_path.split('/').collect();
    parts.pop(); // the file itself
    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return None;
    }
    // strip an explicit extension if the specifier carried one
    let joined = parts.join("/");
    let trimmed = joined
        .strip_suffix(".ts")
        .or_else(|| joined.strip_suffix(".tsx"))
        .or_else(|| joined.strip_suffix(".js"))
        .or_else(|| joined.strip_suffix(".jsx"))
        .unwrap_or(&joined);
    Some(trimmed.to_string())
}

// --- Rust -------------------------------------------------------------------

fn resolve_rust(r: &Resolver<'_>, outline: &FileOutline, imp: &RawImport) -> Resolved {
    let dotted = imp.target.replace("::", ".");
    let mut segments: Vec<&str> = dotted.split('.').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Resolved::Dropped;
    }

    let base: Vec<String> = match segments[0] {
        "crate" => {
            segments.remove(0);
            vec![r.project().to_string()]
        }
        "self" => {
            segments.remove(0);
            outline.module_qn.split('.').map(String::from).collect()
        }
        "super" => {
            let mut parts: Vec<String> = outline.module_qn.split('.').map(String::from).collect();
            while segments.first() == Some(&"super") {
                segments.remove(0);
                if parts.len() > 1 {
                    parts.pop();
                }
            }
            parts
        }
        _ => vec![r.project().to_string()],
    };

    // longest module prefix wins; the remainder is a symbol path
    let mut candidate: Vec<String> = base;
    candidate.extend(segments.iter().map(|s| s.to_string()));
    for end in (1..=candidate.len()).rev() {
        let qn = candidate[..end].join(".");
        if r.module_exists(&qn) {
            return Resolved::Module(qn);
        }
        // crate layouts nest under src/
        let with_src = format!(
            "{}.src.{}",
            candidate[0],
            candidate[1..end].iter().map(String::as_str).collect::<Vec<_>>().join(".")
        );
        if end > 1 && r.module_exists(&with_src) {
            return Resolved::Module(with_src);
        }
    }

    match imp.target.split("::").next() {
        Some(root) if !matches!(root, "crate" | "self" | "super" | "std" | "core" | "alloc") => {
            Resolved::External(root.to_string())
        }
        _ => Resolved::Dropped,
    }
}

// --- Go ---------------------------------------------------------------------

fn resolve_go(r: &Resolver<'_>, imp: &RawImport) -> Resolved {
    // match the import path's trailing segments against project modules
    let tail: Vec<&str> = imp.target.split('/').collect();
    for take in (1..=tail.len().min(4)).rev() {
        let suffix = tail[tail.len() - take..].join(".");
        let candidate = format!("{}.{suffix}", r.project());
        if r.module_exists(&candidate) {
            return Resolved::Module(candidate);
        }
    }
    let root = imp.target.split('/').next().unwrap_or(&imp.target);
    Resolved::External(root.to_string())
}

// --- Java / Scala -----------------------------------------------------------

fn resolve_jvm(r: &Resolver<'_>, imp: &RawImport) -> Resolved {
    let target = imp.target.trim_end_matches(".*");

    let rooted = format!("{}.{target}", r.project());
    if r.module_exists(&rooted) {
        return Resolved::Module(rooted);
    }
    // source roots (src/main/java, ...) prefix the on-disk module name;
    // fall back to suffix matching against known modules
    let dotted_suffix = format!(".{target}");
    let matches: Vec<&str> = r
        .outlines()
        .iter()
        .map(|o| o.module_qn.as_str())
        .filter(|qn| qn.ends_with(&dotted_suffix))
        .collect();
    if let Some(qn) = super::pick_candidate(target, matches) {
        return Resolved::Module(qn.to_string());
    }
    // an import of a class inside a module: try one segment up
    if let Some((parent, _)) = target.rsplit_once('.') {
        let parent_suffix = format!(".{parent}");
        let matches: Vec<&str> = r
            .outlines()
            .iter()
            .map(|o| o.module_qn.as_str())
            .filter(|qn| qn.ends_with(&parent_suffix))
            .collect();
        if let Some(qn) = super::pick_candidate(parent, matches) {
            return Resolved::Module(qn.to_string());
        }
    }

    let root = target.split('.').next().unwrap_or(target);
    Resolved::External(root.to_string())
}

// --- C / C++ ----------------------------------------------------------------

fn resolve_c(r: &Resolver<'_>, outline: &FileOutline, imp: &RawImport) -> Resolved {
    if imp.system {
        let root = imp.target.rsplit('/').next().unwrap_or(&imp.target);
        return Resolved::External(root.trim_end_matches(".h").to_string());
    }

    // quoted include: relative to the including file, then the repo root
    if let Some(normalized) = normalize_include(&outline.relative_path, &imp.target) {
        if let Some(qn) = r.module_for_path(&normalized) {
            return Resolved::Module(qn.to_string());
        }
    }
    if let Some(qn) = r.module_for_path(&imp.target) {
        return Resolved::Module(qn.to_string());
    }
    Resolved::Dropped
}

fn normalize_include(including_path: &str, target: &str) -> Option<String> {
    let mut parts: Vec<&str> = including_path.split('/').collect();
    parts.pop();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

// --- derived sets -----------------------------------------------------------

fn emit_externals(
    r: &Resolver<'_>,
    externals: BTreeMap<String, Option<String>>,
    out: &mut Resolution,
) {
    let project_ref = NodeRef::new(NodeLabel::Project, r.project().to_string());
    for (name, version) in externals {
        out.nodes.push(
            NodeRow::new(NodeLabel::ExternalPackage, name.clone())
                .prop_opt("version", version.clone()),
        );
        out.edges.push(
            RelRow::new(
                project_ref.clone(),
                RelType::DependsOnExternal,
                NodeRef::new(NodeLabel::ExternalPackage, name),
            )
            .prop_opt("version_spec", version),
        );
    }
}

/// Tarjan over the module dependency graph; every non-trivial SCC becomes
/// a ring of CIRCULAR_DEPENDENCY edges.
fn emit_import_cycles(module_deps: BTreeMap<String, BTreeSet<String>>, out: &mut Resolution) {
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut indices = BTreeMap::new();
    for (module, deps) in &module_deps {
        for qn in std::iter::once(module).chain(deps.iter()) {
            indices
                .entry(qn.clone())
                .or_insert_with(|| graph.add_node(qn.clone()));
        }
    }
    for (module, deps) in &module_deps {
        for dep in deps {
            graph.add_edge(indices[module], indices[dep], ());
        }
    }

    let mut cycle_id: i64 = 0;
    for component in tarjan_scc(&graph) {
        let is_cycle = component.len() > 1
            || (component.len() == 1 && graph.contains_edge(component[0], component[0]));
        if !is_cycle {
            continue;
        }
        cycle_id += 1;
        out.stats.import_cycles += 1;
        let mut members: Vec<&String> = component.iter().map(|ix| &graph[*ix]).collect();
        members.sort();
        // one edge per adjacent pair around the ring; a two-member cycle
        // collapses to a single pair
        let edges = if members.len() == 2 { 1 } else { members.len() };
        for pair in 0..edges {
            let src = members[pair];
            let dst = members[(pair + 1) % members.len()];
            if src == dst {
                continue;
            }
            out.edges.push(
                RelRow::new(
                    NodeRef::new(NodeLabel::Module, src.clone()),
                    RelType::CircularDependency,
                    NodeRef::new(NodeLabel::Module, dst.clone()),
                )
                .prop("cycle_id", cycle_id),
            );
        }
    }
}
