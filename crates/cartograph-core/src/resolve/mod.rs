//! Pass-2 cross-reference resolution.
//!
//! Runs on the aggregator once every file in the batch has a pass-1
//! outline. Resolution order matters: imports first (they feed the alias
//! tables everything else consults), then inheritance (overrides need the
//! base maps), then calls and test links.
//!
//! The resolution precedence everywhere is local > imported >
//! same-package > external; unresolvable references are dropped and
//! counted, never guessed.

mod calls;
mod imports;
mod inherit;

use std::collections::BTreeMap;

use crate::definer::FileOutline;
use crate::definitions::DefinitionRegistry;
use crate::graph::{NodeRow, RelRow};

pub use imports::ImportTarget;

/// Counters for the final report.
#[derive(Debug, Default, Clone)]
pub struct ResolveStats {
    pub imports_resolved: u64,
    pub imports_external: u64,
    pub imports_dropped: u64,
    pub calls_resolved: u64,
    pub calls_dropped: u64,
    pub inherits_resolved: u64,
    pub inherits_dropped: u64,
    pub overrides: u64,
    pub import_cycles: u64,
    pub inheritance_cycles: u64,
    pub tests_linked: u64,
}

/// Everything pass-2 produced.
#[derive(Default)]
pub struct Resolution {
    pub nodes: Vec<NodeRow>,
    pub edges: Vec<RelRow>,
    pub stats: ResolveStats,
}

/// Resolves unresolved buffers against the whole-project registry.
pub struct Resolver<'a> {
    project: &'a str,
    registry: &'a DefinitionRegistry,
    outlines: &'a [FileOutline],
    /// module QN -> outline index
    modules: BTreeMap<String, usize>,
    /// relative path -> module QN
    module_paths: BTreeMap<String, String>,
    /// declared dependency name -> version spec, from manifests
    manifest_deps: &'a BTreeMap<String, String>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        project: &'a str,
        registry: &'a DefinitionRegistry,
        outlines: &'a [FileOutline],
        manifest_deps: &'a BTreeMap<String, String>,
    ) -> Self {
        let mut modules = BTreeMap::new();
        let mut module_paths = BTreeMap::new();
        for (idx, outline) in outlines.iter().enumerate() {
            modules.insert(outline.module_qn.clone(), idx);
            module_paths.insert(outline.relative_path.clone(), outline.module_qn.clone());
        }
        Self { project, registry, outlines, modules, module_paths, manifest_deps }
    }

    /// Run the whole pass.
    pub fn resolve(&self) -> Resolution {
        let mut resolution = Resolution::default();

        let tables = imports::resolve_imports(self, &mut resolution);
        let base_map = inherit::resolve_inheritance(self, &tables, &mut resolution);
        inherit::resolve_overrides(self, &base_map, &mut resolution);
        calls::resolve_calls(self, &tables, &mut resolution);

        resolution
    }

    pub(crate) fn project(&self) -> &str {
        self.project
    }

    pub(crate) fn registry(&self) -> &DefinitionRegistry {
        self.registry
    }

    pub(crate) fn outlines(&self) -> &[FileOutline] {
        self.outlines
    }

    pub(crate) fn module_exists(&self, qn: &str) -> bool {
        self.modules.contains_key(qn)
    }

    pub(crate) fn module_for_path(&self, relative_path: &str) -> Option<&str> {
        self.module_paths.get(relative_path).map(String::as_str)
    }

    pub(crate) fn manifest_version(&self, name: &str) -> Option<&str> {
        self.manifest_deps.get(name).map(String::as_str)
    }

    pub(crate) fn has_manifest_dep(&self, name: &str) -> bool {
        self.manifest_deps.contains_key(name)
    }

    /// Modules in the same package (same QN parent) as the given module.
    pub(crate) fn sibling_modules<'r>(&'r self, module_qn: &str) -> Vec<&'r str> {
        let parent = match module_qn.rsplit_once('.') {
            Some((parent, _)) => parent.to_string(),
            None => return Vec::new(),
        };
        self.modules
            .keys()
            .filter(|qn| {
                qn.as_str() != module_qn
                    && qn.rsplit_once('.').map(|(p, _)| p == parent).unwrap_or(false)
            })
            .map(String::as_str)
            .collect()
    }
}

/// Deterministic choice among equally ranked candidates: longest suffix
/// match against the reference text first, lexicographically smallest QN
/// on ties.
pub(crate) fn pick_candidate<'a>(reference: &str, mut candidates: Vec<&'a str>) -> Option<&'a str> {
    if candidates.is_empty() {
        return None;
    }
    let dotted = reference.replace("::", ".");
    candidates.sort_by(|a, b| {
        let sa = suffix_overlap(&dotted, a);
        let sb = suffix_overlap(&dotted, b);
        sb.cmp(&sa).then_with(|| a.cmp(b))
    });
    candidates.first().copied()
}

/// Number of trailing dotted segments shared by reference and candidate.
fn suffix_overlap(reference: &str, candidate: &str) -> usize {
    let r: Vec<&str> = reference.split('.').collect();
    let c: Vec<&str> = candidate.split('.').collect();
    r.iter()
        .rev()
        .zip(c.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_prefers_longest_suffix_then_lexicographic() {
        let picked = pick_candidate("b.f", vec!["p.a.f", "p.b.f"]);
        assert_eq!(picked, Some("p.b.f"));

        let picked = pick_candidate("f", vec!["p.z.f", "p.a.f"]);
        assert_eq!(picked, Some("p.a.f"));
    }
}
