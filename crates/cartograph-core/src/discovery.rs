//! File discovery and repository structure.
//!
//! Walks the repository root honoring ignore files, the unconditional
//! skip list and the configured folder/pattern filters, tagging each file
//! with a language. The walk is sorted by relative path so two runs see
//! the identical sequence, and symlinked files are visited at most once
//! per physical inode.
//!
//! The same walk classifies every directory as a Package (it contains a
//! package indicator such as `__init__.py` or `Cargo.toml`) or a plain
//! Folder, and emits the containment chain from the Project root.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::warn;

use crate::config::{IngestConfig, SKIPPED_DIRS};
use crate::error::UpdaterError;
use crate::graph::{NodeLabel, NodeRef, NodeRow, RelRow, RelType};
use crate::lang::{Lang, LanguageRegistry};

/// One candidate file from the walk.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub absolute_path: PathBuf,
    /// Repository-relative, forward slashes.
    pub relative_path: String,
    pub lang: Option<Lang>,
    pub byte_len: u64,
}

/// Walk output: the file sequence plus the structural subgraph.
#[derive(Default)]
pub struct DiscoveryResult {
    pub files: Vec<DiscoveredFile>,
    /// Project, Package, Folder and File nodes.
    pub nodes: Vec<NodeRow>,
    /// CONTAINS_* chain from the Project root.
    pub edges: Vec<RelRow>,
    /// Relative paths of directories that are packages.
    pub packages: BTreeSet<String>,
    pub warnings: u64,
}

/// Walk the repository and classify everything in it.
pub fn discover(config: &IngestConfig, registry: &LanguageRegistry) -> Result<DiscoveryResult, UpdaterError> {
    let project = config.project_name();
    let folder_prefixes = config.folder_prefixes();
    let glob_set = build_globs(&config.file_globs())?;
    let indicators: BTreeSet<&str> = registry.package_indicators().into_iter().collect();

    let mut result = DiscoveryResult::default();
    result.nodes.push(
        NodeRow::new(NodeLabel::Project, project.clone())
            .prop("root_path", config.repo_path.display().to_string()),
    );

    // dir relative path -> directory contents, collected before
    // classification so package indicators are known for every directory
    let mut dir_files: BTreeMap<String, Vec<(String, u64)>> = BTreeMap::new();
    let mut seen_inodes: BTreeSet<(u64, u64)> = BTreeSet::new();

    let walker = WalkBuilder::new(&config.repo_path)
        .hidden(true)
        .git_ignore(true)
        .follow_links(true)
        .sort_by_file_path(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
                && SKIPPED_DIRS.contains(&name.as_ref()))
        })
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("discovery error: {e}");
                result.warnings += 1;
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let Ok(relative) = path.strip_prefix(&config.repo_path) else {
            continue;
        };
        let relative_path = relative.to_string_lossy().replace('\\', "/");
        if relative_path.is_empty() {
            continue;
        }

        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                warn!("unreadable entry {relative_path}: {e}");
                result.warnings += 1;
                continue;
            }
        };

        // a symlinked file is processed once per physical inode
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            if !seen_inodes.insert((meta.dev(), meta.ino())) {
                continue;
            }
        }
        #[cfg(not(unix))]
        let _ = &mut seen_inodes;

        if !folder_prefixes.is_empty()
            && !folder_prefixes.iter().any(|p| relative_path.starts_with(p.as_str()))
        {
            continue;
        }
        if let Some(glob_set) = &glob_set {
            if !glob_set.is_match(&relative_path) {
                continue;
            }
        }

        let dir = relative_path.rsplit_once('/').map(|(d, _)| d).unwrap_or("").to_string();
        dir_files.entry(dir).or_default().push((relative_path, meta.len()));
    }

    // classify directories bottom of the chain first needs parents first;
    // BTreeMap iteration gives parents before children lexicographically
    let mut all_dirs: BTreeSet<String> = BTreeSet::new();
    for dir in dir_files.keys() {
        let mut current = dir.as_str();
        loop {
            if !current.is_empty() {
                all_dirs.insert(current.to_string());
            }
            match current.rsplit_once('/') {
                Some((parent, _)) => current = parent,
                None => break,
            }
        }
    }

    for dir in &all_dirs {
        let basenames: BTreeSet<&str> = dir_files
            .get(dir)
            .map(|files| {
                files
                    .iter()
                    .map(|(p, _)| p.rsplit('/').next().unwrap_or(p.as_str()))
                    .collect()
            })
            .unwrap_or_default();
        let is_package = basenames.iter().any(|b| indicators.contains(b));
        if is_package {
            result.packages.insert(dir.clone());
        }

        let name = dir.rsplit('/').next().unwrap_or(dir).to_string();
        let parent_ref = container_ref(&project, dir, &result.packages);
        if is_package {
            let package_qn = package_qn(&project, dir);
            result.nodes.push(
                NodeRow::new(NodeLabel::Package, package_qn.clone())
                    .prop("name", name)
                    .prop("path", dir.clone()),
            );
            result.edges.push(RelRow::new(
                parent_ref,
                RelType::ContainsPackage,
                NodeRef::new(NodeLabel::Package, package_qn),
            ));
        } else {
            result.nodes.push(
                NodeRow::new(NodeLabel::Folder, dir.clone()).prop("name", name),
            );
            result.edges.push(RelRow::new(
                parent_ref,
                RelType::ContainsFolder,
                NodeRef::new(NodeLabel::Folder, dir.clone()),
            ));
        }
    }

    // file nodes and the file sequence, in path order
    for (dir, files) in &dir_files {
        for (relative_path, byte_len) in files {
            let basename = relative_path.rsplit('/').next().unwrap_or(relative_path);
            let lang = classify(basename, registry);

            let mut row = NodeRow::new(NodeLabel::File, relative_path.clone())
                .prop("name", basename)
                .prop(
                    "extension",
                    basename.rsplit_once('.').map(|(_, e)| e).unwrap_or(""),
                );
            if let Some(lang) = lang {
                row = row.prop("language", lang.as_str());
            }
            result.nodes.push(row);

            let parent_ref = file_parent_ref(&project, dir, &result.packages);
            result.edges.push(RelRow::new(
                parent_ref,
                RelType::ContainsFile,
                NodeRef::new(NodeLabel::File, relative_path.clone()),
            ));

            result.files.push(DiscoveredFile {
                absolute_path: config.repo_path.join(relative_path),
                relative_path: relative_path.clone(),
                lang,
                byte_len: *byte_len,
            });
        }
    }

    result.files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(result)
}

/// Language tag by extension, then by recognized basename.
fn classify(basename: &str, registry: &LanguageRegistry) -> Option<Lang> {
    if basename.ends_with(".feature") {
        return Some(Lang::Gherkin);
    }
    if let Some(ext) = basename.rsplit_once('.').map(|(_, e)| e) {
        if let Some(profile) = registry.profile_for_extension(ext) {
            return Some(profile.lang);
        }
    }
    if crate::analyzers::config_files::ConfigFormat::detect(basename).is_some()
        || crate::analyzers::config_files::MANIFEST_BASENAMES.contains(&basename)
    {
        return Some(Lang::Config);
    }
    None
}

fn package_qn(project: &str, dir: &str) -> String {
    let mut qn = String::from(project);
    for part in dir.split('/').filter(|p| !p.is_empty()) {
        qn.push('.');
        qn.push_str(part);
    }
    qn
}

/// Containment parent of a directory: the project root, or the enclosing
/// package/folder.
fn container_ref(project: &str, dir: &str, packages: &BTreeSet<String>) -> NodeRef {
    match dir.rsplit_once('/') {
        None => NodeRef::new(NodeLabel::Project, project.to_string()),
        Some((parent, _)) => {
            if packages.contains(parent) {
                NodeRef::new(NodeLabel::Package, package_qn(project, parent))
            } else {
                NodeRef::new(NodeLabel::Folder, parent.to_string())
            }
        }
    }
}

/// Containment parent of a file: its directory, or the project root for
/// top-level files.
fn file_parent_ref(project: &str, dir: &str, packages: &BTreeSet<String>) -> NodeRef {
    if dir.is_empty() {
        NodeRef::new(NodeLabel::Project, project.to_string())
    } else if packages.contains(dir) {
        NodeRef::new(NodeLabel::Package, package_qn(project, dir))
    } else {
        NodeRef::new(NodeLabel::Folder, dir.to_string())
    }
}

fn build_globs(patterns: &[String]) -> Result<Option<GlobSet>, UpdaterError> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| UpdaterError::Config(format!("bad file pattern {pattern:?}: {e}")))?;
        builder.add(glob);
    }
    let set = builder
        .build()
        .map_err(|e| UpdaterError::Config(format!("bad file pattern set: {e}")))?;
    Ok(Some(set))
}
