//! The ingestion pipeline: discovery, parallel extraction, resolution,
//! analysis, persistence.
//!
//! Pass-1 is embarrassingly parallel per file and runs on a rayon pool;
//! everything that mutates shared state (the definition registry, the
//! graph client) happens on the single aggregator task. Files are
//! dispatched in chunks and merged in lexicographic path order whatever
//! order workers finish in, which keeps the emitted graph deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::analyzers::{bdd, builtin_analyzers, config_files, tests as test_analysis, vcs, FileAnalyzer};
use crate::config::IngestConfig;
use crate::definer::{Definer, FileOutline, StepDef};
use crate::definitions::DefinitionRegistry;
use crate::discovery::{discover, DiscoveredFile};
use crate::error::UpdaterError;
use crate::graph::{NodeLabel, NodeRef, PropMap, PropValue, RelRow, RelType};
use crate::lang::{Lang, LanguageRegistry};
use crate::parser::{parse_file, ParseLimits, ParseOutcome};
use crate::progress::ProgressReporter;
use crate::resolve::Resolver;
use crate::store::{GraphClient, GraphSnapshot, GraphWriter, IndexManager};

/// Cooperative cancellation handle, checked between files and batches.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome summary of one ingestion run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunReport {
    pub project: String,
    pub files_discovered: usize,
    pub files_parsed: usize,
    pub files_skipped: u64,
    pub parse_errors: u64,
    pub warnings: u64,
    pub definitions: usize,
    pub nodes_written: u64,
    pub rels_written: u64,
    pub calls_resolved: u64,
    pub calls_dropped: u64,
    pub imports_resolved: u64,
    pub import_cycles: u64,
    pub inheritance_cycles: u64,
    pub overrides: u64,
    pub tests_linked: u64,
    pub steps_linked: u64,
    pub commits: u64,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

pub(crate) struct RunOutput {
    pub report: RunReport,
    pub snapshot: GraphSnapshot,
}

enum WorkResult {
    Outline(Box<FileOutline>),
    Skipped { path: String, reason: String },
    Failed { path: String, message: String },
}

/// Run the whole pipeline against the configured repository.
pub(crate) async fn run_ingest(
    client: Arc<dyn GraphClient>,
    config: &IngestConfig,
    cancel: &CancelFlag,
) -> Result<RunOutput, UpdaterError> {
    config.validate().map_err(|e| UpdaterError::Config(e.to_string()))?;

    let started = Instant::now();
    let project = config.project_name();
    let registry = Arc::new(LanguageRegistry::new());
    let mut report = RunReport { project: project.clone(), ..Default::default() };

    // (1) schema, and a clean slate when asked for
    IndexManager::new(Arc::clone(&client)).ensure_all().await?;
    if config.clean {
        info!(project = %project, "deleting existing project subgraph");
        let mut params = PropMap::new();
        params.insert("project".into(), PropValue::Str(project.clone()));
        client
            .run("MATCH (n {project: $project}) DETACH DELETE n", params)
            .await?;
    }

    let mut writer = GraphWriter::new(
        Arc::clone(&client),
        config.batch_size,
        Duration::from_secs(config.batch_timeout_secs),
    );

    // (2) discovery + containment structure
    let discovery = discover(config, &registry)?;
    report.files_discovered = discovery.files.len();
    report.warnings += discovery.warnings;
    info!(files = discovery.files.len(), "discovery complete");

    for node in discovery.nodes.clone() {
        writer.push_node(node.prop("project", project.clone())).await?;
    }
    for edge in discovery.edges.clone() {
        writer.push_rel(edge).await?;
    }
    writer.flush().await?;

    // (3) pass-1 over parseable files
    let parseable: Vec<DiscoveredFile> = discovery
        .files
        .iter()
        .filter(|f| f.lang.map(|l| l.has_grammar()).unwrap_or(false))
        .filter(|f| {
            !(config.skip_tests
                && f.lang.map(|l| test_analysis::is_test_path(&f.relative_path, l)).unwrap_or(false))
        })
        .cloned()
        .collect();

    let limits = ParseLimits {
        max_file_bytes: config.max_file_bytes,
        mmap_threshold_bytes: config.mmap_threshold_bytes,
        timeout_secs: config.parse_timeout_secs,
    };
    let workers = config.effective_workers();
    let pool = Arc::new(
        rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| UpdaterError::Config(format!("worker pool: {e}")))?,
    );

    let total_bytes: u64 = parseable.iter().map(|f| f.byte_len).sum();
    let mut progress = ProgressReporter::new(parseable.len(), total_bytes);

    let mut outlines: Vec<FileOutline> = Vec::with_capacity(parseable.len());
    let mut definitions = DefinitionRegistry::new();
    let mut files_done = 0usize;
    let mut retained_bytes: u64 = 0;

    let chunk_size = (workers * 8).max(1);
    for chunk in parseable.chunks(chunk_size) {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        let results: Vec<WorkResult> = if config.parallel {
            let chunk_files: Vec<DiscoveredFile> = chunk.to_vec();
            let registry = Arc::clone(&registry);
            let project = project.clone();
            let pool = Arc::clone(&pool);
            tokio::task::spawn_blocking(move || -> Vec<WorkResult> {
                let analyzers = builtin_analyzers();
                pool.install(|| {
                    chunk_files
                        .par_iter()
                        .map(|file| process_file(file, &registry, &analyzers, &project, &limits))
                        .collect()
                })
            })
            .await
            .map_err(|e| UpdaterError::Config(format!("worker pool join: {e}")))?
        } else {
            let analyzers = builtin_analyzers();
            chunk
                .iter()
                .map(|file| process_file(file, &registry, &analyzers, &project, &limits))
                .collect()
        };

        for (file, result) in chunk.iter().zip(results) {
            files_done += 1;
            progress.file_done(file.byte_len, files_done, parseable.len());
            match result {
                WorkResult::Outline(outline) => {
                    report.files_parsed += 1;
                    if outline.has_errors {
                        report.parse_errors += 1;
                    }
                    report.warnings += outline.warnings.len() as u64;
                    for warning in &outline.warnings {
                        warn!("{warning}");
                    }
                    for def in &outline.defs {
                        if !definitions.insert(def.clone()) {
                            report.warnings += 1;
                        }
                    }
                    for node in outline.nodes.clone() {
                        writer.push_node(node.prop("project", project.clone())).await?;
                    }
                    for edge in outline.edges.clone() {
                        writer.push_rel(edge).await?;
                    }
                    writer
                        .push_rel(RelRow::new(
                            module_container_ref(&project, &outline.relative_path, &discovery.packages),
                            RelType::ContainsModule,
                            outline.module_ref(),
                        ))
                        .await?;
                    retained_bytes += outline.byte_len;
                    outlines.push(*outline);
                }
                WorkResult::Skipped { path, reason } => {
                    report.files_skipped += 1;
                    report.warnings += 1;
                    warn!("skipped {path}: {reason}");
                }
                WorkResult::Failed { path, message } => {
                    report.parse_errors += 1;
                    report.warnings += 1;
                    warn!("failed to parse {path}: {message}");
                }
            }
        }

        // memory policy: when the aggregator holds too much, flush the
        // writer before dispatching the next chunk
        if config.memory_cap_bytes > 0 && retained_bytes * 10 >= config.memory_cap_bytes * 8 {
            writer.flush().await?;
        }
    }
    progress.finish();

    // method owners declared in other files (impl-style blocks)
    for outline in &outlines {
        for (owner_qn, method_qn) in &outline.deferred_method_edges {
            match definitions.get(owner_qn) {
                Some(owner)
                    if matches!(
                        owner.label,
                        NodeLabel::Class | NodeLabel::Struct | NodeLabel::Union | NodeLabel::Enum
                    ) =>
                {
                    writer
                        .push_rel(RelRow::new(
                            NodeRef::new(owner.label, owner_qn.clone()),
                            RelType::DefinesMethod,
                            NodeRef::new(NodeLabel::Method, method_qn.clone()),
                        ))
                        .await?;
                }
                _ => {
                    writer
                        .push_rel(RelRow::new(
                            outline.module_ref(),
                            RelType::Defines,
                            NodeRef::new(NodeLabel::Method, method_qn.clone()),
                        ))
                        .await?;
                }
            }
        }
    }

    report.definitions = definitions.len();
    writer.flush().await?;
    info!(definitions = definitions.len(), "extraction complete");

    // a cancelled run commits what it has and stops before resolution
    if report.cancelled || cancel.is_cancelled() {
        report.cancelled = true;
        finish_report(&mut report, &writer, started);
        return Ok(RunOutput { report, snapshot: writer.snapshot().clone() });
    }

    // (4) dependency manifests feed external-package classification
    let manifest_deps = collect_manifest_deps(config, &discovery.files);

    // (5) pass-2 resolution
    let resolution = Resolver::new(&project, &definitions, &outlines, &manifest_deps).resolve();
    report.calls_resolved = resolution.stats.calls_resolved;
    report.calls_dropped = resolution.stats.calls_dropped;
    report.imports_resolved = resolution.stats.imports_resolved;
    report.import_cycles = resolution.stats.import_cycles;
    report.inheritance_cycles = resolution.stats.inheritance_cycles;
    report.overrides = resolution.stats.overrides;
    report.tests_linked = resolution.stats.tests_linked;

    for node in resolution.nodes {
        writer.push_node(node.prop("project", project.clone())).await?;
    }
    let import_edges: Vec<RelRow> = resolution
        .edges
        .iter()
        .filter(|e| e.rel == RelType::Imports)
        .cloned()
        .collect();
    for edge in resolution.edges {
        writer.push_rel(edge).await?;
    }
    writer.flush().await?;

    if cancel.is_cancelled() {
        report.cancelled = true;
        finish_report(&mut report, &writer, started);
        return Ok(RunOutput { report, snapshot: writer.snapshot().clone() });
    }

    // (6) analyzer outputs
    for outline in &outlines {
        for node in outline.analyzer_nodes.clone() {
            writer.push_node(node.prop("project", project.clone())).await?;
        }
        for edge in outline.analyzer_edges.clone() {
            writer.push_rel(edge).await?;
        }
    }

    for edge in macro_expansion_edges(&outlines, &import_edges, config.macro_expansion_depth) {
        writer.push_rel(edge).await?;
    }

    report.steps_linked +=
        bdd_pass(&discovery.files, &outlines, &definitions, &mut writer, &project).await?;
    config_pass(&discovery.files, &mut writer, &project).await?;

    if config.enable_vcs {
        let known_files: BTreeSet<String> =
            discovery.files.iter().map(|f| f.relative_path.clone()).collect();
        let history = vcs::analyze_history(&config.repo_path, &known_files);
        report.commits = history.commit_count;
        for node in history.nodes {
            writer.push_node(node.prop("project", project.clone())).await?;
        }
        for edge in history.edges {
            writer.push_rel(edge).await?;
        }
    }

    writer.flush().await?;
    finish_report(&mut report, &writer, started);
    info!(
        nodes = report.nodes_written,
        rels = report.rels_written,
        elapsed_ms = report.elapsed_ms,
        "ingestion complete"
    );

    Ok(RunOutput { report, snapshot: writer.snapshot().clone() })
}

/// Containment parent of a module: the package or folder of its file, or
/// the project root for top-level files.
fn module_container_ref(project: &str, relative_path: &str, packages: &BTreeSet<String>) -> NodeRef {
    let dir = relative_path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
    if dir.is_empty() {
        NodeRef::new(NodeLabel::Project, project.to_string())
    } else if packages.contains(dir) {
        let mut qn = String::from(project);
        for part in dir.split('/') {
            qn.push('.');
            qn.push_str(part);
        }
        NodeRef::new(NodeLabel::Package, qn)
    } else {
        NodeRef::new(NodeLabel::Folder, dir.to_string())
    }
}

fn finish_report(report: &mut RunReport, writer: &GraphWriter, started: Instant) {
    report.nodes_written = writer.stats.nodes_written;
    report.rels_written = writer.stats.rels_written;
    report.elapsed_ms = started.elapsed().as_millis() as u64;
}

/// Pass-1 worker: parse, outline, analyze. Pure per file.
fn process_file(
    file: &DiscoveredFile,
    registry: &LanguageRegistry,
    analyzers: &[Box<dyn FileAnalyzer>],
    project: &str,
    limits: &ParseLimits,
) -> WorkResult {
    let Some(lang) = file.lang else {
        return WorkResult::Skipped {
            path: file.relative_path.clone(),
            reason: "no language tag".into(),
        };
    };
    let Some(profile) = registry.profile_for(lang) else {
        return WorkResult::Skipped {
            path: file.relative_path.clone(),
            reason: format!("no grammar for {lang}"),
        };
    };

    let parsed = match parse_file(&profile, &file.absolute_path, limits) {
        Ok(ParseOutcome::Parsed(parsed)) => parsed,
        Ok(ParseOutcome::SkippedTooLarge(bytes)) => {
            return WorkResult::Skipped {
                path: file.relative_path.clone(),
                reason: format!("file too large ({bytes} bytes)"),
            }
        }
        Ok(ParseOutcome::SkippedUnparsable) => {
            return WorkResult::Skipped {
                path: file.relative_path.clone(),
                reason: "grammar gave up".into(),
            }
        }
        Err(e) => {
            return WorkResult::Failed {
                path: file.relative_path.clone(),
                message: e.to_string(),
            }
        }
    };

    let is_test = test_analysis::is_test_path(&file.relative_path, lang);
    let definer = Definer::new(&profile);
    let mut outline = definer.outline(&parsed, project, &file.relative_path, is_test);

    if matches!(lang, Lang::Python | Lang::JavaScript | Lang::TypeScript | Lang::Java) {
        let content = String::from_utf8_lossy(parsed.bytes());
        if content.contains("@given")
            || content.contains("@when")
            || content.contains("@then")
            || content.contains("Given(")
            || content.contains("When(")
            || content.contains("Then(")
            || content.contains("@Given")
        {
            bdd::collect_step_defs(&content, &mut outline);
        }
    }

    for analyzer in analyzers {
        if analyzer.wants(&outline) {
            analyzer.visit_file(&parsed, &mut outline);
        }
    }

    WorkResult::Outline(Box::new(outline))
}

/// Dependency tables from every manifest in the scanned set.
fn collect_manifest_deps(
    config: &IngestConfig,
    files: &[DiscoveredFile],
) -> BTreeMap<String, String> {
    let mut deps = BTreeMap::new();
    for file in files {
        let basename = file.relative_path.rsplit('/').next().unwrap_or(&file.relative_path);
        if !config_files::MANIFEST_BASENAMES.contains(&basename) {
            continue;
        }
        match std::fs::read_to_string(&file.absolute_path) {
            Ok(content) => deps.extend(config_files::parse_manifest(&file.relative_path, &content)),
            Err(e) => warn!("unreadable manifest {}: {e}", file.relative_path),
        }
    }
    deps
}

/// Cross-reference identifier uses against the macro tables of each
/// file's include closure, depth-limited.
fn macro_expansion_edges(
    outlines: &[FileOutline],
    import_edges: &[RelRow],
    depth: u32,
) -> Vec<RelRow> {
    let c_modules: BTreeSet<&str> = outlines
        .iter()
        .filter(|o| matches!(o.language, Some(Lang::C | Lang::Cpp)))
        .map(|o| o.module_qn.as_str())
        .collect();
    if c_modules.is_empty() {
        return Vec::new();
    }

    let mut includes: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in import_edges {
        if c_modules.contains(edge.src.key.as_str()) {
            includes.entry(edge.src.key.as_str()).or_default().push(edge.dst.key.as_str());
        }
    }
    let macros_by_module: BTreeMap<&str, &FileOutline> =
        outlines.iter().map(|o| (o.module_qn.as_str(), o)).collect();

    let mut out = Vec::new();
    for outline in outlines {
        if !matches!(outline.language, Some(Lang::C | Lang::Cpp)) || outline.ident_uses.is_empty() {
            continue;
        }

        // include closure, breadth-first, depth-limited
        let mut closure: Vec<&str> = vec![outline.module_qn.as_str()];
        let mut seen: BTreeSet<&str> = closure.iter().copied().collect();
        let mut frontier: Vec<&str> = closure.clone();
        for _ in 0..depth {
            let mut next = Vec::new();
            for module in frontier.clone() {
                for dep in includes.get(module).into_iter().flatten() {
                    if seen.insert(*dep) {
                        next.push(*dep);
                        closure.push(*dep);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        let mut macro_table: BTreeMap<&str, &str> = BTreeMap::new();
        for module in &closure {
            if let Some(other) = macros_by_module.get(module) {
                for macro_def in &other.macros {
                    macro_table
                        .entry(macro_def.name.as_str())
                        .or_insert(macro_def.qualified_name.as_str());
                }
            }
        }
        if macro_table.is_empty() {
            continue;
        }

        for (function_qn, idents) in &outline.ident_uses {
            for ident in idents {
                if let Some(macro_qn) = macro_table.get(ident.as_str()) {
                    out.push(RelRow::new(
                        NodeRef::new(NodeLabel::Function, function_qn.clone()),
                        RelType::ExpandsTo,
                        NodeRef::new(NodeLabel::Macro, macro_qn.to_string()),
                    ));
                }
            }
        }
    }
    out
}

/// Parse `.feature` files, emit their subgraphs and link steps to the
/// implementations collected during pass-1.
async fn bdd_pass(
    files: &[DiscoveredFile],
    outlines: &[FileOutline],
    definitions: &DefinitionRegistry,
    writer: &mut GraphWriter,
    project: &str,
) -> Result<u64, UpdaterError> {
    let mut all_steps = Vec::new();
    for file in files.iter().filter(|f| f.lang == Some(Lang::Gherkin)) {
        let content = match std::fs::read_to_string(&file.absolute_path) {
            Ok(content) => content,
            Err(e) => {
                warn!("unreadable feature file {}: {e}", file.relative_path);
                continue;
            }
        };
        let Some(result) = bdd::analyze_feature_file(&file.relative_path, &content) else {
            continue;
        };
        for node in result.outline.analyzer_nodes {
            writer.push_node(node.prop("project", project.to_string())).await?;
        }
        for edge in result.outline.analyzer_edges {
            writer.push_rel(edge).await?;
        }
        all_steps.extend(result.steps);
    }
    if all_steps.is_empty() {
        return Ok(0);
    }

    // step implementations with a resolvable target only
    let mut step_defs: Vec<(StepDef, NodeLabel)> = Vec::new();
    let module_qns: BTreeSet<&str> = outlines.iter().map(|o| o.module_qn.as_str()).collect();
    for outline in outlines {
        for def in &outline.step_defs {
            if let Some(target) = definitions.get(&def.function_qn) {
                step_defs.push((def.clone(), target.label));
            } else if module_qns.contains(def.function_qn.as_str()) {
                step_defs.push((def.clone(), NodeLabel::Module));
            }
        }
    }

    let mut edges = Vec::new();
    let linked = bdd::link_steps(&all_steps, &step_defs, &mut edges);
    for edge in edges {
        writer.push_rel(edge).await?;
    }
    Ok(linked)
}

/// ConfigSetting nodes for recognized configuration files.
async fn config_pass(
    files: &[DiscoveredFile],
    writer: &mut GraphWriter,
    project: &str,
) -> Result<(), UpdaterError> {
    for file in files.iter().filter(|f| f.lang == Some(Lang::Config)) {
        if file.byte_len > 2 * 1024 * 1024 {
            continue;
        }
        let content = match std::fs::read_to_string(&file.absolute_path) {
            Ok(content) => content,
            Err(e) => {
                warn!("unreadable config file {}: {e}", file.relative_path);
                continue;
            }
        };
        let emission = config_files::analyze_config_file(&file.relative_path, &content);
        for node in emission.nodes {
            writer.push_node(node.prop("project", project.to_string())).await?;
        }
        for edge in emission.edges {
            writer.push_rel(edge).await?;
        }
    }
    Ok(())
}
