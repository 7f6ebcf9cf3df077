//! C pointer and kernel analysis over fixture translation units.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use cartograph_core::graph::{NodeLabel, PropValue, RelType};
use cartograph_core::store::{GraphSnapshot, MemoryGraph};
use cartograph_core::{GraphUpdater, IngestConfig};

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

async fn ingest(files: &[(&str, &str)]) -> (GraphUpdater, String, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    for (relative, content) in files {
        write(dir.path(), relative, content);
    }
    let mut config = IngestConfig::for_repo(dir.path());
    config.enable_vcs = false;
    let project = config.project_name();
    let mut updater = GraphUpdater::new(Arc::new(MemoryGraph::new()), config);
    updater.ingest().await.expect("ingestion should succeed");
    (updater, project, dir)
}

fn snapshot(updater: &GraphUpdater) -> &GraphSnapshot {
    updater.snapshot().unwrap()
}

#[tokio::test]
async fn function_pointer_assignment_and_invocation() {
    let source = "\
int add(int a, int b) { return a + b; }

int (*op)(int, int) = add;

int run(void) {
    return op(1, 2);
}
";
    let (updater, p, _dir) = ingest(&[("m.c", source)]).await;
    let graph = snapshot(&updater);

    assert!(graph.has_node(NodeLabel::FunctionPointer, &format!("{p}.m.op")));
    assert!(graph.has_rel(
        (NodeLabel::FunctionPointer, &format!("{p}.m.op")),
        RelType::AssignsFp,
        (NodeLabel::Function, &format!("{p}.m.add")),
    ));
    assert!(graph.has_rel(
        (NodeLabel::Function, &format!("{p}.m.run")),
        RelType::InvokesFp,
        (NodeLabel::FunctionPointer, &format!("{p}.m.op")),
    ));
}

#[tokio::test]
async fn pointer_targets_and_indirection_levels() {
    let source = "\
int value = 42;
int *p = &value;
int *q = p;
int **pp = &p;
";
    let (updater, p, _dir) = ingest(&[("ptr.c", source)]).await;
    let graph = snapshot(&updater);

    assert!(graph.has_node(NodeLabel::GlobalVariable, &format!("{p}.ptr.value")));
    assert!(graph.has_node(NodeLabel::Pointer, &format!("{p}.ptr.p")));
    assert!(graph.has_rel(
        (NodeLabel::Pointer, &format!("{p}.ptr.p")),
        RelType::PointsTo,
        (NodeLabel::GlobalVariable, &format!("{p}.ptr.value")),
    ));
    // alias q = p picks up p's target
    assert!(graph.has_rel(
        (NodeLabel::Pointer, &format!("{p}.ptr.q")),
        RelType::PointsTo,
        (NodeLabel::GlobalVariable, &format!("{p}.ptr.value")),
    ));

    let pp = &graph.nodes[&(NodeLabel::Pointer, format!("{p}.ptr.pp"))];
    assert_eq!(pp.get("indirection_level"), Some(&PropValue::Int(2)));
}

#[tokio::test]
async fn syscalls_and_exports_are_recognized() {
    let source = "\
#include \"deps.h\"

SYSCALL_DEFINE2(openat, int, dirfd, const char *, path)
{
    return 0;
}

int shared_helper(void) { return 1; }
EXPORT_SYMBOL_GPL(shared_helper);
";
    let (updater, p, _dir) = ingest(&[("sys.c", source), ("deps.h", "#define NOOP 0\n")]).await;
    let graph = snapshot(&updater);

    assert!(graph.has_node(NodeLabel::Syscall, &format!("{p}.sys.sys_openat")));
    assert!(graph.has_rel(
        (NodeLabel::Module, &format!("{p}.sys")),
        RelType::Defines,
        (NodeLabel::Syscall, &format!("{p}.sys.sys_openat")),
    ));
    assert!(graph.has_node(NodeLabel::KernelExport, &format!("{p}.sys.shared_helper")));
    assert!(graph.has_rel(
        (NodeLabel::Module, &format!("{p}.sys")),
        RelType::Exports,
        (NodeLabel::KernelExport, &format!("{p}.sys.shared_helper")),
    ));
}

#[tokio::test]
async fn lock_discipline_edges_from_enclosing_function() {
    let source = "\
void critical(void) {
    spin_lock(&state_lock);
    do_work();
    spin_unlock(&state_lock);
}

void do_work(void) {}
";
    let (updater, p, _dir) = ingest(&[("lock.c", source)]).await;
    let graph = snapshot(&updater);

    assert!(graph.has_rel(
        (NodeLabel::Function, &format!("{p}.lock.critical")),
        RelType::Locks,
        (NodeLabel::GlobalVariable, &format!("{p}.lock.state_lock")),
    ));
    assert!(graph.has_rel(
        (NodeLabel::Function, &format!("{p}.lock.critical")),
        RelType::Unlocks,
        (NodeLabel::GlobalVariable, &format!("{p}.lock.state_lock")),
    ));

    let lock = &graph.nodes[&(NodeLabel::GlobalVariable, format!("{p}.lock.state_lock"))];
    assert_eq!(lock.get("type"), Some(&PropValue::Str("spinlock".into())));
}

#[tokio::test]
async fn macro_expansion_follows_the_include_closure() {
    let header = "#define LIMIT 10\n";
    let source = "\
#include \"limits.h\"
#define LOCAL_STEP 2

int clamp(int v) {
    if (v > LIMIT) return LIMIT;
    return v + LOCAL_STEP;
}
";
    let (updater, p, _dir) = ingest(&[("limits.h", header), ("main.c", source)]).await;
    let graph = snapshot(&updater);

    assert!(graph.has_node(NodeLabel::Macro, &format!("{p}.limits.LIMIT")));
    assert!(graph.has_node(NodeLabel::Macro, &format!("{p}.main.LOCAL_STEP")));

    // use of a macro from the included header
    assert!(graph.has_rel(
        (NodeLabel::Function, &format!("{p}.main.clamp")),
        RelType::ExpandsTo,
        (NodeLabel::Macro, &format!("{p}.limits.LIMIT")),
    ));
    // and of the translation unit's own macro
    assert!(graph.has_rel(
        (NodeLabel::Function, &format!("{p}.main.clamp")),
        RelType::ExpandsTo,
        (NodeLabel::Macro, &format!("{p}.main.LOCAL_STEP")),
    ));
}

#[tokio::test]
async fn module_init_functions_are_flagged() {
    let source = "\
static int demo_init(void) { return 0; }
static void demo_exit(void) {}

module_init(demo_init);
module_exit(demo_exit);
";
    let (updater, p, _dir) = ingest(&[("demo.c", source)]).await;
    let graph = snapshot(&updater);

    let init = &graph.nodes[&(NodeLabel::Function, format!("{p}.demo.demo_init"))];
    assert_eq!(init.get("is_module_init"), Some(&PropValue::Bool(true)));
    let exit = &graph.nodes[&(NodeLabel::Function, format!("{p}.demo.demo_exit"))];
    assert_eq!(exit.get("is_module_exit"), Some(&PropValue::Bool(true)));
}
