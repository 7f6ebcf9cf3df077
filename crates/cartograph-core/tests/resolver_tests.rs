//! Resolution behavior across languages: impl-style method owners,
//! qualified calls, precedence and tie-breaks.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use cartograph_core::graph::{NodeLabel, RelType};
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
async fn rust_impl_methods_attach_to_their_struct() {
    let source = "\
pub struct Counter {
    value: u64,
}

impl Counter {
    pub fn increment(&mut self) {
        self.value += 1;
    }
}
";
    let (updater, p, _dir) = ingest(&[("counter.rs", source)]).await;
    let graph = snapshot(&updater);

    let struct_qn = format!("{p}.counter.Counter");
    let method_qn = format!("{struct_qn}.increment");
    assert!(graph.has_node(NodeLabel::Struct, &struct_qn));
    assert!(graph.has_node(NodeLabel::Method, &method_qn));
    assert!(graph.has_rel(
        (NodeLabel::Struct, &struct_qn),
        RelType::DefinesMethod,
        (NodeLabel::Method, &method_qn),
    ));
}

#[tokio::test]
async fn rust_traits_are_abstract_classes() {
    let source = "\
pub trait Runner {
    fn run(&self);
}
";
    let (updater, p, _dir) = ingest(&[("traits.rs", source)]).await;
    let graph = snapshot(&updater);

    let trait_qn = format!("{p}.traits.Runner");
    assert!(graph.has_node(NodeLabel::Class, &trait_qn));
    let props = &graph.nodes[&(NodeLabel::Class, trait_qn)];
    assert_eq!(
        props.get("is_abstract"),
        Some(&cartograph_core::graph::PropValue::Bool(true))
    );
}

#[tokio::test]
async fn qualified_calls_walk_the_import_table() {
    let (updater, p, _dir) = ingest(&[
        ("pkg/__init__.py", ""),
        ("pkg/util.py", "def helper():\n    pass\n"),
        ("pkg/app.py", "import pkg.util\n\ndef main():\n    pkg.util.helper()\n"),
    ])
    .await;
    let graph = snapshot(&updater);

    assert!(graph.has_rel(
        (NodeLabel::Function, &format!("{p}.pkg.app.main")),
        RelType::Calls,
        (NodeLabel::Function, &format!("{p}.pkg.util.helper")),
    ));
}

#[tokio::test]
async fn same_package_resolution_prefers_lexicographic_on_ties() {
    let (updater, p, _dir) = ingest(&[
        ("pkg/__init__.py", ""),
        ("pkg/alpha.py", "def shared():\n    pass\n"),
        ("pkg/beta.py", "def shared():\n    pass\n"),
        ("pkg/caller.py", "def go():\n    shared()\n"),
    ])
    .await;
    let graph = snapshot(&updater);

    // both candidates rank equal; the lexicographically smallest QN wins
    assert!(graph.has_rel(
        (NodeLabel::Function, &format!("{p}.pkg.caller.go")),
        RelType::Calls,
        (NodeLabel::Function, &format!("{p}.pkg.alpha.shared")),
    ));
    assert!(!graph.has_rel(
        (NodeLabel::Function, &format!("{p}.pkg.caller.go")),
        RelType::Calls,
        (NodeLabel::Function, &format!("{p}.pkg.beta.shared")),
    ));
}

#[tokio::test]
async fn local_definitions_shadow_sibling_modules() {
    let (updater, p, _dir) = ingest(&[
        ("pkg/__init__.py", ""),
        ("pkg/other.py", "def work():\n    pass\n"),
        ("pkg/own.py", "def work():\n    pass\n\ndef go():\n    work()\n"),
    ])
    .await;
    let graph = snapshot(&updater);

    assert!(graph.has_rel(
        (NodeLabel::Function, &format!("{p}.pkg.own.go")),
        RelType::Calls,
        (NodeLabel::Function, &format!("{p}.pkg.own.work")),
    ));
    assert!(!graph.has_rel(
        (NodeLabel::Function, &format!("{p}.pkg.own.go")),
        RelType::Calls,
        (NodeLabel::Function, &format!("{p}.pkg.other.work")),
    ));
}

#[tokio::test]
async fn js_class_extends_resolves_through_imports() {
    let (updater, p, _dir) = ingest(&[
        ("base.ts", "export class Base {\n  run() {}\n}\n"),
        (
            "child.ts",
            "import { Base } from './base';\n\nexport class Child extends Base {\n  run() {}\n}\n",
        ),
    ])
    .await;
    let graph = snapshot(&updater);

    assert!(graph.has_rel(
        (NodeLabel::Class, &format!("{p}.child.Child")),
        RelType::InheritsFrom,
        (NodeLabel::Class, &format!("{p}.base.Base")),
    ));
    assert!(graph.has_rel(
        (NodeLabel::Method, &format!("{p}.child.Child.run")),
        RelType::Overrides,
        (NodeLabel::Method, &format!("{p}.base.Base.run")),
    ));
}

#[tokio::test]
async fn config_settings_hang_off_their_file() {
    let (updater, _p, _dir) = ingest(&[(
        "conf/app.toml",
        "[server]\nhost = \"0.0.0.0\"\nport = 8080\n",
    )])
    .await;
    let graph = snapshot(&updater);

    let setting_qn = "conf/app.toml.server.host";
    assert!(graph.has_node(NodeLabel::ConfigSetting, setting_qn));
    assert!(graph.has_rel(
        (NodeLabel::File, "conf/app.toml"),
        RelType::Defines,
        (NodeLabel::ConfigSetting, setting_qn),
    ));
}

#[tokio::test]
async fn exports_are_recorded_for_javascript_modules() {
    let (updater, p, _dir) = ingest(&[("lib.ts", "export function api() {}\n")]).await;
    let graph = snapshot(&updater);

    assert!(graph.has_rel(
        (NodeLabel::Module, &format!("{p}.lib")),
        RelType::Exports,
        (NodeLabel::Function, &format!("{p}.lib.api")),
    ));
}
