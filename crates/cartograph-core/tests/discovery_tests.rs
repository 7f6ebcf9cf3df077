use std::fs;
use std::path::Path;

use cartograph_core::config::IngestConfig;
use cartograph_core::discovery::discover;
use cartograph_core::graph::{NodeLabel, RelType};
use cartograph_core::lang::{Lang, LanguageRegistry};

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn files_come_back_in_lexicographic_order() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "zeta.py", "x = 1\n");
    write(dir.path(), "alpha.py", "x = 1\n");
    write(dir.path(), "mid/beta.py", "x = 1\n");

    let config = IngestConfig::for_repo(dir.path());
    let registry = LanguageRegistry::new();
    let result = discover(&config, &registry).unwrap();

    let paths: Vec<&str> = result.files.iter().map(|f| f.relative_path.as_str()).collect();
    assert_eq!(paths, vec!["alpha.py", "mid/beta.py", "zeta.py"]);
}

#[test]
fn hidden_and_vendored_directories_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/main.py", "x = 1\n");
    write(dir.path(), "node_modules/lib/index.js", "x = 1\n");
    write(dir.path(), "__pycache__/main.pyc", "");
    write(dir.path(), ".venv/lib/thing.py", "x = 1\n");

    let config = IngestConfig::for_repo(dir.path());
    let registry = LanguageRegistry::new();
    let result = discover(&config, &registry).unwrap();

    let paths: Vec<&str> = result.files.iter().map(|f| f.relative_path.as_str()).collect();
    assert_eq!(paths, vec!["src/main.py"]);
}

#[test]
fn folder_filter_and_glob_filter_compose() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/a.py", "x = 1\n");
    write(dir.path(), "src/a.c", "int x;\n");
    write(dir.path(), "docs/b.py", "x = 1\n");

    let mut config = IngestConfig::for_repo(dir.path());
    config.folder_filter = "src".into();
    config.file_pattern = "*.py".into();
    let registry = LanguageRegistry::new();
    let result = discover(&config, &registry).unwrap();

    let paths: Vec<&str> = result.files.iter().map(|f| f.relative_path.as_str()).collect();
    assert_eq!(paths, vec!["src/a.py"]);
}

#[test]
fn language_tags_follow_extension_and_basename() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.py", "");
    write(dir.path(), "b.rs", "");
    write(dir.path(), "c.feature", "Feature: x\n");
    write(dir.path(), "Makefile", "all:\n");
    write(dir.path(), "notes.txt", "");

    let config = IngestConfig::for_repo(dir.path());
    let registry = LanguageRegistry::new();
    let result = discover(&config, &registry).unwrap();

    let tag = |path: &str| {
        result
            .files
            .iter()
            .find(|f| f.relative_path == path)
            .and_then(|f| f.lang)
    };
    assert_eq!(tag("a.py"), Some(Lang::Python));
    assert_eq!(tag("b.rs"), Some(Lang::Rust));
    assert_eq!(tag("c.feature"), Some(Lang::Gherkin));
    assert_eq!(tag("Makefile"), Some(Lang::Config));
    assert_eq!(tag("notes.txt"), None);
}

#[test]
fn packages_and_folders_form_a_containment_chain() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "pkg/__init__.py", "");
    write(dir.path(), "pkg/sub/__init__.py", "");
    write(dir.path(), "misc/readme.py", "");

    let config = IngestConfig::for_repo(dir.path());
    let project = config.project_name();
    let registry = LanguageRegistry::new();
    let result = discover(&config, &registry).unwrap();

    assert!(result.packages.contains("pkg"));
    assert!(result.packages.contains("pkg/sub"));
    assert!(!result.packages.contains("misc"));

    let has_node = |label: NodeLabel, key: &str| {
        result.nodes.iter().any(|n| n.label == label && n.key == key)
    };
    assert!(has_node(NodeLabel::Project, &project));
    assert!(has_node(NodeLabel::Package, &format!("{project}.pkg")));
    assert!(has_node(NodeLabel::Package, &format!("{project}.pkg.sub")));
    assert!(has_node(NodeLabel::Folder, "misc"));

    // Project -> pkg -> pkg.sub
    let has_edge = |rel: RelType, src: &str, dst: &str| {
        result
            .edges
            .iter()
            .any(|e| e.rel == rel && e.src.key == src && e.dst.key == dst)
    };
    assert!(has_edge(RelType::ContainsPackage, &project, &format!("{project}.pkg")));
    assert!(has_edge(
        RelType::ContainsPackage,
        &format!("{project}.pkg"),
        &format!("{project}.pkg.sub")
    ));
    assert!(has_edge(RelType::ContainsFolder, &project, "misc"));
    assert!(has_edge(RelType::ContainsFile, &format!("{project}.pkg"), "pkg/__init__.py"));
}
