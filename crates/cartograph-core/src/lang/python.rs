//! Python grammar profile and syntax helpers.

use tree_sitter::Node;

use super::{text, BaseKind, Lang, LanguageProfile, RawBase, RawImport};

pub fn profile() -> LanguageProfile {
    LanguageProfile {
        lang: Lang::Python,
        grammar: tree_sitter_python::LANGUAGE.into(),
        extensions: &["py", "pyi"],
        function_kinds: &["function_definition"],
        class_kinds: &["class_definition"],
        owner_kinds: &[],
        namespace_kinds: &[],
        module_kinds: &["module"],
        call_kinds: &["call"],
        import_kinds: &["import_statement", "import_from_statement"],
        package_indicators: &["__init__.py", "pyproject.toml", "setup.py"],
    }
}

/// ABC-style abstractness: any base named `ABC` or metaclass `ABCMeta`.
pub fn has_abstract_base(node: &Node, src: &[u8]) -> bool {
    node.child_by_field_name("superclasses")
        .map(|sc| {
            let t = text(&sc, src);
            t.contains("ABC") || t.contains("ABCMeta") || t.contains("Protocol")
        })
        .unwrap_or(false)
}

pub fn collect_imports(node: &Node, src: &[u8], out: &mut Vec<RawImport>) {
    let line = super::line_of(node);
    match node.kind() {
        // `import a.b` / `import a.b as c`
        "import_statement" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "dotted_name" => out.push(RawImport::new(text(&child, src), line)),
                    "aliased_import" => {
                        let target = child
                            .child_by_field_name("name")
                            .map(|n| text(&n, src))
                            .unwrap_or_default();
                        let alias = child.child_by_field_name("alias").map(|n| text(&n, src));
                        if !target.is_empty() {
                            let mut imp = RawImport::new(target, line);
                            imp.alias = alias;
                            out.push(imp);
                        }
                    }
                    _ => {}
                }
            }
        }
        // `from .x import y as z` / `from a import *`
        "import_from_statement" => {
            let Some(module) = node.child_by_field_name("module_name") else {
                return;
            };
            let mut imp = RawImport::new(text(&module, src), line);
            let mut cursor = node.walk();
            let mut past_module = false;
            for child in node.named_children(&mut cursor) {
                if child.id() == module.id() {
                    past_module = true;
                    continue;
                }
                if !past_module {
                    continue;
                }
                match child.kind() {
                    "dotted_name" => imp.items.push(text(&child, src)),
                    "aliased_import" => {
                        if let Some(name) = child.child_by_field_name("name") {
                            imp.items.push(text(&name, src));
                        }
                        if let Some(alias) = child.child_by_field_name("alias") {
                            imp.alias = Some(text(&alias, src));
                        }
                    }
                    "wildcard_import" => imp.is_wildcard = true,
                    _ => {}
                }
            }
            out.push(imp);
        }
        _ => {}
    }
}

pub fn bases_of(node: &Node, src: &[u8]) -> Vec<RawBase> {
    let Some(superclasses) = node.child_by_field_name("superclasses") else {
        return Vec::new();
    };
    let mut bases = Vec::new();
    let mut cursor = superclasses.walk();
    for child in superclasses.named_children(&mut cursor) {
        if matches!(child.kind(), "identifier" | "attribute") {
            let name = text(&child, src);
            // Metaclass machinery is not inheritance.
            if name != "object" && !name.starts_with("metaclass") {
                bases.push(RawBase { name, kind: BaseKind::Extends });
            }
        }
    }
    bases
}

/// `__all__ = ["a", "b"]` at module scope.
pub fn exports_of(node: &Node, src: &[u8]) -> Vec<String> {
    if node.kind() != "expression_statement" {
        return Vec::new();
    }
    let mut cursor = node.walk();
    let Some(assign) = node.named_children(&mut cursor).find(|c| c.kind() == "assignment") else {
        return Vec::new();
    };
    let is_all = assign
        .child_by_field_name("left")
        .map(|l| text(&l, src) == "__all__")
        .unwrap_or(false);
    if !is_all {
        return Vec::new();
    }
    let Some(right) = assign.child_by_field_name("right") else {
        return Vec::new();
    };
    let mut names = Vec::new();
    let mut cursor = right.walk();
    for child in right.named_children(&mut cursor) {
        if child.kind() == "string" {
            let raw = text(&child, src);
            names.push(raw.trim_matches(['"', '\'']).to_string());
        }
    }
    names
}
