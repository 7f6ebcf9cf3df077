//! Go grammar profile and syntax helpers.

use tree_sitter::Node;

use super::{text, Lang, LanguageProfile, RawImport};
use crate::graph::ClassKind;

pub fn profile() -> LanguageProfile {
    LanguageProfile {
        lang: Lang::Go,
        grammar: tree_sitter_go::LANGUAGE.into(),
        extensions: &["go"],
        function_kinds: &["function_declaration", "method_declaration"],
        class_kinds: &["type_spec"],
        owner_kinds: &[],
        namespace_kinds: &[],
        module_kinds: &["source_file"],
        call_kinds: &["call_expression"],
        import_kinds: &["import_declaration"],
        package_indicators: &["go.mod"],
    }
}

/// Struct for `type T struct{...}`, Class otherwise; only named specs with
/// struct or interface bodies are worth a node.
pub fn spec_class_kind(node: &Node) -> ClassKind {
    match node.child_by_field_name("type").map(|t| t.kind()) {
        Some("struct_type") => ClassKind::Struct,
        _ => ClassKind::Class,
    }
}

pub fn spec_is_interface(node: &Node) -> bool {
    node.child_by_field_name("type")
        .map(|t| t.kind() == "interface_type")
        .unwrap_or(false)
}

pub fn node_name(node: &Node, src: &[u8]) -> Option<String> {
    // type_spec and both function forms carry a name field
    node.child_by_field_name("name").map(|n| text(&n, src))
}

pub fn collect_imports(node: &Node, src: &[u8], out: &mut Vec<RawImport>) {
    let line = super::line_of(node);
    let mut push_spec = |spec: &Node| {
        let Some(path) = spec.child_by_field_name("path") else {
            return;
        };
        let target = text(&path, src).trim_matches('"').to_string();
        let mut imp = RawImport::new(target, line);
        imp.alias = spec.child_by_field_name("name").map(|n| text(&n, src));
        imp.system = true; // refined during resolution against project packages
        out.push(imp);
    };

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "import_spec" => push_spec(&child),
            "import_spec_list" => {
                let mut list_cursor = child.walk();
                for spec in child.named_children(&mut list_cursor) {
                    if spec.kind() == "import_spec" {
                        push_spec(&spec);
                    }
                }
            }
            _ => {}
        }
    }
}
