//! Scala grammar profile and syntax helpers.

use tree_sitter::Node;

use super::{text, BaseKind, Lang, LanguageProfile, RawBase, RawImport};

pub fn profile() -> LanguageProfile {
    LanguageProfile {
        lang: Lang::Scala,
        grammar: tree_sitter_scala::LANGUAGE.into(),
        extensions: &["scala", "sc"],
        function_kinds: &["function_definition"],
        class_kinds: &["class_definition", "object_definition", "trait_definition"],
        owner_kinds: &["template_body"],
        namespace_kinds: &[],
        module_kinds: &["compilation_unit"],
        call_kinds: &["call_expression"],
        import_kinds: &["import_declaration"],
        package_indicators: &["build.sbt"],
    }
}

pub fn collect_imports(node: &Node, src: &[u8], out: &mut Vec<RawImport>) {
    let line = super::line_of(node);
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "stable_identifier" | "identifier" => {
                out.push(RawImport::new(text(&child, src), line));
            }
            "namespace_selectors" | "import_selectors" => {
                // selectors attach to the preceding stable path
                if let Some(last) = out.last_mut() {
                    let mut sel_cursor = child.walk();
                    for sel in child.named_children(&mut sel_cursor) {
                        match sel.kind() {
                            "identifier" => last.items.push(text(&sel, src)),
                            "namespace_wildcard" | "wildcard" => last.is_wildcard = true,
                            _ => {}
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

pub fn bases_of(node: &Node, src: &[u8]) -> Vec<RawBase> {
    let Some(extends) = node
        .child_by_field_name("extend")
        .or_else(|| find_child(node, "extends_clause"))
    else {
        return Vec::new();
    };
    let mut bases = Vec::new();
    let mut cursor = extends.walk();
    for child in extends.named_children(&mut cursor) {
        if matches!(child.kind(), "type_identifier" | "stable_type_identifier" | "generic_type") {
            let raw = text(&child, src);
            let name = raw.split('[').next().unwrap_or(&raw).trim().to_string();
            if !name.is_empty() {
                bases.push(RawBase { name, kind: BaseKind::Extends });
            }
        }
    }
    bases
}

fn find_child<'tree>(node: &Node<'tree>, kind: &str) -> Option<Node<'tree>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}
