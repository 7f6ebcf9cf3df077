//! Rust grammar profile and syntax helpers.

use tree_sitter::Node;

use super::{text, Lang, LanguageProfile, RawImport};

pub fn profile() -> LanguageProfile {
    LanguageProfile {
        lang: Lang::Rust,
        grammar: tree_sitter_rust::LANGUAGE.into(),
        extensions: &["rs"],
        function_kinds: &["function_item"],
        class_kinds: &["struct_item", "enum_item", "union_item", "trait_item"],
        // impl blocks own methods but the type node is emitted elsewhere
        owner_kinds: &["impl_item"],
        namespace_kinds: &["mod_item"],
        module_kinds: &["source_file"],
        call_kinds: &["call_expression"],
        import_kinds: &["use_declaration"],
        package_indicators: &["Cargo.toml"],
    }
}

/// Item names; impl blocks answer with their target type.
pub fn node_name(node: &Node, src: &[u8]) -> Option<String> {
    if node.kind() == "impl_item" {
        let ty = node.child_by_field_name("type")?;
        let raw = text(&ty, src);
        // `impl<T> Foo<T>` names Foo
        return Some(raw.split('<').next().unwrap_or(&raw).trim().to_string());
    }
    node.child_by_field_name("name").map(|n| text(&n, src))
}

pub fn collect_imports(node: &Node, src: &[u8], out: &mut Vec<RawImport>) {
    let Some(argument) = node.child_by_field_name("argument") else {
        return;
    };
    let line = super::line_of(node);
    collect_use_tree(&argument, src, "", line, out);
}

/// Flatten a use tree into one raw import per leaf path.
fn collect_use_tree(node: &Node, src: &[u8], prefix: &str, line: u32, out: &mut Vec<RawImport>) {
    match node.kind() {
        "identifier" | "scoped_identifier" | "crate" | "self" | "super" => {
            out.push(RawImport::new(join_path(prefix, &text(node, src)), line));
        }
        "use_as_clause" => {
            if let Some(path) = node.child_by_field_name("path") {
                let mut imp = RawImport::new(join_path(prefix, &text(&path, src)), line);
                imp.alias = node.child_by_field_name("alias").map(|n| text(&n, src));
                out.push(imp);
            }
        }
        "use_wildcard" => {
            let mut cursor = node.walk();
            let base = node
                .named_children(&mut cursor)
                .next()
                .map(|n| text(&n, src))
                .unwrap_or_default();
            let mut imp = RawImport::new(join_path(prefix, &base), line);
            imp.is_wildcard = true;
            out.push(imp);
        }
        "scoped_use_list" => {
            let base = node
                .child_by_field_name("path")
                .map(|p| join_path(prefix, &text(&p, src)))
                .unwrap_or_else(|| prefix.to_string());
            if let Some(list) = node.child_by_field_name("list") {
                let mut cursor = list.walk();
                for child in list.named_children(&mut cursor) {
                    collect_use_tree(&child, src, &base, line, out);
                }
            }
        }
        "use_list" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_use_tree(&child, src, prefix, line, out);
            }
        }
        _ => {}
    }
}

fn join_path(prefix: &str, tail: &str) -> String {
    if prefix.is_empty() {
        tail.to_string()
    } else {
        format!("{prefix}::{tail}")
    }
}
