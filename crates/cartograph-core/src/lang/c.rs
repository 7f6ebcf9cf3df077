//! C and C++ grammar profiles and syntax helpers.
//!
//! C function names hide under declarator chains; the pointer and kernel
//! analyzers lean on the same descent helpers exported here.

use tree_sitter::Node;

use super::{text, BaseKind, Lang, LanguageProfile, RawBase, RawImport};

pub fn c() -> LanguageProfile {
    LanguageProfile {
        lang: Lang::C,
        grammar: tree_sitter_c::LANGUAGE.into(),
        extensions: &["c", "h"],
        function_kinds: &["function_definition"],
        class_kinds: &["struct_specifier", "union_specifier", "enum_specifier"],
        owner_kinds: &[],
        namespace_kinds: &[],
        module_kinds: &["translation_unit"],
        call_kinds: &["call_expression"],
        import_kinds: &["preproc_include"],
        package_indicators: &["Makefile", "Kconfig"],
    }
}

pub fn cpp() -> LanguageProfile {
    LanguageProfile {
        lang: Lang::Cpp,
        grammar: tree_sitter_cpp::LANGUAGE.into(),
        extensions: &["cpp", "cc", "cxx", "hpp", "hxx"],
        function_kinds: &["function_definition"],
        class_kinds: &[
            "class_specifier",
            "struct_specifier",
            "union_specifier",
            "enum_specifier",
        ],
        owner_kinds: &["field_declaration_list"],
        namespace_kinds: &["namespace_definition"],
        module_kinds: &["translation_unit"],
        call_kinds: &["call_expression"],
        import_kinds: &["preproc_include"],
        package_indicators: &["Makefile", "CMakeLists.txt"],
    }
}

/// Function and type names, descending through declarators.
pub fn node_name(node: &Node, src: &[u8]) -> Option<String> {
    match node.kind() {
        "function_definition" => {
            let declarator = node.child_by_field_name("declarator")?;
            function_declarator_name(&declarator, src)
        }
        "struct_specifier" | "union_specifier" | "enum_specifier" | "class_specifier" => {
            // only named specifiers with a body define anything
            let name = node.child_by_field_name("name")?;
            node.child_by_field_name("body")?;
            Some(text(&name, src))
        }
        "namespace_definition" => node.child_by_field_name("name").map(|n| text(&n, src)),
        _ => node.child_by_field_name("name").map(|n| text(&n, src)),
    }
}

/// Name inside a (possibly pointer-wrapped) function declarator.
pub fn function_declarator_name(declarator: &Node, src: &[u8]) -> Option<String> {
    let mut current = *declarator;
    loop {
        match current.kind() {
            "pointer_declarator" | "parenthesized_declarator" => {
                current = current
                    .child_by_field_name("declarator")
                    .or_else(|| first_named_child(&current))?;
            }
            "function_declarator" => {
                let inner = current.child_by_field_name("declarator")?;
                return deepest_identifier(&inner, src);
            }
            "identifier" => return Some(text(&current, src)),
            _ => return deepest_identifier(&current, src),
        }
    }
}

/// The deepest identifier in a declarator tree.
pub fn deepest_identifier(node: &Node, src: &[u8]) -> Option<String> {
    if matches!(node.kind(), "identifier" | "field_identifier" | "type_identifier") {
        return Some(text(node, src));
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(found) = deepest_identifier(&child, src) {
            return Some(found);
        }
    }
    None
}

fn first_named_child<'tree>(node: &Node<'tree>) -> Option<Node<'tree>> {
    let mut cursor = node.walk();
    let first = node.named_children(&mut cursor).next();
    first
}

pub fn collect_imports(node: &Node, src: &[u8], out: &mut Vec<RawImport>) {
    let Some(path) = node.child_by_field_name("path") else {
        return;
    };
    let line = super::line_of(node);
    match path.kind() {
        // "local.h" is relative to the including file
        "string_literal" => {
            let target = text(&path, src).trim_matches('"').to_string();
            out.push(RawImport::new(target, line));
        }
        // <stdio.h> is external
        "system_lib_string" => {
            let target = text(&path, src).trim_matches(['<', '>']).to_string();
            let mut imp = RawImport::new(target, line);
            imp.system = true;
            out.push(imp);
        }
        _ => {}
    }
}

/// C++ base-class clauses: `class D : public B1, private B2`.
pub fn bases_of(node: &Node, src: &[u8]) -> Vec<RawBase> {
    let mut bases = Vec::new();
    let mut cursor = node.walk();
    let Some(clause) = node.children(&mut cursor).find(|c| c.kind() == "base_class_clause") else {
        return bases;
    };
    let mut clause_cursor = clause.walk();
    for child in clause.named_children(&mut clause_cursor) {
        if matches!(child.kind(), "type_identifier" | "qualified_identifier" | "template_type") {
            let raw = text(&child, src);
            let name = raw.split('<').next().unwrap_or(&raw).trim().to_string();
            if !name.is_empty() {
                bases.push(RawBase { name, kind: BaseKind::Extends });
            }
        }
    }
    bases
}
