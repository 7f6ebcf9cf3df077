//! JavaScript and TypeScript grammar profiles and syntax helpers.
//!
//! The two languages share import/export/class syntax; TypeScript adds
//! interfaces, enums and abstract classes on top.

use tree_sitter::Node;

use super::{text, BaseKind, Lang, LanguageProfile, RawBase, RawImport};

pub fn javascript() -> LanguageProfile {
    LanguageProfile {
        lang: Lang::JavaScript,
        grammar: tree_sitter_javascript::LANGUAGE.into(),
        extensions: &["js", "jsx", "mjs", "cjs"],
        function_kinds: &[
            "function_declaration",
            "generator_function_declaration",
            "method_definition",
        ],
        class_kinds: &["class_declaration"],
        owner_kinds: &["class_body"],
        namespace_kinds: &[],
        module_kinds: &["program"],
        call_kinds: &["call_expression", "new_expression"],
        import_kinds: &["import_statement"],
        package_indicators: &["package.json"],
    }
}

pub fn typescript() -> LanguageProfile {
    LanguageProfile {
        lang: Lang::TypeScript,
        grammar: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        extensions: &["ts", "tsx"],
        function_kinds: &[
            "function_declaration",
            "generator_function_declaration",
            "method_definition",
        ],
        class_kinds: &[
            "class_declaration",
            "abstract_class_declaration",
            "interface_declaration",
            "enum_declaration",
        ],
        owner_kinds: &["class_body"],
        namespace_kinds: &["internal_module"],
        module_kinds: &["program"],
        call_kinds: &["call_expression", "new_expression"],
        import_kinds: &["import_statement"],
        package_indicators: &["package.json", "tsconfig.json"],
    }
}

pub fn collect_imports(node: &Node, src: &[u8], out: &mut Vec<RawImport>) {
    let Some(source) = node.child_by_field_name("source") else {
        return;
    };
    let target = text(&source, src).trim_matches(['"', '\'', '`']).to_string();
    let mut imp = RawImport::new(target, super::line_of(node));
    imp.system = !imp.target.starts_with('.');

    // import clause: default name, named imports, namespace import
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() != "import_clause" {
            continue;
        }
        let mut clause_cursor = child.walk();
        for part in child.named_children(&mut clause_cursor) {
            match part.kind() {
                "identifier" => imp.alias = Some(text(&part, src)),
                "namespace_import" => {
                    imp.is_wildcard = true;
                    let mut ns_cursor = part.walk();
                    let found =
                        part.named_children(&mut ns_cursor).find(|c| c.kind() == "identifier");
                    if let Some(name) = found {
                        imp.alias = Some(text(&name, src));
                    }
                }
                "named_imports" => {
                    let mut named_cursor = part.walk();
                    for spec in part.named_children(&mut named_cursor) {
                        if spec.kind() == "import_specifier" {
                            let name = spec
                                .child_by_field_name("alias")
                                .or_else(|| spec.child_by_field_name("name"))
                                .map(|n| text(&n, src));
                            if let Some(name) = name {
                                imp.items.push(name);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
    out.push(imp);
}

pub fn bases_of(node: &Node, src: &[u8]) -> Vec<RawBase> {
    let mut bases = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            // JS: `class A extends B`, heritage wraps the expression
            "class_heritage" => {
                let mut h_cursor = child.walk();
                for expr in child.named_children(&mut h_cursor) {
                    match expr.kind() {
                        "identifier" | "member_expression" => {
                            bases.push(RawBase { name: text(&expr, src), kind: BaseKind::Extends });
                        }
                        // TS: extends_clause / implements_clause under heritage
                        "extends_clause" => collect_clause(&expr, src, BaseKind::Extends, &mut bases),
                        "implements_clause" => {
                            collect_clause(&expr, src, BaseKind::Implements, &mut bases)
                        }
                        _ => {}
                    }
                }
            }
            "extends_clause" => collect_clause(&child, src, BaseKind::Extends, &mut bases),
            "implements_clause" => collect_clause(&child, src, BaseKind::Implements, &mut bases),
            _ => {}
        }
    }
    bases
}

fn collect_clause(clause: &Node, src: &[u8], kind: BaseKind, out: &mut Vec<RawBase>) {
    let mut cursor = clause.walk();
    for child in clause.named_children(&mut cursor) {
        if matches!(child.kind(), "identifier" | "type_identifier" | "member_expression" | "generic_type") {
            let raw = text(&child, src);
            let name = raw.split('<').next().unwrap_or(&raw).trim().to_string();
            if !name.is_empty() {
                out.push(RawBase { name, kind });
            }
        }
    }
}

/// Names exported by an `export` statement.
pub fn exports_of(node: &Node, src: &[u8]) -> Vec<String> {
    if node.kind() != "export_statement" {
        return Vec::new();
    }
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "function_declaration"
            | "generator_function_declaration"
            | "class_declaration"
            | "abstract_class_declaration"
            | "interface_declaration"
            | "enum_declaration" => {
                if let Some(name) = child.child_by_field_name("name") {
                    names.push(text(&name, src));
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                let mut decl_cursor = child.walk();
                for declarator in child.named_children(&mut decl_cursor) {
                    if declarator.kind() == "variable_declarator" {
                        if let Some(name) = declarator.child_by_field_name("name") {
                            names.push(text(&name, src));
                        }
                    }
                }
            }
            "export_clause" => {
                let mut clause_cursor = child.walk();
                for spec in child.named_children(&mut clause_cursor) {
                    if spec.kind() == "export_specifier" {
                        if let Some(name) = spec.child_by_field_name("name") {
                            names.push(text(&name, src));
                        }
                    }
                }
            }
            _ => {}
        }
    }
    names
}
