//! Java grammar profile and syntax helpers.

use tree_sitter::Node;

use super::{text, BaseKind, CallKind, CalleeRef, Lang, LanguageProfile, RawBase, RawImport};

pub fn profile() -> LanguageProfile {
    LanguageProfile {
        lang: Lang::Java,
        grammar: tree_sitter_java::LANGUAGE.into(),
        extensions: &["java"],
        function_kinds: &["method_declaration", "constructor_declaration"],
        class_kinds: &[
            "class_declaration",
            "interface_declaration",
            "enum_declaration",
            "record_declaration",
        ],
        owner_kinds: &["class_body", "interface_body", "enum_body"],
        namespace_kinds: &[],
        module_kinds: &["program"],
        call_kinds: &["method_invocation", "object_creation_expression"],
        import_kinds: &["import_declaration"],
        package_indicators: &["pom.xml", "build.gradle", "build.gradle.kts"],
    }
}

pub fn collect_imports(node: &Node, src: &[u8], out: &mut Vec<RawImport>) {
    let mut cursor = node.walk();
    let Some(path) = node
        .named_children(&mut cursor)
        .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
    else {
        return;
    };
    let mut imp = RawImport::new(text(&path, src), super::line_of(node));
    // `import a.b.*;` carries an asterisk sibling
    imp.is_wildcard = text(node, src).contains(".*");
    out.push(imp);
}

/// `method_invocation` puts the name in a field rather than a child
/// expression, unlike the dot-syntax scripting languages.
pub fn callee_of(node: &Node, src: &[u8]) -> Option<CalleeRef> {
    match node.kind() {
        "method_invocation" => {
            let name = node.child_by_field_name("name").map(|n| text(&n, src))?;
            match node.child_by_field_name("object") {
                Some(obj) => {
                    let receiver = text(&obj, src);
                    if receiver == "super" {
                        Some(CalleeRef { name, kind: CallKind::Super, receiver: Some(receiver), qualifier: None })
                    } else if obj.kind() == "field_access" {
                        Some(CalleeRef {
                            name,
                            kind: CallKind::Qualified,
                            receiver: Some(receiver.clone()),
                            qualifier: Some(receiver),
                        })
                    } else if receiver == "this" {
                        Some(CalleeRef { name, kind: CallKind::Method, receiver: Some("this".into()), qualifier: None })
                    } else {
                        Some(CalleeRef { name, kind: CallKind::Method, receiver: Some(receiver), qualifier: None })
                    }
                }
                None => Some(CalleeRef { name, kind: CallKind::Free, receiver: None, qualifier: None }),
            }
        }
        "object_creation_expression" => {
            let ty = node.child_by_field_name("type")?;
            let raw = text(&ty, src);
            let name = raw.split('<').next().unwrap_or(&raw).trim().to_string();
            Some(CalleeRef { name, kind: CallKind::Free, receiver: None, qualifier: None })
        }
        _ => None,
    }
}

pub fn bases_of(node: &Node, src: &[u8]) -> Vec<RawBase> {
    let mut bases = Vec::new();

    if let Some(superclass) = node.child_by_field_name("superclass") {
        let mut cursor = superclass.walk();
        for child in superclass.named_children(&mut cursor) {
            if matches!(child.kind(), "type_identifier" | "scoped_type_identifier" | "generic_type") {
                bases.push(RawBase { name: base_name(&child, src), kind: BaseKind::Extends });
            }
        }
    }

    if let Some(interfaces) = node.child_by_field_name("interfaces") {
        let mut cursor = interfaces.walk();
        collect_type_identifiers(&interfaces, src, &mut cursor, &mut bases);
    }

    bases
}

fn collect_type_identifiers<'a>(
    node: &Node<'a>,
    src: &[u8],
    cursor: &mut tree_sitter::TreeCursor<'a>,
    out: &mut Vec<RawBase>,
) {
    for child in node.named_children(cursor) {
        match child.kind() {
            "type_identifier" | "scoped_type_identifier" | "generic_type" => {
                out.push(RawBase { name: base_name(&child, src), kind: BaseKind::Implements });
            }
            "type_list" => {
                let mut inner = child.walk();
                collect_type_identifiers(&child, src, &mut inner, out);
            }
            _ => {}
        }
    }
}

fn base_name(node: &Node, src: &[u8]) -> String {
    let raw = text(node, src);
    raw.split('<').next().unwrap_or(&raw).trim().to_string()
}
