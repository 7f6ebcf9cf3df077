//! Pass-1 definition extraction.
//!
//! The [`Definer`] walks one parse tree and produces a [`FileOutline`]:
//! the Module node, every definition found in the file, the containment
//! edges that are already resolvable, and the unresolved buffers (imports,
//! base classes, call sites, exports) that pass-2 will resolve against the
//! whole-project registry.
//!
//! Pass-1 is pure per file: no shared state, no graph writes, so it can
//! run on any worker.

use std::collections::{BTreeMap, BTreeSet};

use tree_sitter::Node;

use crate::graph::{
    ClassEntity, FunctionEntity, MethodEntity, ModuleEntity, NodeLabel, NodeRef, NodeRow, RelRow,
    RelType,
};
use crate::lang::{
    self, text, CallKind, CalleeRef, Lang, LanguageProfile, RawBase, RawImport,
};
use crate::parser::ParsedFile;

// =============================================================================
// OUTLINE
// =============================================================================

/// One definition as the registry will see it.
#[derive(Debug, Clone)]
pub struct DefRecord {
    pub qualified_name: String,
    pub label: NodeLabel,
    pub name: String,
}

/// A call site waiting for resolution.
#[derive(Debug, Clone)]
pub struct RawCall {
    pub caller_qn: String,
    pub caller_label: NodeLabel,
    pub name: String,
    pub kind: CallKind,
    pub receiver: Option<String>,
    pub qualifier: Option<String>,
    pub line: u32,
}

/// Base-class references of one class, waiting for resolution.
#[derive(Debug, Clone)]
pub struct ClassBases {
    pub class_qn: String,
    pub class_label: NodeLabel,
    pub bases: Vec<RawBase>,
}

/// A `#define` captured for macro-expansion linking.
#[derive(Debug, Clone)]
pub struct MacroDef {
    pub qualified_name: String,
    pub name: String,
    pub body: String,
    pub params: Option<String>,
}

/// A BDD step implementation found in a source file.
#[derive(Debug, Clone)]
pub struct StepDef {
    pub keyword: String,
    pub pattern: String,
    pub function_qn: String,
}

/// Everything pass-1 learned about one file.
#[derive(Default)]
pub struct FileOutline {
    pub relative_path: String,
    pub language: Option<Lang>,
    pub module_qn: String,
    pub byte_len: u64,
    pub has_errors: bool,
    pub is_test: bool,

    /// Module + definition nodes, emission-ready.
    pub nodes: Vec<NodeRow>,
    /// Containment edges resolvable within the file.
    pub edges: Vec<RelRow>,
    /// Registry records for every definition above.
    pub defs: Vec<DefRecord>,

    /// Method edges whose owner is declared elsewhere (e.g. `impl` blocks);
    /// the aggregator resolves the owner label against the registry.
    pub deferred_method_edges: Vec<(String, String)>,

    pub imports: Vec<RawImport>,
    pub bases: Vec<ClassBases>,
    pub calls: Vec<RawCall>,
    pub exports: Vec<String>,
    /// Constructor-site receiver types: variable name -> class name text.
    pub constructed: BTreeMap<String, String>,

    /// Specialized analyzer emissions (C pointers, kernel, tests).
    pub analyzer_nodes: Vec<NodeRow>,
    pub analyzer_edges: Vec<RelRow>,
    /// C macro table of this translation unit.
    pub macros: Vec<MacroDef>,
    /// Identifier uses per enclosing function, for macro-expansion linking.
    pub ident_uses: BTreeMap<String, BTreeSet<String>>,
    /// BDD step implementations defined in this file.
    pub step_defs: Vec<StepDef>,

    pub warnings: Vec<String>,
}

impl FileOutline {
    pub fn module_ref(&self) -> NodeRef {
        NodeRef::new(NodeLabel::Module, self.module_qn.clone())
    }
}

/// Project-rooted dotted module name for a relative path.
///
/// `pkg/__init__.py`, `pkg/mod.rs` and `pkg/index.ts` all collapse to the
/// directory itself so sibling files resolve against the same name.
pub fn module_qn(project: &str, relative_path: &str) -> String {
    let mut parts: Vec<&str> = relative_path.split('/').filter(|p| !p.is_empty()).collect();
    if let Some(last) = parts.last() {
        let stem = last.rsplit_once('.').map(|(s, _)| s).unwrap_or(last);
        if matches!(stem, "__init__" | "mod" | "index") && parts.len() > 1 {
            parts.pop();
        } else {
            let len = parts.len();
            parts[len - 1] = stem;
        }
    }
    let mut qn = String::from(project);
    for part in parts {
        qn.push('.');
        qn.push_str(part);
    }
    qn
}

// =============================================================================
// DEFINER
// =============================================================================

/// Innermost class-like scope during the walk.
#[derive(Clone)]
struct Owner {
    qn: String,
    /// `None` when the owner is an `impl`-style block whose type is
    /// declared elsewhere.
    label: Option<NodeLabel>,
}

struct WalkState {
    /// QN segments below the module (namespaces, classes, functions).
    segments: Vec<String>,
    owner: Option<Owner>,
    fn_stack: Vec<(String, NodeLabel)>,
    seen_qns: BTreeSet<String>,
}

/// Walks one parse tree and emits definitions plus unresolved buffers.
pub struct Definer<'a> {
    profile: &'a LanguageProfile,
}

impl<'a> Definer<'a> {
    pub fn new(profile: &'a LanguageProfile) -> Self {
        Self { profile }
    }

    pub fn outline(
        &self,
        parsed: &ParsedFile,
        project: &str,
        relative_path: &str,
        is_test: bool,
    ) -> FileOutline {
        let qn = module_qn(project, relative_path);
        let mut outline = FileOutline {
            relative_path: relative_path.to_string(),
            language: Some(self.profile.lang),
            module_qn: qn.clone(),
            byte_len: parsed.bytes().len() as u64,
            has_errors: parsed.has_errors,
            is_test,
            ..Default::default()
        };

        let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
        outline.nodes.push(
            ModuleEntity {
                qualified_name: qn,
                name: name.to_string(),
                path: relative_path.to_string(),
                language: self.profile.lang.as_str().to_string(),
                byte_size: outline.byte_len,
            }
            .into_row(),
        );

        let mut state = WalkState {
            segments: Vec::new(),
            owner: None,
            fn_stack: Vec::new(),
            seen_qns: BTreeSet::new(),
        };
        self.walk(parsed.root(), parsed.bytes(), &mut state, &mut outline);
        outline
    }

    fn walk(&self, node: Node<'_>, src: &[u8], state: &mut WalkState, out: &mut FileOutline) {
        let kind = node.kind();

        if self.profile.namespace_kinds.contains(&kind) {
            if let Some(name) = self.profile.node_name(&node, src) {
                state.segments.push(name);
                self.walk_children(node, src, state, out);
                state.segments.pop();
                return;
            }
        }

        if self.profile.is_class_kind(kind) {
            self.visit_class(node, src, state, out);
            return;
        }

        if self.profile.owner_kinds.contains(&kind) && !self.profile.is_class_kind(kind) {
            // Owner-only scopes: impl blocks name a type declared elsewhere,
            // class bodies inherit the surrounding owner.
            if let Some(name) = self.profile.node_name(&node, src) {
                let qn = self.scoped_qn(out, state, &name);
                let saved = state.owner.replace(Owner { qn: qn.clone(), label: None });
                state.segments.push(name);
                self.walk_children(node, src, state, out);
                state.segments.pop();
                state.owner = saved;
            } else {
                self.walk_children(node, src, state, out);
            }
            return;
        }

        if self.profile.is_function_kind(kind) {
            self.visit_function(node, src, state, out);
            return;
        }

        if self.profile.call_kinds.contains(&kind) {
            self.visit_call(node, src, state, out);
            // fall through: arguments may contain nested calls and lambdas
            self.walk_children(node, src, state, out);
            return;
        }

        if self.profile.import_kinds.contains(&kind) {
            self.profile.collect_imports(&node, src, &mut out.imports);
            return;
        }

        match kind {
            "export_statement" => {
                for name in self.profile.exports_of(&node, src) {
                    out.exports.push(name);
                }
                self.walk_children(node, src, state, out);
                return;
            }
            "expression_statement" if self.profile.lang == Lang::Python => {
                for name in self.profile.exports_of(&node, src) {
                    out.exports.push(name);
                }
            }
            _ => {}
        }

        self.track_constructor_site(node, src, out);
        self.walk_children(node, src, state, out);
    }

    fn walk_children(&self, node: Node<'_>, src: &[u8], state: &mut WalkState, out: &mut FileOutline) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, src, state, out);
        }
    }

    fn visit_class(&self, node: Node<'_>, src: &[u8], state: &mut WalkState, out: &mut FileOutline) {
        let Some(name) = self.profile.node_name(&node, src) else {
            // anonymous or body-less reference; nothing to define
            self.walk_children(node, src, state, out);
            return;
        };

        let qn = self.scoped_qn(out, state, &name);
        if !state.seen_qns.insert(qn.clone()) {
            out.warnings.push(format!("duplicate definition of {qn} ignored"));
            return;
        }

        let kind = self.profile.class_kind_of(&node);
        let label = kind.label();
        let entity = ClassEntity {
            qualified_name: qn.clone(),
            name: name.clone(),
            kind,
            language: self.profile.lang.as_str().to_string(),
            start_line: lang::line_of(&node),
            end_line: lang::end_line_of(&node),
            is_abstract: self.profile.is_abstract(&node, src),
            docstring: self.docstring(&node, src),
        };
        out.nodes.push(entity.into_row());
        out.defs.push(DefRecord { qualified_name: qn.clone(), label, name: name.clone() });

        // nearest structural parent: enclosing class, else module
        let parent = match &state.owner {
            Some(owner) => NodeRef::new(owner.label.unwrap_or(NodeLabel::Class), owner.qn.clone()),
            None => out.module_ref(),
        };
        out.edges.push(RelRow::new(parent, RelType::Defines, NodeRef::new(label, qn.clone())));

        let bases = self.profile.bases_of(&node, src);
        if !bases.is_empty() {
            out.bases.push(ClassBases { class_qn: qn.clone(), class_label: label, bases });
        }

        let saved = state.owner.replace(Owner { qn, label: Some(label) });
        state.segments.push(name);
        self.walk_children(node, src, state, out);
        state.segments.pop();
        state.owner = saved;
    }

    fn visit_function(&self, node: Node<'_>, src: &[u8], state: &mut WalkState, out: &mut FileOutline) {
        let Some(name) = self.profile.node_name(&node, src) else {
            self.walk_children(node, src, state, out);
            return;
        };

        let qn = self.scoped_qn(out, state, &name);
        if !state.seen_qns.insert(qn.clone()) {
            out.warnings.push(format!("duplicate definition of {qn} ignored"));
            return;
        }

        let start_line = lang::line_of(&node);
        let end_line = lang::end_line_of(&node);
        let docstring = self.docstring(&node, src);
        let language = self.profile.lang.as_str().to_string();

        let label = if let Some((parent_qn, parent_label)) = state.fn_stack.last().cloned() {
            // nested function: defined by the lexical parent function
            out.nodes.push(
                FunctionEntity {
                    qualified_name: qn.clone(),
                    name: name.clone(),
                    language,
                    start_line,
                    end_line,
                    signature: signature_of(&node, src),
                    docstring,
                }
                .into_row(),
            );
            out.edges.push(RelRow::new(
                NodeRef::new(parent_label, parent_qn),
                RelType::Defines,
                NodeRef::new(NodeLabel::Function, qn.clone()),
            ));
            NodeLabel::Function
        } else if let Some(owner) = state.owner.clone() {
            out.nodes.push(
                MethodEntity {
                    qualified_name: qn.clone(),
                    name: name.clone(),
                    parent_class: owner.qn.clone(),
                    language,
                    start_line,
                    end_line,
                    docstring,
                }
                .into_row(),
            );
            match owner.label {
                Some(owner_label) => out.edges.push(RelRow::new(
                    NodeRef::new(owner_label, owner.qn),
                    RelType::DefinesMethod,
                    NodeRef::new(NodeLabel::Method, qn.clone()),
                )),
                None => out.deferred_method_edges.push((owner.qn, qn.clone())),
            }
            NodeLabel::Method
        } else {
            out.nodes.push(
                FunctionEntity {
                    qualified_name: qn.clone(),
                    name: name.clone(),
                    language,
                    start_line,
                    end_line,
                    signature: signature_of(&node, src),
                    docstring,
                }
                .into_row(),
            );
            out.edges.push(RelRow::new(
                out.module_ref(),
                RelType::Defines,
                NodeRef::new(NodeLabel::Function, qn.clone()),
            ));
            NodeLabel::Function
        };

        out.defs.push(DefRecord { qualified_name: qn.clone(), label, name: name.clone() });

        state.fn_stack.push((qn, label));
        state.segments.push(name);
        self.walk_children(node, src, state, out);
        state.segments.pop();
        state.fn_stack.pop();
    }

    fn visit_call(&self, node: Node<'_>, src: &[u8], state: &mut WalkState, out: &mut FileOutline) {
        // calls outside any function body have no caller node; dropped
        let Some((caller_qn, caller_label)) = state.fn_stack.last().cloned() else {
            return;
        };
        let Some(CalleeRef { name, kind, receiver, qualifier }) = self.profile.callee_of(&node, src)
        else {
            return;
        };
        out.calls.push(RawCall {
            caller_qn,
            caller_label,
            name,
            kind,
            receiver,
            qualifier,
            line: lang::line_of(&node),
        });
    }

    /// Track `x = Foo()` / `const x = new Foo()` / `Foo x = new Foo()` so
    /// method calls on `x` can resolve against `Foo`.
    fn track_constructor_site(&self, node: Node<'_>, src: &[u8], out: &mut FileOutline) {
        match (self.profile.lang, node.kind()) {
            (Lang::Python, "assignment") => {
                let (Some(left), Some(right)) =
                    (node.child_by_field_name("left"), node.child_by_field_name("right"))
                else {
                    return;
                };
                if left.kind() != "identifier" || right.kind() != "call" {
                    return;
                }
                if let Some(func) = right.child_by_field_name("function") {
                    if func.kind() == "identifier" {
                        let class_name = text(&func, src);
                        if class_name.chars().next().is_some_and(|c| c.is_uppercase()) {
                            out.constructed.insert(text(&left, src), class_name);
                        }
                    }
                }
            }
            (Lang::JavaScript | Lang::TypeScript, "variable_declarator") => {
                let (Some(name), Some(value)) =
                    (node.child_by_field_name("name"), node.child_by_field_name("value"))
                else {
                    return;
                };
                if value.kind() == "new_expression" {
                    if let Some(ctor) = value.child_by_field_name("constructor") {
                        out.constructed.insert(text(&name, src), text(&ctor, src));
                    }
                }
            }
            (Lang::JavaScript | Lang::TypeScript, "assignment_expression") => {
                let (Some(left), Some(right)) =
                    (node.child_by_field_name("left"), node.child_by_field_name("right"))
                else {
                    return;
                };
                if left.kind() == "identifier" && right.kind() == "new_expression" {
                    if let Some(ctor) = right.child_by_field_name("constructor") {
                        out.constructed.insert(text(&left, src), text(&ctor, src));
                    }
                }
            }
            (Lang::Java, "local_variable_declaration") => {
                let Some(ty) = node.child_by_field_name("type") else {
                    return;
                };
                let type_name = {
                    let raw = text(&ty, src);
                    raw.split('<').next().unwrap_or(&raw).trim().to_string()
                };
                let mut cursor = node.walk();
                for declarator in node.named_children(&mut cursor) {
                    if declarator.kind() == "variable_declarator" {
                        if let Some(name) = declarator.child_by_field_name("name") {
                            out.constructed.insert(text(&name, src), type_name.clone());
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn scoped_qn(&self, out: &FileOutline, state: &WalkState, name: &str) -> String {
        let mut qn = out.module_qn.clone();
        for segment in &state.segments {
            qn.push('.');
            qn.push_str(segment);
        }
        qn.push('.');
        qn.push_str(name);
        qn
    }

    /// Python docstrings: a string as the first body statement.
    fn docstring(&self, node: &Node, src: &[u8]) -> Option<String> {
        if self.profile.lang != Lang::Python {
            return None;
        }
        let body = node.child_by_field_name("body")?;
        let mut cursor = body.walk();
        let first = body.named_children(&mut cursor).next()?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let mut inner = first.walk();
        let string = first.named_children(&mut inner).find(|c| c.kind() == "string")?;
        let raw = text(&string, src);
        let cleaned = raw
            .trim_start_matches("\"\"\"")
            .trim_end_matches("\"\"\"")
            .trim_start_matches("'''")
            .trim_end_matches("'''")
            .trim_matches(['"', '\''])
            .trim();
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned.to_string())
        }
    }
}

/// First line of a definition, as a cheap signature.
fn signature_of(node: &Node, src: &[u8]) -> Option<String> {
    let raw = text(node, src);
    raw.lines().next().map(|l| l.trim_end_matches(['{', ':']).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::LanguageRegistry;
    use crate::parser::parse_bytes;

    fn outline_python(source: &str) -> FileOutline {
        let registry = LanguageRegistry::new();
        let profile = registry.profile_for(Lang::Python).unwrap();
        let parsed = parse_bytes(&profile, source.as_bytes().to_vec()).unwrap();
        Definer::new(&profile).outline(&parsed, "proj", "pkg/a.py", false)
    }

    #[test]
    fn module_qn_collapses_init_and_index() {
        assert_eq!(module_qn("proj", "pkg/a.py"), "proj.pkg.a");
        assert_eq!(module_qn("proj", "pkg/__init__.py"), "proj.pkg");
        assert_eq!(module_qn("proj", "src/mod.rs"), "proj.src");
        assert_eq!(module_qn("proj", "lib/index.ts"), "proj.lib");
        assert_eq!(module_qn("proj", "main.go"), "proj.main");
    }

    #[test]
    fn nested_function_hangs_off_lexical_parent() {
        let outline = outline_python("def outer():\n    def inner():\n        pass\n    inner()\n");
        let qns: Vec<&str> = outline.defs.iter().map(|d| d.qualified_name.as_str()).collect();
        assert!(qns.contains(&"proj.pkg.a.outer"));
        assert!(qns.contains(&"proj.pkg.a.outer.inner"));

        let defines: Vec<(&str, &str)> = outline
            .edges
            .iter()
            .filter(|e| e.rel == RelType::Defines)
            .map(|e| (e.src.key.as_str(), e.dst.key.as_str()))
            .collect();
        assert!(defines.contains(&("proj.pkg.a", "proj.pkg.a.outer")));
        assert!(defines.contains(&("proj.pkg.a.outer", "proj.pkg.a.outer.inner")));

        // the call to inner() is recorded with outer as the caller
        assert_eq!(outline.calls.len(), 1);
        assert_eq!(outline.calls[0].caller_qn, "proj.pkg.a.outer");
        assert_eq!(outline.calls[0].name, "inner");
    }

    #[test]
    fn methods_get_defines_method_from_class() {
        let outline = outline_python("class C:\n    def m(self):\n        pass\n");
        let method = outline.defs.iter().find(|d| d.label == NodeLabel::Method).unwrap();
        assert_eq!(method.qualified_name, "proj.pkg.a.C.m");

        let dm: Vec<_> = outline.edges.iter().filter(|e| e.rel == RelType::DefinesMethod).collect();
        assert_eq!(dm.len(), 1);
        assert_eq!(dm[0].src.key, "proj.pkg.a.C");
    }

    #[test]
    fn duplicate_qualified_names_keep_first() {
        let outline = outline_python("def f():\n    pass\n\ndef f():\n    pass\n");
        let count = outline.defs.iter().filter(|d| d.qualified_name == "proj.pkg.a.f").count();
        assert_eq!(count, 1);
        assert_eq!(outline.warnings.len(), 1);
    }

    #[test]
    fn top_level_calls_are_dropped() {
        let outline = outline_python("def f():\n    pass\n\nf()\n");
        assert!(outline.calls.is_empty());
    }

    #[test]
    fn constructor_sites_are_tracked() {
        let outline = outline_python("class C:\n    def m(self):\n        pass\n\ndef f():\n    x = C()\n    x.m()\n");
        assert_eq!(outline.constructed.get("x"), Some(&"C".to_string()));
        let call = outline.calls.iter().find(|c| c.name == "m").unwrap();
        assert_eq!(call.kind, CallKind::Method);
        assert_eq!(call.receiver.as_deref(), Some("x"));
    }
}
