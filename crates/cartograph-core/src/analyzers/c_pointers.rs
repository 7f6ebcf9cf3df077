//! Pointer analysis for C translation units.
//!
//! Emits `Pointer`, `FunctionPointer`, `GlobalVariable` and `Typedef`
//! nodes and the `POINTS_TO` / `ASSIGNS_FP` / `INVOKES_FP` edges. Names
//! resolve against the translation unit's own symbol table; anything the
//! file does not declare is dropped.

use std::collections::BTreeMap;

use tree_sitter::Node;

use crate::definer::FileOutline;
use crate::graph::{NodeLabel, NodeRef, NodeRow, RelRow, RelType};
use crate::lang::{self, text, Lang};
use crate::parser::ParsedFile;

use super::FileAnalyzer;

/// Everything known about one pointer declaration.
#[derive(Debug, Clone)]
struct PointerInfo {
    qn: String,
    indirection_level: u32,
    is_function_pointer: bool,
    points_to: Option<String>,
}

#[derive(Default)]
struct Pass {
    module_qn: String,
    pointers: BTreeMap<String, PointerInfo>,
    /// fp name -> functions assigned to it
    fp_assignments: BTreeMap<String, Vec<String>>,
    globals: BTreeMap<String, String>,
    functions: BTreeMap<String, String>,
    /// (fp name, enclosing function) invocation sites
    invocations: Vec<(String, String)>,
    /// lhs = rhs pointer aliases, resolved to fixpoint afterwards
    pending_aliases: Vec<(String, String)>,
    typedefs: Vec<(String, String)>,
}

pub struct CPointerAnalyzer;

impl FileAnalyzer for CPointerAnalyzer {
    fn wants(&self, outline: &FileOutline) -> bool {
        matches!(outline.language, Some(Lang::C | Lang::Cpp))
    }

    fn visit_file(&self, parsed: &ParsedFile, outline: &mut FileOutline) {
        let mut pass = Pass { module_qn: outline.module_qn.clone(), ..Default::default() };

        // function names from the definer give invocation contexts
        for def in &outline.defs {
            if def.label == NodeLabel::Function {
                pass.functions.insert(def.name.clone(), def.qualified_name.clone());
            }
        }

        pass.walk(parsed.root(), parsed.bytes(), None);
        pass.resolve_aliases();
        pass.emit(outline);
    }
}

impl Pass {
    fn walk(&mut self, node: Node<'_>, src: &[u8], context: Option<&str>) {
        match node.kind() {
            "declaration" => self.visit_declaration(&node, src, context),
            "type_definition" => self.visit_typedef(&node, src),
            "assignment_expression" => self.visit_assignment(&node, src),
            "call_expression" => self.visit_call(&node, src, context),
            _ => {}
        }

        // function bodies switch the invocation context
        let next_context: Option<String> = if node.kind() == "function_definition" {
            node.child_by_field_name("declarator")
                .and_then(|d| lang::c_function_name(&d, src))
        } else {
            None
        };

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match &next_context {
                Some(name) => self.walk(child, src, Some(name.as_str())),
                None => self.walk(child, src, context),
            }
        }
    }

    fn visit_declaration(&mut self, node: &Node, src: &[u8], context: Option<&str>) {
        let type_text = node.child_by_field_name("type").map(|t| text(&t, src)).unwrap_or_default();

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "init_declarator" => {
                    let Some(declarator) = child.child_by_field_name("declarator") else {
                        continue;
                    };
                    let value = child.child_by_field_name("value");
                    self.visit_declarator(&declarator, value.as_ref(), src, &type_text, context);
                }
                "pointer_declarator" | "function_declarator" | "array_declarator"
                | "parenthesized_declarator" => {
                    self.visit_declarator(&child, None, src, &type_text, context);
                }
                "identifier" => {
                    // plain global at file scope
                    if context.is_none() {
                        self.globals.insert(text(&child, src), type_text.clone());
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_declarator(
        &mut self,
        declarator: &Node,
        value: Option<&Node>,
        src: &[u8],
        type_text: &str,
        context: Option<&str>,
    ) {
        if is_function_pointer(declarator) {
            let Some(name) = deepest_name(declarator, src) else {
                return;
            };
            let qn = format!("{}.{name}", self.module_qn);
            self.pointers.insert(
                name.clone(),
                PointerInfo { qn, indirection_level: 1, is_function_pointer: true, points_to: None },
            );
            // `int (*op)(int,int) = add;`
            if let Some(value) = value {
                if value.kind() == "identifier" {
                    self.fp_assignments.entry(name).or_default().push(text(value, src));
                }
            }
            return;
        }

        let levels = indirection_of(declarator);
        if levels == 0 {
            // non-pointer declarator at file scope is a global
            if context.is_none() {
                if let Some(name) = deepest_name(declarator, src) {
                    self.globals.entry(name).or_insert_with(|| type_text.to_string());
                }
            }
            return;
        }

        let Some(name) = deepest_name(declarator, src) else {
            return;
        };
        let qn = format!("{}.{name}", self.module_qn);
        let mut info = PointerInfo {
            qn,
            indirection_level: levels,
            is_function_pointer: false,
            points_to: None,
        };

        if let Some(value) = value {
            match value.kind() {
                // `int *p = &x;`
                "pointer_expression" => {
                    if let Some(target) = address_of_target(value, src) {
                        info.points_to = Some(target);
                    }
                }
                // `int *q = p;` is an alias, resolved later
                "identifier" => self.pending_aliases.push((name.clone(), text(value, src))),
                _ => {}
            }
        }

        self.pointers.insert(name, info);
    }

    fn visit_typedef(&mut self, node: &Node, src: &[u8]) {
        let Some(declarator) = node.child_by_field_name("declarator") else {
            return;
        };
        let Some(name) = deepest_name(&declarator, src) else {
            return;
        };
        let base = node.child_by_field_name("type").map(|t| text(&t, src)).unwrap_or_default();
        self.typedefs.push((name, base));
    }

    fn visit_assignment(&mut self, node: &Node, src: &[u8]) {
        let (Some(left), Some(right)) =
            (node.child_by_field_name("left"), node.child_by_field_name("right"))
        else {
            return;
        };
        let Some(lhs) = identifier_of(&left, src) else {
            return;
        };

        match right.kind() {
            "pointer_expression" => {
                if let Some(target) = address_of_target(&right, src) {
                    if let Some(info) = self.pointers.get_mut(&lhs) {
                        info.points_to = Some(target);
                    }
                }
            }
            "identifier" => {
                let rhs = text(&right, src);
                if self.fp_assignments.contains_key(&lhs)
                    || self.pointers.get(&lhs).map(|p| p.is_function_pointer).unwrap_or(false)
                {
                    self.fp_assignments.entry(lhs).or_default().push(rhs);
                } else if self.pointers.contains_key(&lhs) {
                    self.pending_aliases.push((lhs, rhs));
                }
            }
            _ => {}
        }
    }

    fn visit_call(&mut self, node: &Node, src: &[u8], context: Option<&str>) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let Some(context) = context else {
            return;
        };

        let fp_name = match function.kind() {
            // `op(1, 2)`
            "identifier" => {
                let name = text(&function, src);
                self.pointers
                    .get(&name)
                    .filter(|p| p.is_function_pointer)
                    .map(|_| name)
            }
            // `(*op)(1, 2)`
            "parenthesized_expression" => {
                let mut cursor = function.walk();
                let result = function
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "pointer_expression")
                    .and_then(|inner| inner.child_by_field_name("argument"))
                    .and_then(|arg| identifier_of(&arg, src))
                    .filter(|name| {
                        self.pointers.get(name).map(|p| p.is_function_pointer).unwrap_or(false)
                    });
                result
            }
            // `ops[i](1, 2)`: an array of function pointers acts as one entity
            "subscript_expression" => function
                .child_by_field_name("argument")
                .and_then(|arg| identifier_of(&arg, src))
                .filter(|name| {
                    self.pointers.get(name).map(|p| p.is_function_pointer).unwrap_or(false)
                }),
            _ => None,
        };

        if let Some(fp) = fp_name {
            self.invocations.push((fp, context.to_string()));
        }
    }

    /// `p2 = p1` aliasing propagates targets until nothing changes.
    fn resolve_aliases(&mut self) {
        for _ in 0..10 {
            let mut changed = false;
            for (lhs, rhs) in self.pending_aliases.clone() {
                let target = self.pointers.get(&rhs).and_then(|p| p.points_to.clone());
                if let (Some(target), Some(info)) = (target, self.pointers.get_mut(&lhs)) {
                    if info.points_to.as_deref() != Some(target.as_str()) {
                        info.points_to = Some(target);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn emit(&self, out: &mut FileOutline) {
        let module_ref = out.module_ref();

        for (name, ty) in &self.globals {
            if self.pointers.contains_key(name) || self.functions.contains_key(name) {
                continue;
            }
            let qn = format!("{}.{name}", self.module_qn);
            out.analyzer_nodes.push(
                NodeRow::new(NodeLabel::GlobalVariable, qn.clone())
                    .prop("name", name.clone())
                    .prop("type", ty.clone()),
            );
            out.analyzer_edges.push(RelRow::new(
                module_ref.clone(),
                RelType::Defines,
                NodeRef::new(NodeLabel::GlobalVariable, qn),
            ));
        }

        for (name, base) in &self.typedefs {
            let qn = format!("{}.{name}", self.module_qn);
            out.analyzer_nodes.push(
                NodeRow::new(NodeLabel::Typedef, qn.clone())
                    .prop("name", name.clone())
                    .prop("type", base.clone()),
            );
            out.analyzer_edges.push(RelRow::new(
                module_ref.clone(),
                RelType::Defines,
                NodeRef::new(NodeLabel::Typedef, qn),
            ));
        }

        for (name, info) in &self.pointers {
            let label =
                if info.is_function_pointer { NodeLabel::FunctionPointer } else { NodeLabel::Pointer };
            out.analyzer_nodes.push(
                NodeRow::new(label, info.qn.clone())
                    .prop("name", name.clone())
                    .prop("indirection_level", info.indirection_level),
            );
            out.analyzer_edges.push(RelRow::new(
                module_ref.clone(),
                RelType::Defines,
                NodeRef::new(label, info.qn.clone()),
            ));

            // POINTS_TO only lands on something this file declares
            if let Some(target) = &info.points_to {
                let target_ref = if let Some(p) = self.pointers.get(target) {
                    let label = if p.is_function_pointer {
                        NodeLabel::FunctionPointer
                    } else {
                        NodeLabel::Pointer
                    };
                    Some(NodeRef::new(label, p.qn.clone()))
                } else if let Some(fqn) = self.functions.get(target) {
                    Some(NodeRef::new(NodeLabel::Function, fqn.clone()))
                } else if self.globals.contains_key(target) {
                    Some(NodeRef::new(
                        NodeLabel::GlobalVariable,
                        format!("{}.{target}", self.module_qn),
                    ))
                } else {
                    None
                };
                if let Some(target_ref) = target_ref {
                    out.analyzer_edges.push(RelRow::new(
                        NodeRef::new(label, info.qn.clone()),
                        RelType::PointsTo,
                        target_ref,
                    ));
                }
            }
        }

        for (fp, functions) in &self.fp_assignments {
            let Some(fp_info) = self.pointers.get(fp) else {
                continue;
            };
            for function in functions {
                let Some(target_qn) = self.functions.get(function) else {
                    continue;
                };
                out.analyzer_edges.push(RelRow::new(
                    NodeRef::new(NodeLabel::FunctionPointer, fp_info.qn.clone()),
                    RelType::AssignsFp,
                    NodeRef::new(NodeLabel::Function, target_qn.clone()),
                ));
            }
        }

        for (fp, context) in &self.invocations {
            let (Some(fp_info), Some(caller_qn)) =
                (self.pointers.get(fp), self.functions.get(context))
            else {
                continue;
            };
            out.analyzer_edges.push(RelRow::new(
                NodeRef::new(NodeLabel::Function, caller_qn.clone()),
                RelType::InvokesFp,
                NodeRef::new(NodeLabel::FunctionPointer, fp_info.qn.clone()),
            ));
        }
    }
}

// =============================================================================
// DECLARATOR HELPERS
// =============================================================================

/// Pointer levels: stacked `pointer_declarator`s, seen through
/// parentheses and array declarators.
fn indirection_of(declarator: &Node) -> u32 {
    let mut levels = 0;
    let mut current = *declarator;
    loop {
        match current.kind() {
            "pointer_declarator" => {
                levels += 1;
                match current.child_by_field_name("declarator") {
                    Some(next) => current = next,
                    None => break,
                }
            }
            "parenthesized_declarator" | "array_declarator" => {
                let mut cursor = current.walk();
                let inner = current
                    .named_children(&mut cursor)
                    .find(|c| matches!(c.kind(), "pointer_declarator" | "parenthesized_declarator"));
                match inner {
                    Some(next) => current = next,
                    None => break,
                }
            }
            _ => break,
        }
    }
    levels
}

/// A declarator chain ending in a function declarator is a function pointer.
fn is_function_pointer(declarator: &Node) -> bool {
    let mut current = *declarator;
    loop {
        match current.kind() {
            "pointer_declarator" | "parenthesized_declarator" => {
                let next = current.child_by_field_name("declarator").or_else(|| {
                    let mut cursor = current.walk();
                    let first = current.named_children(&mut cursor).next();
                    first
                });
                match next {
                    Some(n) => current = n,
                    None => return false,
                }
            }
            "function_declarator" => {
                // a function *declaration* has a bare identifier declarator;
                // a function pointer wraps it in (*name)
                return current
                    .child_by_field_name("declarator")
                    .map(|d| d.kind() != "identifier")
                    .unwrap_or(false);
            }
            _ => return false,
        }
    }
}

fn deepest_name(node: &Node, src: &[u8]) -> Option<String> {
    crate::lang::c_deepest_identifier(node, src)
}

/// Target of `&x`, when the operand is a plain identifier.
fn address_of_target(value: &Node, src: &[u8]) -> Option<String> {
    let is_address = value
        .child(0)
        .map(|op| text(&op, src) == "&")
        .unwrap_or(false);
    if !is_address {
        return None;
    }
    let argument = value.child_by_field_name("argument")?;
    if argument.kind() == "identifier" {
        Some(text(&argument, src))
    } else {
        None
    }
}

/// Identifier behind an lvalue: plain, `p->field` or `arr[i]`.
fn identifier_of(node: &Node, src: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" => Some(text(node, src)),
        "field_expression" => node.child_by_field_name("field").map(|f| text(&f, src)),
        "subscript_expression" => {
            let argument = node.child_by_field_name("argument")?;
            (argument.kind() == "identifier").then(|| text(&argument, src))
        }
        _ => None,
    }
}
