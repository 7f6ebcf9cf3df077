//! Linux kernel pattern analysis for C translation units.
//!
//! Recognizes the macro surface the kernel is written in: syscall
//! definitions, symbol exports, module entry points and lock discipline.
//! Also collects the `#define` table and per-function identifier uses
//! that feed macro-expansion linking once include closures are known.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use crate::definer::{FileOutline, MacroDef};
use crate::graph::{NodeLabel, NodeRef, NodeRow, RelRow, RelType};
use crate::lang::{self, text, Lang};
use crate::parser::ParsedFile;

use super::FileAnalyzer;

static SYSCALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)\b(COMPAT_)?SYSCALL_DEFINE(\d)\s*\(\s*(\w+)").expect("syscall pattern")
});

static EXPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)\bEXPORT_SYMBOL(?:_GPL|_NS)?\s*\(\s*(\w+)").expect("export pattern")
});

static MODULE_INIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(?:^|[^_\w])module_init\s*\(\s*(\w+)\s*\)").expect("init pattern"));

static MODULE_EXIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(?:^|[^_\w])module_exit\s*\(\s*(\w+)\s*\)").expect("exit pattern"));

/// Lock families: (call prefix, primitive type, locks-or-unlocks).
const LOCK_OPS: &[(&str, &str, RelType)] = &[
    ("spin_lock", "spinlock", RelType::Locks),
    ("spin_trylock", "spinlock", RelType::Locks),
    ("spin_unlock", "spinlock", RelType::Unlocks),
    ("raw_spin_lock", "spinlock", RelType::Locks),
    ("raw_spin_unlock", "spinlock", RelType::Unlocks),
    ("mutex_lock", "mutex", RelType::Locks),
    ("mutex_trylock", "mutex", RelType::Locks),
    ("mutex_unlock", "mutex", RelType::Unlocks),
    ("down_interruptible", "semaphore", RelType::Locks),
    ("down_trylock", "semaphore", RelType::Locks),
    ("read_lock", "rwlock", RelType::Locks),
    ("read_unlock", "rwlock", RelType::Unlocks),
    ("write_lock", "rwlock", RelType::Locks),
    ("write_unlock", "rwlock", RelType::Unlocks),
];

pub struct CKernelAnalyzer;

impl FileAnalyzer for CKernelAnalyzer {
    fn wants(&self, outline: &FileOutline) -> bool {
        matches!(outline.language, Some(Lang::C | Lang::Cpp))
    }

    fn visit_file(&self, parsed: &ParsedFile, outline: &mut FileOutline) {
        let content = String::from_utf8_lossy(parsed.bytes()).into_owned();

        collect_macros(parsed, outline);
        collect_ident_uses(parsed, outline);
        scan_syscalls(&content, outline);
        scan_exports(&content, outline);
        scan_module_hooks(&content, outline);
        scan_locks(parsed, outline);
    }
}

// =============================================================================
// MACRO TABLE
// =============================================================================

/// Every `#define` becomes a Macro node and an entry in the file's macro
/// table for expansion linking.
fn collect_macros(parsed: &ParsedFile, outline: &mut FileOutline) {
    let src = parsed.bytes();
    for node in parsed.capture(&["preproc_def", "preproc_function_def"]) {
        let Some(name_node) = node.child_by_field_name("name") else {
            continue;
        };
        let name = text(&name_node, src);
        let body = node
            .child_by_field_name("value")
            .map(|v| text(&v, src).trim().to_string())
            .unwrap_or_default();
        let params = node.child_by_field_name("parameters").map(|p| text(&p, src));
        let qn = format!("{}.{name}", outline.module_qn);

        outline.analyzer_nodes.push(
            NodeRow::new(NodeLabel::Macro, qn.clone())
                .prop("name", name.clone())
                .prop("body", body.clone())
                .prop_opt("params", params.clone()),
        );
        outline.analyzer_edges.push(RelRow::new(
            outline.module_ref(),
            RelType::Defines,
            NodeRef::new(NodeLabel::Macro, qn.clone()),
        ));
        outline.macros.push(MacroDef { qualified_name: qn, name, body, params });
    }
}

/// Identifiers used inside each function body, keyed by function QN.
/// Cross-referenced against include-closure macro tables later.
fn collect_ident_uses(parsed: &ParsedFile, outline: &mut FileOutline) {
    let src = parsed.bytes();
    let mut bodies: Vec<(String, usize, usize)> = Vec::new();
    for node in parsed.capture(&["function_definition"]) {
        let Some(declarator) = node.child_by_field_name("declarator") else {
            continue;
        };
        let (Some(name), Some(body)) =
            (lang::c_function_name(&declarator, src), node.child_by_field_name("body"))
        else {
            continue;
        };
        bodies.push((
            format!("{}.{name}", outline.module_qn),
            body.start_byte(),
            body.end_byte(),
        ));
    }

    for node in parsed.capture(&["identifier"]) {
        let start = node.start_byte();
        if let Some((qn, _, _)) = bodies.iter().find(|(_, lo, hi)| start > *lo && start < *hi) {
            outline.ident_uses.entry(qn.clone()).or_default().insert(text(&node, src));
        }
    }
}

// =============================================================================
// KERNEL MACRO SURFACE
// =============================================================================

fn scan_syscalls(content: &str, outline: &mut FileOutline) {
    for caps in SYSCALL_RE.captures_iter(content) {
        let compat = caps.get(1).is_some();
        let param_count: i64 = caps[2].parse().unwrap_or(0);
        let name = &caps[3];
        let key = if compat { format!("compat_{name}") } else { name.to_string() };
        let qn = format!("{}.sys_{key}", outline.module_qn);

        outline.analyzer_nodes.push(
            NodeRow::new(NodeLabel::Syscall, qn.clone())
                .prop("name", name)
                .prop("param_count", param_count),
        );
        outline.analyzer_edges.push(RelRow::new(
            outline.module_ref(),
            RelType::Defines,
            NodeRef::new(NodeLabel::Syscall, qn),
        ));
    }
}

fn scan_exports(content: &str, outline: &mut FileOutline) {
    let mut seen = BTreeSet::new();
    for caps in EXPORT_RE.captures_iter(content) {
        let symbol = caps[1].to_string();
        if !seen.insert(symbol.clone()) {
            continue;
        }
        let qn = format!("{}.{symbol}", outline.module_qn);
        outline.analyzer_nodes.push(
            NodeRow::new(NodeLabel::KernelExport, qn.clone())
                .prop("name", symbol.clone())
                .prop("symbol", symbol),
        );
        outline.analyzer_edges.push(RelRow::new(
            outline.module_ref(),
            RelType::Exports,
            NodeRef::new(NodeLabel::KernelExport, qn),
        ));
    }
}

/// `module_init(f)` / `module_exit(f)` flag their argument functions.
fn scan_module_hooks(content: &str, outline: &mut FileOutline) {
    let mut flag = |function: &str, prop: &str| {
        let qn = format!("{}.{function}", outline.module_qn);
        let defined = outline.defs.iter().any(|d| d.qualified_name == qn);
        if defined {
            outline
                .analyzer_nodes
                .push(NodeRow::new(NodeLabel::Function, qn).prop(prop, true));
        }
    };

    if let Some(caps) = MODULE_INIT_RE.captures(content) {
        flag(&caps[1], "is_module_init");
    }
    if let Some(caps) = MODULE_EXIT_RE.captures(content) {
        flag(&caps[1], "is_module_exit");
    }
}

// =============================================================================
// LOCK DISCIPLINE
// =============================================================================

/// Lock/unlock calls become edges from the enclosing function to a
/// synthesized lock variable node.
fn scan_locks(parsed: &ParsedFile, outline: &mut FileOutline) {
    let src = parsed.bytes();
    let mut synthesized: BTreeSet<String> = BTreeSet::new();
    let mut emitted: BTreeSet<(String, String, RelType)> = BTreeSet::new();

    for node in parsed.capture(&["call_expression"]) {
        let Some(function) = node.child_by_field_name("function") else {
            continue;
        };
        if function.kind() != "identifier" {
            continue;
        }
        let callee = text(&function, src);
        let Some((_, family, rel)) = LOCK_OPS
            .iter()
            .filter(|(prefix, _, _)| {
                callee == *prefix || callee.starts_with(&format!("{prefix}_"))
            })
            .max_by_key(|(prefix, _, _)| prefix.len())
        else {
            continue;
        };

        let Some(lock_name) = first_argument_identifier(&node, src) else {
            continue;
        };
        let Some(caller_qn) = enclosing_function_qn(&node, src, outline) else {
            continue;
        };

        let lock_qn = format!("{}.{lock_name}", outline.module_qn);
        if synthesized.insert(lock_qn.clone()) {
            outline.analyzer_nodes.push(
                NodeRow::new(NodeLabel::GlobalVariable, lock_qn.clone())
                    .prop("name", lock_name.clone())
                    .prop("type", *family),
            );
        }
        if emitted.insert((caller_qn.clone(), lock_qn.clone(), *rel)) {
            outline.analyzer_edges.push(RelRow::new(
                NodeRef::new(NodeLabel::Function, caller_qn),
                *rel,
                NodeRef::new(NodeLabel::GlobalVariable, lock_qn),
            ));
        }
    }
}

/// First call argument, with any leading `&` stripped.
fn first_argument_identifier(call: &Node, src: &[u8]) -> Option<String> {
    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    let first = args.named_children(&mut cursor).next()?;
    match first.kind() {
        "identifier" => Some(text(&first, src)),
        "pointer_expression" => {
            let argument = first.child_by_field_name("argument")?;
            (argument.kind() == "identifier").then(|| text(&argument, src))
        }
        "field_expression" => first.child_by_field_name("field").map(|f| text(&f, src)),
        _ => None,
    }
}

fn enclosing_function_qn(node: &Node, src: &[u8], outline: &FileOutline) -> Option<String> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.kind() == "function_definition" {
            let declarator = parent.child_by_field_name("declarator")?;
            let name = lang::c_function_name(&declarator, src)?;
            return Some(format!("{}.{name}", outline.module_qn));
        }
        current = parent.parent();
    }
    None
}
