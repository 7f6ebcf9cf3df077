//! Language registry: one profile per supported language.
//!
//! A [`LanguageProfile`] bundles the tree-sitter grammar with the node-kind
//! sets the extraction passes need: which kinds are function-like, which
//! are class-like, where the module scope starts, what a call or an import
//! looks like. The registry is built once at startup and read-only after
//! that.
//!
//! Language-specific syntax knowledge (name extraction, import targets,
//! call receivers, base classes) lives in the per-language modules and is
//! dispatched through the profile.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tree_sitter::{Language, Node};

use crate::graph::ClassKind;

mod c;
mod go;
mod java;
mod javascript;
mod python;
mod rust;
mod scala;

pub use c::{
    deepest_identifier as c_deepest_identifier, function_declarator_name as c_function_name,
};

// =============================================================================
// LANGUAGE TAGS
// =============================================================================

/// Supported source languages, plus the non-grammar tags discovery assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Python,
    JavaScript,
    TypeScript,
    Rust,
    Go,
    Java,
    Scala,
    C,
    Cpp,
    /// Gherkin feature files; parsed by the BDD analyzer, not tree-sitter.
    Gherkin,
    /// Build/config files recognized by basename; parsed by the config analyzer.
    Config,
}

impl Lang {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Java => "java",
            Self::Scala => "scala",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Gherkin => "gherkin",
            Self::Config => "config",
        }
    }

    /// True when a tree-sitter grammar backs this tag.
    pub fn has_grammar(&self) -> bool {
        !matches!(self, Self::Gherkin | Self::Config)
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a call site addresses its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// Bare identifier: `f()`.
    Free,
    /// Receiver call: `obj.m()`.
    Method,
    /// Dotted path: `a.b.c()`.
    Qualified,
    /// Parent-class call: `super().m()` / `super.m()`.
    Super,
}

/// A call target as seen at the call site, before resolution.
#[derive(Debug, Clone)]
pub struct CalleeRef {
    pub name: String,
    pub kind: CallKind,
    /// Receiver text for method calls (`obj` in `obj.m()`).
    pub receiver: Option<String>,
    /// Leading path for qualified calls (`a.b` in `a.b.c()`).
    pub qualifier: Option<String>,
}

// =============================================================================
// LANGUAGE PROFILES
// =============================================================================

/// Grammar handle plus the node-kind vocabulary of one language.
pub struct LanguageProfile {
    pub lang: Lang,
    pub grammar: Language,
    pub extensions: &'static [&'static str],
    /// Kinds that define functions (free or method, decided by context).
    pub function_kinds: &'static [&'static str],
    /// Kinds that define class-like entities.
    pub class_kinds: &'static [&'static str],
    /// Kinds that own methods without emitting a class node themselves
    /// (e.g. Rust `impl` blocks). Class kinds are owners implicitly.
    pub owner_kinds: &'static [&'static str],
    /// Kinds that contribute a namespace segment to nested names.
    pub namespace_kinds: &'static [&'static str],
    /// Root kinds that stop the enclosing-scope walk.
    pub module_kinds: &'static [&'static str],
    pub call_kinds: &'static [&'static str],
    pub import_kinds: &'static [&'static str],
    /// Files whose presence makes a directory a Package.
    pub package_indicators: &'static [&'static str],
}

impl LanguageProfile {
    pub fn is_function_kind(&self, kind: &str) -> bool {
        self.function_kinds.contains(&kind)
    }

    pub fn is_class_kind(&self, kind: &str) -> bool {
        self.class_kinds.contains(&kind)
    }

    pub fn is_owner_kind(&self, kind: &str) -> bool {
        self.owner_kinds.contains(&kind) || self.class_kinds.contains(&kind)
    }

    pub fn is_module_kind(&self, kind: &str) -> bool {
        self.module_kinds.contains(&kind)
    }

    /// Struct/Union/Enum/Class flavor for a class-like node kind.
    pub fn class_kind_of(&self, node: &Node) -> ClassKind {
        match node.kind() {
            "struct_specifier" | "struct_item" | "record_declaration" => ClassKind::Struct,
            "union_specifier" | "union_item" => ClassKind::Union,
            "enum_specifier" | "enum_item" | "enum_declaration" => ClassKind::Enum,
            "type_spec" => go::spec_class_kind(node),
            _ => ClassKind::Class,
        }
    }

    /// Whether a class-like node is abstract (interface, trait, ...).
    pub fn is_abstract(&self, node: &Node, src: &[u8]) -> bool {
        match node.kind() {
            "interface_declaration" | "trait_item" | "trait_definition" => true,
            "abstract_class_declaration" => true,
            "type_spec" => go::spec_is_interface(node),
            "class_definition" if self.lang == Lang::Python => python::has_abstract_base(node, src),
            _ => false,
        }
    }

    /// The defined name of a function/class-like node, if extractable.
    pub fn node_name(&self, node: &Node, src: &[u8]) -> Option<String> {
        match self.lang {
            Lang::C | Lang::Cpp => c::node_name(node, src),
            Lang::Rust => rust::node_name(node, src),
            Lang::Go => go::node_name(node, src),
            _ => node
                .child_by_field_name("name")
                .map(|n| text(&n, src)),
        }
    }

    /// Raw imports declared by an import-kind node.
    pub fn collect_imports(&self, node: &Node, src: &[u8], out: &mut Vec<RawImport>) {
        match self.lang {
            Lang::Python => python::collect_imports(node, src, out),
            Lang::JavaScript | Lang::TypeScript => javascript::collect_imports(node, src, out),
            Lang::Rust => rust::collect_imports(node, src, out),
            Lang::Go => go::collect_imports(node, src, out),
            Lang::Java => java::collect_imports(node, src, out),
            Lang::Scala => scala::collect_imports(node, src, out),
            Lang::C | Lang::Cpp => c::collect_imports(node, src, out),
            _ => {}
        }
    }

    /// Call target of a call-kind node.
    pub fn callee_of(&self, node: &Node, src: &[u8]) -> Option<CalleeRef> {
        match self.lang {
            Lang::Java => java::callee_of(node, src),
            _ => shared_callee_of(node, src),
        }
    }

    /// Base-class names (extends + implements) of a class-like node.
    pub fn bases_of(&self, node: &Node, src: &[u8]) -> Vec<RawBase> {
        match self.lang {
            Lang::Python => python::bases_of(node, src),
            Lang::JavaScript | Lang::TypeScript => javascript::bases_of(node, src),
            Lang::Java => java::bases_of(node, src),
            Lang::Scala => scala::bases_of(node, src),
            Lang::Cpp => c::bases_of(node, src),
            _ => Vec::new(),
        }
    }

    /// Exported symbol names declared at a node, for languages with
    /// explicit export syntax.
    pub fn exports_of(&self, node: &Node, src: &[u8]) -> Vec<String> {
        match self.lang {
            Lang::JavaScript | Lang::TypeScript => javascript::exports_of(node, src),
            Lang::Python => python::exports_of(node, src),
            _ => Vec::new(),
        }
    }
}

/// A raw import statement before resolution.
#[derive(Debug, Clone)]
pub struct RawImport {
    /// Textual target as written: `./a`, `pkg.mod`, `crate::x`, `stdio.h`.
    pub target: String,
    pub alias: Option<String>,
    /// Named items (`from m import a, b` / `import {a, b}`).
    pub items: Vec<String>,
    pub is_wildcard: bool,
    /// Angle-bracket include or otherwise known-external target.
    pub system: bool,
    pub line: u32,
}

impl RawImport {
    pub fn new(target: impl Into<String>, line: u32) -> Self {
        Self {
            target: target.into(),
            alias: None,
            items: Vec::new(),
            is_wildcard: false,
            system: false,
            line,
        }
    }
}

/// How a base-class reference relates subclass to superclass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseKind {
    Extends,
    Implements,
}

/// A textual base-class reference before resolution.
#[derive(Debug, Clone)]
pub struct RawBase {
    pub name: String,
    pub kind: BaseKind,
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Extension-indexed registry of language profiles.
pub struct LanguageRegistry {
    by_extension: HashMap<String, Arc<LanguageProfile>>,
}

impl LanguageRegistry {
    /// Build the registry with every built-in language.
    pub fn new() -> Self {
        let mut registry = Self { by_extension: HashMap::new() };

        registry.register(python::profile());
        registry.register(javascript::javascript());
        registry.register(javascript::typescript());
        registry.register(rust::profile());
        registry.register(go::profile());
        registry.register(java::profile());
        registry.register(scala::profile());
        registry.register(c::c());
        registry.register(c::cpp());

        registry
    }

    fn register(&mut self, profile: LanguageProfile) {
        let profile = Arc::new(profile);
        for ext in profile.extensions {
            self.by_extension.insert(ext.to_string(), Arc::clone(&profile));
        }
    }

    pub fn profile_for_extension(&self, extension: &str) -> Option<Arc<LanguageProfile>> {
        self.by_extension.get(&extension.to_lowercase()).cloned()
    }

    pub fn profile_for(&self, lang: Lang) -> Option<Arc<LanguageProfile>> {
        self.by_extension.values().find(|p| p.lang == lang).cloned()
    }

    /// All package-indicator basenames across registered languages.
    pub fn package_indicators(&self) -> Vec<&'static str> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for profile in self.by_extension.values() {
            for indicator in profile.package_indicators {
                if seen.insert(*indicator) {
                    out.push(*indicator);
                }
            }
        }
        out.sort_unstable();
        out
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SHARED NODE HELPERS
// =============================================================================

/// Node text from source bytes.
pub fn text(node: &Node, src: &[u8]) -> String {
    node.utf8_text(src).unwrap_or_default().to_string()
}

/// 1-based start line.
pub fn line_of(node: &Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based end line.
pub fn end_line_of(node: &Node) -> u32 {
    node.end_position().row as u32 + 1
}

/// Call-target extraction shared by the dot-syntax languages.
///
/// Handles `f()`, `obj.m()`, `a.b.c()` and `new Foo()` shapes; anything
/// stranger (computed receivers, IIFEs) returns `None` and the call is
/// dropped rather than guessed.
fn shared_callee_of(node: &Node, src: &[u8]) -> Option<CalleeRef> {
    if node.kind() == "new_expression" || node.kind() == "object_creation_expression" {
        let ctor = node
            .child_by_field_name("constructor")
            .or_else(|| node.child_by_field_name("type"))?;
        return Some(CalleeRef {
            name: text(&ctor, src),
            kind: CallKind::Free,
            receiver: None,
            qualifier: None,
        });
    }

    let func = node.child_by_field_name("function")?;
    match func.kind() {
        "identifier" => Some(CalleeRef {
            name: text(&func, src),
            kind: CallKind::Free,
            receiver: None,
            qualifier: None,
        }),
        // Python: obj.method
        "attribute" => {
            let attr = func.child_by_field_name("attribute")?;
            let obj = func.child_by_field_name("object")?;
            let receiver = text(&obj, src);
            classify_dotted(text(&attr, src), receiver, src, &obj)
        }
        // JS/TS: obj.method
        "member_expression" => {
            let prop = func.child_by_field_name("property")?;
            let obj = func.child_by_field_name("object")?;
            let receiver = text(&obj, src);
            classify_dotted(text(&prop, src), receiver, src, &obj)
        }
        // Rust/Go/Scala path calls: a::b / pkg.Fn
        "scoped_identifier" | "selector_expression" | "field_expression" => {
            let name = func
                .child_by_field_name("name")
                .or_else(|| func.child_by_field_name("field"))
                .map(|n| text(&n, src))?;
            let qualifier = func
                .child_by_field_name("path")
                .or_else(|| func.child_by_field_name("operand"))
                .or_else(|| func.child_by_field_name("argument"))
                .map(|n| text(&n, src));
            Some(CalleeRef { name, kind: CallKind::Qualified, receiver: qualifier.clone(), qualifier })
        }
        _ => None,
    }
}

fn classify_dotted(name: String, receiver: String, src: &[u8], obj: &Node) -> Option<CalleeRef> {
    if receiver == "super" || receiver.starts_with("super(") {
        return Some(CalleeRef { name, kind: CallKind::Super, receiver: Some(receiver), qualifier: None });
    }
    // `a.b.c()` with a dotted receiver reads as a qualified path, a plain
    // identifier receiver as a method call.
    let is_path = matches!(obj.kind(), "attribute" | "member_expression")
        && !text(obj, src).contains('(');
    if is_path {
        Some(CalleeRef { name, kind: CallKind::Qualified, receiver: Some(receiver.clone()), qualifier: Some(receiver) })
    } else {
        Some(CalleeRef { name, kind: CallKind::Method, receiver: Some(receiver), qualifier: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_all_extensions() {
        let registry = LanguageRegistry::new();

        for ext in ["py", "pyi", "js", "jsx", "mjs", "cjs", "ts", "tsx", "rs", "go", "java", "scala", "c", "h", "cpp", "cc", "hpp"] {
            assert!(
                registry.profile_for_extension(ext).is_some(),
                "missing profile for .{ext}"
            );
        }
        assert!(registry.profile_for_extension("xyz").is_none());
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        let registry = LanguageRegistry::new();
        assert!(registry.profile_for_extension("PY").is_some());
        assert!(registry.profile_for_extension("Rs").is_some());
    }

    #[test]
    fn package_indicators_are_collected() {
        let registry = LanguageRegistry::new();
        let indicators = registry.package_indicators();
        assert!(indicators.contains(&"__init__.py"));
        assert!(indicators.contains(&"package.json"));
        assert!(indicators.contains(&"Cargo.toml"));
        assert!(indicators.contains(&"go.mod"));
    }

    #[test]
    fn profiles_carry_grammar_vocabulary() {
        let registry = LanguageRegistry::new();
        let py = registry.profile_for(Lang::Python).unwrap();
        assert!(py.is_function_kind("function_definition"));
        assert!(py.is_class_kind("class_definition"));
        assert!(py.is_module_kind("module"));

        let c = registry.profile_for(Lang::C).unwrap();
        assert!(c.is_function_kind("function_definition"));
        assert!(c.is_class_kind("struct_specifier"));
    }
}
