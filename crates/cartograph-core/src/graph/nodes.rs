//! Node labels and entity types for the code knowledge graph.
//!
//! Every label merges on exactly one key property; `NodeLabel::merge_key`
//! names it. The entity structs here are what pass-1 extraction produces;
//! they flatten into `NodeRow`s for the writer.

use serde::{Deserialize, Serialize};

use super::{NodeRef, PropMap, PropValue};

// =============================================================================
// NODE LABELS
// =============================================================================

/// Every node label the graph can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    Project,
    Package,
    Folder,
    File,
    Module,
    Class,
    Struct,
    Union,
    Enum,
    Function,
    Method,
    Macro,
    GlobalVariable,
    Typedef,
    Pointer,
    FunctionPointer,
    Syscall,
    KernelExport,
    TestSuite,
    TestCase,
    Assertion,
    BddFeature,
    BddScenario,
    BddStep,
    ExternalPackage,
    Vulnerability,
    ConfigSetting,
    Contributor,
    Commit,
}

impl NodeLabel {
    /// Label string as written in Cypher.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "Project",
            Self::Package => "Package",
            Self::Folder => "Folder",
            Self::File => "File",
            Self::Module => "Module",
            Self::Class => "Class",
            Self::Struct => "Struct",
            Self::Union => "Union",
            Self::Enum => "Enum",
            Self::Function => "Function",
            Self::Method => "Method",
            Self::Macro => "Macro",
            Self::GlobalVariable => "GlobalVariable",
            Self::Typedef => "Typedef",
            Self::Pointer => "Pointer",
            Self::FunctionPointer => "FunctionPointer",
            Self::Syscall => "Syscall",
            Self::KernelExport => "KernelExport",
            Self::TestSuite => "TestSuite",
            Self::TestCase => "TestCase",
            Self::Assertion => "Assertion",
            Self::BddFeature => "BDDFeature",
            Self::BddScenario => "BDDScenario",
            Self::BddStep => "BDDStep",
            Self::ExternalPackage => "ExternalPackage",
            Self::Vulnerability => "Vulnerability",
            Self::ConfigSetting => "ConfigSetting",
            Self::Contributor => "Contributor",
            Self::Commit => "Commit",
        }
    }

    /// The property this label merges on.
    pub fn merge_key(&self) -> &'static str {
        match self {
            Self::Project | Self::ExternalPackage => "name",
            Self::Folder | Self::File => "path",
            Self::Vulnerability => "id",
            Self::Contributor => "email",
            Self::Commit => "sha",
            _ => "qualified_name",
        }
    }

    /// True for labels whose instances can be call targets.
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function | Self::Method)
    }
}

impl std::fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// NODE ROWS
// =============================================================================

/// One node ready for emission: label, merge-key value and properties.
///
/// The merge-key property is carried inside `props` as well so the writer
/// can pass the whole map through one parameterized statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRow {
    pub label: NodeLabel,
    pub key: String,
    pub props: PropMap,
}

impl NodeRow {
    pub fn new(label: NodeLabel, key: impl Into<String>) -> Self {
        let key = key.into();
        let mut props = PropMap::new();
        props.insert(label.merge_key().to_string(), PropValue::Str(key.clone()));
        Self { label, key, props }
    }

    pub fn prop(mut self, name: &str, value: impl Into<PropValue>) -> Self {
        self.props.insert(name.to_string(), value.into());
        self
    }

    /// Set a property only when the value is present.
    pub fn prop_opt(mut self, name: &str, value: Option<impl Into<PropValue>>) -> Self {
        if let Some(v) = value {
            self.props.insert(name.to_string(), v.into());
        }
        self
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.label, self.key.clone())
    }
}

// =============================================================================
// CORE ENTITIES
// =============================================================================

/// A source module (one parsed file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleEntity {
    /// Project-rooted dotted path, e.g. `proj.pkg.util`.
    pub qualified_name: String,
    pub name: String,
    /// Path relative to the repository root.
    pub path: String,
    pub language: String,
    pub byte_size: u64,
}

impl ModuleEntity {
    pub fn into_row(self) -> NodeRow {
        NodeRow::new(NodeLabel::Module, self.qualified_name)
            .prop("name", self.name)
            .prop("path", self.path)
            .prop("language", self.language)
            .prop("byte_size", self.byte_size)
    }
}

/// The flavor of a class-like definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    Class,
    Struct,
    Union,
    Enum,
}

impl ClassKind {
    pub fn label(&self) -> NodeLabel {
        match self {
            Self::Class => NodeLabel::Class,
            Self::Struct => NodeLabel::Struct,
            Self::Union => NodeLabel::Union,
            Self::Enum => NodeLabel::Enum,
        }
    }
}

/// A class, struct, union or enum definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassEntity {
    pub qualified_name: String,
    pub name: String,
    pub kind: ClassKind,
    pub language: String,
    pub start_line: u32,
    pub end_line: u32,
    pub is_abstract: bool,
    pub docstring: Option<String>,
}

impl ClassEntity {
    pub fn into_row(self) -> NodeRow {
        NodeRow::new(self.kind.label(), self.qualified_name)
            .prop("name", self.name)
            .prop("language", self.language)
            .prop("start_line", self.start_line)
            .prop("end_line", self.end_line)
            .prop("is_abstract", self.is_abstract)
            .prop_opt("docstring", self.docstring)
    }
}

/// A free function, possibly nested inside another function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionEntity {
    pub qualified_name: String,
    pub name: String,
    pub language: String,
    pub start_line: u32,
    pub end_line: u32,
    pub signature: Option<String>,
    pub docstring: Option<String>,
}

impl FunctionEntity {
    pub fn into_row(self) -> NodeRow {
        NodeRow::new(NodeLabel::Function, self.qualified_name)
            .prop("name", self.name)
            .prop("language", self.language)
            .prop("start_line", self.start_line)
            .prop("end_line", self.end_line)
            .prop_opt("signature", self.signature)
            .prop_opt("docstring", self.docstring)
    }
}

/// A function defined syntactically inside a class body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodEntity {
    pub qualified_name: String,
    pub name: String,
    pub parent_class: String,
    pub language: String,
    pub start_line: u32,
    pub end_line: u32,
    pub docstring: Option<String>,
}

impl MethodEntity {
    pub fn into_row(self) -> NodeRow {
        NodeRow::new(NodeLabel::Method, self.qualified_name)
            .prop("name", self.name)
            .prop("parent_class", self.parent_class)
            .prop("language", self.language)
            .prop("start_line", self.start_line)
            .prop("end_line", self.end_line)
            .prop_opt("docstring", self.docstring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_key_follows_label() {
        assert_eq!(NodeLabel::Project.merge_key(), "name");
        assert_eq!(NodeLabel::File.merge_key(), "path");
        assert_eq!(NodeLabel::Function.merge_key(), "qualified_name");
        assert_eq!(NodeLabel::Contributor.merge_key(), "email");
    }

    #[test]
    fn row_carries_merge_key_property() {
        let row = NodeRow::new(NodeLabel::Function, "proj.m.f").prop("start_line", 3u32);
        assert_eq!(
            row.props.get("qualified_name"),
            Some(&PropValue::Str("proj.m.f".into()))
        );
        assert_eq!(row.props.get("start_line"), Some(&PropValue::Int(3)));
    }
}
