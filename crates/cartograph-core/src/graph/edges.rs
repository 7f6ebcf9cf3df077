//! Relationship types and edge rows.
//!
//! Edges are directed, typed and merge on the `(source, type, target)`
//! triple; optional properties ride along on first emission.

use serde::{Deserialize, Serialize};

use super::{NodeRef, PropMap, PropValue};

// =============================================================================
// RELATIONSHIP TYPES
// =============================================================================

/// Every relationship type the graph can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelType {
    ContainsPackage,
    ContainsFolder,
    ContainsFile,
    ContainsModule,
    Defines,
    DefinesMethod,
    Imports,
    Exports,
    CircularDependency,
    Calls,
    InheritsFrom,
    Implements,
    Overrides,
    PointsTo,
    AssignsFp,
    InvokesFp,
    Locks,
    Unlocks,
    ExpandsTo,
    Tests,
    Asserts,
    InSuite,
    InTest,
    InFeature,
    InScenario,
    ImplementsStep,
    GivenLinksTo,
    WhenLinksTo,
    ThenLinksTo,
    HasVulnerability,
    FlowsTo,
    Modifies,
    DependsOnExternal,
    ModifiedIn,
    Authored,
}

impl RelType {
    /// Type string as written in Cypher.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContainsPackage => "CONTAINS_PACKAGE",
            Self::ContainsFolder => "CONTAINS_FOLDER",
            Self::ContainsFile => "CONTAINS_FILE",
            Self::ContainsModule => "CONTAINS_MODULE",
            Self::Defines => "DEFINES",
            Self::DefinesMethod => "DEFINES_METHOD",
            Self::Imports => "IMPORTS",
            Self::Exports => "EXPORTS",
            Self::CircularDependency => "CIRCULAR_DEPENDENCY",
            Self::Calls => "CALLS",
            Self::InheritsFrom => "INHERITS_FROM",
            Self::Implements => "IMPLEMENTS",
            Self::Overrides => "OVERRIDES",
            Self::PointsTo => "POINTS_TO",
            Self::AssignsFp => "ASSIGNS_FP",
            Self::InvokesFp => "INVOKES_FP",
            Self::Locks => "LOCKS",
            Self::Unlocks => "UNLOCKS",
            Self::ExpandsTo => "EXPANDS_TO",
            Self::Tests => "TESTS",
            Self::Asserts => "ASSERTS",
            Self::InSuite => "IN_SUITE",
            Self::InTest => "IN_TEST",
            Self::InFeature => "IN_FEATURE",
            Self::InScenario => "IN_SCENARIO",
            Self::ImplementsStep => "IMPLEMENTS_STEP",
            Self::GivenLinksTo => "GIVEN_LINKS_TO",
            Self::WhenLinksTo => "WHEN_LINKS_TO",
            Self::ThenLinksTo => "THEN_LINKS_TO",
            Self::HasVulnerability => "HAS_VULNERABILITY",
            Self::FlowsTo => "FLOWS_TO",
            Self::Modifies => "MODIFIES",
            Self::DependsOnExternal => "DEPENDS_ON_EXTERNAL",
            Self::ModifiedIn => "MODIFIED_IN",
            Self::Authored => "AUTHORED",
        }
    }

    /// True for the edges that form the containment forest.
    pub fn is_containment(&self) -> bool {
        matches!(
            self,
            Self::ContainsPackage
                | Self::ContainsFolder
                | Self::ContainsFile
                | Self::ContainsModule
                | Self::Defines
                | Self::DefinesMethod
        )
    }
}

impl std::fmt::Display for RelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// EDGE ROWS
// =============================================================================

/// One relationship ready for emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelRow {
    pub src: NodeRef,
    pub rel: RelType,
    pub dst: NodeRef,
    pub props: PropMap,
}

impl RelRow {
    pub fn new(src: NodeRef, rel: RelType, dst: NodeRef) -> Self {
        Self { src, rel, dst, props: PropMap::new() }
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

    /// Key identifying this edge for dedup and idempotent merge.
    pub fn merge_key(&self) -> (NodeRef, RelType, NodeRef) {
        (self.src.clone(), self.rel, self.dst.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeLabel;

    #[test]
    fn rel_type_strings_are_screaming_snake() {
        assert_eq!(RelType::ContainsPackage.as_str(), "CONTAINS_PACKAGE");
        assert_eq!(RelType::InheritsFrom.as_str(), "INHERITS_FROM");
        assert_eq!(RelType::GivenLinksTo.as_str(), "GIVEN_LINKS_TO");
    }

    #[test]
    fn containment_classification() {
        assert!(RelType::Defines.is_containment());
        assert!(RelType::ContainsModule.is_containment());
        assert!(!RelType::Calls.is_containment());
        assert!(!RelType::Imports.is_containment());
    }

    #[test]
    fn edge_merge_key_ignores_props() {
        let a = NodeRef::new(NodeLabel::Function, "p.a");
        let b = NodeRef::new(NodeLabel::Function, "p.b");
        let e1 = RelRow::new(a.clone(), RelType::Calls, b.clone()).prop("line", 4u32);
        let e2 = RelRow::new(a, RelType::Calls, b);
        assert_eq!(e1.merge_key(), e2.merge_key());
    }
}
