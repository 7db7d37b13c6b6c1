//! Node and edge record types.
//!
//! These records are the stable contract between the extraction core and
//! every downstream consumer (graph import, enrichment, analytics). Field
//! names are fixed by serde attributes and must not change shape across
//! implementations.

use serde::{Deserialize, Serialize};

// ============================================================================
// Node Kinds
// ============================================================================

/// Kind of a persisted graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Source file
    File,
    /// Function, method, or stored procedure
    Function,
    /// Class, struct, interface, or module-like type
    Class,
    /// Global or static variable
    Global,
    /// Database trigger
    Trigger,
    /// Platform API entry point (annotation target for contamination seeds)
    PlatformApi,
}

impl NodeKind {
    /// String form used in record output and node identity.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::File => "File",
            NodeKind::Function => "Function",
            NodeKind::Class => "Class",
            NodeKind::Global => "Global",
            NodeKind::Trigger => "Trigger",
            NodeKind::PlatformApi => "PlatformApi",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Edge Kinds
// ============================================================================

/// Kind of a persisted graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// Symbol is defined in a file
    DefinedIn,
    /// Function calls another function by name
    Calls,
    /// Call target matched a configured platform-API pattern
    CallsPlatformApi,
    /// Class declares a base type
    InheritsFrom,
    /// Function reads a tracked global
    UsesGlobal,
    /// Function writes a global, possibly creating it implicitly
    WritesGlobal,
    /// Trigger watches a table
    Watches,
}

impl EdgeKind {
    /// String form used in record output.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::DefinedIn => "DEFINED_IN",
            EdgeKind::Calls => "CALLS",
            EdgeKind::CallsPlatformApi => "CALLS_PLATFORM_API",
            EdgeKind::InheritsFrom => "INHERITS_FROM",
            EdgeKind::UsesGlobal => "USES_GLOBAL",
            EdgeKind::WritesGlobal => "WRITES_GLOBAL",
            EdgeKind::Watches => "WATCHES",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Records
// ============================================================================

/// A persisted graph vertex.
///
/// Identity (`id`) is derived from `(kind, label)` alone, never from the
/// file, so two same-named symbols in different files merge into one node.
/// That collision is a deliberate trade-off: it produces a whole-codebase
/// call graph at the cost of per-file precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Deterministic node id
    pub id: String,
    /// Display name of the symbol
    pub label: String,
    /// Node kind
    pub kind: NodeKind,
    /// Defining file, relative to the extraction root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// 1-based declaration line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,
    /// 1-based end line, when the extent is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
    /// Approximate cyclomatic complexity for function-like nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<u32>,
    /// Declared base types for class-like nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_types: Option<Vec<String>>,
    /// Node was inferred from a reference rather than a definition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inferred: Option<bool>,
}

impl NodeRecord {
    /// Create a bare record with no positional metadata.
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            file: None,
            start_line: None,
            end_line: None,
            complexity: None,
            base_types: None,
            inferred: None,
        }
    }

    /// Attach a defining file.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Attach a line range.
    pub fn with_lines(mut self, start: usize, end: Option<usize>) -> Self {
        self.start_line = Some(start);
        self.end_line = end;
        self
    }

    /// Merge another record for the same id, filling absent properties only.
    ///
    /// Existing values always win; a later emission never downgrades a node
    /// that already carries file or position information.
    pub fn merge_absent(&mut self, other: &NodeRecord) {
        if self.file.is_none() {
            self.file = other.file.clone();
        }
        if self.start_line.is_none() {
            self.start_line = other.start_line;
            if self.end_line.is_none() {
                self.end_line = other.end_line;
            }
        }
        if self.complexity.is_none() {
            self.complexity = other.complexity;
        }
        if self.base_types.is_none() {
            self.base_types = other.base_types.clone();
        }
        // A node defined anywhere is no longer "inferred".
        if other.inferred.is_none() {
            self.inferred = None;
        }
    }
}

/// A persisted graph relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
    /// Edge kind
    pub kind: EdgeKind,
}

impl EdgeRecord {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_record_serializes_without_empty_fields() {
        let node = NodeRecord::new("n1", "main", NodeKind::Function);
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("\"id\":\"n1\""));
        assert!(json.contains("\"kind\":\"Function\""));
        assert!(!json.contains("file"));
        assert!(!json.contains("complexity"));
    }

    #[test]
    fn edge_kind_wire_names() {
        let edge = EdgeRecord::new("a", "b", EdgeKind::UsesGlobal);
        let json = serde_json::to_string(&edge).unwrap();
        assert!(json.contains("\"USES_GLOBAL\""));
        assert_eq!(EdgeKind::CallsPlatformApi.as_str(), "CALLS_PLATFORM_API");
    }

    #[test]
    fn merge_absent_fills_only_missing() {
        let mut defined = NodeRecord::new("n1", "g_count", NodeKind::Global)
            .with_file("src/state.c")
            .with_lines(10, None);
        let bare = NodeRecord::new("n1", "g_count", NodeKind::Global);
        defined.merge_absent(&bare);
        assert_eq!(defined.file.as_deref(), Some("src/state.c"));
        assert_eq!(defined.start_line, Some(10));

        let mut bare = NodeRecord::new("n1", "g_count", NodeKind::Global);
        bare.inferred = Some(true);
        let defined = NodeRecord::new("n1", "g_count", NodeKind::Global).with_file("src/state.c");
        bare.merge_absent(&defined);
        assert_eq!(bare.file.as_deref(), Some("src/state.c"));
        assert_eq!(bare.inferred, None);
    }
}
