//! Run-scoped extraction values and node identity.
//!
//! [`Definition`] and [`Reference`] are transient: they exist between an
//! adapter scan and the builder's emission, and are never persisted. Only
//! the [`relic_store::NodeRecord`] / [`relic_store::EdgeRecord`] values
//! derived from them reach the store.

use sha2::{Digest, Sha256};

pub use relic_store::{EdgeKind, EdgeRecord, NodeKind, NodeRecord};

/// Kind of a discovered symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefKind {
    Function,
    Class,
    Global,
    Trigger,
}

impl DefKind {
    /// The node kind a definition of this kind materializes as.
    pub fn node_kind(&self) -> NodeKind {
        match self {
            DefKind::Function => NodeKind::Function,
            DefKind::Class => NodeKind::Class,
            DefKind::Global => NodeKind::Global,
            DefKind::Trigger => NodeKind::Trigger,
        }
    }
}

/// A symbol discovered during Pass 1, local to one extraction run.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    /// Simple name of the symbol
    pub name: String,
    /// Symbol kind
    pub kind: DefKind,
    /// 1-based declaration line in the original file
    pub line: usize,
    /// 1-based end line, when the extent is known
    pub end_line: Option<usize>,
    /// Approximate cyclomatic complexity, function-like definitions only
    pub complexity: Option<u32>,
    /// Declared base types, class-like definitions only
    pub bases: Vec<String>,
    /// Watched table, trigger definitions only
    pub watches: Option<String>,
}

impl Definition {
    /// A function-like definition with a known body extent.
    pub fn function(name: impl Into<String>, line: usize, end_line: usize, complexity: u32) -> Self {
        Self {
            name: name.into(),
            kind: DefKind::Function,
            line,
            end_line: Some(end_line),
            complexity: Some(complexity),
            bases: Vec::new(),
            watches: None,
        }
    }

    /// A class-like definition with declared base types.
    pub fn class(name: impl Into<String>, line: usize, bases: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: DefKind::Class,
            line,
            end_line: None,
            complexity: None,
            bases,
            watches: None,
        }
    }

    /// A global or static variable.
    pub fn global(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            kind: DefKind::Global,
            line,
            end_line: None,
            complexity: None,
            bases: Vec::new(),
            watches: None,
        }
    }

    /// A trigger watching a table.
    pub fn trigger(name: impl Into<String>, line: usize, watches: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DefKind::Trigger,
            line,
            end_line: None,
            complexity: None,
            bases: Vec::new(),
            watches: Some(watches.into()),
        }
    }

    /// Shift all line numbers by `offset` (chunked and wrapped parses).
    pub fn shift_lines(&mut self, offset: isize) {
        self.line = shift(self.line, offset);
        if let Some(end) = self.end_line {
            self.end_line = Some(shift(end, offset));
        }
    }
}

fn shift(line: usize, offset: isize) -> usize {
    let shifted = line as isize + offset;
    shifted.max(1) as usize
}

/// Kind of a discovered relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// Call to a function by simple name
    Call,
    /// Read of a tracked global
    Usage,
    /// Trigger watching a table
    Watches,
    /// Write to a global that may not be declared anywhere
    ImplicitWrite,
}

/// A relation from a defining symbol to a target name, found in Pass 2.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Name of the enclosing definition
    pub source: String,
    /// Simple name of the target
    pub target: String,
    /// Relation kind
    pub kind: RefKind,
}

impl Reference {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: RefKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }

    pub fn call(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(source, target, RefKind::Call)
    }

    pub fn usage(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(source, target, RefKind::Usage)
    }
}

/// Deterministic node identity from `(kind, name)`.
///
/// Identity deliberately excludes the file: two same-named symbols in
/// different files collapse into one node, producing a whole-codebase call
/// graph at the cost of per-file precision. Both extraction passes and
/// repeated runs derive the same id without any shared lookup table, which
/// is what allows streaming, memory-bounded emission.
pub fn node_id(kind: NodeKind, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(name.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    // 16 hex chars keeps ids short; collisions would need ~2^32 symbols.
    format!("n{}", &digest[..16])
}
