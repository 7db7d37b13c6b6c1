//! Language adapters.
//!
//! One adapter per language family, all conforming to the same contract:
//! one-time [`SourceAdapter::init`], a [`SourceAdapter::parse`] that never
//! fails (it degrades to a tagged fallback result instead, because one
//! malformed file must not abort a multi-thousand-file run), and the two
//! extraction passes [`SourceAdapter::scan_definitions`] /
//! [`SourceAdapter::scan_references`].
//!
//! ## Supported Languages
//!
//! - C family (.c, .cc, .cpp, .cxx, .h, .hh, .hpp, .hxx, .inl)
//! - C# (.cs)
//! - TypeScript (.ts, .tsx)
//! - VB (.vb)
//! - Embedded pages (.asp, .aspx, .cshtml, .razor)
//! - SQL (.sql)

pub mod cpp;
pub mod csharp;
pub mod page;
pub mod sql;
pub mod typescript;
pub mod vb;

pub use cpp::CppAdapter;
pub use csharp::CSharpAdapter;
pub use page::PageAdapter;
pub use sql::SqlAdapter;
pub use typescript::TypeScriptAdapter;
pub use vb::VbAdapter;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::warn;
use tree_sitter::{Node, Tree};

use crate::model::{Definition, Reference};

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur while setting an adapter up.
///
/// Parsing and scanning never error; only `init` can.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Grammar rejected by the tree-sitter runtime (ABI mismatch)
    #[error("failed to load grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),
}

// ============================================================================
// Source Languages
// ============================================================================

/// Language families with a dedicated adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceLanguage {
    /// C and C++ systems code
    CFamily,
    /// C# managed code
    CSharp,
    /// TypeScript / TSX
    TypeScript,
    /// VB.NET / VBScript
    Vb,
    /// Markup pages embedding C# or VB
    Page,
    /// T-SQL stored procedures and triggers
    Sql,
}

impl SourceLanguage {
    /// Detect language from file extension.
    ///
    /// Returns `None` if the extension is not recognized; such files are
    /// skipped, not treated as errors.
    pub fn from_extension(ext: &str) -> Option<Self> {
        extension_map().get(ext.to_lowercase().as_str()).copied()
    }

    /// Detect language from file path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// All extensions handled by some adapter.
    pub fn all_extensions() -> &'static [&'static str] {
        &[
            "c", "cc", "cpp", "cxx", "h", "hh", "hpp", "hxx", "inl", "cs", "ts", "tsx", "vb",
            "asp", "aspx", "cshtml", "razor", "sql",
        ]
    }

    /// Whether a path belongs to some supported language.
    pub fn is_supported(path: &Path) -> bool {
        Self::from_path(path).is_some()
    }
}

static EXTENSION_MAP: OnceLock<HashMap<&'static str, SourceLanguage>> = OnceLock::new();

fn extension_map() -> &'static HashMap<&'static str, SourceLanguage> {
    EXTENSION_MAP.get_or_init(|| {
        let mut map = HashMap::new();
        for ext in ["c", "cc", "cpp", "cxx", "h", "hh", "hpp", "hxx", "inl"] {
            map.insert(ext, SourceLanguage::CFamily);
        }
        map.insert("cs", SourceLanguage::CSharp);
        map.insert("ts", SourceLanguage::TypeScript);
        map.insert("tsx", SourceLanguage::TypeScript);
        map.insert("vb", SourceLanguage::Vb);
        for ext in ["asp", "aspx", "cshtml", "razor"] {
            map.insert(ext, SourceLanguage::Page);
        }
        map.insert("sql", SourceLanguage::Sql);
        map
    })
}

// ============================================================================
// Parse Output
// ============================================================================

/// Tagged result of [`SourceAdapter::parse`].
///
/// Adapters produce the variants they own and must tolerate any other
/// variant by returning empty scan results.
pub enum ParseOutput {
    /// One tree-sitter tree over the (possibly truncated) source.
    Tree { tree: Tree, source: String },
    /// Oversized C-family source split into independently parsed chunks.
    Chunked { chunks: Vec<ParsedChunk> },
    /// Structural parsing failed; only regex definition scanning applies.
    Fallback { source: String },
    /// Pattern-scanned source with no structural representation (SQL, VB).
    Text { source: String },
    /// Delegated page parse, tagged with the delegate and line correction.
    Page {
        inner: Box<ParseOutput>,
        delegate: PageDelegate,
        line_shift: isize,
    },
}

/// One independently parsed chunk of an oversized source.
pub struct ParsedChunk {
    /// Parse tree, `None` when this chunk fell back to regex scanning.
    pub tree: Option<Tree>,
    /// Chunk text, aligned with `tree` when present.
    pub source: String,
    /// Lines preceding this chunk in the original file.
    pub line_offset: usize,
}

/// Which managed-language adapter a page parse was delegated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDelegate {
    CSharp,
    Vb,
}

// ============================================================================
// Adapter Contract
// ============================================================================

/// Common capability set of every language adapter.
pub trait SourceAdapter: Send + Sync {
    /// One-time setup (grammar loading). Called once per process, before
    /// any parallel per-file work; reused across all files of the language.
    fn init(&mut self) -> Result<(), AdapterError>;

    /// Convert source text into the adapter's parse representation.
    ///
    /// Must not fail for any input: oversized sources are truncated and
    /// unparseable ones degrade to [`ParseOutput::Fallback`].
    fn parse(&self, source: &str, path: Option<&Path>) -> ParseOutput;

    /// Pass 1: single traversal yielding functions, classes (with declared
    /// base types), and global/static variables.
    fn scan_definitions(&self, parsed: &ParseOutput) -> Vec<Definition>;

    /// Pass 2: call and global-usage references, resolved against the
    /// complete known-globals set from Pass 1.
    fn scan_references(&self, parsed: &ParseOutput, globals: &HashSet<String>) -> Vec<Reference>;
}

// ============================================================================
// Adapter Set
// ============================================================================

/// Size limits applied before parsing.
#[derive(Debug, Clone, Copy)]
pub struct SizeLimits {
    /// Hard cap; larger sources are truncated (lossy, logged, never fatal).
    pub max_file_bytes: usize,
    /// C-family chunking threshold.
    pub chunk_threshold_bytes: usize,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: relic_config::DEFAULT_MAX_FILE_BYTES,
            chunk_threshold_bytes: relic_config::DEFAULT_CHUNK_THRESHOLD_BYTES,
        }
    }
}

/// The full adapter family, dispatched by file extension.
pub struct AdapterSet {
    cpp: CppAdapter,
    csharp: CSharpAdapter,
    typescript: TypeScriptAdapter,
    vb: VbAdapter,
    page: PageAdapter,
    sql: SqlAdapter,
}

impl AdapterSet {
    pub fn new(limits: SizeLimits) -> Self {
        Self {
            cpp: CppAdapter::new(limits),
            csharp: CSharpAdapter::new(limits),
            typescript: TypeScriptAdapter::new(limits),
            vb: VbAdapter::new(),
            page: PageAdapter::new(limits),
            sql: SqlAdapter::new(),
        }
    }

    /// Initialize every adapter. Must complete before parallel file work
    /// starts; grammar setup is not assumed safe to run concurrently.
    pub fn init_all(&mut self) -> Result<(), AdapterError> {
        self.cpp.init()?;
        self.csharp.init()?;
        self.typescript.init()?;
        self.vb.init()?;
        self.page.init()?;
        self.sql.init()?;
        Ok(())
    }

    /// Adapter for a source language.
    pub fn adapter_for(&self, language: SourceLanguage) -> &dyn SourceAdapter {
        match language {
            SourceLanguage::CFamily => &self.cpp,
            SourceLanguage::CSharp => &self.csharp,
            SourceLanguage::TypeScript => &self.typescript,
            SourceLanguage::Vb => &self.vb,
            SourceLanguage::Page => &self.page,
            SourceLanguage::Sql => &self.sql,
        }
    }

    /// Adapter for a file path, `None` for unsupported extensions.
    pub fn adapter_for_path(&self, path: &Path) -> Option<&dyn SourceAdapter> {
        SourceLanguage::from_path(path).map(|lang| self.adapter_for(lang))
    }
}

impl Default for AdapterSet {
    fn default() -> Self {
        Self::new(SizeLimits::default())
    }
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// Truncate oversized source on a char boundary, logging the loss.
pub(crate) fn truncate_source<'a>(source: &'a str, cap: usize, path: Option<&Path>) -> &'a str {
    if source.len() <= cap {
        return source;
    }
    let mut end = cap;
    while !source.is_char_boundary(end) {
        end -= 1;
    }
    warn!(
        "source too large ({} bytes), truncating to {} bytes{}",
        source.len(),
        end,
        path.map(|p| format!(" ({})", p.display())).unwrap_or_default()
    );
    &source[..end]
}

/// Labels above this length are cut with an ellipsis.
const MAX_LABEL_LEN: usize = 128;

/// Truncate pathological symbol labels (templated C++ names, generated code).
pub(crate) fn truncate_label(label: &str) -> String {
    if label.len() <= MAX_LABEL_LEN {
        return label.to_string();
    }
    let mut end = MAX_LABEL_LEN - 3;
    while !label.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &label[..end])
}

/// Approximate cyclomatic complexity of a function-like subtree.
///
/// 1 + one per branching construct + one per short-circuit `&&` / `||`.
/// This approximates, rather than exactly replicates, standard cyclomatic
/// complexity; it is used as a relative signal only.
pub(crate) fn tree_complexity(root: Node, source: &[u8], branching: &[&str]) -> u32 {
    let mut complexity = 1;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let kind = node.kind();
        if branching.contains(&kind) {
            complexity += 1;
        }
        if kind == "binary_expression" {
            if let Some(op) = node.child_by_field_name("operator") {
                if let Ok(text) = op.utf8_text(source) {
                    if text == "&&" || text == "||" {
                        complexity += 1;
                    }
                }
            }
        }
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                stack.push(child);
            }
        }
    }
    complexity
}

/// UTF-8 text of a node, empty on malformed input.
pub(crate) fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

static FALLBACK_FUNC_RE: Lazy<Regex> = Lazy::new(|| {
    // [qualifiers] ReturnType Name( on a single line, conservative.
    Regex::new(r"^\s*(?:(?:virtual|static|inline|friend)\s+)*(?:[\w:*&<>]+\s+)+([*&]?\w+)\s*\(")
        .expect("fallback pattern is valid")
});

/// Control-flow keywords a definition match can never be.
const FALLBACK_KEYWORDS: [&str; 5] = ["if", "while", "for", "switch", "catch"];

/// Regex definition scan for sources without a usable structural parse.
///
/// Yields only `Function` definitions with `end_line == line` (the true
/// extent cannot be inferred from a single line) and complexity 1.
pub(crate) fn regex_fallback_definitions(source: &str) -> Vec<Definition> {
    let mut definitions = Vec::new();
    for (i, line) in source.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("//") || trimmed.starts_with('#') {
            continue;
        }
        if let Some(caps) = FALLBACK_FUNC_RE.captures(line) {
            let name = caps[1].replace(['*', '&'], "");
            if FALLBACK_KEYWORDS.contains(&name.as_str()) {
                continue;
            }
            definitions.push(Definition::function(name, i + 1, i + 1, 1));
        }
    }
    definitions
}
