//! VB symbol extraction.
//!
//! No VB grammar is published for tree-sitter on crates.io, so this adapter
//! scans the line-oriented VB surface directly, the same pattern-matching
//! approach the SQL adapter uses. VB's rigid `Sub ... End Sub` block
//! structure makes the line scan reliable enough for definition extents,
//! locals, and call sites.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::adapter::{truncate_source, AdapterError, ParseOutput, SourceAdapter};
use crate::model::{Definition, RefKind, Reference};

static CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:(?:public|private|protected|friend|partial|shared|notinheritable|mustinherit)\s+)*(?:class|module|structure)\s+(\w+)",
    )
    .expect("class pattern is valid")
});

static END_CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*end\s+(?:class|module|structure)\b").expect("end-class pattern is valid")
});

static INHERITS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*inherits\s+([\w.]+)").expect("inherits pattern is valid"));

static METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:(?:public|private|protected|friend|shared|overrides|overridable|shadows)\s+)*(?:sub|function)\s+(\w+)\s*\(([^)]*)\)",
    )
    .expect("method pattern is valid")
});

static END_METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*end\s+(?:sub|function)\b").expect("end-method pattern is valid")
});

static DIM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:dim|static)\s+([\w\s,]+?)(?:\s+as\s+.*|\s*=.*)?$")
        .expect("dim pattern is valid")
});

static BRANCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:if\b|elseif\b|for\b|while\b|do\b|case\b|catch\b|select\s+case\b)")
        .expect("branch pattern is valid")
});

static SHORT_CIRCUIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:andalso|orelse)\b").expect("operator pattern is valid"));

static CALL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+(?:\.\w+)*)\s*\(").expect("call pattern is valid"));

static ASSIGN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_]\w*)\s*=[^=]").expect("assignment pattern is valid")
});

static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_]\w*").expect("identifier pattern is valid"));

/// Keywords the call/identifier patterns must never match.
static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "if", "then", "else", "elseif", "end", "sub", "function", "dim", "as", "call", "while",
        "wend", "for", "next", "do", "loop", "select", "case", "return", "new", "not", "and",
        "or", "andalso", "orelse", "true", "false", "nothing", "me", "ctype", "cint", "cstr",
        "cdbl", "byval", "byref", "to", "step", "each", "in", "try", "catch", "finally", "throw",
        "exit", "class", "module", "structure", "inherits", "imports", "public", "private",
        "protected", "friend", "shared", "string", "integer", "boolean", "double", "object",
    ]
    .into_iter()
    .collect()
});

/// One method block discovered by the line scan.
struct MethodBlock {
    name: String,
    start: usize,
    end: usize,
    params: Vec<String>,
}

/// Line-oriented parser for VB source code.
#[derive(Default)]
pub struct VbAdapter;

impl VbAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Scan for `Sub`/`Function` blocks with their extents and parameters.
    fn method_blocks(source: &str) -> Vec<MethodBlock> {
        let mut blocks = Vec::new();
        let mut open: Option<MethodBlock> = None;

        for (i, line) in source.lines().enumerate() {
            match open {
                None => {
                    if let Some(caps) = METHOD_RE.captures(line) {
                        let params = caps[2]
                            .split(',')
                            .filter_map(Self::parameter_name)
                            .collect();
                        open = Some(MethodBlock {
                            name: caps[1].to_string(),
                            start: i + 1,
                            end: i + 1,
                            params,
                        });
                    }
                }
                Some(_) if END_METHOD_RE.is_match(line) => {
                    if let Some(mut block) = open.take() {
                        block.end = i + 1;
                        blocks.push(block);
                    }
                }
                Some(_) => {}
            }
        }

        // An unterminated block still names a method; its extent is unknown.
        if let Some(block) = open {
            blocks.push(block);
        }
        blocks
    }

    /// `ByVal amount As Integer` → `amount`
    fn parameter_name(param: &str) -> Option<String> {
        let mut tokens = param
            .split_whitespace()
            .filter(|t| !t.eq_ignore_ascii_case("byval") && !t.eq_ignore_ascii_case("byref"));
        let name = tokens.next()?;
        if name.eq_ignore_ascii_case("as") {
            return None;
        }
        Some(name.trim_start_matches('_').to_string())
    }

    fn block_complexity(lines: &[&str]) -> u32 {
        let mut complexity = 1;
        for line in lines {
            if BRANCH_RE.is_match(line) {
                complexity += 1;
            }
            complexity += SHORT_CIRCUIT_RE.find_iter(line).count() as u32;
        }
        complexity
    }

    fn collect_locals(lines: &[&str], params: &[String], locals: &mut HashSet<String>) {
        for param in params {
            locals.insert(param.clone());
        }
        for line in lines {
            if let Some(caps) = DIM_RE.captures(line) {
                for name in caps[1].split(',') {
                    let name = name.trim();
                    if !name.is_empty() {
                        locals.insert(name.to_string());
                    }
                }
            }
        }
    }

    fn scan_block_references(
        lines: &[&str],
        method: &MethodBlock,
        locals: &HashSet<String>,
        globals: &HashSet<String>,
        references: &mut Vec<Reference>,
    ) {
        for line in lines {
            let trimmed = line.trim();
            if trimmed.starts_with('\'') {
                continue;
            }

            // Byte positions of call-target and assignment-target
            // identifiers, so the same occurrence is never double-counted
            // as a Usage below.
            let mut claimed_spans: Vec<(usize, usize)> = Vec::new();

            // `Name = expr` without a prior Dim writes a global the script
            // engine creates on the spot.
            if let Some(target) = ASSIGN_RE.captures(line).and_then(|caps| caps.get(1)) {
                let name = target.as_str();
                if !KEYWORDS.contains(name.to_lowercase().as_str()) && !locals.contains(name) {
                    claimed_spans.push((target.start(), target.end()));
                    references.push(Reference::new(
                        method.name.clone(),
                        name,
                        RefKind::ImplicitWrite,
                    ));
                }
            }

            for caps in CALL_RE.captures_iter(line) {
                let Some(whole) = caps.get(1) else {
                    continue;
                };
                let target = whole
                    .as_str()
                    .rsplit('.')
                    .next()
                    .unwrap_or(whole.as_str());
                if KEYWORDS.contains(target.to_lowercase().as_str()) {
                    continue;
                }
                let target_start = whole.end() - target.len();
                claimed_spans.push((target_start, whole.end()));
                references.push(Reference::call(method.name.clone(), target));
            }

            for m in IDENT_RE.find_iter(line) {
                let name = m.as_str();
                if KEYWORDS.contains(name.to_lowercase().as_str()) || locals.contains(name) {
                    continue;
                }
                if claimed_spans
                    .iter()
                    .any(|&(start, end)| m.start() >= start && m.end() <= end)
                {
                    continue;
                }
                // Member accesses (`obj.Field`) are not bare identifiers.
                if m.start() > 0 && line.as_bytes()[m.start() - 1] == b'.' {
                    continue;
                }
                if globals.contains(name) {
                    references.push(Reference::usage(method.name.clone(), name));
                }
            }
        }
    }
}

impl SourceAdapter for VbAdapter {
    fn init(&mut self) -> Result<(), AdapterError> {
        // Pattern tables are lazily compiled statics; touch one so a bad
        // pattern fails here rather than mid-run.
        Lazy::force(&METHOD_RE);
        Ok(())
    }

    fn parse(&self, source: &str, path: Option<&Path>) -> ParseOutput {
        let source = truncate_source(source, relic_config::DEFAULT_MAX_FILE_BYTES, path);
        ParseOutput::Text {
            source: source.to_string(),
        }
    }

    fn scan_definitions(&self, parsed: &ParseOutput) -> Vec<Definition> {
        let ParseOutput::Text { source } = parsed else {
            return Vec::new();
        };

        let lines: Vec<&str> = source.lines().collect();
        let mut definitions = Vec::new();

        // Classes, modules, structures with their Inherits lines.
        let mut open_classes: Vec<usize> = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            if let Some(caps) = CLASS_RE.captures(line) {
                definitions.push(Definition::class(caps[1].to_string(), i + 1, Vec::new()));
                open_classes.push(definitions.len() - 1);
            } else if END_CLASS_RE.is_match(line) {
                open_classes.pop();
            } else if let Some(caps) = INHERITS_RE.captures(line) {
                if let Some(&idx) = open_classes.last() {
                    definitions[idx].bases.push(caps[1].to_string());
                }
            }
        }

        for block in Self::method_blocks(source) {
            let body_start = block.start.min(lines.len());
            let body_end = block.end.saturating_sub(1).min(lines.len());
            let body = if body_start < body_end {
                &lines[body_start..body_end]
            } else {
                &[][..]
            };
            definitions.push(Definition::function(
                block.name.clone(),
                block.start,
                block.end,
                Self::block_complexity(body),
            ));
        }

        definitions
    }

    fn scan_references(&self, parsed: &ParseOutput, globals: &HashSet<String>) -> Vec<Reference> {
        let ParseOutput::Text { source } = parsed else {
            return Vec::new();
        };

        let lines: Vec<&str> = source.lines().collect();
        let mut references = Vec::new();

        for block in Self::method_blocks(source) {
            let body_start = block.start.min(lines.len());
            let body_end = block.end.saturating_sub(1).min(lines.len());
            if body_start >= body_end {
                continue;
            }
            let body = &lines[body_start..body_end];

            let mut locals = HashSet::new();
            Self::collect_locals(body, &block.params, &mut locals);
            Self::scan_block_references(body, &block, &locals, globals, &mut references);
        }

        references
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DefKind, RefKind};

    fn adapter() -> VbAdapter {
        let mut adapter = VbAdapter::new();
        adapter.init().unwrap();
        adapter
    }

    fn definitions(source: &str) -> Vec<Definition> {
        let adapter = adapter();
        let parsed = adapter.parse(source, Some(Path::new("test.vb")));
        adapter.scan_definitions(&parsed)
    }

    fn references(source: &str, globals: &[&str]) -> Vec<Reference> {
        let adapter = adapter();
        let parsed = adapter.parse(source, Some(Path::new("test.vb")));
        let globals: HashSet<String> = globals.iter().map(|s| s.to_string()).collect();
        adapter.scan_references(&parsed, &globals)
    }

    const SAMPLE: &str = "\
Public Class OrderForm\n\
    Inherits System.Web.UI.Page\n\
\n\
    Public Sub Submit(ByVal id As Integer)\n\
        Dim total As Integer\n\
        total = id\n\
        gPending = total\n\
        Audit.Log(gPending)\n\
    End Sub\n\
End Class\n";

    #[test]
    fn class_with_inherits() {
        let defs = definitions(SAMPLE);
        let class = defs.iter().find(|d| d.kind == DefKind::Class).unwrap();
        assert_eq!(class.name, "OrderForm");
        assert_eq!(class.bases, vec!["System.Web.UI.Page"]);
        assert_eq!(class.line, 1);
    }

    #[test]
    fn sub_block_with_extent() {
        let defs = definitions(SAMPLE);
        let method = defs.iter().find(|d| d.name == "Submit").unwrap();
        assert_eq!(method.kind, DefKind::Function);
        assert_eq!(method.line, 4);
        assert_eq!(method.end_line, Some(9));
    }

    #[test]
    fn branching_complexity() {
        let source = "\
Function Check(ByVal a As Integer) As Boolean\n\
    If a > 0 AndAlso a < 10 Then\n\
        Return True\n\
    End If\n\
    Return False\n\
End Function\n";
        let defs = definitions(source);
        // 1 + If + AndAlso.
        assert_eq!(defs[0].complexity, Some(3));
    }

    #[test]
    fn calls_and_usages() {
        let refs = references(SAMPLE, &["gPending"]);

        let calls: Vec<_> = refs
            .iter()
            .filter(|r| r.kind == RefKind::Call)
            .map(|r| r.target.as_str())
            .collect();
        assert_eq!(calls, vec!["Log"]);

        let usages: Vec<_> = refs
            .iter()
            .filter(|r| r.kind == RefKind::Usage)
            .map(|r| r.target.as_str())
            .collect();
        assert!(usages.contains(&"gPending"));
        assert!(!usages.contains(&"total"));
        assert!(!usages.contains(&"id"));
    }

    #[test]
    fn call_target_not_counted_as_usage() {
        let source = "\
Sub Run()\n\
    Refresh()\n\
End Sub\n";
        let refs = references(source, &["Refresh"]);
        assert!(refs
            .iter()
            .any(|r| r.kind == RefKind::Call && r.target == "Refresh"));
        assert!(!refs
            .iter()
            .any(|r| r.kind == RefKind::Usage && r.target == "Refresh"));
    }

    #[test]
    fn undeclared_assignment_is_an_implicit_write() {
        let refs = references(SAMPLE, &[]);
        assert!(refs.iter().any(
            |r| r.kind == RefKind::ImplicitWrite && r.target == "gPending" && r.source == "Submit"
        ));
        // The declared local is assigned too, but never implicitly.
        assert!(!refs
            .iter()
            .any(|r| r.kind == RefKind::ImplicitWrite && r.target == "total"));
    }

    #[test]
    fn module_wrapper_is_transparent() {
        let wrapped = format!("Module PageWrapper\n{}\nEnd Module", SAMPLE);
        let defs = definitions(&wrapped);
        assert!(defs.iter().any(|d| d.name == "Submit"));
        assert!(defs.iter().any(|d| d.name == "PageWrapper"));
    }
}
