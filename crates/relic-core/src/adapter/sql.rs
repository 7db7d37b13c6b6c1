//! T-SQL symbol extraction.
//!
//! There is deliberately no structural SQL parser here: procedure and
//! trigger headers plus table-touching keywords are regular enough that
//! pattern matching over the raw text extracts everything the graph needs.
//! References are attributed to the nearest preceding definition by byte
//! offset, the textual equivalent of "inside its body".

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::adapter::{truncate_source, AdapterError, ParseOutput, SourceAdapter};
use crate::model::{DefKind, Definition, RefKind, Reference};

// Identifiers may be bracket-quoted and schema-qualified:
//   CREATE PROC [dbo].[UpdateInventory] / CREATE PROC UpdateInventory
// Groups 1-4 cover the schema-qualified form (schema, name), 5-6 the bare
// form; the object name is whichever of groups 3-6 matched.
const IDENT: &str = r"(?:(?:\[(\w+)\]|(\w+))\.(?:\[(\w+)\]|(\w+))|(?:\[(\w+)\]|(\w+)))";

static PROC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)create\s+(?:procedure|proc)\s+{IDENT}"))
        .expect("procedure pattern is valid")
});

static TRIGGER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)create\s+trigger\s+{IDENT}\s+on\s+{IDENT}"))
        .expect("trigger pattern is valid")
});

static TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)(?:from|join|update|insert\s+into)\s+{IDENT}"))
        .expect("table pattern is valid")
});

static EXEC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)(?:exec|execute)\s+{IDENT}")).expect("exec pattern is valid")
});

/// Reserved words the identifier pattern can match by accident.
static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "select", "from", "where", "insert", "update", "delete", "join", "on", "as", "begin",
        "end", "go", "set", "declare", "if", "else", "values",
    ]
    .into_iter()
    .collect()
});

/// Object name from an IDENT match: the name part of a schema-qualified
/// identifier, or the bare identifier.
///
/// IDENT contributes six capture groups; the object name is in groups
/// base+3 (bracketed name), base+4 (bare name), base+5 / base+6
/// (unqualified forms).
fn object_name(caps: &regex::Captures, base: usize) -> Option<String> {
    for group in [base + 3, base + 4, base + 5, base + 6] {
        if let Some(m) = caps.get(group) {
            return Some(m.as_str().to_string());
        }
    }
    None
}

fn line_of(source: &str, byte_offset: usize) -> usize {
    source[..byte_offset].matches('\n').count() + 1
}

fn match_start(caps: &regex::Captures) -> usize {
    caps.get(0).map_or(0, |m| m.start())
}

/// Pattern-matching parser for T-SQL stored procedures and triggers.
#[derive(Default)]
pub struct SqlAdapter;

impl SqlAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Definition start offsets, sorted, for reference attribution.
    fn definition_ranges(source: &str) -> Vec<(usize, String)> {
        let mut ranges: Vec<(usize, String)> = Vec::new();
        for caps in PROC_RE.captures_iter(source) {
            if let Some(name) = object_name(&caps, 0) {
                ranges.push((match_start(&caps), name));
            }
        }
        for caps in TRIGGER_RE.captures_iter(source) {
            if let Some(name) = object_name(&caps, 0) {
                ranges.push((match_start(&caps), name));
            }
        }
        ranges.sort_by_key(|&(start, _)| start);
        ranges
    }

    /// The definition whose region contains `offset`.
    fn enclosing_definition(ranges: &[(usize, String)], offset: usize) -> Option<&str> {
        ranges
            .iter()
            .take_while(|&&(start, _)| start <= offset)
            .last()
            .map(|(_, name)| name.as_str())
    }
}

impl SourceAdapter for SqlAdapter {
    fn init(&mut self) -> Result<(), AdapterError> {
        // Force pattern compilation up front.
        Lazy::force(&PROC_RE);
        Lazy::force(&TRIGGER_RE);
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

        let mut definitions = Vec::new();

        for caps in PROC_RE.captures_iter(source) {
            if let Some(name) = object_name(&caps, 0) {
                let offset = match_start(&caps);
                // Stored procedures are callable: they enter the graph as
                // functions so EXEC edges resolve against them.
                definitions.push(Definition {
                    name,
                    kind: DefKind::Function,
                    line: line_of(source, offset),
                    end_line: None,
                    complexity: None,
                    bases: Vec::new(),
                    watches: None,
                });
            }
        }

        for caps in TRIGGER_RE.captures_iter(source) {
            let name = object_name(&caps, 0);
            // Table groups follow the six name groups.
            let table = object_name(&caps, 6);
            if let Some(name) = name {
                let offset = match_start(&caps);
                let line = line_of(source, offset);
                match table {
                    Some(table) => definitions.push(Definition::trigger(name, line, table)),
                    None => definitions.push(Definition {
                        name,
                        kind: DefKind::Trigger,
                        line,
                        end_line: None,
                        complexity: None,
                        bases: Vec::new(),
                        watches: None,
                    }),
                }
            }
        }

        definitions
    }

    fn scan_references(&self, parsed: &ParseOutput, _globals: &HashSet<String>) -> Vec<Reference> {
        let ParseOutput::Text { source } = parsed else {
            return Vec::new();
        };

        let ranges = Self::definition_ranges(source);
        let mut references = Vec::new();

        for (pattern, kind) in [(&*TABLE_RE, RefKind::Usage), (&*EXEC_RE, RefKind::Call)] {
            for caps in pattern.captures_iter(source) {
                let Some(name) = object_name(&caps, 0) else {
                    continue;
                };
                if KEYWORDS.contains(name.to_lowercase().as_str()) {
                    continue;
                }
                let offset = match_start(&caps);
                if let Some(container) = Self::enclosing_definition(&ranges, offset) {
                    references.push(Reference::new(container, name, kind));
                }
            }
        }

        // Trigger watch targets are references too, emitted as WATCHES.
        for def in self.scan_definitions(parsed) {
            if let (DefKind::Trigger, Some(table)) = (def.kind, def.watches) {
                references.push(Reference::new(def.name, table, RefKind::Watches));
            }
        }

        references
    }
}
