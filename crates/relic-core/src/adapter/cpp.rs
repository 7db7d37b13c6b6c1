//! C-family symbol extraction using tree-sitter-c / tree-sitter-cpp.
//!
//! Extracts function definitions, class/struct specifiers (with base
//! classes), top-level globals, and forward function declarations. This is
//! the adapter that carries the full size policy: oversized sources are
//! truncated at the hard cap, and sources above the chunking threshold are
//! split on a top-level `}` delimiter into independently parsed chunks, so
//! that one pathological translation unit cannot sink the whole run.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use tree_sitter::{Language, Node, Parser, Tree};

use crate::adapter::{
    node_text, regex_fallback_definitions, truncate_label, truncate_source, tree_complexity,
    AdapterError, ParseOutput, ParsedChunk, SizeLimits, SourceAdapter,
};
use crate::model::{DefKind, Definition, Reference};

/// Branching node kinds counted by the complexity approximation.
const BRANCHING: [&str; 6] = [
    "if_statement",
    "for_statement",
    "while_statement",
    "case_statement",
    "catch_clause",
    "conditional_expression",
];

static CHUNK_DELIMITER: Lazy<Regex> = Lazy::new(|| {
    // Closing brace at a statement boundary, the usual end of a top-level
    // function or aggregate in C/C++.
    Regex::new(r"\n\}\s*\n").expect("chunk delimiter pattern is valid")
});

/// Parser for C and C++ source code.
pub struct CppAdapter {
    limits: SizeLimits,
    c: Option<Language>,
    cpp: Option<Language>,
}

impl CppAdapter {
    pub fn new(limits: SizeLimits) -> Self {
        Self {
            limits,
            c: None,
            cpp: None,
        }
    }

    fn language_for(&self, path: Option<&Path>) -> Option<&Language> {
        let is_c = path
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("c"))
            .unwrap_or(false);
        if is_c {
            self.c.as_ref()
        } else {
            self.cpp.as_ref()
        }
    }

    fn parse_tree(language: &Language, source: &str) -> Option<Tree> {
        let mut parser = Parser::new();
        parser.set_language(language).ok()?;
        parser.parse(source, None)
    }

    fn parse_chunks(&self, language: &Language, source: &str) -> ParseOutput {
        let mut chunks = Vec::new();
        let mut line_offset = 0usize;

        for part in CHUNK_DELIMITER.split(source) {
            // Re-add the delimiter so every chunk closes its last brace.
            let chunk_source = format!("{}\n}}\n", part);
            let chunk_lines = chunk_source.matches('\n').count();

            let tree = Self::parse_tree(language, &chunk_source);
            if tree.is_none() {
                debug!("chunk at line offset {} fell back to regex scan", line_offset);
            }
            chunks.push(ParsedChunk {
                tree,
                source: chunk_source,
                line_offset,
            });

            line_offset += chunk_lines;
        }

        ParseOutput::Chunked { chunks }
    }

    fn scan_tree_definitions(root: Node, source: &[u8], line_offset: usize) -> Vec<Definition> {
        let mut definitions = Vec::new();
        Self::visit_definitions(root, source, line_offset, &mut definitions);
        definitions
    }

    fn visit_definitions(
        node: Node,
        source: &[u8],
        line_offset: usize,
        definitions: &mut Vec<Definition>,
    ) {
        match node.kind() {
            "function_definition" => {
                if let Some(name) = Self::function_name(node, source) {
                    definitions.push(Definition::function(
                        name,
                        node.start_position().row + 1 + line_offset,
                        node.end_position().row + 1 + line_offset,
                        tree_complexity(node, source, &BRANCHING),
                    ));
                }
            }
            "class_specifier" | "struct_specifier" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source).to_string())
                    .unwrap_or_else(|| "anonymous".to_string());

                let mut bases = Vec::new();
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if child.kind() == "base_class_clause" {
                        let mut base_cursor = child.walk();
                        for base in child.children(&mut base_cursor) {
                            if base.kind() == "type_identifier"
                                || base.kind() == "qualified_identifier"
                            {
                                bases.push(node_text(base, source).to_string());
                            }
                        }
                    }
                }

                definitions.push(Definition::class(
                    truncate_label(&name),
                    node.start_position().row + 1 + line_offset,
                    bases,
                ));
            }
            "declaration" if Self::is_top_level(node) => {
                if let Some(name) = Self::declaration_name(node, source) {
                    definitions.push(Definition::global(
                        name,
                        node.start_position().row + 1 + line_offset,
                    ));
                }
                // Forward declarations still name a function the graph
                // should know about; extent and complexity are unknowable.
                if let Some(name) = Self::function_declaration_name(node, source) {
                    definitions.push(Definition {
                        name,
                        kind: DefKind::Function,
                        line: node.start_position().row + 1 + line_offset,
                        end_line: None,
                        complexity: Some(0),
                        bases: Vec::new(),
                        watches: None,
                    });
                }
            }
            _ => {}
        }

        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                Self::visit_definitions(child, source, line_offset, definitions);
            }
        }
    }

    fn scan_tree_references(
        root: Node,
        source: &[u8],
        globals: &HashSet<String>,
    ) -> Vec<Reference> {
        let mut references = Vec::new();
        Self::visit_references(root, source, globals, &mut references);
        references
    }

    fn visit_references(
        node: Node,
        source: &[u8],
        globals: &HashSet<String>,
        references: &mut Vec<Reference>,
    ) {
        if node.kind() == "function_definition" {
            if let Some(name) = Self::function_name(node, source) {
                if let Some(body) = node.child_by_field_name("body") {
                    let mut locals = HashSet::new();
                    Self::collect_locals(node, source, &mut locals);
                    Self::scan_body(body, source, &name, &locals, globals, references);
                }
            }
            return;
        }
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                Self::visit_references(child, source, globals, references);
            }
        }
    }

    // --- Helpers ---

    /// True when no enclosing function or lambda owns this node.
    fn is_top_level(node: Node) -> bool {
        let mut current = node.parent();
        while let Some(parent) = current {
            match parent.kind() {
                "function_definition" | "lambda_expression" => return false,
                "translation_unit" => return true,
                _ => {}
            }
            current = parent.parent();
        }
        true
    }

    /// Name of a function definition, drilling through declarators.
    fn function_name(node: Node, source: &[u8]) -> Option<String> {
        let declarator = node.child_by_field_name("declarator")?;
        let mut current = declarator;
        while matches!(
            current.kind(),
            "function_declarator" | "pointer_declarator" | "reference_declarator"
        ) {
            match current.child_by_field_name("declarator") {
                Some(inner) => current = inner,
                None => break,
            }
        }
        Some(truncate_label(node_text(current, source)))
    }

    /// Name bound by a top-level variable declaration, if any.
    fn declaration_name(node: Node, source: &[u8]) -> Option<String> {
        let mut cursor = node.walk();
        let declarator = node.children(&mut cursor).find(|c| {
            matches!(c.kind(), "init_declarator" | "identifier" | "array_declarator")
        })?;

        let name = match declarator.kind() {
            "init_declarator" => {
                let inner = declarator.child_by_field_name("declarator")?;
                node_text(inner, source)
                    .split('[')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            }
            "array_declarator" => {
                let inner = declarator.child_by_field_name("declarator")?;
                node_text(inner, source).to_string()
            }
            _ => node_text(declarator, source).to_string(),
        };

        let cleaned = name.replace(['*', '&'], "").trim().to_string();
        if cleaned.is_empty() {
            None
        } else {
            Some(truncate_label(&cleaned))
        }
    }

    /// Name of a forward function declaration inside a `declaration` node.
    ///
    /// Iterative search: declarations can nest declarators arbitrarily deep.
    fn function_declaration_name(node: Node, source: &[u8]) -> Option<String> {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if current.kind() == "function_declarator" {
                let mut inner = current.child_by_field_name("declarator");
                while let Some(d) = inner {
                    if matches!(d.kind(), "pointer_declarator" | "reference_declarator") {
                        inner = d.child_by_field_name("declarator");
                    } else {
                        return Some(node_text(d, source).to_string());
                    }
                }
                return None;
            }
            for i in (0..current.child_count()).rev() {
                if let Some(child) = current.child(i) {
                    stack.push(child);
                }
            }
        }
        None
    }

    /// Parameters plus every declaration in the body, nested blocks included.
    fn collect_locals(node: Node, source: &[u8], locals: &mut HashSet<String>) {
        if let Some(declarator) = node.child_by_field_name("declarator") {
            let mut current = Some(declarator);
            while let Some(d) = current {
                if matches!(d.kind(), "pointer_declarator" | "reference_declarator") {
                    current = d.child_by_field_name("declarator");
                } else {
                    current = Some(d);
                    break;
                }
            }
            if let Some(d) = current {
                if d.kind() == "function_declarator" {
                    if let Some(params) = d.child_by_field_name("parameters") {
                        let mut cursor = params.walk();
                        for param in params.children(&mut cursor) {
                            if param.kind() == "parameter_declaration" {
                                if let Some(name) = param.child_by_field_name("declarator") {
                                    locals.insert(
                                        node_text(name, source)
                                            .replace(['*', '&'], "")
                                            .trim()
                                            .to_string(),
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            Self::collect_body_locals(body, source, locals);
        }
    }

    fn collect_body_locals(node: Node, source: &[u8], locals: &mut HashSet<String>) {
        match node.kind() {
            "declaration" => {
                let mut cursor = node.walk();
                let init = node
                    .children(&mut cursor)
                    .find(|c| c.kind() == "init_declarator");
                match init {
                    Some(init) => {
                        if let Some(name) = init.child_by_field_name("declarator") {
                            let cleaned = node_text(name, source)
                                .split('=')
                                .next()
                                .unwrap_or_default()
                                .trim()
                                .replace(['*', '&'], "");
                            locals.insert(cleaned);
                        }
                    }
                    None => {
                        let mut cursor = node.walk();
                        let id = node.children(&mut cursor).find(|c| c.kind() == "identifier");
                        if let Some(id) = id {
                            locals.insert(node_text(id, source).to_string());
                        }
                    }
                }
            }
            "init_declarator" => {
                if let Some(name) = node.child_by_field_name("declarator") {
                    locals.insert(node_text(name, source).replace(['*', '&'], "").trim().to_string());
                }
            }
            _ => {}
        }

        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                Self::collect_body_locals(child, source, locals);
            }
        }
    }

    /// Simple name of the callee expression of a call.
    fn callee_name(func: Node, source: &[u8]) -> String {
        match func.kind() {
            // obj.method() / ptr->method(): the member is the target.
            "field_expression" => func
                .child_by_field_name("field")
                .map(|f| node_text(f, source).to_string())
                .unwrap_or_else(|| node_text(func, source).to_string()),
            // ns::f(): the rightmost name is the target.
            "qualified_identifier" => func
                .child_by_field_name("name")
                .map(|n| Self::callee_name(n, source))
                .unwrap_or_else(|| node_text(func, source).to_string()),
            _ => node_text(func, source).to_string(),
        }
    }

    /// Whether an identifier is the callee (or the drilled-down callee name)
    /// of an enclosing call, and therefore never a `Usage`.
    fn is_callee_position(node: Node) -> bool {
        let Some(parent) = node.parent() else {
            return false;
        };
        if parent.kind() == "call_expression" {
            if let Some(func) = parent.child_by_field_name("function") {
                return func.id() == node.id();
            }
        }
        if parent.kind() == "qualified_identifier" {
            return Self::is_callee_position(parent);
        }
        false
    }

    fn scan_body(
        node: Node,
        source: &[u8],
        source_func: &str,
        locals: &HashSet<String>,
        globals: &HashSet<String>,
        references: &mut Vec<Reference>,
    ) {
        if node.kind() == "call_expression" {
            if let Some(func) = node.child_by_field_name("function") {
                references.push(Reference::call(
                    source_func,
                    Self::callee_name(func, source),
                ));
            }
        }

        if node.kind() == "identifier" {
            let name = node_text(node, source);
            if !locals.contains(name)
                && !Self::is_callee_position(node)
                && globals.contains(name)
            {
                references.push(Reference::usage(source_func, name));
            }
        }

        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                Self::scan_body(child, source, source_func, locals, globals, references);
            }
        }
    }
}

impl SourceAdapter for CppAdapter {
    fn init(&mut self) -> Result<(), AdapterError> {
        if self.c.is_none() {
            self.c = Some(tree_sitter_c::LANGUAGE.into());
        }
        if self.cpp.is_none() {
            self.cpp = Some(tree_sitter_cpp::LANGUAGE.into());
        }
        Ok(())
    }

    fn parse(&self, source: &str, path: Option<&Path>) -> ParseOutput {
        let source = truncate_source(source, self.limits.max_file_bytes, path);

        let Some(language) = self.language_for(path) else {
            // init() was skipped; degrade rather than panic.
            return ParseOutput::Fallback {
                source: source.to_string(),
            };
        };

        if source.len() > self.limits.chunk_threshold_bytes {
            debug!(
                "large C-family source ({} bytes), using chunking strategy",
                source.len()
            );
            return self.parse_chunks(language, source);
        }

        match Self::parse_tree(language, source) {
            Some(tree) => ParseOutput::Tree {
                tree,
                source: source.to_string(),
            },
            None => ParseOutput::Fallback {
                source: source.to_string(),
            },
        }
    }

    fn scan_definitions(&self, parsed: &ParseOutput) -> Vec<Definition> {
        match parsed {
            ParseOutput::Tree { tree, source } => {
                Self::scan_tree_definitions(tree.root_node(), source.as_bytes(), 0)
            }
            ParseOutput::Chunked { chunks } => {
                let mut definitions = Vec::new();
                for chunk in chunks {
                    match &chunk.tree {
                        Some(tree) => definitions.extend(Self::scan_tree_definitions(
                            tree.root_node(),
                            chunk.source.as_bytes(),
                            chunk.line_offset,
                        )),
                        None => {
                            let mut fallback = regex_fallback_definitions(&chunk.source);
                            for def in &mut fallback {
                                def.shift_lines(chunk.line_offset as isize);
                            }
                            definitions.extend(fallback);
                        }
                    }
                }
                definitions
            }
            ParseOutput::Fallback { source } => regex_fallback_definitions(source),
            _ => Vec::new(),
        }
    }

    fn scan_references(&self, parsed: &ParseOutput, globals: &HashSet<String>) -> Vec<Reference> {
        match parsed {
            ParseOutput::Tree { tree, source } => {
                Self::scan_tree_references(tree.root_node(), source.as_bytes(), globals)
            }
            ParseOutput::Chunked { chunks } => chunks
                .iter()
                .filter_map(|chunk| chunk.tree.as_ref().map(|t| (t, chunk)))
                .flat_map(|(tree, chunk)| {
                    Self::scan_tree_references(tree.root_node(), chunk.source.as_bytes(), globals)
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}
