//! C# symbol extraction using tree-sitter-c-sharp.
//!
//! Methods and local functions become `Function` definitions, classes and
//! structs (with their base list) become `Class` definitions, and static
//! fields are treated as globals: in the legacy codebases this targets,
//! mutable static state is the managed twin of a C global.

use std::collections::HashSet;
use std::path::Path;

use tree_sitter::{Language, Node, Parser};

use crate::adapter::{
    node_text, truncate_source, tree_complexity, AdapterError, ParseOutput, SizeLimits,
    SourceAdapter,
};
use crate::model::{Definition, Reference};

/// Branching node kinds counted by the complexity approximation.
const BRANCHING: [&str; 7] = [
    "if_statement",
    "for_statement",
    "foreach_statement",
    "while_statement",
    "switch_statement",
    "catch_clause",
    "conditional_expression",
];

/// Parser for C# source code.
pub struct CSharpAdapter {
    limits: SizeLimits,
    language: Option<Language>,
}

impl CSharpAdapter {
    pub fn new(limits: SizeLimits) -> Self {
        Self {
            limits,
            language: None,
        }
    }

    fn visit_definitions(node: Node, source: &[u8], definitions: &mut Vec<Definition>) {
        match node.kind() {
            "method_declaration" | "local_function_statement" => {
                if let Some(name) = node.child_by_field_name("name") {
                    definitions.push(Definition::function(
                        node_text(name, source),
                        node.start_position().row + 1,
                        node.end_position().row + 1,
                        tree_complexity(node, source, &BRANCHING),
                    ));
                }
            }
            "class_declaration" | "struct_declaration" | "interface_declaration" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source).to_string())
                    .unwrap_or_else(|| "anonymous".to_string());

                let mut bases = Vec::new();
                let base_list = node.child_by_field_name("bases").or_else(|| {
                    let mut cursor = node.walk();
                    let found = node.children(&mut cursor).find(|c| c.kind() == "base_list");
                    found
                });
                if let Some(base_list) = base_list {
                    let mut cursor = base_list.walk();
                    for base in base_list.children(&mut cursor) {
                        if matches!(
                            base.kind(),
                            "identifier" | "qualified_name" | "type_identifier" | "generic_name"
                        ) {
                            bases.push(node_text(base, source).to_string());
                        }
                    }
                }

                definitions.push(Definition::class(
                    name,
                    node.start_position().row + 1,
                    bases,
                ));
            }
            "field_declaration" => {
                if Self::is_static(node, source) {
                    Self::collect_declarator_names(node, source, |name, _| {
                        definitions.push(Definition::global(name, node.start_position().row + 1));
                    });
                }
            }
            _ => {}
        }

        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                Self::visit_definitions(child, source, definitions);
            }
        }
    }

    fn is_static(node: Node, source: &[u8]) -> bool {
        let mut cursor = node.walk();
        let is_static = node
            .children(&mut cursor)
            .any(|c| c.kind() == "modifier" && node_text(c, source) == "static");
        is_static
    }

    /// Apply `f` to the name of every `variable_declarator` under `node`.
    fn collect_declarator_names(node: Node, source: &[u8], mut f: impl FnMut(&str, Node)) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if current.kind() == "variable_declarator" {
                if let Some(name) = current.child_by_field_name("name") {
                    f(node_text(name, source), current);
                }
            }
            for i in 0..current.child_count() {
                if let Some(child) = current.child(i) {
                    stack.push(child);
                }
            }
        }
    }

    fn visit_references(
        node: Node,
        source: &[u8],
        globals: &HashSet<String>,
        references: &mut Vec<Reference>,
    ) {
        if node.kind() == "method_declaration" {
            if let Some(name) = node.child_by_field_name("name") {
                if let Some(body) = node.child_by_field_name("body") {
                    let func_name = node_text(name, source).to_string();
                    let mut locals = HashSet::new();
                    Self::collect_locals(node, source, &mut locals);
                    Self::scan_body(body, source, &func_name, &locals, globals, references);
                }
            }
        }

        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                Self::visit_references(child, source, globals, references);
            }
        }
    }

    fn collect_locals(node: Node, source: &[u8], locals: &mut HashSet<String>) {
        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for param in params.children(&mut cursor) {
                if param.kind() == "parameter" {
                    if let Some(name) = param.child_by_field_name("name") {
                        locals.insert(node_text(name, source).to_string());
                    }
                }
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            Self::collect_body_locals(body, source, locals);
        }
    }

    fn collect_body_locals(node: Node, source: &[u8], locals: &mut HashSet<String>) {
        if node.kind() == "local_declaration_statement" {
            Self::collect_declarator_names(node, source, |name, _| {
                locals.insert(name.to_string());
            });
        }
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                Self::collect_body_locals(child, source, locals);
            }
        }
    }

    /// Whether an identifier occupies a call-target position: the callee of
    /// an invocation, or the member name of an invoked member access
    /// (`Bar` in `Foo.Bar()`).
    fn is_call_position(node: Node) -> bool {
        let Some(parent) = node.parent() else {
            return false;
        };

        if parent.kind() == "invocation_expression" {
            if let Some(func) = parent.child_by_field_name("function") {
                if func.id() == node.id() {
                    return true;
                }
            }
        }

        if parent.kind() == "member_access_expression" {
            if let (Some(grandparent), Some(member)) =
                (parent.parent(), parent.child_by_field_name("name"))
            {
                if grandparent.kind() == "invocation_expression" && member.id() == node.id() {
                    if let Some(func) = grandparent.child_by_field_name("function") {
                        return func.id() == parent.id();
                    }
                }
            }
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
        if node.kind() == "invocation_expression" {
            if let Some(func) = node.child_by_field_name("function") {
                let callee = if func.kind() == "member_access_expression" {
                    func.child_by_field_name("name")
                        .map(|n| node_text(n, source).to_string())
                        .unwrap_or_else(|| node_text(func, source).to_string())
                } else {
                    node_text(func, source).to_string()
                };
                references.push(Reference::call(source_func, callee));
            }
        }

        if node.kind() == "identifier" {
            let name = node_text(node, source);
            if !locals.contains(name) && !Self::is_call_position(node) && globals.contains(name) {
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

impl SourceAdapter for CSharpAdapter {
    fn init(&mut self) -> Result<(), AdapterError> {
        if self.language.is_none() {
            self.language = Some(tree_sitter_c_sharp::LANGUAGE.into());
        }
        Ok(())
    }

    fn parse(&self, source: &str, path: Option<&Path>) -> ParseOutput {
        let source = truncate_source(source, self.limits.max_file_bytes, path);

        let tree = self.language.as_ref().and_then(|language| {
            let mut parser = Parser::new();
            parser.set_language(language).ok()?;
            parser.parse(source, None)
        });

        match tree {
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
                let mut definitions = Vec::new();
                Self::visit_definitions(tree.root_node(), source.as_bytes(), &mut definitions);
                definitions
            }
            ParseOutput::Fallback { source } => crate::adapter::regex_fallback_definitions(source),
            _ => Vec::new(),
        }
    }

    fn scan_references(&self, parsed: &ParseOutput, globals: &HashSet<String>) -> Vec<Reference> {
        match parsed {
            ParseOutput::Tree { tree, source } => {
                let mut references = Vec::new();
                Self::visit_references(
                    tree.root_node(),
                    source.as_bytes(),
                    globals,
                    &mut references,
                );
                references
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DefKind, RefKind};

    fn adapter() -> CSharpAdapter {
        let mut adapter = CSharpAdapter::new(SizeLimits::default());
        adapter.init().unwrap();
        adapter
    }

    fn definitions(source: &str) -> Vec<Definition> {
        let adapter = adapter();
        let parsed = adapter.parse(source, Some(Path::new("test.cs")));
        adapter.scan_definitions(&parsed)
    }

    fn references(source: &str, globals: &[&str]) -> Vec<Reference> {
        let adapter = adapter();
        let parsed = adapter.parse(source, Some(Path::new("test.cs")));
        let globals: HashSet<String> = globals.iter().map(|s| s.to_string()).collect();
        adapter.scan_references(&parsed, &globals)
    }

    const SAMPLE: &str = "\
class OrderService : ServiceBase {\n\
    static int pendingCount;\n\
\n\
    void Submit(int id) {\n\
        int total = id;\n\
        pendingCount = total;\n\
        Audit.Log(pendingCount);\n\
    }\n\
}\n";

    #[test]
    fn class_with_base_and_method() {
        let defs = definitions(SAMPLE);

        let class = defs.iter().find(|d| d.kind == DefKind::Class).unwrap();
        assert_eq!(class.name, "OrderService");
        assert_eq!(class.bases, vec!["ServiceBase"]);

        let method = defs.iter().find(|d| d.name == "Submit").unwrap();
        assert_eq!(method.kind, DefKind::Function);
        assert_eq!(method.line, 4);
    }

    #[test]
    fn static_fields_become_globals() {
        let defs = definitions(SAMPLE);
        let globals: Vec<_> = defs
            .iter()
            .filter(|d| d.kind == DefKind::Global)
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(globals, vec!["pendingCount"]);
    }

    #[test]
    fn instance_fields_are_not_globals() {
        let defs = definitions("class C {\n    int counter;\n}\n");
        assert!(defs.iter().all(|d| d.kind != DefKind::Global));
    }

    #[test]
    fn member_call_targets_member_name() {
        let refs = references(SAMPLE, &["pendingCount"]);
        let calls: Vec<_> = refs
            .iter()
            .filter(|r| r.kind == RefKind::Call)
            .map(|r| r.target.as_str())
            .collect();
        assert_eq!(calls, vec!["Log"]);
    }

    #[test]
    fn global_usage_excludes_locals_and_callees() {
        let refs = references(SAMPLE, &["pendingCount", "Log"]);
        let usages: Vec<_> = refs
            .iter()
            .filter(|r| r.kind == RefKind::Usage)
            .map(|r| r.target.as_str())
            .collect();
        assert!(usages.contains(&"pendingCount"));
        assert!(!usages.contains(&"total"));
        assert!(!usages.contains(&"id"));
        // `Log` only occurs as the member name of a call.
        assert!(!usages.contains(&"Log"));
    }

    #[test]
    fn complexity_counts_branches_and_operators() {
        let source = "\
class C {\n\
    int Pick(int a, int b) {\n\
        if (a > 0 && b > 0) {\n\
            return a;\n\
        }\n\
        return b;\n\
    }\n\
}\n";
        let defs = definitions(source);
        let method = defs.iter().find(|d| d.name == "Pick").unwrap();
        assert_eq!(method.complexity, Some(3));
    }

    #[test]
    fn deterministic_rescan() {
        assert_eq!(definitions(SAMPLE), definitions(SAMPLE));
    }
}
