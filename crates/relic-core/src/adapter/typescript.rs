//! TypeScript symbol extraction using tree-sitter-typescript.
//!
//! Covers function and generator declarations, class methods, arrow and
//! function expressions bound to variables, and class/interface heritage.
//! `.tsx` files use the TSX grammar.

use std::collections::HashSet;
use std::path::Path;

use tree_sitter::{Language, Node, Parser};

use crate::adapter::{
    node_text, truncate_source, tree_complexity, AdapterError, ParseOutput, SizeLimits,
    SourceAdapter,
};
use crate::model::{Definition, Reference};

/// Branching node kinds counted by the complexity approximation.
const BRANCHING: [&str; 8] = [
    "if_statement",
    "for_statement",
    "for_in_statement",
    "while_statement",
    "do_statement",
    "switch_case",
    "catch_clause",
    "ternary_expression",
];

/// Parser for TypeScript and TSX source code.
pub struct TypeScriptAdapter {
    limits: SizeLimits,
    typescript: Option<Language>,
    tsx: Option<Language>,
}

impl TypeScriptAdapter {
    pub fn new(limits: SizeLimits) -> Self {
        Self {
            limits,
            typescript: None,
            tsx: None,
        }
    }

    fn language_for(&self, path: Option<&Path>) -> Option<&Language> {
        let is_tsx = path
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("tsx"))
            .unwrap_or(false);
        if is_tsx {
            self.tsx.as_ref()
        } else {
            self.typescript.as_ref()
        }
    }

    /// A variable declarator whose value is a function: name + value nodes.
    fn function_binding<'t>(node: Node<'t>, _source: &[u8]) -> Option<(Node<'t>, Node<'t>)> {
        if node.kind() != "variable_declarator" {
            return None;
        }
        let name = node.child_by_field_name("name")?;
        let value = node.child_by_field_name("value")?;
        if matches!(value.kind(), "arrow_function" | "function_expression") {
            Some((name, value))
        } else {
            None
        }
    }

    fn visit_definitions(node: Node, source: &[u8], definitions: &mut Vec<Definition>) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" | "method_definition" => {
                if let Some(name) = node.child_by_field_name("name") {
                    definitions.push(Definition::function(
                        node_text(name, source),
                        node.start_position().row + 1,
                        node.end_position().row + 1,
                        tree_complexity(node, source, &BRANCHING),
                    ));
                }
            }
            "variable_declarator" => {
                if let Some((name, value)) = Self::function_binding(node, source) {
                    definitions.push(Definition::function(
                        node_text(name, source),
                        node.start_position().row + 1,
                        node.end_position().row + 1,
                        tree_complexity(value, source, &BRANCHING),
                    ));
                }
            }
            "class_declaration" | "interface_declaration" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source).to_string())
                    .unwrap_or_else(|| "anonymous".to_string());

                let mut bases = Vec::new();
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    match child.kind() {
                        // class X extends A implements B
                        "class_heritage" => {
                            let mut heritage_cursor = child.walk();
                            for clause in child.children(&mut heritage_cursor) {
                                if matches!(clause.kind(), "extends_clause" | "implements_clause") {
                                    Self::collect_heritage_types(clause, source, &mut bases);
                                }
                            }
                        }
                        // interface X extends A
                        "extends_type_clause" => {
                            Self::collect_heritage_types(child, source, &mut bases);
                        }
                        _ => {}
                    }
                }

                definitions.push(Definition::class(
                    name,
                    node.start_position().row + 1,
                    bases,
                ));
            }
            _ => {}
        }

        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                Self::visit_definitions(child, source, definitions);
            }
        }
    }

    fn collect_heritage_types(clause: Node, source: &[u8], bases: &mut Vec<String>) {
        let mut cursor = clause.walk();
        for child in clause.children(&mut cursor) {
            if matches!(
                child.kind(),
                "type_identifier" | "nested_type_identifier" | "generic_type" | "identifier"
            ) {
                bases.push(node_text(child, source).to_string());
            }
        }
    }

    fn visit_references(
        node: Node,
        source: &[u8],
        globals: &HashSet<String>,
        references: &mut Vec<Reference>,
    ) {
        let mut scope: Option<(String, Node)> = None;

        match node.kind() {
            "function_declaration" | "generator_function_declaration" | "method_definition" => {
                if let (Some(name), Some(body)) = (
                    node.child_by_field_name("name"),
                    node.child_by_field_name("body"),
                ) {
                    scope = Some((node_text(name, source).to_string(), body));
                }
            }
            "variable_declarator" => {
                if let Some((name, value)) = Self::function_binding(node, source) {
                    if let Some(body) = value.child_by_field_name("body") {
                        scope = Some((node_text(name, source).to_string(), body));
                    }
                }
            }
            _ => {}
        }

        if let Some((func_name, body)) = scope {
            let mut locals = HashSet::new();
            Self::collect_locals(node, source, &mut locals);
            Self::collect_locals(body, source, &mut locals);
            Self::collect_declared_locals(body, source, &mut locals);
            Self::scan_body(body, source, &func_name, &locals, globals, references);
            // The body was handled; nested definitions were scanned by the
            // body walk, so the outer traversal stops here.
            return;
        }

        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                Self::visit_references(child, source, globals, references);
            }
        }
    }

    /// Parameters of a function-like node (or its bound function value).
    fn collect_locals(node: Node, source: &[u8], locals: &mut HashSet<String>) {
        let params = node.child_by_field_name("parameters").or_else(|| {
            node.child_by_field_name("value")
                .and_then(|v| v.child_by_field_name("parameters"))
        });
        if let Some(params) = params {
            let mut cursor = params.walk();
            for param in params.children(&mut cursor) {
                match param.kind() {
                    "identifier" => {
                        locals.insert(node_text(param, source).to_string());
                    }
                    "required_parameter" | "optional_parameter" => {
                        if let Some(pattern) = param.child_by_field_name("pattern") {
                            if pattern.kind() == "identifier" {
                                locals.insert(node_text(pattern, source).to_string());
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// Every `let`/`const`/`var` binding in the body, nested blocks included.
    fn collect_declared_locals(node: Node, source: &[u8], locals: &mut HashSet<String>) {
        if node.kind() == "variable_declarator" {
            if let Some(name) = node.child_by_field_name("name") {
                if name.kind() == "identifier" {
                    locals.insert(node_text(name, source).to_string());
                }
            }
        }
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                Self::collect_declared_locals(child, source, locals);
            }
        }
    }

    /// Whether an identifier sits in a call-target or member-name position.
    fn is_call_part(node: Node) -> bool {
        let Some(parent) = node.parent() else {
            return false;
        };

        match parent.kind() {
            "call_expression" => parent
                .child_by_field_name("function")
                .map(|f| f.id() == node.id())
                .unwrap_or(false),
            "new_expression" => parent
                .child_by_field_name("constructor")
                .map(|c| c.id() == node.id())
                .unwrap_or(false),
            // obj.prop: property names are never global usages; when the
            // member expression is invoked they are call targets instead.
            "member_expression" => parent
                .child_by_field_name("property")
                .map(|p| p.id() == node.id())
                .unwrap_or(false),
            _ => false,
        }
    }

    fn scan_body(
        node: Node,
        source: &[u8],
        source_func: &str,
        locals: &HashSet<String>,
        globals: &HashSet<String>,
        references: &mut Vec<Reference>,
    ) {
        if matches!(node.kind(), "call_expression" | "new_expression") {
            let func = node
                .child_by_field_name("function")
                .or_else(|| node.child_by_field_name("constructor"));
            if let Some(func) = func {
                let callee = if func.kind() == "member_expression" {
                    func.child_by_field_name("property")
                        .map(|p| node_text(p, source).to_string())
                        .unwrap_or_else(|| node_text(func, source).to_string())
                } else {
                    node_text(func, source).to_string()
                };
                references.push(Reference::call(source_func, callee));
            }
        }

        if node.kind() == "identifier" {
            let name = node_text(node, source);
            if !locals.contains(name) && !Self::is_call_part(node) && globals.contains(name) {
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

impl SourceAdapter for TypeScriptAdapter {
    fn init(&mut self) -> Result<(), AdapterError> {
        if self.typescript.is_none() {
            self.typescript = Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into());
        }
        if self.tsx.is_none() {
            self.tsx = Some(tree_sitter_typescript::LANGUAGE_TSX.into());
        }
        Ok(())
    }

    fn parse(&self, source: &str, path: Option<&Path>) -> ParseOutput {
        let source = truncate_source(source, self.limits.max_file_bytes, path);

        let tree = self.language_for(path).and_then(|language| {
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

    fn adapter() -> TypeScriptAdapter {
        let mut adapter = TypeScriptAdapter::new(SizeLimits::default());
        adapter.init().unwrap();
        adapter
    }

    fn definitions(source: &str) -> Vec<Definition> {
        let adapter = adapter();
        let parsed = adapter.parse(source, Some(Path::new("test.ts")));
        adapter.scan_definitions(&parsed)
    }

    fn references(source: &str, globals: &[&str]) -> Vec<Reference> {
        let adapter = adapter();
        let parsed = adapter.parse(source, Some(Path::new("test.ts")));
        let globals: HashSet<String> = globals.iter().map(|s| s.to_string()).collect();
        adapter.scan_references(&parsed, &globals)
    }

    #[test]
    fn functions_methods_and_arrow_bindings() {
        let source = "\
function load(path: string): void {\n\
}\n\
const parse = (text: string) => {\n\
    return text;\n\
};\n\
class Session {\n\
    close(): void {\n\
    }\n\
}\n";
        let defs = definitions(source);
        let names: Vec<_> = defs
            .iter()
            .filter(|d| d.kind == DefKind::Function)
            .map(|d| d.name.as_str())
            .collect();
        assert!(names.contains(&"load"));
        assert!(names.contains(&"parse"));
        assert!(names.contains(&"close"));
    }

    #[test]
    fn class_and_interface_heritage() {
        let source = "\
interface Closeable extends Disposable {\n\
}\n\
class Connection extends Socket implements Closeable {\n\
}\n";
        let defs = definitions(source);

        let interface = defs.iter().find(|d| d.name == "Closeable").unwrap();
        assert_eq!(interface.kind, DefKind::Class);
        assert_eq!(interface.bases, vec!["Disposable"]);

        let class = defs.iter().find(|d| d.name == "Connection").unwrap();
        assert_eq!(class.bases, vec!["Socket", "Closeable"]);
    }

    #[test]
    fn ternary_and_operator_complexity() {
        let source = "\
function pick(a: number, b: number): number {\n\
    return a > 0 && b > 0 ? a : b;\n\
}\n";
        let defs = definitions(source);
        // 1 + ternary + one short-circuit operator.
        assert_eq!(defs[0].complexity, Some(3));
    }

    #[test]
    fn calls_usages_and_member_targets() {
        let source = "\
function refresh(id: number) {\n\
    const cached = registry;\n\
    store.save(id);\n\
    rebuild(registry);\n\
}\n";
        let refs = references(source, &["registry"]);

        let calls: Vec<_> = refs
            .iter()
            .filter(|r| r.kind == RefKind::Call)
            .map(|r| r.target.as_str())
            .collect();
        assert_eq!(calls, vec!["save", "rebuild"]);

        let usages: Vec<_> = refs
            .iter()
            .filter(|r| r.kind == RefKind::Usage)
            .map(|r| r.target.as_str())
            .collect();
        assert!(usages.contains(&"registry"));
        assert!(!usages.contains(&"cached"));
        assert!(!usages.contains(&"id"));
        assert!(!usages.contains(&"store"));
    }

    #[test]
    fn new_expression_is_a_call() {
        let refs = references("function boot() {\n    const s = new Server();\n}\n", &[]);
        assert!(refs
            .iter()
            .any(|r| r.kind == RefKind::Call && r.target == "Server"));
    }

    #[test]
    fn arrow_function_references_are_attributed_to_binding() {
        let source = "const sync = () => {\n    flush(queue);\n};\n";
        let refs = references(source, &["queue"]);
        assert!(refs
            .iter()
            .any(|r| r.source == "sync" && r.kind == RefKind::Call && r.target == "flush"));
        assert!(refs
            .iter()
            .any(|r| r.source == "sync" && r.kind == RefKind::Usage && r.target == "queue"));
    }
}
