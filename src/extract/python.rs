//! Python extractor: a single CST walk producing a `FileExtraction`.
//!
//! The walk maintains a class stack, a function stack, a per-scope local
//! type environment, the file's import map, and the bound names of open
//! except clauses (the reraise context). Everything else in the pipeline
//! consumes the facts this pass emits.

use std::collections::HashMap;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, Tree};

use crate::model::{
    CallSite, CatchSite, ClassDef, FileExtraction, FunctionDef, FunctionKey, ImportInfo,
    RaiseSite, ResolutionKind, MODULE_SCOPE,
};

/// Query for the return-annotation pre-pass: same-file callees with a
/// declared return type feed the local type environment.
const RETURN_TYPE_QUERY: &str = r#"
(function_definition
  name: (identifier) @name
  return_type: (type) @ret
)
"#;

/// Query for the local-class pre-pass.
const CLASS_NAME_QUERY: &str = r#"
(class_definition
  name: (identifier) @name
) @class
"#;

/// Holds a parsed tree-sitter tree plus the bytes it was parsed from.
pub struct ParsedFile {
    pub tree: Tree,
    pub source: Vec<u8>,
    pub path: String,
}

impl ParsedFile {
    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }
}

pub struct PythonExtractor {
    language: Language,
}

impl Default for PythonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PythonExtractor {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }

    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }

    pub fn parse(&self, path: &str, source: &[u8]) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("failed to parse Python source: {}", path))?;
        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_string(),
        })
    }

    /// Extract all facts for one file. Parse problems degrade to
    /// diagnostics; this never fails the run.
    pub fn extract(&self, parsed: &ParsedFile) -> FileExtraction {
        let mut walk = Walk {
            parsed,
            path: &parsed.path,
            out: FileExtraction::default(),
            class_stack: Vec::new(),
            function_stack: Vec::new(),
            // One scope for module-level bindings; functions push their own.
            local_scopes: vec![HashMap::new()],
            except_stack: Vec::new(),
            local_classes: HashMap::new(),
            return_annotations: HashMap::new(),
        };

        if parsed.tree.root_node().has_error() {
            walk.out
                .diagnostics
                .push(format!("{}: syntax errors, extraction is partial", parsed.path));
        }

        walk.collect_return_annotations(&self.language);
        walk.collect_local_classes(&self.language);
        walk.visit(parsed.tree.root_node());
        walk.out
    }

    /// Parse and extract in one step, mapping total parse failure to an
    /// empty extraction with a diagnostic.
    pub fn extract_source(&self, path: &str, source: &[u8]) -> FileExtraction {
        match self.parse(path, source) {
            Ok(parsed) => self.extract(&parsed),
            Err(e) => FileExtraction::failed(format!("{}: {}", path, e)),
        }
    }
}

/// A local variable binding with its provenance.
struct LocalBinding {
    type_name: String,
    via_return_type: bool,
}

struct Walk<'a> {
    parsed: &'a ParsedFile,
    path: &'a str,
    out: FileExtraction,
    class_stack: Vec<String>,
    function_stack: Vec<String>,
    local_scopes: Vec<HashMap<String, LocalBinding>>,
    /// Bound name of each open except clause, innermost last.
    except_stack: Vec<Option<String>>,
    /// Simple name -> qualified name for classes defined in this file.
    local_classes: HashMap<String, String>,
    /// Same-file function name -> return annotation.
    return_annotations: HashMap<String, String>,
}

impl<'a> Walk<'a> {
    fn collect_return_annotations(&mut self, language: &Language) {
        let Ok(query) = Query::new(language, RETURN_TYPE_QUERY) else {
            return;
        };
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, self.parsed.tree.root_node(), &self.parsed.source[..]);

        while let Some(m) = matches.next() {
            let mut name = None;
            let mut annotation = None;
            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "name" => name = Some(self.parsed.node_text(capture.node).to_string()),
                    "ret" => annotation = type_annotation_name(self.parsed, capture.node),
                    _ => {}
                }
            }
            if let (Some(name), Some(annotation)) = (name, annotation) {
                self.return_annotations.insert(name, annotation);
            }
        }
    }

    fn collect_local_classes(&mut self, language: &Language) {
        let Ok(query) = Query::new(language, CLASS_NAME_QUERY) else {
            return;
        };
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, self.parsed.tree.root_node(), &self.parsed.source[..]);

        while let Some(m) = matches.next() {
            for capture in m.captures {
                if query.capture_names()[capture.index as usize] != "class" {
                    continue;
                }
                let node = capture.node;
                if let Some(name_node) = node.child_by_field_name("name") {
                    let name = self.parsed.node_text(name_node).to_string();
                    let qualified = enclosing_class_path(self.parsed, node, &name);
                    self.local_classes.insert(name, qualified);
                }
            }
        }
    }

    fn visit(&mut self, node: Node) {
        match node.kind() {
            "import_statement" => {
                self.on_import(node);
                return;
            }
            "import_from_statement" => {
                self.on_import_from(node);
                return;
            }
            "class_definition" => {
                self.on_class(node);
                return;
            }
            "function_definition" => {
                self.on_function(node);
                return;
            }
            "decorated_definition" => {
                // Decorator expressions never emit call sites; only the
                // detector framework inspects them.
                if let Some(definition) = node.child_by_field_name("definition") {
                    self.visit(definition);
                }
                return;
            }
            "raise_statement" => self.on_raise(node),
            "try_statement" => {
                self.on_try(node);
                return;
            }
            "call" => self.on_call(node),
            "assignment" => self.on_assignment(node),
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
    }

    // ---------------------------------------------------------------
    // context helpers

    fn current_qualified(&self) -> String {
        let mut parts: Vec<&str> = self.class_stack.iter().map(|s| s.as_str()).collect();
        parts.extend(self.function_stack.iter().map(|s| s.as_str()));
        if parts.is_empty() {
            MODULE_SCOPE.to_string()
        } else {
            parts.join(".")
        }
    }

    fn current_key(&self) -> FunctionKey {
        FunctionKey::new(self.path, &self.current_qualified())
    }

    fn innermost_bound_except(&self) -> Option<&str> {
        self.except_stack
            .iter()
            .rev()
            .find_map(|name| name.as_deref())
    }

    fn is_open_except_name(&self, name: &str) -> bool {
        self.except_stack
            .iter()
            .any(|bound| bound.as_deref() == Some(name))
    }

    /// Resolve a written name through the import map: a first segment that
    /// is an imported local name is replaced with its origin.
    fn resolve_through_imports(&self, written: &str) -> String {
        let head = written.split('.').next().unwrap_or(written);
        match self.out.import_map.get(head) {
            Some(origin) if head == written => origin.clone(),
            Some(origin) => format!("{}{}", origin, &written[head.len()..]),
            None => written.to_string(),
        }
    }

    // ---------------------------------------------------------------
    // imports

    fn on_import(&mut self, node: Node) {
        let mut cursor = node.walk();
        for name_node in node.children_by_field_name("name", &mut cursor) {
            let (module, alias) = match name_node.kind() {
                "aliased_import" => {
                    let module = name_node
                        .child_by_field_name("name")
                        .map(|n| self.parsed.node_text(n).to_string())
                        .unwrap_or_default();
                    let alias = name_node
                        .child_by_field_name("alias")
                        .map(|n| self.parsed.node_text(n).to_string());
                    (module, alias)
                }
                _ => (self.parsed.node_text(name_node).to_string(), None),
            };
            if module.is_empty() {
                continue;
            }

            match &alias {
                Some(alias) => {
                    self.out.import_map.insert(alias.clone(), module.clone());
                }
                None => {
                    // Dotted imports land under both the full path and the
                    // trailing segment.
                    self.out.import_map.insert(module.clone(), module.clone());
                    if let Some(tail) = module.rsplit('.').next() {
                        if tail != module {
                            self.out.import_map.insert(tail.to_string(), module.clone());
                        }
                    }
                }
            }

            self.detect_framework(&module);
            self.out.imports.push(ImportInfo {
                file: self.path.to_string(),
                module: module.clone(),
                name: module,
                alias,
                is_from_import: false,
            });
        }
    }

    fn on_import_from(&mut self, node: Node) {
        let Some(module_node) = node.child_by_field_name("module_name") else {
            return;
        };
        let module = self.parsed.node_text(module_node).to_string();
        self.detect_framework(&module);

        let mut saw_name = false;
        let mut cursor = node.walk();
        for name_node in node.children_by_field_name("name", &mut cursor) {
            saw_name = true;
            let (name, alias) = match name_node.kind() {
                "aliased_import" => {
                    let name = name_node
                        .child_by_field_name("name")
                        .map(|n| self.parsed.node_text(n).to_string())
                        .unwrap_or_default();
                    let alias = name_node
                        .child_by_field_name("alias")
                        .map(|n| self.parsed.node_text(n).to_string());
                    (name, alias)
                }
                _ => (self.parsed.node_text(name_node).to_string(), None),
            };
            if name.is_empty() {
                continue;
            }

            let local = alias.clone().unwrap_or_else(|| name.clone());
            self.out
                .import_map
                .insert(local, format!("{}.{}", module, name));
            self.out.imports.push(ImportInfo {
                file: self.path.to_string(),
                module: module.clone(),
                name,
                alias,
                is_from_import: true,
            });
        }

        if !saw_name {
            // `from mod import *`
            let mut cursor = node.walk();
            let has_wildcard = node
                .children(&mut cursor)
                .any(|c| c.kind() == "wildcard_import");
            if has_wildcard {
                self.out.imports.push(ImportInfo {
                    file: self.path.to_string(),
                    module: module.clone(),
                    name: "*".to_string(),
                    alias: None,
                    is_from_import: true,
                });
            }
        }
    }

    fn detect_framework(&mut self, module: &str) {
        let lowered = module.to_lowercase();
        if lowered.contains("flask") {
            self.out.detected_frameworks.insert("flask".to_string());
        } else if lowered.contains("fastapi") || lowered.contains("starlette") {
            self.out.detected_frameworks.insert("fastapi".to_string());
        } else if lowered.contains("django") || lowered.contains("rest_framework") {
            self.out.detected_frameworks.insert("django".to_string());
        }
    }

    // ---------------------------------------------------------------
    // definitions

    fn on_class(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.parsed.node_text(name_node).to_string();

        let mut bases = Vec::new();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for arg in superclasses.named_children(&mut cursor) {
                // Skip keyword arguments like metaclass=...
                if let Some(base) = dotted_name_of(self.parsed, arg) {
                    bases.push(base);
                }
            }
        }

        self.class_stack.push(name.clone());
        let qualified = self.class_stack.join(".");

        self.out.classes.push(ClassDef {
            file: self.path.to_string(),
            line: node.start_position().row + 1,
            name,
            qualified_name: qualified,
            bases,
            is_exception: false,
        });

        if let Some(body) = node.child_by_field_name("body") {
            self.visit_children_of(body);
        }
        self.class_stack.pop();
    }

    fn on_function(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.parsed.node_text(name_node).to_string();

        let mut parts: Vec<&str> = self.class_stack.iter().map(|s| s.as_str()).collect();
        parts.extend(self.function_stack.iter().map(|s| s.as_str()));
        parts.push(&name);
        let qualified = parts.join(".");

        let return_type = node
            .child_by_field_name("return_type")
            .and_then(|t| type_annotation_name(self.parsed, t));
        if let Some(annotation) = &return_type {
            self.out.return_types.insert(
                FunctionKey::new(self.path, &qualified).as_str().to_string(),
                annotation.clone(),
            );
        }

        self.out.functions.push(FunctionDef {
            file: self.path.to_string(),
            line: node.start_position().row + 1,
            name: name.clone(),
            qualified_name: qualified,
            class_name: self.class_stack.last().cloned(),
            return_type,
        });

        self.function_stack.push(name);
        let mut scope = HashMap::new();
        if let Some(parameters) = node.child_by_field_name("parameters") {
            self.bind_annotated_parameters(parameters, &mut scope);
        }
        self.local_scopes.push(scope);

        if let Some(body) = node.child_by_field_name("body") {
            self.visit_children_of(body);
        }

        self.local_scopes.pop();
        self.function_stack.pop();
    }

    fn bind_annotated_parameters(&self, parameters: Node, scope: &mut HashMap<String, LocalBinding>) {
        let mut cursor = parameters.walk();
        for param in parameters.named_children(&mut cursor) {
            let (name_node, type_node) = match param.kind() {
                "typed_parameter" => (param.named_child(0), param.child_by_field_name("type")),
                "typed_default_parameter" => (
                    param.child_by_field_name("name"),
                    param.child_by_field_name("type"),
                ),
                _ => continue,
            };
            let (Some(name_node), Some(type_node)) = (name_node, type_node) else {
                continue;
            };
            if name_node.kind() != "identifier" {
                continue;
            }
            if let Some(type_name) = type_annotation_name(self.parsed, type_node) {
                scope.insert(
                    self.parsed.node_text(name_node).to_string(),
                    LocalBinding {
                        type_name,
                        via_return_type: false,
                    },
                );
            }
        }
    }

    fn visit_children_of(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
    }

    // ---------------------------------------------------------------
    // raises and catches

    fn on_raise(&mut self, node: Node) {
        let line = node.start_position().row + 1;
        let function = self.current_key();

        let target = raise_target(node);

        let (exception_type, is_reraise) = match target {
            None => {
                let bound = self
                    .innermost_bound_except()
                    .unwrap_or("Unknown")
                    .to_string();
                (bound, true)
            }
            Some(expr) => match expr.kind() {
                "call" => {
                    let written = expr
                        .child_by_field_name("function")
                        .and_then(|f| dotted_name_of(self.parsed, f))
                        .unwrap_or_else(|| "Unknown".to_string());
                    (self.resolve_through_imports(&written), false)
                }
                "identifier" => {
                    let written = self.parsed.node_text(expr).to_string();
                    if self.is_open_except_name(&written) {
                        (written, true)
                    } else {
                        (self.resolve_through_imports(&written), false)
                    }
                }
                _ => match dotted_name_of(self.parsed, expr) {
                    Some(written) => (self.resolve_through_imports(&written), false),
                    None => ("Unknown".to_string(), false),
                },
            },
        };

        self.out.raise_sites.push(RaiseSite {
            file: self.path.to_string(),
            line,
            function,
            exception_type,
            is_reraise,
        });
    }

    fn on_try(&mut self, node: Node) {
        let function = self.current_key();
        let (try_start, try_end) = match node.child_by_field_name("body") {
            Some(body) => (body.start_position().row + 1, body.end_position().row + 1),
            None => (node.start_position().row + 1, node.end_position().row + 1),
        };

        // Protected region first, outside any reraise context.
        if let Some(body) = node.child_by_field_name("body") {
            self.visit_children_of(body);
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "except_clause" => {
                    self.on_except_clause(child, &function, try_start, try_end)
                }
                "except_group_clause" => {
                    self.out.diagnostics.push(format!(
                        "{}:{}: except* groups are not modeled",
                        self.path,
                        child.start_position().row + 1
                    ));
                    // Facts inside the handler body still count.
                    if let Some(block) = last_block_child(child) {
                        self.visit_children_of(block);
                    }
                }
                "else_clause" | "finally_clause" => {
                    if let Some(block) = last_block_child(child) {
                        self.visit_children_of(block);
                    }
                }
                _ => {}
            }
        }
    }

    fn on_except_clause(
        &mut self,
        clause: Node,
        function: &FunctionKey,
        try_start: usize,
        try_end: usize,
    ) {
        let mut caught_types = Vec::new();
        let mut catches_all = false;
        let mut bound_name = None;

        // Named children: optional type expression (an as_pattern when a
        // name is bound), then the handler block.
        let mut cursor = clause.walk();
        let named: Vec<Node> = clause.named_children(&mut cursor).collect();
        let exprs: Vec<Node> = named.iter().copied().filter(|n| n.kind() != "block").collect();

        let mut type_expr = exprs.first().copied();
        if let Some(expr) = type_expr {
            if expr.kind() == "as_pattern" {
                // `except ValueError as e:`
                type_expr = expr.named_child(0);
                if let Some(alias) = expr.child_by_field_name("alias") {
                    bound_name = Some(self.parsed.node_text(alias).to_string());
                }
            }
        }
        // Older grammar shape: `except X, e:` yields two sibling expressions.
        if bound_name.is_none() {
            if let Some(alias) = exprs.get(1) {
                if alias.kind() == "identifier" {
                    bound_name = Some(self.parsed.node_text(*alias).to_string());
                }
            }
        }

        match type_expr {
            None => catches_all = true,
            Some(type_expr) => {
                if type_expr.kind() == "tuple" {
                    let mut tuple_cursor = type_expr.walk();
                    for element in type_expr.named_children(&mut tuple_cursor) {
                        if let Some(name) = dotted_name_of(self.parsed, element) {
                            caught_types.push(self.resolve_through_imports(&name));
                        }
                    }
                } else if let Some(name) = dotted_name_of(self.parsed, type_expr) {
                    caught_types.push(self.resolve_through_imports(&name));
                }
                if caught_types.is_empty() {
                    // Dynamic expression in the type slot: over-approximate.
                    catches_all = true;
                }
            }
        }

        let block = named.iter().copied().find(|n| n.kind() == "block");
        let has_reraise = block
            .map(|b| {
                let mut block_cursor = b.walk();
                let found = b
                    .named_children(&mut block_cursor)
                    .any(|stmt| stmt.kind() == "raise_statement");
                found
            })
            .unwrap_or(false);

        self.out.catch_sites.push(CatchSite {
            file: self.path.to_string(),
            line: clause.start_position().row + 1,
            function: function.clone(),
            caught_types,
            catches_all,
            bound_name: bound_name.clone(),
            has_reraise,
            try_start_line: try_start,
            try_end_line: try_end,
        });

        self.except_stack.push(bound_name);
        if let Some(block) = block {
            self.visit_children_of(block);
        }
        self.except_stack.pop();
    }

    // ---------------------------------------------------------------
    // calls and assignments

    fn on_call(&mut self, node: Node) {
        let Some(func) = node.child_by_field_name("function") else {
            return;
        };
        let line = node.start_position().row + 1;
        let caller = self.current_key();

        match func.kind() {
            "identifier" => {
                let callee = self.parsed.node_text(func).to_string();
                let (callee_key, resolution) = match self.out.import_map.get(&callee) {
                    Some(origin) => (Some(origin.clone()), ResolutionKind::Import),
                    None => (None, ResolutionKind::Unresolved),
                };
                self.out.call_sites.push(CallSite {
                    file: self.path.to_string(),
                    line,
                    caller,
                    callee_bare_name: callee,
                    callee_key,
                    is_method_call: false,
                    resolution,
                });
            }
            "attribute" => {
                let Some(attr_node) = func.child_by_field_name("attribute") else {
                    return;
                };
                let attr = self.parsed.node_text(attr_node).to_string();
                let object = func.child_by_field_name("object");

                let mut callee_key = None;
                let mut resolution = ResolutionKind::Unresolved;
                let mut is_method_call = true;

                if let Some(object) = object.filter(|o| o.kind() == "identifier") {
                    let object_name = self.parsed.node_text(object);
                    if object_name == "self" && !self.class_stack.is_empty() {
                        let class_path = self.class_stack.join(".");
                        callee_key = Some(
                            FunctionKey::new(self.path, &format!("{}.{}", class_path, attr))
                                .as_str()
                                .to_string(),
                        );
                        resolution = ResolutionKind::SelfCall;
                    } else if let Some(binding) =
                        self.local_scopes.last().and_then(|s| s.get(object_name))
                    {
                        let type_name = binding.type_name.clone();
                        callee_key = Some(match self.out.import_map.get(&type_name) {
                            Some(origin) => format!("{}.{}", origin, attr),
                            None => {
                                let qualified = self
                                    .local_classes
                                    .get(&type_name)
                                    .cloned()
                                    .unwrap_or(type_name);
                                FunctionKey::new(self.path, &format!("{}.{}", qualified, attr))
                                    .as_str()
                                    .to_string()
                            }
                        });
                        resolution = if binding.via_return_type {
                            ResolutionKind::ReturnType
                        } else {
                            ResolutionKind::Constructor
                        };
                    } else if let Some(origin) = self.out.import_map.get(object_name) {
                        // Attribute access on an imported module.
                        callee_key = Some(format!("{}.{}", origin, attr));
                        resolution = ResolutionKind::Import;
                        is_method_call = false;
                    }
                }

                self.out.call_sites.push(CallSite {
                    file: self.path.to_string(),
                    line,
                    caller,
                    callee_bare_name: attr,
                    callee_key,
                    is_method_call,
                    resolution,
                });
            }
            // Anything else in the function position is skipped entirely.
            _ => {}
        }
    }

    fn on_assignment(&mut self, node: Node) {
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let var_name = self.parsed.node_text(left).to_string();

        if let Some(type_node) = node.child_by_field_name("type") {
            if let Some(type_name) = type_annotation_name(self.parsed, type_node) {
                self.bind_local(var_name.clone(), type_name, false);
            }
        }

        let Some(right) = node.child_by_field_name("right") else {
            return;
        };
        if right.kind() != "call" {
            return;
        }
        let Some(func) = right.child_by_field_name("function") else {
            return;
        };
        if func.kind() != "identifier" {
            return;
        }
        let callee = self.parsed.node_text(func).to_string();

        if self.local_classes.contains_key(&callee) || self.out.import_map.contains_key(&callee) {
            self.bind_local(var_name, callee, false);
        } else if let Some(annotation) = self.return_annotations.get(&callee) {
            self.bind_local(var_name, annotation.clone(), true);
        }
    }

    fn bind_local(&mut self, name: String, type_name: String, via_return_type: bool) {
        if let Some(scope) = self.local_scopes.last_mut() {
            scope.insert(
                name,
                LocalBinding {
                    type_name,
                    via_return_type,
                },
            );
        }
    }
}

/// The exception expression of a raise statement, if any.
fn raise_target(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "comment" {
            continue;
        }
        // `raise X from Y` puts the cause under its own field.
        if node.child_by_field_name("cause") == Some(child) {
            continue;
        }
        return Some(child);
    }
    None
}

/// Extract a dotted name from an identifier/attribute/dotted_name node.
fn dotted_name_of(parsed: &ParsedFile, node: Node) -> Option<String> {
    match node.kind() {
        "identifier" | "dotted_name" => Some(parsed.node_text(node).to_string()),
        "attribute" => {
            let object = node.child_by_field_name("object")?;
            let attr = node.child_by_field_name("attribute")?;
            let base = dotted_name_of(parsed, object)?;
            Some(format!("{}.{}", base, parsed.node_text(attr)))
        }
        _ => None,
    }
}

/// The class name inside a type annotation. Subscripted and otherwise
/// structured annotations yield nothing; only plain names resolve.
fn type_annotation_name(parsed: &ParsedFile, type_node: Node) -> Option<String> {
    let inner = if type_node.kind() == "type" {
        type_node.named_child(0)?
    } else {
        type_node
    };
    dotted_name_of(parsed, inner)
}

fn last_block_child(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let mut result = None;
    for child in node.named_children(&mut cursor) {
        if child.kind() == "block" {
            result = Some(child);
        }
    }
    result
}

fn enclosing_class_path(parsed: &ParsedFile, class_node: Node, name: &str) -> String {
    let mut parts = vec![name.to_string()];
    let mut current = class_node.parent();
    while let Some(node) = current {
        if node.kind() == "class_definition" {
            if let Some(name_node) = node.child_by_field_name("name") {
                parts.push(parsed.node_text(name_node).to_string());
            }
        }
        current = node.parent();
    }
    parts.reverse();
    parts.join(".")
}
