//! Pattern matchers that classify decorators, class bases, and registration
//! calls as entrypoints or global handlers.
//!
//! Patterns are plain serializable records: a framework is a configuration
//! of pattern lists, and user-supplied detector files deserialize straight
//! into `FrameworkConfig`. Adding a framework requires no extractor changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::extract::ParsedFile;
use crate::model::{Entrypoint, EntrypointKind, GlobalHandler, MODULE_SCOPE};

/// HTTP-method-named methods recognized on class-based views.
pub const HTTP_METHOD_NAMES: &[&str] = &["get", "post", "put", "patch", "delete", "head", "options"];

/// Pattern for decorator-based routes like `@app.route` or `@router.get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoratorRoutePattern {
    /// Name to match against the decorator's attribute, e.g. `route`,
    /// `get`, or a glob like `*.expose`.
    pub decorator: String,
    /// Where the path template lives: `arg[N]` or `kwarg[name]`.
    #[serde(default = "default_path_source")]
    pub path_source: String,
    /// Where the HTTP method comes from: `decorator_name`,
    /// `kwarg[methods]`, or `arg[N]`.
    #[serde(default = "default_method_source")]
    pub method_source: String,
    #[serde(default = "default_method")]
    pub default_method: String,
}

fn default_path_source() -> String {
    "arg[0]".to_string()
}

fn default_method_source() -> String {
    "kwarg[methods]".to_string()
}

fn default_method() -> String {
    "GET".to_string()
}

impl DecoratorRoutePattern {
    pub fn matches_decorator(&self, name: &str) -> bool {
        name_matches(&self.decorator, name)
    }
}

/// Pattern for class-based views like Django's `APIView` subclasses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRoutePattern {
    pub base_classes: Vec<String>,
    #[serde(default = "default_http_methods")]
    pub method_names: Vec<String>,
}

fn default_http_methods() -> Vec<String> {
    HTTP_METHOD_NAMES.iter().map(|m| m.to_string()).collect()
}

impl ClassRoutePattern {
    pub fn matches_base(&self, base: &str) -> bool {
        let simple = base.rsplit('.').next().unwrap_or(base);
        self.base_classes.iter().any(|b| b == base || b == simple)
    }
}

/// Pattern for registration calls like `api.add_resource(Cls, "/path")`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationCallPattern {
    /// Glob matched against the dotted call name.
    pub call: String,
    #[serde(default = "default_class_arg")]
    pub class_arg: usize,
    #[serde(default = "default_path_arg")]
    pub path_arg: usize,
    #[serde(default = "default_http_methods")]
    pub method_names: Vec<String>,
}

fn default_class_arg() -> usize {
    0
}

fn default_path_arg() -> usize {
    1
}

impl RegistrationCallPattern {
    pub fn matches_call(&self, name: &str) -> bool {
        name_matches(&self.call, name)
    }
}

/// Pattern for global exception handlers: a decorator shape like
/// `@app.errorhandler(Exc)` or a call shape like
/// `app.add_exception_handler(Exc, fn)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandlerPattern {
    #[serde(default)]
    pub decorator: Option<String>,
    #[serde(default)]
    pub call: Option<String>,
}

impl HandlerPattern {
    pub fn matches_decorator(&self, name: &str) -> bool {
        self.decorator
            .as_deref()
            .map(|p| name_matches(p, name))
            .unwrap_or(false)
    }

    pub fn matches_call(&self, name: &str) -> bool {
        self.call
            .as_deref()
            .map(|p| name_matches(p, name))
            .unwrap_or(false)
    }
}

/// Complete configuration for one framework.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameworkConfig {
    pub name: String,
    #[serde(default)]
    pub route_patterns: Vec<DecoratorRoutePattern>,
    #[serde(default)]
    pub class_patterns: Vec<ClassRoutePattern>,
    #[serde(default)]
    pub registration_patterns: Vec<RegistrationCallPattern>,
    #[serde(default)]
    pub handler_patterns: Vec<HandlerPattern>,
    /// Exceptions the framework converts to responses on its own.
    #[serde(default)]
    pub handled_exceptions: Vec<String>,
    /// Exception name -> response description shown in audit output.
    #[serde(default)]
    pub exception_responses: BTreeMap<String, String>,
}

impl FrameworkConfig {
    /// The response the framework produces for an exception, tolerant of
    /// qualified and bare spellings on both sides.
    pub fn framework_response(&self, exception: &str) -> Option<&str> {
        if let Some(response) = self.exception_responses.get(exception) {
            return Some(response.as_str());
        }
        let simple = exception.rsplit('.').next().unwrap_or(exception);
        self.exception_responses
            .iter()
            .find(|(name, _)| name.rsplit('.').next().unwrap_or(name) == simple)
            .map(|(_, response)| response.as_str())
    }
}

/// Match a pattern against a decorator/call name.
///
/// A plain pattern matches the trailing attribute segment; patterns with
/// wildcards or dots glob against the full dotted name.
fn name_matches(pattern: &str, name: &str) -> bool {
    if !pattern.contains('*') && !pattern.contains('.') {
        let simple = name.rsplit('.').next().unwrap_or(name);
        return simple == pattern;
    }
    match globset::Glob::new(pattern) {
        Ok(glob) => glob.compile_matcher().is_match(name),
        Err(_) => false,
    }
}

// -------------------------------------------------------------------
// CST matching

/// Run a framework config over a parsed file, collecting entrypoints.
pub fn detect_entrypoints(parsed: &ParsedFile, config: &FrameworkConfig) -> Vec<Entrypoint> {
    let mut found = Vec::new();
    walk(parsed.tree.root_node(), &mut |node| match node.kind() {
        "decorated_definition" => {
            decorated_routes(parsed, config, node, &mut found);
        }
        "class_definition" => {
            class_routes(parsed, config, node, &mut found);
        }
        "call" => {
            registration_routes(parsed, config, node, &mut found);
        }
        _ => {}
    });
    found
}

/// Run a framework config over a parsed file, collecting global handlers.
pub fn detect_global_handlers(parsed: &ParsedFile, config: &FrameworkConfig) -> Vec<GlobalHandler> {
    let mut found = Vec::new();
    walk(parsed.tree.root_node(), &mut |node| match node.kind() {
        "decorated_definition" => {
            decorated_handlers(parsed, config, node, &mut found);
        }
        "call" => {
            call_handlers(parsed, config, node, &mut found);
        }
        _ => {}
    });
    found
}

/// Emit one CLI-script entrypoint for a file containing a
/// `if __name__ == "__main__":` block, bound to the module-level record.
pub fn detect_cli_entrypoint(parsed: &ParsedFile) -> Option<Entrypoint> {
    let root = parsed.tree.root_node();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() != "if_statement" {
            continue;
        }
        let Some(condition) = child.child_by_field_name("condition") else {
            continue;
        };
        let text = parsed.node_text(condition);
        if text.contains("__name__") && text.contains("__main__") {
            let mut metadata = BTreeMap::new();
            metadata.insert("framework".to_string(), "cli".to_string());
            return Some(Entrypoint {
                file: parsed.path.clone(),
                line: child.start_position().row + 1,
                function: MODULE_SCOPE.to_string(),
                kind: EntrypointKind::CliScript,
                metadata,
            });
        }
    }
    None
}

fn decorated_routes(
    parsed: &ParsedFile,
    config: &FrameworkConfig,
    node: Node,
    found: &mut Vec<Entrypoint>,
) {
    let Some(definition) = node.child_by_field_name("definition") else {
        return;
    };
    if definition.kind() != "function_definition" {
        return;
    }
    let Some(function) = qualified_definition_name(parsed, definition) else {
        return;
    };

    let mut cursor = node.walk();
    for decorator in node.children(&mut cursor) {
        if decorator.kind() != "decorator" {
            continue;
        }
        let Some((dec_name, dec_call)) = decorator_parts(parsed, decorator) else {
            continue;
        };

        for pattern in &config.route_patterns {
            if !pattern.matches_decorator(&dec_name) {
                continue;
            }

            let mut metadata = BTreeMap::new();
            metadata.insert("framework".to_string(), config.name.clone());

            if let Some(call) = dec_call {
                if let Some(path) = argument_by_source(parsed, call, &pattern.path_source) {
                    metadata.insert("path".to_string(), path);
                }
            }

            let method = match pattern.method_source.as_str() {
                "decorator_name" => dec_name
                    .rsplit('.')
                    .next()
                    .unwrap_or(&dec_name)
                    .to_uppercase(),
                source => dec_call
                    .and_then(|call| argument_by_source(parsed, call, source))
                    .map(|m| m.to_uppercase())
                    .unwrap_or_else(|| pattern.default_method.clone()),
            };
            metadata.insert("method".to_string(), method);

            found.push(Entrypoint {
                file: parsed.path.clone(),
                line: definition.start_position().row + 1,
                function: function.clone(),
                kind: EntrypointKind::HttpRoute,
                metadata,
            });
            break;
        }
    }
}

fn class_routes(
    parsed: &ParsedFile,
    config: &FrameworkConfig,
    node: Node,
    found: &mut Vec<Entrypoint>,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let class_name = parsed.node_text(name_node).to_string();

    let bases = class_bases(parsed, node);
    for pattern in &config.class_patterns {
        if !bases.iter().any(|b| pattern.matches_base(b)) {
            continue;
        }
        for (method, line) in class_methods(parsed, node) {
            if !pattern.method_names.contains(&method) {
                continue;
            }
            let mut metadata = BTreeMap::new();
            metadata.insert("framework".to_string(), config.name.clone());
            metadata.insert("method".to_string(), method.to_uppercase());
            metadata.insert("class".to_string(), class_name.clone());
            found.push(Entrypoint {
                file: parsed.path.clone(),
                line,
                function: format!("{}.{}", class_name, method),
                kind: EntrypointKind::HttpRoute,
                metadata,
            });
        }
        break;
    }
}

fn registration_routes(
    parsed: &ParsedFile,
    config: &FrameworkConfig,
    node: Node,
    found: &mut Vec<Entrypoint>,
) {
    let Some(func) = node.child_by_field_name("function") else {
        return;
    };
    let Some(call_name) = dotted(parsed, func) else {
        return;
    };

    for pattern in &config.registration_patterns {
        if !pattern.matches_call(&call_name) {
            continue;
        }
        let args = positional_args(node);
        let Some(class_node) = args.get(pattern.class_arg) else {
            continue;
        };
        if class_node.kind() != "identifier" {
            continue;
        }
        let class_name = parsed.node_text(*class_node).to_string();
        let path = args
            .get(pattern.path_arg)
            .and_then(|n| string_value(parsed, *n));

        // One entrypoint per HTTP-method-named method the class defines.
        let Some(class_def) = find_class(parsed, &class_name) else {
            continue;
        };
        for (method, line) in class_methods(parsed, class_def) {
            if !pattern.method_names.contains(&method) {
                continue;
            }
            let mut metadata = BTreeMap::new();
            metadata.insert("framework".to_string(), config.name.clone());
            metadata.insert("method".to_string(), method.to_uppercase());
            if let Some(path) = &path {
                metadata.insert("path".to_string(), path.clone());
            }
            found.push(Entrypoint {
                file: parsed.path.clone(),
                line,
                function: format!("{}.{}", class_name, method),
                kind: EntrypointKind::HttpRoute,
                metadata,
            });
        }
    }
}

fn decorated_handlers(
    parsed: &ParsedFile,
    config: &FrameworkConfig,
    node: Node,
    found: &mut Vec<GlobalHandler>,
) {
    let Some(definition) = node.child_by_field_name("definition") else {
        return;
    };
    if definition.kind() != "function_definition" {
        return;
    }
    let handler_function = definition
        .child_by_field_name("name")
        .map(|n| parsed.node_text(n).to_string())
        .unwrap_or_default();

    let mut cursor = node.walk();
    for decorator in node.children(&mut cursor) {
        if decorator.kind() != "decorator" {
            continue;
        }
        let Some((dec_name, Some(dec_call))) = decorator_parts(parsed, decorator) else {
            continue;
        };
        for pattern in &config.handler_patterns {
            if !pattern.matches_decorator(&dec_name) {
                continue;
            }
            let Some(handled) = positional_args(dec_call)
                .first()
                .and_then(|n| dotted(parsed, *n))
            else {
                continue;
            };
            found.push(GlobalHandler {
                file: parsed.path.clone(),
                line: definition.start_position().row + 1,
                handler_function: handler_function.clone(),
                handled_type: handled,
            });
        }
    }
}

fn call_handlers(
    parsed: &ParsedFile,
    config: &FrameworkConfig,
    node: Node,
    found: &mut Vec<GlobalHandler>,
) {
    let Some(func) = node.child_by_field_name("function") else {
        return;
    };
    let Some(call_name) = dotted(parsed, func) else {
        return;
    };

    for pattern in &config.handler_patterns {
        if !pattern.matches_call(&call_name) {
            continue;
        }
        let args = positional_args(node);
        let Some(handled) = args.first().and_then(|n| dotted(parsed, *n)) else {
            continue;
        };
        let handler_function = args
            .get(1)
            .and_then(|n| dotted(parsed, *n))
            .unwrap_or_default();
        found.push(GlobalHandler {
            file: parsed.path.clone(),
            line: node.start_position().row + 1,
            handler_function,
            handled_type: handled,
        });
    }
}

// -------------------------------------------------------------------
// node helpers

fn walk<'t>(node: Node<'t>, visit: &mut dyn FnMut(Node<'t>)) {
    visit(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, visit);
    }
}

/// Split a decorator into its dotted name and call node (when it is a call).
fn decorator_parts<'t>(
    parsed: &ParsedFile,
    decorator: Node<'t>,
) -> Option<(String, Option<Node<'t>>)> {
    let expr = decorator.named_child(0)?;
    match expr.kind() {
        "call" => {
            let func = expr.child_by_field_name("function")?;
            Some((dotted(parsed, func)?, Some(expr)))
        }
        _ => Some((dotted(parsed, expr)?, None)),
    }
}

fn dotted(parsed: &ParsedFile, node: Node) -> Option<String> {
    match node.kind() {
        "identifier" | "dotted_name" => Some(parsed.node_text(node).to_string()),
        "attribute" => {
            let object = node.child_by_field_name("object")?;
            let attr = node.child_by_field_name("attribute")?;
            Some(format!("{}.{}", dotted(parsed, object)?, parsed.node_text(attr)))
        }
        _ => None,
    }
}

/// Positional arguments of a call, keyword arguments excluded.
fn positional_args(call: Node) -> Vec<Node> {
    let Some(arguments) = call.child_by_field_name("arguments") else {
        return Vec::new();
    };
    let mut cursor = arguments.walk();
    arguments
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "keyword_argument" && n.kind() != "comment")
        .collect()
}

fn keyword_arg<'t>(call: Node<'t>, name: &str, parsed: &ParsedFile) -> Option<Node<'t>> {
    let arguments = call.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    for arg in arguments.named_children(&mut cursor) {
        if arg.kind() != "keyword_argument" {
            continue;
        }
        let key = arg.child_by_field_name("name")?;
        if parsed.node_text(key) == name {
            return arg.child_by_field_name("value");
        }
    }
    None
}

/// Resolve an `arg[N]` / `kwarg[name]` source against a call node.
fn argument_by_source(parsed: &ParsedFile, call: Node, source: &str) -> Option<String> {
    if let Some(index) = source
        .strip_prefix("arg[")
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|n| n.parse::<usize>().ok())
    {
        return positional_args(call)
            .get(index)
            .and_then(|n| extracted_value(parsed, *n));
    }
    if let Some(name) = source
        .strip_prefix("kwarg[")
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return keyword_arg(call, name, parsed).and_then(|n| extracted_value(parsed, n));
    }
    None
}

/// A display value for a pattern source: string literals lose their quotes,
/// lists flatten to comma-separated items.
fn extracted_value(parsed: &ParsedFile, node: Node) -> Option<String> {
    match node.kind() {
        "string" => string_value(parsed, node),
        "list" | "tuple" => {
            let mut cursor = node.walk();
            let items: Vec<String> = node
                .named_children(&mut cursor)
                .filter_map(|n| extracted_value(parsed, n))
                .collect();
            (!items.is_empty()).then(|| items.join(","))
        }
        _ => dotted(parsed, node),
    }
}

fn string_value(parsed: &ParsedFile, node: Node) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let text = parsed.node_text(node);
    Some(text.trim_matches(|c| c == '"' || c == '\'').to_string())
}

fn class_bases(parsed: &ParsedFile, class_node: Node) -> Vec<String> {
    let Some(superclasses) = class_node.child_by_field_name("superclasses") else {
        return Vec::new();
    };
    let mut cursor = superclasses.walk();
    superclasses
        .named_children(&mut cursor)
        .filter_map(|n| dotted(parsed, n))
        .collect()
}

/// (name, line) of each method defined directly on a class.
fn class_methods(parsed: &ParsedFile, class_node: Node) -> Vec<(String, usize)> {
    let Some(body) = class_node.child_by_field_name("body") else {
        return Vec::new();
    };
    let mut methods = Vec::new();
    let mut cursor = body.walk();
    for child in body.named_children(&mut cursor) {
        let def = match child.kind() {
            "function_definition" => Some(child),
            "decorated_definition" => child
                .child_by_field_name("definition")
                .filter(|d| d.kind() == "function_definition"),
            _ => None,
        };
        if let Some(def) = def {
            if let Some(name) = def.child_by_field_name("name") {
                methods.push((
                    parsed.node_text(name).to_string(),
                    def.start_position().row + 1,
                ));
            }
        }
    }
    methods
}

fn find_class<'t>(parsed: &'t ParsedFile, name: &str) -> Option<Node<'t>> {
    let root = parsed.tree.root_node();
    let mut result = None;
    walk(root, &mut |node| {
        if result.is_some() || node.kind() != "class_definition" {
            return;
        }
        if let Some(name_node) = node.child_by_field_name("name") {
            if parsed.node_text(name_node) == name {
                result = Some(node);
            }
        }
    });
    result
}

fn qualified_definition_name(parsed: &ParsedFile, definition: Node) -> Option<String> {
    let name = parsed
        .node_text(definition.child_by_field_name("name")?)
        .to_string();
    let mut classes = Vec::new();
    let mut current = definition.parent();
    while let Some(node) = current {
        if node.kind() == "class_definition" {
            if let Some(n) = node.child_by_field_name("name") {
                classes.push(parsed.node_text(n).to_string());
            }
        }
        current = node.parent();
    }
    classes.reverse();
    if classes.is_empty() {
        Some(name)
    } else {
        Some(format!("{}.{}", classes.join("."), name))
    }
}
