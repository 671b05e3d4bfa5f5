//! Fact records produced by extraction.
//!
//! Everything in this module is serializable: the file cache persists
//! `FileExtraction` values verbatim, and query results embed these records
//! in their JSON output.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical identity of a function or method: `relative_path::qualified_name`.
///
/// The `::` separator never occurs inside a relative path or a dotted
/// qualified name, so the rendering is unambiguous. Module-level code is
/// attributed to the synthetic qualified name `<module>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionKey(String);

/// Qualified name used for statements outside any function body.
pub const MODULE_SCOPE: &str = "<module>";

impl FunctionKey {
    pub const SEPARATOR: &'static str = "::";

    pub fn new(file: &str, qualified_name: &str) -> Self {
        Self(format!("{}{}{}", file, Self::SEPARATOR, qualified_name))
    }

    /// Parse a rendered key. Returns None if the separator is missing.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.contains(Self::SEPARATOR) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The relative file path component.
    pub fn file(&self) -> &str {
        self.0.split(Self::SEPARATOR).next().unwrap_or(&self.0)
    }

    /// The dotted qualified name component.
    pub fn qualified(&self) -> &str {
        match self.0.find(Self::SEPARATOR) {
            Some(idx) => &self.0[idx + Self::SEPARATOR.len()..],
            None => &self.0,
        }
    }

    /// The bare function name (last dotted segment of the qualified name).
    pub fn simple_name(&self) -> &str {
        self.qualified().rsplit('.').next().unwrap_or(self.qualified())
    }

    /// True when the qualified name has a class (or enclosing function) prefix.
    pub fn is_method(&self) -> bool {
        self.qualified().contains('.')
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extract the bare name from a key string or dotted path.
///
/// Works for rendered keys (`a.py::Cls.method` -> `method`), module paths
/// (`pkg.mod.func` -> `func`) and plain names.
pub fn simple_name_of(reference: &str) -> &str {
    let tail = match reference.rfind(FunctionKey::SEPARATOR) {
        Some(idx) => &reference[idx + FunctionKey::SEPARATOR.len()..],
        None => reference,
    };
    tail.rsplit('.').next().unwrap_or(tail)
}

/// How a call site was resolved to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    /// Name call resolved through the file's import map.
    Import,
    /// Attribute call on `self` within a class body.
    #[serde(rename = "self")]
    SelfCall,
    /// Attribute call on a local bound by a constructor call or annotation.
    Constructor,
    /// Attribute call on a local bound via a callee's return annotation.
    ReturnType,
    /// Assigned during propagation: bare-name match against the key index.
    NameFallback,
    /// Assigned during propagation: several keys matched a method call.
    Polymorphic,
    /// Assigned during propagation: the callee matched a stub entry.
    Stub,
    /// Extraction could not resolve the target.
    Unresolved,
}

impl ResolutionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionKind::Import => "import",
            ResolutionKind::SelfCall => "self",
            ResolutionKind::Constructor => "constructor",
            ResolutionKind::ReturnType => "return_type",
            ResolutionKind::NameFallback => "name_fallback",
            ResolutionKind::Polymorphic => "polymorphic",
            ResolutionKind::Stub => "stub",
            ResolutionKind::Unresolved => "unresolved",
        }
    }

    /// Heuristic kinds lower path confidence and are dropped in strict mode.
    pub fn is_heuristic(&self) -> bool {
        matches!(self, ResolutionKind::NameFallback | ResolutionKind::Polymorphic)
    }
}

impl fmt::Display for ResolutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolution mode for propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMode {
    /// Only follow resolved call edges.
    Strict,
    /// Resolved edges plus name-fallback and polymorphic expansion.
    Default,
    /// Accepted for compatibility; behaves like `Default`.
    Aggressive,
}

impl ResolutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMode::Strict => "strict",
            ResolutionMode::Default => "default",
            ResolutionMode::Aggressive => "aggressive",
        }
    }
}

impl Default for ResolutionMode {
    fn default() -> Self {
        ResolutionMode::Default
    }
}

impl std::str::FromStr for ResolutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(ResolutionMode::Strict),
            "default" => Ok(ResolutionMode::Default),
            "aggressive" => Ok(ResolutionMode::Aggressive),
            _ => Err(format!("unknown resolution mode: {}", s)),
        }
    }
}

impl fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Confidence attached to a propagated-exception path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Derive confidence from the resolution kinds on a call path.
    pub fn for_path(edges: &[ResolutionEdge]) -> Self {
        if edges.iter().any(|e| e.resolution_kind.is_heuristic()) {
            return Confidence::Low;
        }
        if edges.iter().any(|e| e.resolution_kind == ResolutionKind::ReturnType) {
            return Confidence::Medium;
        }
        Confidence::High
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of entrypoint where external input enters the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntrypointKind {
    HttpRoute,
    CliScript,
    Other,
}

impl EntrypointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntrypointKind::HttpRoute => "http-route",
            EntrypointKind::CliScript => "cli-script",
            EntrypointKind::Other => "other",
        }
    }
}

impl fmt::Display for EntrypointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A function or method definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub file: String,
    pub line: usize,
    pub name: String,
    /// Dotted path of enclosing classes and functions plus the name itself.
    pub qualified_name: String,
    /// Innermost containing class, if any.
    pub class_name: Option<String>,
    /// Return type annotation as written, if any.
    pub return_type: Option<String>,
}

impl FunctionDef {
    pub fn key(&self) -> FunctionKey {
        FunctionKey::new(&self.file, &self.qualified_name)
    }

    pub fn is_method(&self) -> bool {
        self.class_name.is_some()
    }
}

/// A class definition with its base names as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub file: String,
    pub line: usize,
    pub name: String,
    pub qualified_name: String,
    pub bases: Vec<String>,
    /// Set during model assembly once the whole hierarchy is known.
    #[serde(default)]
    pub is_exception: bool,
}

/// A location where an exception is raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaiseSite {
    pub file: String,
    pub line: usize,
    pub function: FunctionKey,
    /// Exception type name as written (possibly unqualified, possibly a
    /// bound handler name for re-raises).
    pub exception_type: String,
    /// True for `raise` with no target or `raise e` of a bound handler name.
    pub is_reraise: bool,
}

/// One except clause. A try with several clauses yields several catch sites
/// sharing the same protected span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchSite {
    pub file: String,
    pub line: usize,
    pub function: FunctionKey,
    pub caught_types: Vec<String>,
    /// Bare `except:` or `except BaseException:` shorthand marker.
    pub catches_all: bool,
    /// Name bound with `as`, if any.
    pub bound_name: Option<String>,
    /// The clause body re-raises; such a handler does not swallow.
    pub has_reraise: bool,
    /// Line span of the protected try body.
    pub try_start_line: usize,
    pub try_end_line: usize,
}

/// A location where a function is called.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSite {
    pub file: String,
    pub line: usize,
    pub caller: FunctionKey,
    /// The bare callee name; always present.
    pub callee_bare_name: String,
    /// Resolved target when extraction succeeded: either a rendered
    /// `FunctionKey` or a module-qualified path for imported targets.
    pub callee_key: Option<String>,
    pub is_method_call: bool,
    pub resolution: ResolutionKind,
}

impl CallSite {
    /// The reference propagation follows: the resolved key when present,
    /// else the bare name.
    pub fn callee_ref(&self) -> &str {
        self.callee_key.as_deref().unwrap_or(&self.callee_bare_name)
    }
}

/// An import statement binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportInfo {
    pub file: String,
    pub module: String,
    pub name: String,
    pub alias: Option<String>,
    pub is_from_import: bool,
}

/// A detected entrypoint. The function field holds the bare or
/// class-qualified name as written; it is resolved to a `FunctionKey` at
/// consumption time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entrypoint {
    pub file: String,
    pub line: usize,
    pub function: String,
    pub kind: EntrypointKind,
    pub metadata: BTreeMap<String, String>,
}

impl Entrypoint {
    pub fn framework(&self) -> Option<&str> {
        self.metadata.get("framework").map(|s| s.as_str())
    }
}

/// A framework-registered exception handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalHandler {
    pub file: String,
    pub line: usize,
    pub handler_function: String,
    pub handled_type: String,
}

/// An edge on a propagated call path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionEdge {
    pub caller: String,
    pub callee: String,
    pub file: String,
    pub line: usize,
    pub resolution_kind: ResolutionKind,
    pub is_heuristic: bool,
}

/// Everything the extractor produced for one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileExtraction {
    pub functions: Vec<FunctionDef>,
    pub classes: Vec<ClassDef>,
    pub raise_sites: Vec<RaiseSite>,
    pub catch_sites: Vec<CatchSite>,
    pub call_sites: Vec<CallSite>,
    pub imports: Vec<ImportInfo>,
    pub entrypoints: Vec<Entrypoint>,
    pub global_handlers: Vec<GlobalHandler>,
    /// Local name -> origin qualified name.
    pub import_map: BTreeMap<String, String>,
    /// Rendered function key -> return annotation.
    pub return_types: BTreeMap<String, String>,
    /// Framework tags inferred from imports.
    pub detected_frameworks: BTreeSet<String>,
    /// Non-fatal problems encountered while extracting this file.
    pub diagnostics: Vec<String>,
}

impl FileExtraction {
    /// An empty extraction carrying a diagnostic, used for unparsable files.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            diagnostics: vec![message.into()],
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_components() {
        let key = FunctionKey::new("pkg/api.py", "Handler.get");
        assert_eq!(key.file(), "pkg/api.py");
        assert_eq!(key.qualified(), "Handler.get");
        assert_eq!(key.simple_name(), "get");
        assert!(key.is_method());
        assert_eq!(key.as_str(), "pkg/api.py::Handler.get");
    }

    #[test]
    fn key_parse_requires_separator() {
        assert!(FunctionKey::parse("a.py::f").is_some());
        assert!(FunctionKey::parse("just_a_name").is_none());
    }

    #[test]
    fn module_level_key() {
        let key = FunctionKey::new("script.py", MODULE_SCOPE);
        assert_eq!(key.simple_name(), MODULE_SCOPE);
        assert!(!key.is_method());
    }

    #[test]
    fn simple_name_of_references() {
        assert_eq!(simple_name_of("a.py::Cls.method"), "method");
        assert_eq!(simple_name_of("pkg.mod.func"), "func");
        assert_eq!(simple_name_of("plain"), "plain");
    }

    #[test]
    fn confidence_from_path() {
        let edge = |kind: ResolutionKind| ResolutionEdge {
            caller: "a".into(),
            callee: "b".into(),
            file: "a.py".into(),
            line: 1,
            resolution_kind: kind,
            is_heuristic: kind.is_heuristic(),
        };

        assert_eq!(Confidence::for_path(&[edge(ResolutionKind::Import)]), Confidence::High);
        assert_eq!(
            Confidence::for_path(&[edge(ResolutionKind::Import), edge(ResolutionKind::ReturnType)]),
            Confidence::Medium
        );
        assert_eq!(
            Confidence::for_path(&[edge(ResolutionKind::ReturnType), edge(ResolutionKind::NameFallback)]),
            Confidence::Low
        );
        assert_eq!(Confidence::for_path(&[]), Confidence::High);
    }

    #[test]
    fn callee_ref_prefers_resolved_key() {
        let mut call = CallSite {
            file: "a.py".into(),
            line: 3,
            caller: FunctionKey::new("a.py", "f"),
            callee_bare_name: "save".into(),
            callee_key: None,
            is_method_call: true,
            resolution: ResolutionKind::Unresolved,
        };
        assert_eq!(call.callee_ref(), "save");
        call.callee_key = Some("a.py::Repo.save".into());
        assert_eq!(call.callee_ref(), "a.py::Repo.save");
    }

    #[test]
    fn extraction_round_trips_through_json() {
        let extraction = FileExtraction {
            functions: vec![FunctionDef {
                file: "a.py".into(),
                line: 1,
                name: "f".into(),
                qualified_name: "f".into(),
                class_name: None,
                return_type: Some("Client".into()),
            }],
            raise_sites: vec![RaiseSite {
                file: "a.py".into(),
                line: 2,
                function: FunctionKey::new("a.py", "f"),
                exception_type: "ValueError".into(),
                is_reraise: false,
            }],
            ..Default::default()
        };

        let json = serde_json::to_string(&extraction).unwrap();
        let back: FileExtraction = serde_json::from_str(&json).unwrap();
        assert_eq!(extraction, back);
    }
}
