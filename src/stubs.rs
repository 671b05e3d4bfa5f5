//! Exception stubs for external libraries.
//!
//! A stub file declares which exceptions calls into an unanalyzed module
//! can raise. Builtin stubs cover a few common libraries; users add more
//! under `<config-dir>/stubs/*.yaml`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::StubError;

/// Builtin stub files, shipped with the binary.
const BUILTIN_STUBS: &[(&str, &str)] = &[
    ("requests.yaml", include_str!("stubs/requests.yaml")),
    ("json.yaml", include_str!("stubs/json.yaml")),
    ("io.yaml", include_str!("stubs/io.yaml")),
];

/// Template written by `stubs init`.
pub const STUB_TEMPLATE: &str = include_str!("stubs/template.yaml");

/// On-disk schema of one stub file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StubFile {
    pub module: String,
    #[serde(default)]
    pub functions: BTreeMap<String, Vec<String>>,
}

/// Collection of exception stubs, indexed by module then function.
#[derive(Debug, Clone, Default)]
pub struct StubLibrary {
    stubs: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl StubLibrary {
    /// Exceptions a call can raise: prefer a match on the qualified module
    /// name, fall back to a bare-name match across every registered stub.
    pub fn get_exceptions(&self, module: &str, function: &str) -> BTreeSet<String> {
        if let Some(functions) = self.stubs.get(module) {
            if let Some(exceptions) = functions.get(function) {
                return exceptions.iter().cloned().collect();
            }
        }

        let mut merged = BTreeSet::new();
        for functions in self.stubs.values() {
            if let Some(exceptions) = functions.get(function) {
                merged.extend(exceptions.iter().cloned());
            }
        }
        merged
    }

    /// Exceptions for a callee reference: a dotted path like
    /// `http_client.get` matches by module, a bare name falls back across
    /// every registered stub.
    pub fn get_exceptions_for_ref(&self, callee_ref: &str) -> BTreeSet<String> {
        match callee_ref.rsplit_once('.') {
            Some((module, function)) => self.get_exceptions(module, function),
            None => self.get_exceptions("", callee_ref),
        }
    }

    pub fn add_stub(&mut self, module: &str, function: &str, exceptions: Vec<String>) {
        self.stubs
            .entry(module.to_string())
            .or_default()
            .insert(function.to_string(), exceptions);
    }

    pub fn modules(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, Vec<String>>)> {
        self.stubs.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }

    fn merge_file(&mut self, stub: StubFile) {
        for (function, exceptions) in stub.functions {
            self.add_stub(&stub.module, &function, exceptions);
        }
    }
}

/// Load builtin stubs plus user stubs from `<config-dir>/stubs/`.
///
/// Malformed user files are skipped; their errors come back as diagnostics.
pub fn load_stubs(config_dir: &Path) -> (StubLibrary, Vec<StubError>) {
    let mut library = StubLibrary::default();
    let mut errors = Vec::new();

    for (name, content) in BUILTIN_STUBS {
        match serde_yaml::from_str::<StubFile>(content) {
            Ok(stub) => library.merge_file(stub),
            Err(e) => errors.push(StubError {
                path: format!("<builtin>/{}", name),
                errors: vec![e.to_string()],
            }),
        }
    }

    for path in stub_files_in(config_dir) {
        let problems = validate_stub_file(&path);
        if !problems.is_empty() {
            errors.push(StubError {
                path: path.display().to_string(),
                errors: problems,
            });
            continue;
        }
        if let Ok(content) = fs::read_to_string(&path) {
            if let Ok(stub) = serde_yaml::from_str::<StubFile>(&content) {
                library.merge_file(stub);
            }
        }
    }

    (library, errors)
}

/// User stub files under `<config-dir>/stubs/`, sorted.
pub fn stub_files_in(config_dir: &Path) -> Vec<PathBuf> {
    let dir = config_dir.join("stubs");
    let Ok(entries) = fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut paths: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e == "yaml" || e == "yml")
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    paths
}

/// Validate a stub file, returning every problem found.
pub fn validate_stub_file(path: &Path) -> Vec<String> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return vec![format!("cannot read file: {}", e)],
    };

    let value: serde_yaml::Value = match serde_yaml::from_str(&content) {
        Ok(v) => v,
        Err(e) => return vec![format!("YAML syntax error: {}", e)],
    };

    let mut errors = Vec::new();
    let Some(mapping) = value.as_mapping() else {
        return vec!["root must be a mapping".to_string()];
    };

    if mapping.get("module").is_none() {
        errors.push("missing 'module' key".to_string());
    }

    match mapping.get("functions") {
        None => errors.push("missing 'functions' key".to_string()),
        Some(functions) => match functions.as_mapping() {
            None => errors.push("'functions' must be a mapping".to_string()),
            Some(functions) => {
                for (name, exceptions) in functions {
                    let name = name.as_str().unwrap_or("<non-string>");
                    match exceptions.as_sequence() {
                        None => {
                            errors.push(format!("'{}' must map to a list of exceptions", name))
                        }
                        Some(items) => {
                            for item in items {
                                if item.as_str().is_none() {
                                    errors.push(format!(
                                        "exception in '{}' must be a string",
                                        name
                                    ));
                                }
                            }
                        }
                    }
                }
            }
        },
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn qualified_match_beats_bare_fallback() {
        let mut library = StubLibrary::default();
        library.add_stub("http_client", "get", vec!["TimeoutError".into()]);
        library.add_stub("other_client", "get", vec!["OtherError".into()]);

        let exact = library.get_exceptions("http_client", "get");
        assert_eq!(exact.len(), 1);
        assert!(exact.contains("TimeoutError"));

        // Unknown module: bare-name fallback merges across stubs.
        let fallback = library.get_exceptions("unknown_module", "get");
        assert!(fallback.contains("TimeoutError"));
        assert!(fallback.contains("OtherError"));
    }

    #[test]
    fn ref_lookup_splits_module_and_function() {
        let mut library = StubLibrary::default();
        library.add_stub("http_client", "get", vec!["TimeoutError".into()]);

        let found = library.get_exceptions_for_ref("http_client.get");
        assert!(found.contains("TimeoutError"));
        // Bare references fall back by name across all stubs.
        assert!(library.get_exceptions_for_ref("get").contains("TimeoutError"));
        assert!(library.get_exceptions_for_ref("unknown").is_empty());
    }

    #[test]
    fn builtin_stubs_parse() {
        let temp = TempDir::new().unwrap();
        let (library, errors) = load_stubs(temp.path());
        assert!(errors.is_empty(), "builtin stub errors: {:?}", errors);
        assert!(!library.is_empty());
        assert!(!library.get_exceptions("requests", "get").is_empty());
    }

    #[test]
    fn user_stub_overlays_builtin() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("stubs");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("http_client.yaml"),
            "module: http_client\nfunctions:\n  get: [TimeoutError]\n",
        )
        .unwrap();

        let (library, errors) = load_stubs(temp.path());
        assert!(errors.is_empty());
        assert!(library.get_exceptions("http_client", "get").contains("TimeoutError"));
    }

    #[test]
    fn malformed_stub_is_skipped_with_errors() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("stubs");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("bad.yaml"), "functions:\n  get: 3\n").unwrap();

        let (_, errors) = load_stubs(temp.path());
        assert_eq!(errors.len(), 1);
        let joined = errors[0].errors.join("; ");
        assert!(joined.contains("missing 'module' key"));
        assert!(joined.contains("'get' must map to a list"));
    }

    #[test]
    fn validation_rules() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("s.yaml");

        fs::write(&path, "- just\n- a list\n").unwrap();
        assert_eq!(validate_stub_file(&path), vec!["root must be a mapping"]);

        fs::write(&path, "module: m\nfunctions:\n  f: [1, Exc]\n").unwrap();
        let errors = validate_stub_file(&path);
        assert!(errors.iter().any(|e| e.contains("must be a string")));

        fs::write(&path, "module: m\nfunctions:\n  f: [Exc]\n").unwrap();
        assert!(validate_stub_file(&path).is_empty());
    }
}
