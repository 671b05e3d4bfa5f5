//! Whole-program model: merged extractions, hierarchy, name index.
//!
//! The model is assembled once per analysis session and is immutable
//! afterwards. All internal structures key on full `FunctionKey`s; bare
//! names are resolved at system boundaries through `resolve_function_key`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::errors::ResolveError;
use crate::model::facts::{
    CallSite, CatchSite, ClassDef, Entrypoint, FileExtraction, FunctionDef, FunctionKey,
    GlobalHandler, ImportInfo, RaiseSite, MODULE_SCOPE,
};
use crate::model::hierarchy::ClassHierarchy;

/// The complete model of a codebase for analysis.
pub struct ProgramModel {
    pub functions: BTreeMap<FunctionKey, FunctionDef>,
    /// Keyed by `file::qualified` like functions.
    pub classes: BTreeMap<String, ClassDef>,
    pub raise_sites: Vec<RaiseSite>,
    pub catch_sites: Vec<CatchSite>,
    pub call_sites: Vec<CallSite>,
    pub imports: Vec<ImportInfo>,
    pub entrypoints: Vec<Entrypoint>,
    pub global_handlers: Vec<GlobalHandler>,
    pub hierarchy: ClassHierarchy,
    /// Per-file import maps: relative path -> (local name -> origin).
    pub import_maps: HashMap<String, BTreeMap<String, String>>,
    /// Rendered function key -> return annotation.
    pub return_types: HashMap<String, String>,
    pub detected_frameworks: BTreeSet<String>,
    /// Diagnostics accumulated across all files (parse failures etc.).
    pub diagnostics: Vec<String>,
    /// Bare or class-qualified name -> matching keys.
    name_to_keys: HashMap<String, Vec<FunctionKey>>,
}

impl ProgramModel {
    /// Merge per-file extractions into a single model.
    ///
    /// Entries are sorted by (file, line, name) so downstream queries and
    /// tests are deterministic regardless of extraction order.
    pub fn assemble(mut extractions: Vec<(String, FileExtraction)>) -> Self {
        extractions.sort_by(|a, b| a.0.cmp(&b.0));

        let mut model = ProgramModel {
            functions: BTreeMap::new(),
            classes: BTreeMap::new(),
            raise_sites: Vec::new(),
            catch_sites: Vec::new(),
            call_sites: Vec::new(),
            imports: Vec::new(),
            entrypoints: Vec::new(),
            global_handlers: Vec::new(),
            hierarchy: ClassHierarchy::new(),
            import_maps: HashMap::new(),
            return_types: HashMap::new(),
            detected_frameworks: BTreeSet::new(),
            diagnostics: Vec::new(),
            name_to_keys: HashMap::new(),
        };

        for (path, extraction) in extractions {
            for func in extraction.functions {
                model.functions.insert(func.key(), func);
            }
            for class in extraction.classes {
                let key = format!("{}{}{}", path, FunctionKey::SEPARATOR, class.qualified_name);
                model.hierarchy.add_class(&class);
                model.classes.insert(key, class);
            }
            model.raise_sites.extend(extraction.raise_sites);
            model.catch_sites.extend(extraction.catch_sites);
            model.call_sites.extend(extraction.call_sites);
            model.imports.extend(extraction.imports);
            model.entrypoints.extend(extraction.entrypoints);
            model.global_handlers.extend(extraction.global_handlers);
            model.import_maps.insert(path.clone(), extraction.import_map);
            model.return_types.extend(extraction.return_types);
            model
                .detected_frameworks
                .extend(extraction.detected_frameworks);
            model.diagnostics.extend(extraction.diagnostics);
        }

        model
            .raise_sites
            .sort_by(|a, b| (&a.file, a.line, &a.exception_type).cmp(&(&b.file, b.line, &b.exception_type)));
        model
            .catch_sites
            .sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
        model
            .call_sites
            .sort_by(|a, b| (&a.file, a.line, &a.callee_bare_name).cmp(&(&b.file, b.line, &b.callee_bare_name)));
        model.imports.sort_by(|a, b| (&a.file, &a.module, &a.name).cmp(&(&b.file, &b.module, &b.name)));
        model
            .entrypoints
            .sort_by(|a, b| (&a.file, a.line, &a.function).cmp(&(&b.file, b.line, &b.function)));
        model
            .global_handlers
            .sort_by(|a, b| (&a.file, a.line, &a.handled_type).cmp(&(&b.file, b.line, &b.handled_type)));
        // Several framework configs share handler shapes (fastapi and
        // django both match `exception_handler`); identical records
        // collapse to one.
        model.global_handlers.dedup();

        // Exception flags need the fully merged hierarchy.
        for class in model.classes.values_mut() {
            class.is_exception = model.hierarchy.is_exception_class(&class.name);
        }

        // Reverse name index: every key under its bare name, and under the
        // class-qualified name when the two differ.
        for (key, func) in &model.functions {
            model
                .name_to_keys
                .entry(func.name.clone())
                .or_default()
                .push(key.clone());
            if func.qualified_name != func.name {
                model
                    .name_to_keys
                    .entry(func.qualified_name.clone())
                    .or_default()
                    .push(key.clone());
            }
        }
        for keys in model.name_to_keys.values_mut() {
            keys.sort();
            keys.dedup();
        }

        model
    }

    /// All keys registered under a bare or class-qualified name.
    pub fn keys_for_name(&self, name: &str) -> &[FunctionKey] {
        self.name_to_keys.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Resolve a user-supplied name to a canonical key.
    ///
    /// Accepts a full rendered key, a bare name, or a class-qualified name.
    /// Fails with suggestions (edit distance, top three, similarity >= 0.5)
    /// when nothing matches, or with the candidate list when several do.
    pub fn resolve_function_key(&self, name: &str) -> Result<FunctionKey, ResolveError> {
        if let Some(key) = FunctionKey::parse(name) {
            if self.functions.contains_key(&key) {
                return Ok(key);
            }
        }

        match self.keys_for_name(name) {
            [] => Err(ResolveError::FunctionNotFound {
                name: name.to_string(),
                suggestions: self.similar_names(name),
            }),
            [key] => Ok(key.clone()),
            many => Err(ResolveError::AmbiguousFunction {
                name: name.to_string(),
                matches: many.to_vec(),
            }),
        }
    }

    /// Resolve an entrypoint's function field, scoping by its file first.
    ///
    /// CLI-script entrypoints bind to the synthetic module-level record.
    pub fn resolve_entrypoint(&self, entrypoint: &Entrypoint) -> Option<FunctionKey> {
        if entrypoint.function == MODULE_SCOPE {
            return Some(FunctionKey::new(&entrypoint.file, MODULE_SCOPE));
        }

        let direct = FunctionKey::new(&entrypoint.file, &entrypoint.function);
        if self.functions.contains_key(&direct) {
            return Some(direct);
        }

        let candidates = self.keys_for_name(&entrypoint.function);
        if let Some(key) = candidates.iter().find(|k| k.file() == entrypoint.file) {
            return Some(key.clone());
        }
        if let [only] = candidates {
            return Some(only.clone());
        }
        None
    }

    /// Map a module-qualified reference like `pkg.mod.func` onto a file
    /// key (`pkg/mod.py::func`) when the module lives in the scanned tree.
    pub fn resolve_module_path(&self, dotted: &str) -> Option<FunctionKey> {
        let segments: Vec<&str> = dotted.split('.').collect();
        for split in 1..segments.len() {
            let module = segments[..split].join("/");
            let qualified = segments[split..].join(".");
            for file in [format!("{}.py", module), format!("{}/__init__.py", module)] {
                let key = FunctionKey::new(&file, &qualified);
                if self.functions.contains_key(&key) {
                    return Some(key);
                }
            }
        }
        None
    }

    /// Close matches for a misspelled name, best first.
    fn similar_names(&self, target: &str) -> Vec<String> {
        let mut scored: Vec<(f64, &String)> = self
            .name_to_keys
            .keys()
            .filter_map(|candidate| {
                let score = similarity(target, candidate);
                (score >= 0.5).then_some((score, candidate))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(b.1)));
        scored.into_iter().take(3).map(|(_, name)| name.clone()).collect()
    }
}

/// Levenshtein similarity ratio in [0, 1].
fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein(a, b) as f64 / max_len as f64)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (m, n) = (a.len(), b.len());
    let mut dp = vec![vec![0usize; n + 1]; m + 1];
    for (i, row) in dp.iter_mut().enumerate().take(m + 1) {
        row[0] = i;
    }
    for (j, cell) in dp[0].iter_mut().enumerate().take(n + 1) {
        *cell = j;
    }
    for i in 1..=m {
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            dp[i][j] = (dp[i - 1][j] + 1)
                .min(dp[i][j - 1] + 1)
                .min(dp[i - 1][j - 1] + cost);
        }
    }
    dp[m][n]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::facts::EntrypointKind;

    fn function(file: &str, name: &str, qualified: &str) -> FunctionDef {
        FunctionDef {
            file: file.into(),
            line: 1,
            name: name.into(),
            qualified_name: qualified.into(),
            class_name: (qualified != name).then(|| {
                qualified.rsplit_once('.').map(|(head, _)| head.to_string()).unwrap_or_default()
            }),
            return_type: None,
        }
    }

    fn model_with(functions: Vec<FunctionDef>) -> ProgramModel {
        let mut by_file: BTreeMap<String, FileExtraction> = BTreeMap::new();
        for f in functions {
            by_file.entry(f.file.clone()).or_default().functions.push(f);
        }
        ProgramModel::assemble(by_file.into_iter().collect())
    }

    #[test]
    fn every_key_is_indexed_under_its_bare_name() {
        let model = model_with(vec![
            function("a.py", "save", "Repo.save"),
            function("b.py", "load", "load"),
        ]);

        for key in model.functions.keys() {
            let bare = key.simple_name();
            assert!(
                model.keys_for_name(bare).contains(key),
                "{} missing under {}",
                key,
                bare
            );
        }
        // Class-qualified alias present when it differs from the bare name.
        assert_eq!(model.keys_for_name("Repo.save").len(), 1);
    }

    #[test]
    fn resolve_accepts_full_key() {
        let model = model_with(vec![function("a.py", "f", "f")]);
        let key = FunctionKey::new("a.py", "f");
        assert_eq!(model.resolve_function_key(key.as_str()).unwrap(), key);
    }

    #[test]
    fn resolve_unique_bare_name() {
        let model = model_with(vec![function("a.py", "handler", "handler")]);
        let key = model.resolve_function_key("handler").unwrap();
        assert_eq!(key, FunctionKey::new("a.py", "handler"));
    }

    #[test]
    fn resolve_ambiguous_lists_matches() {
        let model = model_with(vec![
            function("a.py", "save", "A.save"),
            function("b.py", "save", "B.save"),
        ]);
        match model.resolve_function_key("save") {
            Err(ResolveError::AmbiguousFunction { matches, .. }) => {
                assert_eq!(matches.len(), 2);
            }
            other => panic!("expected ambiguity, got {:?}", other.map(|k| k.to_string())),
        }
        // Class-qualified form disambiguates.
        assert!(model.resolve_function_key("A.save").is_ok());
    }

    #[test]
    fn resolve_missing_offers_suggestions() {
        let model = model_with(vec![function("a.py", "handler", "handler")]);
        match model.resolve_function_key("handlr") {
            Err(ResolveError::FunctionNotFound { suggestions, .. }) => {
                assert_eq!(suggestions, vec!["handler".to_string()]);
            }
            other => panic!("expected not-found, got {:?}", other.map(|k| k.to_string())),
        }
    }

    #[test]
    fn assembly_is_idempotent() {
        let build = || {
            model_with(vec![
                function("b.py", "g", "g"),
                function("a.py", "f", "f"),
            ])
        };
        let one = build();
        let two = build();
        assert_eq!(one.functions, two.functions);
        let keys1: Vec<_> = one.functions.keys().collect();
        let keys2: Vec<_> = two.functions.keys().collect();
        assert_eq!(keys1, keys2);
    }

    #[test]
    fn entrypoint_resolution_prefers_same_file() {
        let model = model_with(vec![
            function("api.py", "handler", "handler"),
            function("other.py", "handler", "handler"),
        ]);
        let ep = Entrypoint {
            file: "api.py".into(),
            line: 3,
            function: "handler".into(),
            kind: EntrypointKind::HttpRoute,
            metadata: BTreeMap::new(),
        };
        assert_eq!(
            model.resolve_entrypoint(&ep).unwrap(),
            FunctionKey::new("api.py", "handler")
        );
    }

    #[test]
    fn cli_entrypoint_binds_to_module_scope() {
        let model = model_with(vec![]);
        let ep = Entrypoint {
            file: "script.py".into(),
            line: 1,
            function: MODULE_SCOPE.into(),
            kind: EntrypointKind::CliScript,
            metadata: BTreeMap::new(),
        };
        assert_eq!(
            model.resolve_entrypoint(&ep).unwrap(),
            FunctionKey::new("script.py", MODULE_SCOPE)
        );
    }

    #[test]
    fn similarity_threshold() {
        assert!(similarity("handler", "handlr") >= 0.5);
        assert!(similarity("handler", "xyzzy") < 0.5);
    }
}
