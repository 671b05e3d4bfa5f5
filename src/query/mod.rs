//! Query engine over the program model and propagation results.
//!
//! Every query returns a typed result record from `results`; formatting
//! lives in `report`. Name resolution happens here, at the boundary, and
//! nowhere deeper.

mod results;

use std::collections::{BTreeMap, BTreeSet};

use lazy_static::lazy_static;

pub use results::*;

use crate::detect::FrameworkConfig;
use crate::errors::ResolveError;
use crate::model::{
    simple_name_of, Entrypoint, EntrypointKind, FunctionKey, ProgramModel, ResolutionKind,
    ResolutionMode,
};
use crate::propagate::{self, PropagationResult};
use crate::session::AnalysisSession;

lazy_static! {
    /// Exception-name noise produced by re-raised handler bindings; never
    /// reported as real escapes in audits.
    static ref RERAISE_NAMES: BTreeSet<&'static str> =
        ["Unknown", "e", "ex", "err", "exc", "error", "exception"]
            .into_iter()
            .collect();
}

/// The queried type plus (optionally) all its known subclasses.
fn searched_types(
    model: &ProgramModel,
    exception_type: &str,
    include_subclasses: bool,
) -> BTreeSet<String> {
    let mut types = BTreeSet::new();
    types.insert(exception_type.to_string());
    if include_subclasses {
        types.extend(model.hierarchy.get_subclasses(exception_type));
    }
    types
}

fn matches_any(types: &BTreeSet<String>, name: &str) -> bool {
    let simple = simple_name_of(name);
    types
        .iter()
        .any(|t| t == name || simple_name_of(t) == simple)
}

/// All raise sites matching an exception type.
pub fn find_raises(
    model: &ProgramModel,
    exception_type: &str,
    include_subclasses: bool,
) -> RaisesResult {
    let types = searched_types(model, exception_type, include_subclasses);
    let matches = model
        .raise_sites
        .iter()
        .filter(|site| matches_any(&types, &site.exception_type))
        .cloned()
        .collect();

    RaisesResult {
        exception_type: exception_type.to_string(),
        include_subclasses,
        types_searched: types,
        matches,
    }
}

/// All catch sites that would handle an exception type. A handler matches
/// when it names the type itself or any of its base classes; the result
/// says which direction applied.
pub fn find_catches(
    model: &ProgramModel,
    exception_type: &str,
    include_subclasses: bool,
) -> CatchesResult {
    let types = searched_types(model, exception_type, include_subclasses);

    let mut matches = Vec::new();
    for site in &model.catch_sites {
        if site.catches_all {
            matches.push(CatchMatch {
                site: site.clone(),
                matched_type: "all".to_string(),
                kind: CatchMatchKind::CatchesAll,
            });
            continue;
        }
        let matched = site.caught_types.iter().find_map(|caught| {
            let caught_simple = simple_name_of(caught);
            if caught_simple == "Exception" || caught_simple == "BaseException" {
                return Some((caught.clone(), CatchMatchKind::CatchesAll));
            }
            if matches_any(&types, caught) {
                return Some((caught.clone(), CatchMatchKind::Exact));
            }
            if types
                .iter()
                .any(|t| model.hierarchy.is_subclass_of(t, caught))
            {
                return Some((caught.clone(), CatchMatchKind::CatchesBase));
            }
            None
        });
        if let Some((matched_type, kind)) = matched {
            matches.push(CatchMatch {
                site: site.clone(),
                matched_type,
                kind,
            });
        }
    }

    let global_handlers = model
        .global_handlers
        .iter()
        .filter(|handler| {
            matches_any(&types, &handler.handled_type)
                || types
                    .iter()
                    .any(|t| model.hierarchy.is_subclass_of(t, &handler.handled_type))
        })
        .cloned()
        .collect();

    CatchesResult {
        exception_type: exception_type.to_string(),
        include_subclasses,
        types_searched: types,
        matches,
        global_handlers,
    }
}

/// Callers of a function: the qualified reverse graph first, then
/// simple-name fallback hits (omitted in strict mode). With `transitive`
/// the walk continues up to every function that can reach the target.
pub fn find_callers(
    session: &AnalysisSession,
    name: &str,
    mode: ResolutionMode,
    transitive: bool,
) -> Result<CallersResult, ResolveError> {
    let model = &session.model;
    let key = model.resolve_function_key(name)?;
    let reverse = propagate::build_reverse_graphs(model);

    let mut callers = Vec::new();
    let mut seen = BTreeSet::new();
    let mut frontier = vec![key.as_str().to_string()];

    while let Some(current) = frontier.pop() {
        let mut found: Vec<CallerInfo> = Vec::new();

        if let Some(qualified) = reverse.qualified.get(&current) {
            for (caller, kind) in qualified {
                found.push(CallerInfo {
                    caller: caller.clone(),
                    resolution: *kind,
                });
            }
        }
        if mode != ResolutionMode::Strict {
            if let Some(by_name) = reverse.by_name.get(simple_name_of(&current)) {
                for caller in by_name {
                    found.push(CallerInfo {
                        caller: caller.clone(),
                        resolution: ResolutionKind::NameFallback,
                    });
                }
            }
        }

        for info in found {
            if info.caller == key.as_str() || !seen.insert(info.caller.clone()) {
                continue;
            }
            if transitive {
                frontier.push(info.caller.clone());
            }
            callers.push(info);
        }
    }

    callers.sort_by(|a, b| a.caller.cmp(&b.caller));
    Ok(CallersResult {
        function: key.as_str().to_string(),
        mode,
        callers,
    })
}

/// Exceptions escaping a function, with evidence.
pub fn find_escapes(
    session: &AnalysisSession,
    name: &str,
    mode: ResolutionMode,
) -> Result<EscapesResult, ResolveError> {
    let key = session.model.resolve_function_key(name)?;
    let propagation = session.propagation(mode);

    let escapes = propagation
        .escapes_of(&key)
        .into_iter()
        .map(|exception| escape_info(&propagation, &key, exception))
        .collect();

    Ok(EscapesResult {
        function: key.as_str().to_string(),
        mode,
        escapes,
    })
}

fn escape_info(
    propagation: &PropagationResult,
    key: &FunctionKey,
    exception: String,
) -> EscapeInfo {
    let best = propagation.best_evidence(key, &exception);
    EscapeInfo {
        confidence: best.map(|b| b.confidence()).unwrap_or(crate::model::Confidence::High),
        evidence: best.map(|b| EvidenceDetail {
            origin_file: b.raise_site.file.clone(),
            origin_line: b.raise_site.line,
            path: b
                .path
                .iter()
                .map(|hop| PathHop {
                    caller: hop.caller.clone(),
                    callee: hop.callee.clone(),
                    file: hop.file.clone(),
                    line: hop.line,
                    resolution: hop.resolution_kind,
                })
                .collect(),
        }),
        exception,
    }
}

/// Trace the forward call tree from a function, annotating each node with
/// its direct raises and subtree escapes. Cycles render as stub nodes.
pub fn trace_function(
    session: &AnalysisSession,
    name: &str,
    max_depth: usize,
    show_all: bool,
) -> Result<TraceResult, ResolveError> {
    let model = &session.model;
    let key = model.resolve_function_key(name)?;
    let propagation = session.propagation(session.config.resolution_mode);
    let forward = propagate::build_forward_graph(model);
    let name_index = propagate::name_index_of(model);

    let root = build_trace_node(
        key.as_str(),
        model,
        &propagation,
        &forward,
        &name_index,
        &BTreeSet::new(),
        0,
        max_depth,
        show_all,
    );

    Ok(TraceResult {
        function: key.as_str().to_string(),
        max_depth,
        escaping: propagation.escapes_of(&key).into_iter().collect(),
        root,
    })
}

#[allow(clippy::too_many_arguments)]
fn build_trace_node(
    key_str: &str,
    model: &ProgramModel,
    propagation: &PropagationResult,
    forward: &BTreeMap<String, BTreeSet<String>>,
    name_index: &std::collections::HashMap<String, Vec<String>>,
    visited: &BTreeSet<String>,
    depth: usize,
    max_depth: usize,
    show_all: bool,
) -> Option<TraceNode> {
    if depth >= max_depth {
        return None;
    }
    let mut visited = visited.clone();
    visited.insert(key_str.to_string());

    let escapes: Vec<String> = propagation
        .escapes
        .get(key_str)
        .map(|s| s.iter().cloned().collect())
        .unwrap_or_default();
    let direct_raises: Vec<String> = propagation
        .direct_raises
        .get(key_str)
        .map(|s| s.iter().cloned().collect())
        .unwrap_or_default();

    let mut calls = Vec::new();
    for callee_ref in forward.get(key_str).into_iter().flatten() {
        for candidate in resolve_trace_ref(model, name_index, callee_ref) {
            let candidate_escapes = propagation
                .escapes
                .get(&candidate)
                .map(|s| !s.is_empty())
                .unwrap_or(false);
            if !show_all && !candidate_escapes {
                continue;
            }
            if visited.contains(&candidate) {
                calls.push(TraceNode {
                    function: simple_name_of(&candidate).to_string(),
                    qualified: candidate.clone(),
                    direct_raises: Vec::new(),
                    escapes: Vec::new(),
                    cycle: true,
                    calls: Vec::new(),
                });
                continue;
            }
            if let Some(node) = build_trace_node(
                &candidate,
                model,
                propagation,
                forward,
                name_index,
                &visited,
                depth + 1,
                max_depth,
                show_all,
            ) {
                calls.push(node);
            }
        }
    }

    Some(TraceNode {
        function: simple_name_of(key_str).to_string(),
        qualified: key_str.to_string(),
        direct_raises,
        escapes,
        cycle: false,
        calls,
    })
}

/// Resolve a forward-graph ref for trace display: a known key stays, a
/// module path maps onto its file key, anything else expands by name.
fn resolve_trace_ref(
    model: &ProgramModel,
    name_index: &std::collections::HashMap<String, Vec<String>>,
    callee_ref: &str,
) -> Vec<String> {
    if let Some(key) = FunctionKey::parse(callee_ref) {
        if model.functions.contains_key(&key) {
            return vec![callee_ref.to_string()];
        }
    }
    if callee_ref.contains('.') && !callee_ref.contains(FunctionKey::SEPARATOR) {
        if let Some(key) = model.resolve_module_path(callee_ref) {
            return vec![key.as_str().to_string()];
        }
    }
    name_index
        .get(simple_name_of(callee_ref))
        .cloned()
        .unwrap_or_default()
}

/// The project's exception classes, roots marked.
pub fn find_exceptions(model: &ProgramModel) -> ExceptionsResult {
    let mut classes = Vec::new();
    let mut roots = Vec::new();

    for class in model.hierarchy.exception_classes() {
        let is_root = !class.bases.iter().any(|base| {
            let simple = simple_name_of(base);
            model
                .hierarchy
                .get(simple)
                .map(|c| model.hierarchy.is_exception_class(&c.name))
                .unwrap_or(false)
        });
        if is_root {
            roots.push(class.name.clone());
        }
        classes.push(ExceptionClassInfo {
            name: class.name.clone(),
            bases: class.bases.clone(),
            file: class.file.clone(),
            line: class.line,
            is_root,
        });
    }

    ExceptionsResult { classes, roots }
}

/// All subclasses of a class. The name may be bare or a dotted suffix.
pub fn find_subclasses(model: &ProgramModel, class_name: &str) -> SubclassesResult {
    let simple = simple_name_of(class_name);
    let base = model.hierarchy.get(simple);

    let subclasses = model
        .hierarchy
        .get_subclasses(simple)
        .into_iter()
        .map(|name| {
            let class = model.hierarchy.get(&name);
            SubclassInfo {
                file: class.map(|c| c.file.clone()),
                line: class.map(|c| c.line),
                name,
            }
        })
        .collect();

    SubclassesResult {
        class_name: simple.to_string(),
        base_file: base.map(|c| c.file.clone()),
        base_line: base.map(|c| c.line),
        subclasses,
    }
}

/// Codebase statistics.
pub fn get_stats(model: &ProgramModel, cache: Option<crate::cache::CacheStats>) -> StatsResult {
    let http_routes = model
        .entrypoints
        .iter()
        .filter(|e| e.kind == EntrypointKind::HttpRoute)
        .count();
    let cli_scripts = model
        .entrypoints
        .iter()
        .filter(|e| e.kind == EntrypointKind::CliScript)
        .count();

    StatsResult {
        functions: model.functions.len(),
        classes: model.classes.len(),
        exception_classes: model.hierarchy.exception_classes().len(),
        raise_sites: model.raise_sites.len(),
        catch_sites: model.catch_sites.len(),
        call_sites: model.call_sites.len(),
        imports: model.imports.len(),
        entrypoints: model.entrypoints.len(),
        http_routes,
        cli_scripts,
        global_handlers: model.global_handlers.len(),
        detected_frameworks: model.detected_frameworks.iter().cloned().collect(),
        cache,
    }
}

/// Entrypoints grouped by kind, optionally filtered to one framework.
pub fn list_entrypoints(model: &ProgramModel, framework: Option<&str>) -> EntrypointsResult {
    let selected: Vec<&Entrypoint> = model
        .entrypoints
        .iter()
        .filter(|e| framework.map(|f| e.framework() == Some(f)).unwrap_or(true))
        .collect();

    EntrypointsResult {
        framework: framework.map(|f| f.to_string()),
        http_routes: selected
            .iter()
            .filter(|e| e.kind == EntrypointKind::HttpRoute)
            .map(|e| (*e).clone())
            .collect(),
        cli_scripts: selected
            .iter()
            .filter(|e| e.kind == EntrypointKind::CliScript)
            .map(|e| (*e).clone())
            .collect(),
        other: selected
            .iter()
            .filter(|e| e.kind == EntrypointKind::Other)
            .map(|e| (*e).clone())
            .collect(),
    }
}

/// Audit every entrypoint of a framework: partition its escape set into
/// framework-handled, caught-by-global-handler, locally-caught, uncaught.
pub fn audit_entrypoints(session: &AnalysisSession, config: &FrameworkConfig) -> AuditResult {
    let model = &session.model;
    let propagation = session.propagation(session.config.resolution_mode);
    let catch_sets = propagate::build_catch_sets(model);

    let entrypoints: Vec<&Entrypoint> = model
        .entrypoints
        .iter()
        .filter(|e| e.framework() == Some(config.name.as_str()))
        .collect();

    let mut entries = Vec::new();
    let mut clean_count = 0;

    for entrypoint in entrypoints.iter() {
        let mut buckets = AuditBuckets::default();
        let function_key = model.resolve_entrypoint(entrypoint);

        if let Some(key) = &function_key {
            let local_catches = catch_sets.get(key.as_str());
            for exception in propagation.escapes_of(key) {
                if RERAISE_NAMES.contains(simple_name_of(&exception)) {
                    continue;
                }

                if let Some(response) = framework_handles(session, config, &exception) {
                    buckets.framework_handled.insert(exception, response);
                    continue;
                }

                if let Some(handler) = global_handler_for(model, &exception) {
                    buckets.caught_by_global.insert(exception, handler);
                    continue;
                }

                if local_catches.map(|c| c.catches(&exception)).unwrap_or(false) {
                    buckets.locally_caught.push(exception);
                    continue;
                }

                let best = propagation.best_evidence(key, &exception);
                buckets.uncaught.push(UncaughtInfo {
                    confidence: best
                        .map(|b| b.confidence())
                        .unwrap_or(crate::model::Confidence::High),
                    origin_file: best.map(|b| b.raise_site.file.clone()),
                    origin_line: best.map(|b| b.raise_site.line),
                    exception,
                });
            }
        }

        if buckets.uncaught.is_empty() {
            clean_count += 1;
        }
        entries.push(AuditEntry {
            entrypoint: (*entrypoint).clone(),
            function_key: function_key.map(|k| k.as_str().to_string()),
            buckets,
        });
    }

    AuditResult {
        framework: config.name.clone(),
        total_entrypoints: entries.len(),
        clean_count,
        entries,
    }
}

/// The framework response for an exception, if the framework (or a
/// configured handled base class) absorbs it.
fn framework_handles(
    session: &AnalysisSession,
    config: &FrameworkConfig,
    exception: &str,
) -> Option<String> {
    if let Some(response) = config.framework_response(exception) {
        return Some(response.to_string());
    }
    for handled in config
        .handled_exceptions
        .iter()
        .chain(&session.config.handled_base_classes)
    {
        if session.model.hierarchy.is_subclass_of(exception, handled) {
            return Some(format!("handled via {}", simple_name_of(handled)));
        }
    }
    None
}

/// The global handler catching an exception (or any of its ancestors).
fn global_handler_for(model: &ProgramModel, exception: &str) -> Option<String> {
    model
        .global_handlers
        .iter()
        .find(|h| model.hierarchy.is_subclass_of(exception, &h.handled_type))
        .map(|h| h.handler_function.clone())
}

/// Which entrypoints of a framework can surface an exception.
pub fn routes_to_exception(
    session: &AnalysisSession,
    config: &FrameworkConfig,
    exception_type: &str,
    include_subclasses: bool,
) -> RoutesToResult {
    let model = &session.model;
    let types = searched_types(model, exception_type, include_subclasses);
    let propagation = session.propagation(session.config.resolution_mode);

    let mut routes = Vec::new();
    for entrypoint in model
        .entrypoints
        .iter()
        .filter(|e| e.framework() == Some(config.name.as_str()))
    {
        let Some(key) = model.resolve_entrypoint(entrypoint) else {
            continue;
        };
        let matched: Vec<String> = propagation
            .escapes_of(&key)
            .into_iter()
            .filter(|exc| matches_any(&types, exc))
            .collect();
        if !matched.is_empty() {
            routes.push(RouteHit {
                entrypoint: entrypoint.clone(),
                matched,
            });
        }
    }

    RoutesToResult {
        framework: config.name.clone(),
        exception_type: exception_type.to_string(),
        include_subclasses,
        types_searched: types,
        routes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::detect;
    use crate::extract::PythonExtractor;
    use crate::stubs::StubLibrary;

    fn session(files: &[(&str, &str)]) -> AnalysisSession {
        let extractor = PythonExtractor::new();
        let detectors = detect::builtin_detectors();
        let extractions = files
            .iter()
            .map(|(path, source)| {
                let parsed = extractor.parse(path, source.as_bytes()).unwrap();
                let mut extraction = extractor.extract(&parsed);
                let (entrypoints, handlers) = detect::run_detectors(&detectors, &parsed);
                extraction.entrypoints = entrypoints;
                extraction.global_handlers = handlers;
                (path.to_string(), extraction)
            })
            .collect();
        AnalysisSession::new(
            ProgramModel::assemble(extractions),
            Config::default(),
            StubLibrary::default(),
            Vec::new(),
        )
    }

    #[test]
    fn raises_includes_subclasses_when_asked() {
        let session = session(&[(
            "a.py",
            "class AppError(Exception):\n    pass\n\nclass DbError(AppError):\n    pass\n\ndef f():\n    raise DbError()\n",
        )]);
        let without = find_raises(&session.model, "AppError", false);
        assert!(without.matches.is_empty());
        let with = find_raises(&session.model, "AppError", true);
        assert_eq!(with.matches.len(), 1);
        assert!(with.types_searched.contains("DbError"));
    }

    #[test]
    fn catches_reports_direction() {
        let session = session(&[(
            "a.py",
            "class MyErr(ValueError):\n    pass\n\ndef f():\n    try:\n        g()\n    except ValueError:\n        pass\n    except MyErr:\n        pass\n",
        )]);
        let result = find_catches(&session.model, "MyErr", false);
        let kinds: Vec<CatchMatchKind> = result.matches.iter().map(|m| m.kind).collect();
        assert!(kinds.contains(&CatchMatchKind::CatchesBase));
        assert!(kinds.contains(&CatchMatchKind::Exact));
    }

    #[test]
    fn callers_mixes_resolved_and_fallback() {
        let session = session(&[
            ("a.py", "def target():\n    pass\n"),
            (
                "b.py",
                "from a import target\n\ndef resolved_caller():\n    target()\n",
            ),
            ("c.py", "def loose_caller(t):\n    t.target()\n"),
        ]);
        let default = find_callers(&session, "target", ResolutionMode::Default, false).unwrap();
        let names: Vec<&str> = default.callers.iter().map(|c| c.caller.as_str()).collect();
        assert!(names.contains(&"b.py::resolved_caller"));
        assert!(names.contains(&"c.py::loose_caller"));

        let strict = find_callers(&session, "target", ResolutionMode::Strict, false).unwrap();
        let names: Vec<&str> = strict.callers.iter().map(|c| c.caller.as_str()).collect();
        assert!(names.contains(&"b.py::resolved_caller"));
        assert!(!names.contains(&"c.py::loose_caller"));
    }

    #[test]
    fn escapes_query_carries_evidence() {
        let session = session(&[
            ("a.py", "def f():\n    raise ValueError(\"x\")\n"),
            ("b.py", "from a import f\n\ndef h():\n    f()\n"),
        ]);
        let result = find_escapes(&session, "h", ResolutionMode::Default).unwrap();
        assert_eq!(result.escapes.len(), 1);
        let escape = &result.escapes[0];
        assert_eq!(escape.exception, "ValueError");
        let evidence = escape.evidence.as_ref().unwrap();
        assert_eq!(evidence.origin_file, "a.py");
        assert_eq!(evidence.path.len(), 1);
    }

    #[test]
    fn unknown_function_fails_with_suggestions() {
        let session = session(&[("a.py", "def handler():\n    pass\n")]);
        match find_escapes(&session, "handlr", ResolutionMode::Default) {
            Err(ResolveError::FunctionNotFound { suggestions, .. }) => {
                assert!(suggestions.contains(&"handler".to_string()));
            }
            other => panic!("expected not-found, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn trace_builds_annotated_tree() {
        let session = session(&[
            ("a.py", "def leaf():\n    raise KeyError()\n"),
            ("b.py", "from a import leaf\n\ndef mid():\n    leaf()\n\ndef top():\n    mid()\n"),
        ]);
        let result = trace_function(&session, "top", 10, false).unwrap();
        let root = result.root.unwrap();
        assert_eq!(root.function, "top");
        assert!(root.escapes.contains(&"KeyError".to_string()));
        let mid = &root.calls[0];
        assert_eq!(mid.function, "mid");
        let leaf = &mid.calls[0];
        assert_eq!(leaf.function, "leaf");
        assert!(leaf.direct_raises.contains(&"KeyError".to_string()));
    }

    #[test]
    fn trace_breaks_cycles() {
        let session = session(&[(
            "a.py",
            "def ping(n):\n    raise ValueError()\n    pong(n)\n\ndef pong(n):\n    ping(n)\n",
        )]);
        let result = trace_function(&session, "ping", 10, true).unwrap();
        let root = result.root.unwrap();

        fn has_cycle_node(node: &TraceNode) -> bool {
            node.cycle || node.calls.iter().any(has_cycle_node)
        }
        assert!(has_cycle_node(&root));
    }

    #[test]
    fn audit_buckets_framework_and_global_and_uncaught() {
        let session = session(&[
            (
                "errors.py",
                "class AppError(Exception):\n    pass\n",
            ),
            (
                "api.py",
                r#"from fastapi import HTTPException
from errors import AppError

@app.exception_handler(AppError)
def handle_app_error(request, exc):
    pass

@router.get("/a")
def route_a():
    raise HTTPException(404)

@router.get("/b")
def route_b():
    raise AppError()

@router.get("/c")
def route_c():
    raise KeyError()
"#,
            ),
        ]);

        let result = audit_entrypoints(&session, &detect::fastapi_config());
        assert_eq!(result.total_entrypoints, 3);
        assert!(result.has_uncaught());

        let entry = |name: &str| {
            result
                .entries
                .iter()
                .find(|e| e.entrypoint.function == name)
                .unwrap()
        };
        assert!(entry("route_a").buckets.framework_handled.contains_key("fastapi.HTTPException"));
        assert!(entry("route_b").buckets.caught_by_global.contains_key("errors.AppError"));
        assert_eq!(entry("route_c").buckets.uncaught[0].exception, "KeyError");
        assert_eq!(result.clean_count, 2);
    }

    #[test]
    fn routes_to_finds_reaching_entrypoints() {
        let session = session(&[
            ("svc.py", "def boom():\n    raise OSError()\n"),
            (
                "api.py",
                "from svc import boom\n\n@router.get(\"/x\")\ndef route_x():\n    boom()\n\n@router.get(\"/y\")\ndef route_y():\n    pass\n",
            ),
        ]);
        let result = routes_to_exception(&session, &detect::fastapi_config(), "OSError", false);
        assert_eq!(result.routes.len(), 1);
        assert_eq!(result.routes[0].entrypoint.function, "route_x");
    }

    #[test]
    fn exceptions_listing_marks_roots() {
        let session = session(&[(
            "a.py",
            "class AppError(Exception):\n    pass\n\nclass DbError(AppError):\n    pass\n",
        )]);
        let result = find_exceptions(&session.model);
        assert_eq!(result.classes.len(), 2);
        assert_eq!(result.roots, vec!["AppError"]);
    }

    #[test]
    fn stats_counts_by_kind() {
        let session = session(&[(
            "app.py",
            "@app.route(\"/x\")\ndef h():\n    pass\n\nif __name__ == \"__main__\":\n    h()\n",
        )]);
        let stats = get_stats(&session.model, None);
        assert_eq!(stats.http_routes, 1);
        assert_eq!(stats.cli_scripts, 1);
        assert_eq!(stats.entrypoints, 2);
    }
}
