//! Exception propagation: a monotone fixpoint over the call graph.
//!
//! For each function the analysis computes the set of exception types that
//! escape it: direct raises, plus everything propagated from callees, minus
//! whatever the function's own handlers catch (subclass-aware). Evidence
//! records one call path per (exception, origin raise site), preferring the
//! shortest path and the highest confidence on ties.

mod graph;

use std::collections::{BTreeSet, HashMap};

pub use graph::{
    build_catch_sets, build_forward_graph, build_reverse_graphs, catches_by_function, CatchSet,
    Edge, PropagationGraph, ReverseGraphs,
};

use crate::model::{
    simple_name_of, CatchSite, Confidence, FunctionKey, ProgramModel, RaiseSite, ResolutionEdge,
    ResolutionKind, ResolutionMode,
};
use crate::stubs::StubLibrary;

/// Convergence is guaranteed by monotonicity; the guard only bounds
/// pathological inputs.
pub const MAX_ITERATIONS: usize = 100;

/// Identifies one piece of evidence: (exception, origin file, origin line).
pub type EvidenceKey = (String, String, usize);

/// One exception escaping one function, with the call path that carries it.
#[derive(Debug, Clone)]
pub struct PropagatedRaise {
    pub exception_type: String,
    pub raise_site: RaiseSite,
    /// Caller-to-origin order; empty for direct raises.
    pub path: Vec<ResolutionEdge>,
}

impl PropagatedRaise {
    pub fn confidence(&self) -> Confidence {
        Confidence::for_path(&self.path)
    }
}

/// Options for one propagation run.
#[derive(Debug, Clone, Default)]
pub struct PropagateOptions {
    pub mode: ResolutionMode,
    /// Fast-audit mode: keep escape sets only, skip path construction.
    pub skip_evidence: bool,
    /// Callee globs severing propagation (config `async_boundaries`).
    pub async_boundaries: Vec<String>,
}

/// Result of propagation for a whole model.
pub struct PropagationResult {
    pub mode: ResolutionMode,
    /// Key -> exceptions raised directly (reraises excluded).
    pub direct_raises: HashMap<String, BTreeSet<String>>,
    /// Key -> exceptions escaping the function.
    pub escapes: HashMap<String, BTreeSet<String>>,
    /// Key -> evidence per (exception, origin).
    pub evidence: HashMap<String, HashMap<EvidenceKey, PropagatedRaise>>,
    /// Key -> the function's catch sites, precomputed for queries.
    pub catches_by_function: HashMap<String, Vec<CatchSite>>,
    pub converged: bool,
    pub iterations: usize,
}

impl PropagationResult {
    pub fn escapes_of(&self, key: &FunctionKey) -> BTreeSet<String> {
        self.escapes.get(key.as_str()).cloned().unwrap_or_default()
    }

    pub fn direct_raises_of(&self, key: &FunctionKey) -> BTreeSet<String> {
        self.direct_raises.get(key.as_str()).cloned().unwrap_or_default()
    }

    /// Evidence for one exception, best first (shortest path, then
    /// highest confidence).
    pub fn evidence_for(&self, key: &FunctionKey, exception: &str) -> Vec<&PropagatedRaise> {
        let mut found: Vec<&PropagatedRaise> = self
            .evidence
            .get(key.as_str())
            .into_iter()
            .flat_map(|m| m.values())
            .filter(|p| p.exception_type == exception)
            .collect();
        found.sort_by_key(|p| (p.path.len(), p.confidence()));
        found
    }

    pub fn best_evidence(&self, key: &FunctionKey, exception: &str) -> Option<&PropagatedRaise> {
        self.evidence_for(key, exception).into_iter().next()
    }
}

/// Run propagation to a fixpoint.
pub fn propagate(
    model: &ProgramModel,
    stubs: Option<&StubLibrary>,
    options: &PropagateOptions,
) -> PropagationResult {
    let graph = PropagationGraph::build(model, &options.async_boundaries);
    let catch_sets = graph::build_catch_sets(model);
    let strict = options.mode == ResolutionMode::Strict;

    // Direct raises, reraise sites excluded.
    let mut direct_raises: HashMap<String, BTreeSet<String>> = HashMap::new();
    for site in &model.raise_sites {
        if site.is_reraise {
            continue;
        }
        direct_raises
            .entry(site.function.as_str().to_string())
            .or_default()
            .insert(site.exception_type.clone());
    }

    let n = graph.len();
    let mut escape: Vec<BTreeSet<String>> = vec![BTreeSet::new(); n];
    let mut evidence: Vec<HashMap<EvidenceKey, PropagatedRaise>> = vec![HashMap::new(); n];
    let empty_catch = CatchSet::default();

    // Seed: direct raises minus the local catch set.
    for id in 0..n {
        let key = graph.name(id);
        let catches = catch_sets.get(key).unwrap_or(&empty_catch);
        if let Some(raised) = direct_raises.get(key) {
            for exc in raised {
                if !catches.catches(exc) {
                    escape[id].insert(exc.clone());
                }
            }
        }
    }
    if !options.skip_evidence {
        for site in &model.raise_sites {
            if site.is_reraise {
                continue;
            }
            let Some(id) = graph.id(site.function.as_str()) else {
                continue;
            };
            if !escape[id].contains(&site.exception_type) {
                continue;
            }
            evidence[id].insert(
                (site.exception_type.clone(), site.file.clone(), site.line),
                PropagatedRaise {
                    exception_type: site.exception_type.clone(),
                    raise_site: site.clone(),
                    path: Vec::new(),
                },
            );
        }
    }

    let mut iterations = 0;
    let mut converged = false;

    while iterations < MAX_ITERATIONS {
        iterations += 1;
        let mut changed = false;

        for caller_id in 0..n {
            let caller_key = graph.name(caller_id).to_string();
            let catches = catch_sets.get(&caller_key).cloned().unwrap_or_default();

            let mut additions: BTreeSet<String> = BTreeSet::new();
            let mut evidence_updates: Vec<(EvidenceKey, PropagatedRaise)> = Vec::new();

            for edge in graph.edges_of(caller_id) {
                // Expand the callee ref to candidate nodes.
                let resolved = graph.id(&edge.callee_ref);
                let (candidates, hop_kind) = match resolved {
                    Some(id) => (vec![id], edge.kind),
                    None => {
                        let simple = simple_name_of(&edge.callee_ref);
                        let matched = graph.ids_by_simple_name(simple);
                        let kind = if matched.len() > 1 && edge.is_method_call {
                            ResolutionKind::Polymorphic
                        } else {
                            ResolutionKind::NameFallback
                        };
                        (matched.to_vec(), kind)
                    }
                };

                if !(strict && hop_kind.is_heuristic()) {
                    for &candidate in &candidates {
                        for exc in &escape[candidate] {
                            if catches.catches(exc) {
                                continue;
                            }
                            additions.insert(exc.clone());

                            if !options.skip_evidence {
                                for (key, origin) in &evidence[candidate] {
                                    if &key.0 != exc {
                                        continue;
                                    }
                                    let hop = ResolutionEdge {
                                        caller: caller_key.clone(),
                                        callee: graph.name(candidate).to_string(),
                                        file: edge.file.clone(),
                                        line: edge.line,
                                        resolution_kind: hop_kind,
                                        is_heuristic: hop_kind.is_heuristic(),
                                    };
                                    let mut path = Vec::with_capacity(origin.path.len() + 1);
                                    path.push(hop);
                                    path.extend(origin.path.iter().cloned());
                                    evidence_updates.push((
                                        key.clone(),
                                        PropagatedRaise {
                                            exception_type: exc.clone(),
                                            raise_site: origin.raise_site.clone(),
                                            path,
                                        },
                                    ));
                                }
                            }
                        }
                    }
                }

                // Stub contribution: a synthetic leaf for external calls.
                // A ref that resolved to a scanned function is not
                // external; stubs never shadow in-tree targets.
                if let (Some(stubs), None) = (stubs, resolved) {
                    for exc in stubs.get_exceptions_for_ref(&edge.callee_ref) {
                        if catches.catches(&exc) {
                            continue;
                        }
                        additions.insert(exc.clone());
                        if !options.skip_evidence {
                            let site = RaiseSite {
                                file: edge.file.clone(),
                                line: edge.line,
                                function: FunctionKey::new(&edge.file, &edge.callee_ref),
                                exception_type: exc.clone(),
                                is_reraise: false,
                            };
                            evidence_updates.push((
                                (exc.clone(), edge.file.clone(), edge.line),
                                PropagatedRaise {
                                    exception_type: exc.clone(),
                                    raise_site: site,
                                    path: vec![ResolutionEdge {
                                        caller: caller_key.clone(),
                                        callee: edge.callee_ref.clone(),
                                        file: edge.file.clone(),
                                        line: edge.line,
                                        resolution_kind: ResolutionKind::Stub,
                                        is_heuristic: false,
                                    }],
                                },
                            ));
                        }
                    }
                }
            }

            for exc in additions {
                if escape[caller_id].insert(exc) {
                    changed = true;
                }
            }
            for (key, candidate) in evidence_updates {
                let replace = match evidence[caller_id].get(&key) {
                    Some(existing) => {
                        (candidate.path.len(), candidate.confidence())
                            < (existing.path.len(), existing.confidence())
                    }
                    None => true,
                };
                if replace {
                    evidence[caller_id].insert(key, candidate);
                }
            }
        }

        if !changed {
            converged = true;
            break;
        }
    }

    let mut escapes_map = HashMap::with_capacity(n);
    let mut evidence_map = HashMap::with_capacity(n);
    for id in 0..n {
        let key = graph.name(id).to_string();
        evidence_map.insert(key.clone(), std::mem::take(&mut evidence[id]));
        escapes_map.insert(key, std::mem::take(&mut escape[id]));
    }

    PropagationResult {
        mode: options.mode,
        direct_raises,
        escapes: escapes_map,
        evidence: evidence_map,
        catches_by_function: graph::catches_by_function(model),
        converged,
        iterations,
    }
}

/// Simple-name index over all function keys, shared by trace queries.
pub fn name_index_of(model: &ProgramModel) -> HashMap<String, Vec<String>> {
    let mut index: HashMap<String, Vec<String>> = HashMap::new();
    for key in model.functions.keys() {
        index
            .entry(key.simple_name().to_string())
            .or_default()
            .push(key.as_str().to_string());
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::PythonExtractor;
    use crate::model::FileExtraction;

    fn extraction(path: &str, source: &str) -> (String, FileExtraction) {
        (
            path.to_string(),
            PythonExtractor::new().extract_source(path, source.as_bytes()),
        )
    }

    fn run(files: &[(&str, &str)], mode: ResolutionMode) -> PropagationResult {
        let extractions = files.iter().map(|(p, s)| extraction(p, s)).collect();
        let model = ProgramModel::assemble(extractions);
        propagate(
            &model,
            None,
            &PropagateOptions {
                mode,
                ..Default::default()
            },
        )
    }

    #[test]
    fn direct_raise_escapes() {
        let result = run(
            &[("a.py", "def f():\n    raise ValueError(\"x\")\n")],
            ResolutionMode::Default,
        );
        let escapes = result.escapes_of(&FunctionKey::new("a.py", "f"));
        assert!(escapes.contains("ValueError"));
    }

    #[test]
    fn propagates_through_import_edge() {
        let result = run(
            &[
                ("a.py", "def f():\n    raise ValueError(\"x\")\n"),
                ("b.py", "from a import f\n\ndef h():\n    f()\n"),
            ],
            ResolutionMode::Default,
        );
        let escapes = result.escapes_of(&FunctionKey::new("b.py", "h"));
        assert!(escapes.contains("ValueError"), "got {:?}", escapes);

        let best = result
            .best_evidence(&FunctionKey::new("b.py", "h"), "ValueError")
            .unwrap();
        assert_eq!(best.raise_site.file, "a.py");
        // The import edge resolves to the scanned module: no heuristics.
        assert_eq!(best.confidence(), Confidence::High);
    }

    #[test]
    fn base_class_catch_stops_subclass() {
        let result = run(
            &[
                (
                    "a.py",
                    "class MyErr(ValueError):\n    pass\n\ndef f():\n    raise MyErr()\n",
                ),
                (
                    "b.py",
                    "from a import f\n\ndef g():\n    try:\n        f()\n    except ValueError:\n        pass\n",
                ),
            ],
            ResolutionMode::Default,
        );
        let escapes = result.escapes_of(&FunctionKey::new("b.py", "g"));
        assert!(!escapes.contains("MyErr"), "got {:?}", escapes);
    }

    #[test]
    fn reraising_handler_does_not_swallow() {
        let result = run(
            &[(
                "a.py",
                "def risky():\n    raise KeyError()\n\ndef f():\n    try:\n        risky()\n    except KeyError as e:\n        raise\n",
            )],
            ResolutionMode::Default,
        );
        let escapes = result.escapes_of(&FunctionKey::new("a.py", "f"));
        assert!(escapes.contains("KeyError"), "got {:?}", escapes);

        // Evidence originates at risky's raise, not at the bare reraise.
        let best = result
            .best_evidence(&FunctionKey::new("a.py", "f"), "KeyError")
            .unwrap();
        assert_eq!(best.raise_site.line, 2);
    }

    #[test]
    fn name_fallback_unions_ambiguous_targets() {
        let files = [
            ("a.py", "class A:\n    def save(self):\n        raise OSError()\n"),
            ("b.py", "class B:\n    def save(self):\n        raise ValueError()\n"),
            ("c.py", "def do(x):\n    x.save()\n"),
        ];

        let default = run(&files, ResolutionMode::Default);
        let escapes = default.escapes_of(&FunctionKey::new("c.py", "do"));
        assert!(escapes.contains("OSError"));
        assert!(escapes.contains("ValueError"));
        for exc in ["OSError", "ValueError"] {
            let best = default.best_evidence(&FunctionKey::new("c.py", "do"), exc).unwrap();
            assert_eq!(best.confidence(), Confidence::Low);
        }

        let strict = run(&files, ResolutionMode::Strict);
        assert!(strict.escapes_of(&FunctionKey::new("c.py", "do")).is_empty());
    }

    #[test]
    fn strict_is_subset_of_default() {
        let files = [
            ("a.py", "class A:\n    def save(self):\n        raise OSError()\n"),
            (
                "b.py",
                "from a import A\n\ndef direct():\n    a = A()\n    a.save()\n\ndef indirect(x):\n    x.save()\n",
            ),
        ];
        let strict = run(&files, ResolutionMode::Strict);
        let default = run(&files, ResolutionMode::Default);

        for (key, strict_escapes) in &strict.escapes {
            let default_escapes = default.escapes.get(key).cloned().unwrap_or_default();
            assert!(
                strict_escapes.is_subset(&default_escapes),
                "{} strict ⊄ default",
                key
            );
        }
    }

    #[test]
    fn monotone_growth_until_fixpoint() {
        let result = run(
            &[
                ("a.py", "def f():\n    raise ValueError()\n"),
                ("b.py", "from a import f\n\ndef g():\n    f()\n"),
                ("c.py", "from b import g\n\ndef h():\n    g()\n"),
            ],
            ResolutionMode::Default,
        );
        assert!(result.converged);
        assert!(result.iterations <= MAX_ITERATIONS);
        assert!(result
            .escapes_of(&FunctionKey::new("c.py", "h"))
            .contains("ValueError"));
    }

    #[test]
    fn recursion_converges() {
        let result = run(
            &[(
                "a.py",
                "def odd(n):\n    if n:\n        even(n - 1)\n    raise ValueError()\n\ndef even(n):\n    if n:\n        odd(n - 1)\n",
            )],
            ResolutionMode::Default,
        );
        assert!(result.converged);
        assert!(result
            .escapes_of(&FunctionKey::new("a.py", "even"))
            .contains("ValueError"));
    }

    #[test]
    fn stub_seeds_leaf_exceptions() {
        let extractions = vec![extraction(
            "a.py",
            "import http_client\n\ndef f():\n    http_client.get(\"u\")\n",
        )];
        let model = ProgramModel::assemble(extractions);
        let mut stubs = StubLibrary::default();
        stubs.add_stub("http_client", "get", vec!["TimeoutError".into()]);

        let result = propagate(&model, Some(&stubs), &PropagateOptions::default());
        let escapes = result.escapes_of(&FunctionKey::new("a.py", "f"));
        assert!(escapes.contains("TimeoutError"), "got {:?}", escapes);

        let best = result
            .best_evidence(&FunctionKey::new("a.py", "f"), "TimeoutError")
            .unwrap();
        assert_eq!(best.path[0].resolution_kind, ResolutionKind::Stub);
    }

    #[test]
    fn stub_never_shadows_a_resolved_in_tree_target() {
        // An in-tree function sharing its bare name with a stubbed one:
        // the resolved call must not pick up the stub's exceptions.
        let extractions = vec![
            extraction("a.py", "def load():\n    pass\n"),
            extraction("b.py", "from a import load\n\ndef f():\n    load()\n"),
        ];
        let model = ProgramModel::assemble(extractions);
        let mut stubs = StubLibrary::default();
        stubs.add_stub("json", "load", vec!["JSONDecodeError".into()]);

        let result = propagate(&model, Some(&stubs), &PropagateOptions::default());
        let escapes = result.escapes_of(&FunctionKey::new("b.py", "f"));
        assert!(escapes.is_empty(), "got {:?}", escapes);
    }

    #[test]
    fn polymorphic_dispatch_over_sibling_implementations() {
        let files = [
            (
                "svc.py",
                "class Svc:\n    def run(self):\n        self._step()\n\nclass SvcA(Svc):\n    def _step(self):\n        raise ValueError()\n\nclass SvcB(Svc):\n    def _step(self):\n        raise OSError()\n",
            ),
            ("caller.py", "from svc import SvcA\n\ns = SvcA()\ns.run()\n"),
        ];
        let default = run(&files, ResolutionMode::Default);
        let module_key = FunctionKey::new("caller.py", crate::model::MODULE_SCOPE);
        let escapes = default.escapes_of(&module_key);
        assert!(escapes.contains("ValueError"), "got {:?}", escapes);
        assert!(escapes.contains("OSError"));

        let best = default.best_evidence(&module_key, "OSError").unwrap();
        assert_eq!(best.confidence(), Confidence::Low);

        let strict = run(&files, ResolutionMode::Strict);
        assert!(!strict.escapes_of(&module_key).contains("OSError"));
    }

    #[test]
    fn skip_evidence_keeps_escapes_only() {
        let extractions = vec![extraction("a.py", "def f():\n    raise ValueError()\n")];
        let model = ProgramModel::assemble(extractions);
        let result = propagate(
            &model,
            None,
            &PropagateOptions {
                skip_evidence: true,
                ..Default::default()
            },
        );
        assert!(result
            .escapes_of(&FunctionKey::new("a.py", "f"))
            .contains("ValueError"));
        assert!(result
            .evidence_for(&FunctionKey::new("a.py", "f"), "ValueError")
            .is_empty());
    }
}
