//! Call-graph construction for propagation and callers queries.
//!
//! Keys are interned to dense integer ids at build time; the forward graph
//! is an adjacency list indexed by id. Building the graph does not invent
//! resolutions: an unresolved call keeps its bare name, and name-based
//! fallback happens during propagation.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::model::{
    simple_name_of, CatchSite, ProgramModel, ResolutionKind,
};

/// One outgoing call edge.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Resolved key or bare name, exactly as extraction recorded it.
    pub callee_ref: String,
    pub file: String,
    pub line: usize,
    pub is_method_call: bool,
    pub kind: ResolutionKind,
}

/// Forward graph over interned node ids.
pub struct PropagationGraph {
    names: Vec<String>,
    ids: HashMap<String, usize>,
    edges: Vec<Vec<Edge>>,
    /// simple name -> node ids, for fallback expansion.
    name_index: HashMap<String, Vec<usize>>,
}

impl PropagationGraph {
    /// Build the graph from the model. Call sites whose callee matches an
    /// async-boundary glob are severed.
    pub fn build(model: &ProgramModel, async_boundaries: &[String]) -> Self {
        let boundary_matchers: Vec<_> = async_boundaries
            .iter()
            .filter_map(|p| globset::Glob::new(p).ok().map(|g| g.compile_matcher()))
            .collect();

        let mut graph = Self {
            names: Vec::new(),
            ids: HashMap::new(),
            edges: Vec::new(),
            name_index: HashMap::new(),
        };

        // Every known function participates, then every caller that shows
        // up at a call site (module scopes included).
        for key in model.functions.keys() {
            graph.intern(key.as_str());
        }
        for call in &model.call_sites {
            graph.intern(call.caller.as_str());
        }

        for call in &model.call_sites {
            let severed = boundary_matchers.iter().any(|m| {
                m.is_match(&call.callee_bare_name)
                    || call.callee_key.as_deref().map(|k| m.is_match(k)).unwrap_or(false)
            });
            if severed {
                continue;
            }

            // Module-qualified refs from import resolution map onto file
            // keys when the module is part of the scanned tree; the hop
            // keeps its extraction kind.
            let mut callee_ref = call.callee_ref().to_string();
            if !callee_ref.contains(crate::model::FunctionKey::SEPARATOR)
                && callee_ref.contains('.')
            {
                if let Some(key) = model.resolve_module_path(&callee_ref) {
                    callee_ref = key.as_str().to_string();
                }
            }

            let caller_id = graph.ids[call.caller.as_str()];
            graph.edges[caller_id].push(Edge {
                callee_ref,
                file: call.file.clone(),
                line: call.line,
                is_method_call: call.is_method_call,
                kind: call.resolution,
            });
        }

        for edges in &mut graph.edges {
            edges.sort_by(|a, b| (&a.file, a.line, &a.callee_ref).cmp(&(&b.file, b.line, &b.callee_ref)));
            edges.dedup_by(|a, b| {
                a.callee_ref == b.callee_ref && a.file == b.file && a.line == b.line
            });
        }

        graph
    }

    fn intern(&mut self, name: &str) -> usize {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        self.edges.push(Vec::new());
        self.name_index
            .entry(simple_name_of(name).to_string())
            .or_default()
            .push(id);
        id
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, id: usize) -> &str {
        &self.names[id]
    }

    pub fn id(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    pub fn edges_of(&self, id: usize) -> &[Edge] {
        &self.edges[id]
    }

    /// Candidate ids for a bare or unresolvable reference.
    pub fn ids_by_simple_name(&self, simple: &str) -> &[usize] {
        self.name_index.get(simple).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Reverse graphs for callers queries: a qualified-key index and a
/// simple-name index.
pub struct ReverseGraphs {
    /// resolved callee key -> (caller key, extraction kind)
    pub qualified: HashMap<String, BTreeMap<String, ResolutionKind>>,
    /// bare callee name -> caller keys with unresolved edges
    pub by_name: HashMap<String, BTreeSet<String>>,
}

pub fn build_reverse_graphs(model: &ProgramModel) -> ReverseGraphs {
    let mut qualified: HashMap<String, BTreeMap<String, ResolutionKind>> = HashMap::new();
    let mut by_name: HashMap<String, BTreeSet<String>> = HashMap::new();

    for call in &model.call_sites {
        let caller = call.caller.as_str().to_string();
        match &call.callee_key {
            Some(key) => {
                // Normalize module-qualified refs onto file keys so callers
                // lookups by key find them.
                let key = if !key.contains(crate::model::FunctionKey::SEPARATOR) {
                    model
                        .resolve_module_path(key)
                        .map(|k| k.as_str().to_string())
                        .unwrap_or_else(|| key.clone())
                } else {
                    key.clone()
                };
                qualified.entry(key).or_default().insert(caller, call.resolution);
            }
            None => {
                by_name
                    .entry(call.callee_bare_name.clone())
                    .or_default()
                    .insert(caller);
            }
        }
    }

    ReverseGraphs { qualified, by_name }
}

/// Forward graph keyed by strings, for trace and reachability queries.
pub fn build_forward_graph(model: &ProgramModel) -> BTreeMap<String, BTreeSet<String>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for call in &model.call_sites {
        graph
            .entry(call.caller.as_str().to_string())
            .or_default()
            .insert(call.callee_ref().to_string());
    }
    graph
}

/// Expanded catch set of one function: caught names plus all their known
/// subclasses, by simple name. Reraising handlers are excluded entirely.
#[derive(Debug, Clone, Default)]
pub struct CatchSet {
    pub catches_all: bool,
    pub names: BTreeSet<String>,
}

impl CatchSet {
    pub fn catches(&self, exception: &str) -> bool {
        if self.catches_all {
            return true;
        }
        self.names.contains(simple_name_of(exception))
    }
}

/// Per-function expanded catch sets.
pub fn build_catch_sets(model: &ProgramModel) -> HashMap<String, CatchSet> {
    let mut sets: HashMap<String, CatchSet> = HashMap::new();

    for catch in &model.catch_sites {
        if catch.has_reraise {
            continue;
        }
        let set = sets.entry(catch.function.as_str().to_string()).or_default();

        if catch.catches_all {
            set.catches_all = true;
            continue;
        }
        for caught in &catch.caught_types {
            let simple = simple_name_of(caught).to_string();
            if simple == "Exception" || simple == "BaseException" {
                set.catches_all = true;
            }
            for sub in model.hierarchy.get_subclasses(&simple) {
                set.names.insert(sub);
            }
            set.names.insert(simple);
        }
    }

    sets
}

/// Per-function catch-site grouping, for query output.
pub fn catches_by_function(model: &ProgramModel) -> HashMap<String, Vec<CatchSite>> {
    let mut catches: HashMap<String, Vec<CatchSite>> = HashMap::new();
    for catch in &model.catch_sites {
        catches
            .entry(catch.function.as_str().to_string())
            .or_default()
            .push(catch.clone());
    }
    catches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CallSite, FileExtraction, FunctionDef, FunctionKey, ProgramModel};

    fn call(caller: &str, bare: &str, key: Option<&str>, method: bool) -> CallSite {
        CallSite {
            file: "a.py".into(),
            line: 1,
            caller: FunctionKey::new("a.py", caller),
            callee_bare_name: bare.into(),
            callee_key: key.map(|k| k.to_string()),
            is_method_call: method,
            resolution: if key.is_some() {
                ResolutionKind::Import
            } else {
                ResolutionKind::Unresolved
            },
        }
    }

    fn model_with_calls(calls: Vec<CallSite>) -> ProgramModel {
        let extraction = FileExtraction {
            functions: vec![FunctionDef {
                file: "a.py".into(),
                line: 1,
                name: "f".into(),
                qualified_name: "f".into(),
                class_name: None,
                return_type: None,
            }],
            call_sites: calls,
            ..Default::default()
        };
        ProgramModel::assemble(vec![("a.py".into(), extraction)])
    }

    #[test]
    fn graph_keeps_unresolved_refs_as_names() {
        let model = model_with_calls(vec![call("f", "mystery", None, false)]);
        let graph = PropagationGraph::build(&model, &[]);
        let f = graph.id("a.py::f").unwrap();
        assert_eq!(graph.edges_of(f)[0].callee_ref, "mystery");
    }

    #[test]
    fn async_boundary_severs_edges() {
        let model = model_with_calls(vec![
            call("f", "delay", Some("tasks.delay"), true),
            call("f", "helper", None, false),
        ]);
        let graph = PropagationGraph::build(&model, &["*delay*".to_string()]);
        let f = graph.id("a.py::f").unwrap();
        let refs: Vec<&str> = graph.edges_of(f).iter().map(|e| e.callee_ref.as_str()).collect();
        assert_eq!(refs, vec!["helper"]);
    }

    #[test]
    fn name_index_covers_methods() {
        let extraction = FileExtraction {
            functions: vec![
                FunctionDef {
                    file: "a.py".into(),
                    line: 1,
                    name: "save".into(),
                    qualified_name: "A.save".into(),
                    class_name: Some("A".into()),
                    return_type: None,
                },
                FunctionDef {
                    file: "a.py".into(),
                    line: 5,
                    name: "save".into(),
                    qualified_name: "B.save".into(),
                    class_name: Some("B".into()),
                    return_type: None,
                },
            ],
            ..Default::default()
        };
        let model = ProgramModel::assemble(vec![("a.py".into(), extraction)]);
        let graph = PropagationGraph::build(&model, &[]);
        assert_eq!(graph.ids_by_simple_name("save").len(), 2);
    }

    #[test]
    fn reverse_graph_splits_resolved_and_name_edges() {
        let model = model_with_calls(vec![
            call("f", "helper", Some("b.py::helper"), false),
            call("f", "mystery", None, false),
        ]);
        let reverse = build_reverse_graphs(&model);
        assert!(reverse.qualified["b.py::helper"].contains_key("a.py::f"));
        assert!(reverse.by_name["mystery"].contains("a.py::f"));
    }
}
