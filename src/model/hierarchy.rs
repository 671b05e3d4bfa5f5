//! Class hierarchy with memoized subclass queries.
//!
//! The hierarchy is keyed by simple class names: catch compatibility in the
//! analyzed language works on whatever name the source wrote, and dotted
//! base names are compared by their trailing segment. An unresolved base
//! (a class imported from an unanalyzed module) stays as written and acts
//! as its own root; nothing is fabricated below it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use crate::model::facts::ClassDef;

/// Built-in exception roots present in every hierarchy.
pub const BUILTIN_ROOTS: &[&str] = &["BaseException", "Exception"];

pub struct ClassHierarchy {
    classes: BTreeMap<String, ClassDef>,
    /// class simple name -> base names as written
    parent_map: HashMap<String, Vec<String>>,
    /// base simple name -> direct subclass names
    child_map: HashMap<String, Vec<String>>,
    /// (child, ancestor) -> memoized answer; cleared on every add_class
    subclass_memo: RwLock<HashMap<(String, String), bool>>,
}

impl Default for ClassHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassHierarchy {
    pub fn new() -> Self {
        let mut hierarchy = Self {
            classes: BTreeMap::new(),
            parent_map: HashMap::new(),
            child_map: HashMap::new(),
            subclass_memo: RwLock::new(HashMap::new()),
        };
        hierarchy.parent_map.insert("BaseException".to_string(), Vec::new());
        hierarchy
            .parent_map
            .insert("Exception".to_string(), vec!["BaseException".to_string()]);
        hierarchy
            .child_map
            .insert("BaseException".to_string(), vec!["Exception".to_string()]);
        hierarchy
    }

    /// Register a class. Invalidates the subclass memo.
    pub fn add_class(&mut self, class: &ClassDef) {
        self.classes.insert(class.name.clone(), class.clone());
        self.parent_map.insert(class.name.clone(), class.bases.clone());

        for base in &class.bases {
            let base_simple = simple(base).to_string();
            let children = self.child_map.entry(base_simple).or_default();
            if !children.iter().any(|c| c == &class.name) {
                children.push(class.name.clone());
            }
        }

        self.subclass_memo.get_mut().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.values()
    }

    /// True when `child` transitively names `ancestor` as a base.
    /// Reflexive: every name is a subclass of itself.
    pub fn is_subclass_of(&self, child: &str, ancestor: &str) -> bool {
        let child = simple(child);
        let ancestor = simple(ancestor);
        if child == ancestor {
            return true;
        }

        let memo_key = (child.to_string(), ancestor.to_string());
        if let Some(&answer) = self.subclass_memo.read().unwrap().get(&memo_key) {
            return answer;
        }

        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut queue: Vec<&str> = vec![child];
        let mut found = false;

        while let Some(current) = queue.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(bases) = self.parent_map.get(current) else {
                continue;
            };
            for base in bases {
                let base_simple = simple(base);
                if base_simple == ancestor || base == ancestor {
                    found = true;
                    queue.clear();
                    break;
                }
                queue.push(base_simple);
            }
        }

        self.subclass_memo.write().unwrap().insert(memo_key, found);
        found
    }

    /// All direct and indirect subclasses of a class.
    pub fn get_subclasses(&self, name: &str) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        let mut queue = vec![simple(name).to_string()];

        while let Some(current) = queue.pop() {
            for child in self.child_map.get(&current).into_iter().flatten() {
                if result.insert(child.clone()) {
                    queue.push(child.clone());
                }
            }
        }

        result
    }

    /// Registered classes that are exception types: either a transitive base
    /// reaches `Exception`/`BaseException`, or a base name reads like one
    /// (contains `Exception` or `Error`, covering builtins like `ValueError`
    /// and vendor types like `HTTPErrorResponse` that are never declared in
    /// the scanned tree).
    pub fn exception_classes(&self) -> Vec<&ClassDef> {
        self.classes
            .values()
            .filter(|c| self.is_exception_class(&c.name))
            .collect()
    }

    pub fn is_exception_class(&self, name: &str) -> bool {
        for root in BUILTIN_ROOTS {
            if name != *root && self.is_subclass_of(name, root) {
                return true;
            }
        }

        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut queue: Vec<&str> = vec![simple(name)];
        while let Some(current) = queue.pop() {
            if !visited.insert(current) {
                continue;
            }
            if current != simple(name) && looks_like_exception(current) {
                return true;
            }
            for base in self.parent_map.get(current).into_iter().flatten() {
                let base_simple = simple(base);
                if looks_like_exception(base_simple) {
                    return true;
                }
                queue.push(base_simple);
            }
        }
        false
    }
}

fn simple(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn looks_like_exception(name: &str) -> bool {
    name.contains("Exception") || name.contains("Error")
}
