//! Module dependency graph.
//!
//! Tracks which served modules import which, keyed by canonical request path.
//! Edges are kept bidirectional: `b ∈ nodes[a].deps ⇔ a ∈ nodes[b].importers`.
//! [`ModuleGraph::set_deps`] is the only mutator, so the invariant holds after
//! every update. Nodes are never removed; a module deleted from disk keeps its
//! node (and its last known edges) for diagnostics.

use super::rewrite::normalize_import;
use crate::imports::scan_imports;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A node in the module graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleNode {
    /// Canonical request path (e.g., `/src/main.js`).
    pub url: String,
    /// Modules that this module imports.
    pub deps: BTreeSet<String>,
    /// Modules that import this module.
    pub importers: BTreeSet<String>,
}

impl ModuleNode {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Directed graph of served modules.
#[derive(Debug, Clone)]
pub struct ModuleGraph {
    nodes: BTreeMap<String, ModuleNode>,
    namespace: String,
}

impl ModuleGraph {
    /// Create an empty graph whose bare imports map under `namespace`.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            nodes: BTreeMap::new(),
            namespace: namespace.into(),
        }
    }

    /// Return the node for `url`, creating it if absent.
    pub fn ensure(&mut self, url: &str) -> &mut ModuleNode {
        self.nodes
            .entry(url.to_string())
            .or_insert_with(|| ModuleNode::new(url))
    }

    #[must_use]
    pub fn get(&self, url: &str) -> Option<&ModuleNode> {
        self.nodes.get(url)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Replace the dependency set of `url`.
    ///
    /// Reverse edges of dropped dependencies are removed (a missing target
    /// node is tolerated), new dependencies get forward and reverse edges and
    /// are created as nodes when needed.
    pub fn set_deps<I, S>(&mut self, url: &str, deps: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let next: BTreeSet<String> = deps.into_iter().map(Into::into).collect();
        let previous = std::mem::take(&mut self.ensure(url).deps);

        for stale in previous.difference(&next) {
            if let Some(dep) = self.nodes.get_mut(stale) {
                dep.importers.remove(url);
            }
        }

        for dep in &next {
            self.ensure(dep).importers.insert(url.to_string());
        }

        self.ensure(url).deps = next;
    }

    /// Scan `code` served at `url` and record its imports as edges.
    ///
    /// Remote imports never become edges.
    pub fn record_from_code(&mut self, url: &str, code: &str) {
        let deps: Vec<String> = scan_imports(code)
            .iter()
            .filter_map(|spec| normalize_import(spec, url, &self.namespace))
            .collect();
        self.set_deps(url, deps);
    }

    /// Direct importers of `url`.
    #[must_use]
    pub fn importers_of(&self, url: &str) -> Vec<&str> {
        self.nodes
            .get(url)
            .map(|n| n.importers.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Every module that reaches `url` through one or more import edges.
    #[must_use]
    pub fn transitive_importers(&self, url: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = self.importers_of(url);

        while let Some(next) = stack.pop() {
            if next == url || !seen.insert(next.to_string()) {
                continue;
            }
            stack.extend(self.importers_of(next));
        }
        seen
    }

    /// Whether every forward edge has its reverse edge and vice versa.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.nodes.values().all(|node| {
            node.deps.iter().all(|d| {
                self.nodes
                    .get(d)
                    .is_some_and(|dep| dep.importers.contains(&node.url))
            }) && node.importers.iter().all(|i| {
                self.nodes
                    .get(i)
                    .is_some_and(|imp| imp.deps.contains(&node.url))
            })
        })
    }

    /// Serializable view for the diagnostics endpoint.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self
                .nodes
                .values()
                .map(|n| NodeSnapshot {
                    url: n.url.clone(),
                    deps: n.deps.iter().cloned().collect(),
                    importers: n.importers.iter().cloned().collect(),
                })
                .collect(),
        }
    }
}

/// Serialized module graph.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeSnapshot>,
}

/// One node of a [`GraphSnapshot`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub url: String,
    pub deps: Vec<String>,
    pub importers: Vec<String>,
}
