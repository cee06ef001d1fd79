// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Module reference graph and the deletion predicate
//!
//! A [`CorpusSnapshot`] is a point-in-time copy of every module record, with a
//! petgraph index of who references whom through `dependencies` and
//! `submodule`. A [`DeletionResolver`] answers, for one deletion batch,
//! whether a module can go without leaving a dangling reference behind.

use crate::types::{Identity, Module, ModuleKey, Relation};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Edge payload: which module holds the reference, and in which list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEdge {
    /// Module holding the reference
    pub from: ModuleKey,
    /// List the reference sits in
    pub relation: Relation,
}

/// Point-in-time copy of the module corpus
#[derive(Debug, Default)]
pub struct CorpusSnapshot {
    modules: BTreeMap<ModuleKey, Module>,
    /// Nodes are `(name, revision)` identities; edges run referencer → referenced
    graph: DiGraph<Identity, ReferenceEdge>,
    node_indices: HashMap<Identity, NodeIndex>,
}

impl CorpusSnapshot {
    /// Build a snapshot and its reference index
    #[must_use]
    pub fn new(modules: BTreeMap<ModuleKey, Module>) -> Self {
        let mut snapshot = Self {
            modules,
            graph: DiGraph::new(),
            node_indices: HashMap::new(),
        };
        snapshot.rebuild_graph();
        snapshot
    }

    fn node(&mut self, identity: Identity) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(&identity) {
            return idx;
        }
        let idx = self.graph.add_node(identity.clone());
        self.node_indices.insert(identity, idx);
        idx
    }

    fn rebuild_graph(&mut self) {
        self.graph.clear();
        self.node_indices.clear();

        let mut edges = Vec::new();
        for (key, module) in &self.modules {
            for relation in [Relation::Dependencies, Relation::Submodule] {
                for reference in module.references(relation) {
                    let target = Identity {
                        name: reference.name.clone(),
                        revision: reference.revision.clone(),
                    };
                    edges.push((key.identity(), target, ReferenceEdge { from: key.clone(), relation }));
                }
            }
        }
        for (from, to, weight) in edges {
            let from_idx = self.node(from);
            let to_idx = self.node(to);
            self.graph.add_edge(from_idx, to_idx, weight);
        }
    }

    /// All module records, keyed and sorted
    #[must_use]
    pub fn modules(&self) -> &BTreeMap<ModuleKey, Module> {
        &self.modules
    }

    /// Mutable record access, for in-place cascades
    pub fn module_mut(&mut self, key: &ModuleKey) -> Option<&mut Module> {
        self.modules.get_mut(key)
    }

    /// Whether a record with this key exists
    #[must_use]
    pub fn contains(&self, key: &ModuleKey) -> bool {
        self.modules.contains_key(key)
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the corpus is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Modules referencing `(name, revision)` through dependencies or
    /// submodule, ordered by referencer key then relation
    #[must_use]
    pub fn referencers(&self, name: &str, revision: &str) -> Vec<&ReferenceEdge> {
        let identity = Identity {
            name: name.to_string(),
            revision: Some(revision.to_string()),
        };
        let Some(&idx) = self.node_indices.get(&identity) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| e.weight())
            .collect();
        edges.sort_by(|a, b| (&a.from, a.relation).cmp(&(&b.from, b.relation)));
        edges
    }

    /// Strip `name` from every other module's `dependents`, matching by name
    /// only. Returns the keys of records that changed.
    pub fn remove_dependent(&mut self, name: &str, skip: &HashSet<ModuleKey>) -> Vec<ModuleKey> {
        let mut changed = Vec::new();
        for (key, module) in &mut self.modules {
            if skip.contains(key) {
                continue;
            }
            let before = module.dependents.len();
            module.dependents.retain(|d| d.name != name);
            if module.dependents.len() != before {
                changed.push(key.clone());
            }
        }
        changed
    }
}

// =============================================================================
// Deletion Resolver
// =============================================================================

/// Why a module has to stay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReason {
    /// Module still holding a reference
    pub referenced_by: ModuleKey,
    /// List holding the reference
    pub relation: Relation,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "referenced by {} in {}", self.referenced_by, self.relation)
    }
}

/// Outcome of the deletion predicate for one `(name, revision)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No surviving module references it
    Deletable,
    /// A surviving module still references it
    Blocked(BlockReason),
}

/// Per-batch deletion predicate with its own memo table
///
/// A module may go when every module referencing it is itself being deleted.
/// Reference cycles inside the requested set are resolved optimistically: a
/// node met again on the current path counts as deletable. Each evaluation
/// reports the shallowest path depth it leaned on, as in Tarjan's lowlink; a
/// deletable node that leaned on nothing above itself is memoized together
/// with the provisional results beneath it, so every node is scanned once.
pub struct DeletionResolver<'a> {
    snapshot: &'a CorpusSnapshot,
    requested: HashSet<ModuleKey>,
    memo: HashMap<(String, String), Verdict>,
}

/// Depth reported by evaluations that leaned on no node of the current path
const UNANCHORED: usize = usize::MAX;

impl<'a> DeletionResolver<'a> {
    /// Resolver for one batch deleting `requested`
    #[must_use]
    pub fn new(snapshot: &'a CorpusSnapshot, requested: impl IntoIterator<Item = ModuleKey>) -> Self {
        Self {
            snapshot,
            requested: requested.into_iter().collect(),
            memo: HashMap::new(),
        }
    }

    /// Whether `(name, revision)` can be deleted
    pub fn can_delete(&mut self, name: &str, revision: &str) -> bool {
        matches!(self.verdict(name, revision), Verdict::Deletable)
    }

    /// Full verdict for `(name, revision)`, including the blocking reason
    pub fn verdict(&mut self, name: &str, revision: &str) -> Verdict {
        let root = (name.to_string(), revision.to_string());
        let mut on_path = HashMap::new();
        let mut provisional = Vec::new();
        let (verdict, _) = self.evaluate(&root, &mut on_path, &mut provisional);
        debug_assert!(provisional.is_empty());
        tracing::trace!(name, revision, ?verdict, "deletion verdict");
        verdict
    }

    /// Returns the verdict and the shallowest on-path depth it relied on
    fn evaluate(
        &mut self,
        id: &(String, String),
        on_path: &mut HashMap<(String, String), usize>,
        provisional: &mut Vec<(String, String)>,
    ) -> (Verdict, usize) {
        if let Some(v) = self.memo.get(id) {
            return (v.clone(), UNANCHORED);
        }
        if let Some(&depth) = on_path.get(id) {
            return (Verdict::Deletable, depth);
        }

        let depth = on_path.len();
        on_path.insert(id.clone(), depth);
        let start = provisional.len();
        let mut low = UNANCHORED;

        let snapshot = self.snapshot;
        for edge in snapshot.referencers(&id.0, &id.1) {
            let blocked = if self.requested.contains(&edge.from) {
                let referencer = (edge.from.name.clone(), edge.from.revision.clone());
                let (verdict, reached) = self.evaluate(&referencer, on_path, provisional);
                low = low.min(reached);
                matches!(verdict, Verdict::Blocked(_))
            } else {
                true
            };
            if blocked {
                on_path.remove(id);
                // results beneath may have assumed this node deletable
                provisional.truncate(start);
                let verdict = Verdict::Blocked(BlockReason {
                    referenced_by: edge.from.clone(),
                    relation: edge.relation,
                });
                self.memo.insert(id.clone(), verdict.clone());
                return (verdict, UNANCHORED);
            }
        }

        on_path.remove(id);
        provisional.push(id.clone());
        if low >= depth {
            for resolved in provisional.drain(start..) {
                self.memo.insert(resolved, Verdict::Deletable);
            }
            (Verdict::Deletable, UNANCHORED)
        } else {
            (Verdict::Deletable, low)
        }
    }
}
