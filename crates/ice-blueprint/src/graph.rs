//! Dependency graph built from a blueprint's nodes, grounded on the
//! level-computation contract `ice-engine` consumes: nodes grouped by
//! `1 + max(levels of dependencies)`, with cycles detected by Kahn's
//! algorithm (iteratively remove zero-in-degree nodes; a cycle is any
//! node never removed).

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use ice_core::NodeId;

/// A node's adjacency, keyed by id, built once from a flat node list plus
/// its declared `dependencies`.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// node -> the nodes it depends on.
    dependencies: BTreeMap<NodeId, BTreeSet<NodeId>>,
    /// node -> the nodes that depend on it (the reverse edge set).
    dependents: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl DependencyGraph {
    /// Build a graph from `(node_id, dependencies)` pairs. Does not
    /// validate referential integrity; callers check that first.
    #[must_use]
    pub fn new(edges: impl IntoIterator<Item = (NodeId, BTreeSet<NodeId>)>) -> Self {
        let mut dependencies = BTreeMap::new();
        let mut dependents: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();

        for (node, deps) in edges {
            for dep in &deps {
                dependents.entry(dep.clone()).or_default().insert(node.clone());
            }
            dependencies.insert(node, deps);
        }

        // Ensure every node also appears as a dependents-map key so lookups
        // never need an `unwrap_or_default`.
        for node in dependencies.keys() {
            dependents.entry(node.clone()).or_default();
        }

        Self { dependencies, dependents }
    }

    /// Number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.dependencies.len()
    }

    /// Nodes with no dependencies.
    #[must_use]
    pub fn entry_nodes(&self) -> Vec<NodeId> {
        self.dependencies
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Nodes nothing depends on.
    #[must_use]
    pub fn exit_nodes(&self) -> Vec<NodeId> {
        self.dependencies
            .keys()
            .filter(|id| self.dependents.get(*id).is_none_or(BTreeSet::is_empty))
            .cloned()
            .collect()
    }

    /// Direct dependents of `node`.
    #[must_use]
    pub fn dependents_of(&self, node: &NodeId) -> BTreeSet<NodeId> {
        self.dependents.get(node).cloned().unwrap_or_default()
    }

    /// Compute levels via Kahn's algorithm: nodes with satisfied
    /// dependencies are peeled off one round at a time, each round forming
    /// one level. Returns `None` if a cycle prevents every node from being
    /// processed.
    #[must_use]
    pub fn compute_levels(&self) -> Option<Vec<Vec<NodeId>>> {
        let mut in_degree: BTreeMap<NodeId, usize> = self
            .dependencies
            .iter()
            .map(|(id, deps)| (id.clone(), deps.len()))
            .collect();

        let mut frontier: VecDeque<NodeId> = in_degree
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(id, _)| id.clone())
            .collect();

        let mut levels = Vec::new();
        let mut processed = 0usize;

        while !frontier.is_empty() {
            let mut level: Vec<NodeId> = frontier.drain(..).collect();
            level.sort();
            processed += level.len();

            let mut next_frontier = Vec::new();
            for node in &level {
                for dependent in self.dependents.get(node).into_iter().flatten() {
                    let deg = in_degree.get_mut(dependent).expect("dependent tracked");
                    *deg -= 1;
                    if *deg == 0 {
                        next_frontier.push(dependent.clone());
                    }
                }
            }
            levels.push(level);
            frontier.extend(next_frontier);
        }

        if processed == self.dependencies.len() {
            Some(levels)
        } else {
            None
        }
    }
}
