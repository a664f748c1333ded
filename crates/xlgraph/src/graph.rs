//! Dependency tracking between graph nodes
//!
//! Edges point from a precedent to the node that reads it: cell to range, range to
//! consuming formula, or cell straight to consuming formula.

use crate::node::NodeId;
use ahash::{AHashMap, AHashSet};

/// Directed graph of node dependencies
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Node → nodes that read it (successors)
    dependents: AHashMap<NodeId, AHashSet<NodeId>>,
    /// Node → nodes it reads (predecessors)
    precedents: AHashMap<NodeId, AHashSet<NodeId>>,
    edges: usize,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency: `dependent` reads `precedent`
    ///
    /// Returns `false` if the edge was already present.
    pub fn add_dependency(&mut self, precedent: NodeId, dependent: NodeId) -> bool {
        let added = self
            .dependents
            .entry(precedent)
            .or_default()
            .insert(dependent);
        if added {
            self.precedents
                .entry(dependent)
                .or_default()
                .insert(precedent);
            self.edges += 1;
        }
        added
    }

    /// Nodes that read the given node
    pub fn dependents(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.dependents
            .get(&node)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Nodes the given node reads
    pub fn precedents(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.precedents
            .get(&node)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Check for an edge from `precedent` to `dependent`
    pub fn has_edge(&self, precedent: NodeId, dependent: NodeId) -> bool {
        self.dependents
            .get(&precedent)
            .map_or(false, |set| set.contains(&dependent))
    }

    /// Number of distinct edges
    pub fn edge_count(&self) -> usize {
        self.edges
    }

    /// Every node reachable downstream of `start`, excluding `start` unless it lies on a
    /// cycle
    pub fn downstream(&self, start: NodeId) -> AHashSet<NodeId> {
        let mut seen = AHashSet::new();
        let mut stack: Vec<NodeId> = self.dependents(start).collect();
        while let Some(node) = stack.pop() {
            if seen.insert(node) {
                stack.extend(self.dependents(node));
            }
        }
        seen
    }

    /// Detect circular references involving a node
    ///
    /// The walk keeps its own stack, so chains of any length are checked.
    pub fn has_circular_reference(&self, node: NodeId) -> bool {
        let mut finished = AHashSet::new();
        let mut on_path = AHashSet::new();
        // (node, precedents already pushed)
        let mut stack = vec![(node, false)];

        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                on_path.remove(&current);
                finished.insert(current);
                continue;
            }
            if finished.contains(&current) {
                continue;
            }
            on_path.insert(current);
            stack.push((current, true));
            for precedent in self.precedents(current) {
                if on_path.contains(&precedent) {
                    return true;
                }
                if !finished.contains(&precedent) {
                    stack.push((precedent, false));
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_add_dependency() {
        let mut graph = DependencyGraph::new();
        let (a1, b1) = (NodeId(0), NodeId(1));

        assert!(graph.add_dependency(a1, b1));
        assert!(!graph.add_dependency(a1, b1));

        assert!(graph.dependents(a1).any(|n| n == b1));
        assert!(graph.precedents(b1).any(|n| n == a1));
        assert!(graph.has_edge(a1, b1));
        assert!(!graph.has_edge(b1, a1));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_downstream() {
        let mut graph = DependencyGraph::new();
        let (a1, range, b1, c1) = (NodeId(0), NodeId(1), NodeId(2), NodeId(3));
        graph.add_dependency(a1, range);
        graph.add_dependency(range, b1);
        graph.add_dependency(b1, c1);

        let mut reached: Vec<_> = graph.downstream(a1).into_iter().collect();
        reached.sort();
        assert_eq!(reached, vec![range, b1, c1]);
        assert!(graph.downstream(c1).is_empty());
    }

    #[test]
    fn test_circular_reference() {
        let mut graph = DependencyGraph::new();
        let (a1, b1, c1, d1) = (NodeId(0), NodeId(1), NodeId(2), NodeId(3));

        // A1 -> B1 -> C1 -> A1
        graph.add_dependency(a1, b1);
        graph.add_dependency(b1, c1);
        graph.add_dependency(c1, a1);
        graph.add_dependency(a1, d1);

        assert!(graph.has_circular_reference(a1));
        assert!(graph.has_circular_reference(b1));
        assert!(graph.has_circular_reference(c1));
        assert!(graph.has_circular_reference(d1));
        assert!(!DependencyGraph::new().has_circular_reference(a1));
    }

    #[test]
    fn test_shared_precedents_are_not_a_cycle() {
        let mut graph = DependencyGraph::new();
        let (a1, b1, c1, d1) = (NodeId(0), NodeId(1), NodeId(2), NodeId(3));
        graph.add_dependency(a1, b1);
        graph.add_dependency(a1, c1);
        graph.add_dependency(b1, d1);
        graph.add_dependency(c1, d1);
        assert!(!graph.has_circular_reference(d1));
    }

    #[test]
    fn test_cycle_check_on_long_chains() {
        let mut graph = DependencyGraph::new();
        let n = 200_000;
        for i in 0..n - 1 {
            graph.add_dependency(NodeId(i), NodeId(i + 1));
        }
        assert!(!graph.has_circular_reference(NodeId(n - 1)));

        graph.add_dependency(NodeId(n - 1), NodeId(0));
        assert!(graph.has_circular_reference(NodeId(n / 2)));
    }
}
