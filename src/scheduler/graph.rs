use std::collections::BTreeMap;

/// Why one node waits for another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EdgeKind {
    /// The later node reads a binding the earlier one produces.
    Data,
    /// The two nodes declare overlapping file effects.
    Effect,
}

/// Edges between call nodes, indexed by declaration order.
///
/// Every edge points from an earlier node to a later one; an edge in the
/// other direction is the only way to close a cycle, so it is refused.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    node_count: usize,
    /// node -> (dependency -> kind)
    dependencies: Vec<BTreeMap<usize, EdgeKind>>,
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            dependencies: vec![BTreeMap::new(); node_count],
            dependents: vec![Vec::new(); node_count],
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Makes `to` wait for `from`. Returns false when the edge was refused
    /// or already present. A data edge replaces an effect edge between the
    /// same pair.
    pub fn add_edge(&mut self, from: usize, to: usize, kind: EdgeKind) -> bool {
        if from >= to || to >= self.node_count {
            log::debug!("dropping edge {} -> {}: not in declaration order", from, to);
            return false;
        }
        match self.dependencies[to].get(&from).copied() {
            Some(existing) if existing <= kind => false,
            Some(_) => {
                self.dependencies[to].insert(from, kind);
                false
            }
            None => {
                self.dependencies[to].insert(from, kind);
                self.dependents[from].push(to);
                true
            }
        }
    }

    pub fn dependencies(&self, node: usize) -> impl Iterator<Item = (usize, EdgeKind)> + '_ {
        self.dependencies[node]
            .iter()
            .map(|(from, kind)| (*from, *kind))
    }

    pub fn dependents(&self, node: usize) -> &[usize] {
        &self.dependents[node]
    }

    /// Every edge as `(from, to, kind)`, sorted.
    pub fn edges(&self) -> Vec<(usize, usize, EdgeKind)> {
        let mut edges: Vec<_> = self
            .dependencies
            .iter()
            .enumerate()
            .flat_map(|(to, deps)| deps.iter().map(move |(from, kind)| (*from, to, *kind)))
            .collect();
        edges.sort();
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_backward_edges() {
        let mut graph = DependencyGraph::new(3);
        assert!(graph.add_edge(0, 2, EdgeKind::Effect));
        assert!(!graph.add_edge(2, 0, EdgeKind::Data));
        assert!(!graph.add_edge(1, 1, EdgeKind::Data));
        assert_eq!(graph.edges(), vec![(0, 2, EdgeKind::Effect)]);
    }

    #[test]
    fn data_edge_wins_over_effect_edge() {
        let mut graph = DependencyGraph::new(2);
        graph.add_edge(0, 1, EdgeKind::Effect);
        graph.add_edge(0, 1, EdgeKind::Data);
        graph.add_edge(0, 1, EdgeKind::Effect);
        assert_eq!(graph.edges(), vec![(0, 1, EdgeKind::Data)]);
        assert_eq!(graph.dependents(0), &[1]);
    }
}
