// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::errors::{LaunchError, Result};

/// Raised by [`DependencyGraph::topological_sort`] when some nodes could not
/// be ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    /// Nodes that never reached in-degree zero, ascending.
    pub unresolved: Vec<usize>,
}

/// Dependency graph over task indices in registration order.
///
/// Edge direction: dependency -> dependent. For `B` depending on `A` we add
/// `A -> B`.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<(), ()>,
}

impl DependencyGraph {
    /// Graph with `nodes` vertices `0..nodes` and no edges.
    pub fn new(nodes: usize) -> Self {
        let mut graph = DiGraph::with_capacity(nodes, nodes);
        for _ in 0..nodes {
            graph.add_node(());
        }
        Self { graph }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Record that `to` depends on `from`.
    pub fn add_edge(&mut self, from: usize, to: usize) -> Result<()> {
        let n = self.node_count();
        if from >= n || to >= n {
            return Err(LaunchError::ConfigError(format!(
                "edge {from} -> {to} references a node outside 0..{n}"
            )));
        }
        if from == to {
            return Err(LaunchError::ConfigError(format!(
                "node {from} cannot depend on itself"
            )));
        }
        self.graph
            .add_edge(NodeIndex::new(from), NodeIndex::new(to), ());
        Ok(())
    }

    /// Kahn's algorithm, always peeling the smallest ready index first.
    ///
    /// Emits fewer than `node_count()` indices if the graph has a cycle.
    pub fn kahn_order(&self) -> Vec<usize> {
        let n = self.node_count();
        let mut in_degree: Vec<usize> = (0..n)
            .map(|i| {
                self.graph
                    .neighbors_directed(NodeIndex::new(i), Direction::Incoming)
                    .count()
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for next in self
                .graph
                .neighbors_directed(NodeIndex::new(node), Direction::Outgoing)
            {
                let d = &mut in_degree[next.index()];
                *d -= 1;
                if *d == 0 {
                    ready.push(Reverse(next.index()));
                }
            }
        }
        order
    }

    /// Topological order of all nodes, or the nodes stuck on a cycle.
    pub fn topological_sort(&self) -> std::result::Result<Vec<usize>, CycleError> {
        let order = self.kahn_order();
        if order.len() == self.node_count() {
            return Ok(order);
        }

        let mut emitted = vec![false; self.node_count()];
        for &i in &order {
            emitted[i] = true;
        }
        let unresolved = emitted
            .iter()
            .enumerate()
            .filter(|(_, done)| !**done)
            .map(|(i, _)| i)
            .collect();
        Err(CycleError { unresolved })
    }
}
