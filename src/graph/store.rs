//! Graph: the canonical in-memory multigraph

use super::edge::{Edge, EdgeId};
use super::error::{GraphError, GraphResult};
use super::node::{Node, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Summary statistics for a graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    /// m / (n (n - 1)) for the directed multigraph; 0 when n < 2
    pub density: f64,
    /// 2m / n; 0 for an empty graph
    pub average_degree: f64,
}

/// The canonical multigraph of nodes and signed edges.
///
/// Nodes are kept in key order; edges in insertion order. Every edge's
/// endpoints exist as nodes: `add_edge` rejects dangling references and
/// `remove_node` cascades to incident edges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Keys are unique; a duplicate is rejected.
    pub fn add_node(&mut self, node: Node) -> GraphResult<NodeId> {
        let id = node.id().clone();
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// Add an edge. Both endpoints must already exist and the key must be new.
    pub fn add_edge(&mut self, edge: Edge) -> GraphResult<EdgeId> {
        for endpoint in [edge.source(), edge.target()] {
            if !self.nodes.contains_key(endpoint) {
                return Err(GraphError::DanglingEdge {
                    edge: edge.id().clone(),
                    node: endpoint.clone(),
                });
            }
        }
        if self.edges.iter().any(|e| e.id() == edge.id()) {
            return Err(GraphError::DuplicateEdge(edge.id().clone()));
        }
        let id = edge.id().clone();
        self.edges.push(edge);
        Ok(id)
    }

    /// Remove a node together with every incident edge.
    ///
    /// Returns the node and the removed edges.
    pub fn remove_node(&mut self, id: &NodeId) -> GraphResult<(Node, Vec<Edge>)> {
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        let (removed, kept): (Vec<Edge>, Vec<Edge>) =
            std::mem::take(&mut self.edges).into_iter().partition(|e| e.touches(id));
        self.edges = kept;
        Ok((node, removed))
    }

    /// Remove a single edge
    pub fn remove_edge(&mut self, id: &EdgeId) -> GraphResult<Edge> {
        let idx = self
            .edges
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| GraphError::EdgeNotFound(id.clone()))?;
        Ok(self.edges.remove(idx))
    }

    /// Edit a node in place. The key cannot change: it has no setter.
    pub fn update_node(&mut self, id: &NodeId, edit: impl FnOnce(&mut Node)) -> GraphResult<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        edit(node);
        Ok(())
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id() == id)
    }

    pub fn edge_mut(&mut self, id: &EdgeId) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.id() == id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in key order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// Edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub(crate) fn edges_mut(&mut self) -> impl Iterator<Item = &mut Edge> {
        self.edges.iter_mut()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Edges touching a node, in either direction
    pub fn incident_edges<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.touches(id))
    }

    /// All edges joining two nodes, regardless of direction
    pub fn edges_between<'a>(&'a self, a: &'a NodeId, b: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| {
            (e.source() == a && e.target() == b) || (e.source() == b && e.target() == a)
        })
    }

    /// Distinct neighbours of a node, ignoring direction and self-loops
    pub fn neighbors(&self, id: &NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for e in self.incident_edges(id) {
            let other = if e.source() == id { e.target() } else { e.source() };
            if other != id && seen.insert(other.clone()) {
                out.push(other.clone());
            }
        }
        out
    }

    pub fn stats(&self) -> GraphStats {
        let n = self.nodes.len();
        let m = self.edges.len();
        let density = if n < 2 {
            0.0
        } else {
            m as f64 / (n as f64 * (n as f64 - 1.0))
        };
        let average_degree = if n == 0 { 0.0 } else { 2.0 * m as f64 / n as f64 };
        GraphStats {
            node_count: n,
            edge_count: m,
            density,
            average_degree,
        }
    }

    /// Check that every edge references existing nodes and keys are unique
    pub fn validate(&self) -> GraphResult<()> {
        let mut seen = HashSet::new();
        for e in &self.edges {
            if !seen.insert(e.id()) {
                return Err(GraphError::DuplicateEdge(e.id().clone()));
            }
            for endpoint in [e.source(), e.target()] {
                if !self.nodes.contains_key(endpoint) {
                    return Err(GraphError::DanglingEdge {
                        edge: e.id().clone(),
                        node: endpoint.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
