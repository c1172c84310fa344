//! Owned, index-based copies of the graph handed to algorithms
//!
//! A snapshot shares nothing with the live graph, so a background run can
//! never observe or cause a partial mutation. Nodes keep the graph's key
//! order; edges keep insertion order and refer to nodes by index.

use super::types::Generation;
use crate::graph::{Category, EdgeId, Graph, Jurisdiction, NodeId, Position, Sign};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: NodeId,
    pub label: String,
    pub category: Category,
    pub jurisdiction: Jurisdiction,
    pub position: Position,
    pub financial_weight: f64,
    pub secrecy_level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Text fed to the embedder for this node
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub id: EdgeId,
    pub source: usize,
    pub target: usize,
    pub weight: f64,
    pub sign: Sign,
}

impl SnapshotEdge {
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// Weight usable as a length or a flow: non-positive weights count as 1
    pub fn positive_weight(&self) -> f64 {
        if self.weight > 0.0 {
            self.weight
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub generation: Generation,
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
}

impl GraphSnapshot {
    pub fn from_graph(graph: &Graph, generation: Generation) -> Self {
        let mut index = HashMap::with_capacity(graph.node_count());
        let nodes: Vec<SnapshotNode> = graph
            .nodes()
            .enumerate()
            .map(|(i, node)| {
                index.insert(node.id().clone(), i);
                SnapshotNode {
                    id: node.id().clone(),
                    label: node.label.clone(),
                    category: node.category,
                    jurisdiction: node.jurisdiction,
                    position: node.position(),
                    financial_weight: node.financial_weight(),
                    secrecy_level: node.secrecy_level(),
                    embedding: node.embedding().map(<[f32]>::to_vec),
                    text: node.embedding_text(),
                }
            })
            .collect();

        // Graph invariants guarantee both endpoints are indexed
        let edges = graph
            .edges()
            .filter_map(|edge| {
                Some(SnapshotEdge {
                    id: edge.id().clone(),
                    source: *index.get(edge.source())?,
                    target: *index.get(edge.target())?,
                    weight: edge.weight as f64,
                    sign: edge.sign,
                })
            })
            .collect();

        Self {
            generation,
            nodes,
            edges,
        }
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

    pub fn index_of(&self, id: &NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| &n.id == id)
    }

    /// Undirected degree per node; a self-loop counts twice
    pub fn degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.nodes.len()];
        for edge in &self.edges {
            degrees[edge.source] += 1;
            degrees[edge.target] += 1;
        }
        degrees
    }

    /// Undirected weighted projection: parallel and antiparallel edges are
    /// summed, self-loops are kept on the diagonal.
    pub fn undirected_weights(&self) -> Vec<BTreeMap<usize, f64>> {
        let mut adjacency = vec![BTreeMap::new(); self.nodes.len()];
        for edge in &self.edges {
            let w = edge.positive_weight();
            *adjacency[edge.source].entry(edge.target).or_insert(0.0) += w;
            if !edge.is_self_loop() {
                *adjacency[edge.target].entry(edge.source).or_insert(0.0) += w;
            }
        }
        adjacency
    }

    /// Distinct neighbours per node, direction ignored, self-loops dropped
    pub fn neighbor_lists(&self) -> Vec<Vec<usize>> {
        let mut lists: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for edge in self.edges.iter().filter(|e| !e.is_self_loop()) {
            lists[edge.source].push(edge.target);
            lists[edge.target].push(edge.source);
        }
        for list in &mut lists {
            list.sort_unstable();
            list.dedup();
        }
        lists
    }
}
