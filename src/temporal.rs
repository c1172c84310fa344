//! Year-based visibility filtering
//!
//! Filtering only toggles the `hidden` flag; nothing is ever deleted.
//! An edge is hidden when its own interval excludes the year or when
//! either endpoint is hidden.

use crate::graph::{Graph, NodeId, ValidTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Counts after applying a year filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityCounts {
    pub visible_nodes: usize,
    pub hidden_nodes: usize,
    pub visible_edges: usize,
    pub hidden_edges: usize,
}

/// `start <= year <= end`
pub fn is_visible(valid_time: &ValidTime, year: i32) -> bool {
    valid_time.contains(year)
}

/// Hide every node and edge not valid in `year`
pub fn apply_year(graph: &mut Graph, year: i32) -> VisibilityCounts {
    let mut hidden_ids = BTreeSet::new();
    for node in graph.nodes_mut() {
        node.hidden = !is_visible(&node.valid_time, year);
        if node.hidden {
            hidden_ids.insert(node.id().clone());
        }
    }
    for edge in graph.edges_mut() {
        edge.hidden = !is_visible(&edge.valid_time, year)
            || hidden_ids.contains(edge.source())
            || hidden_ids.contains(edge.target());
    }
    let counts = counts(graph);
    debug!(year, ?counts, "applied year filter");
    counts
}

/// Make everything visible again
pub fn clear(graph: &mut Graph) {
    for node in graph.nodes_mut() {
        node.hidden = false;
    }
    for edge in graph.edges_mut() {
        edge.hidden = false;
    }
}

/// An owned copy containing only what is visible in `year`
pub fn visible_view(graph: &Graph, year: i32) -> Graph {
    let mut view = Graph::new();
    let mut kept: BTreeSet<NodeId> = BTreeSet::new();
    for node in graph.nodes().filter(|n| is_visible(&n.valid_time, year)) {
        let mut node = node.clone();
        node.hidden = false;
        kept.insert(node.id().clone());
        // keys come from a valid graph, so insertion cannot collide
        let _ = view.add_node(node);
    }
    for edge in graph.edges() {
        if is_visible(&edge.valid_time, year) && kept.contains(edge.source()) && kept.contains(edge.target()) {
            let mut edge = edge.clone();
            edge.hidden = false;
            let _ = view.add_edge(edge);
        }
    }
    view
}

fn counts(graph: &Graph) -> VisibilityCounts {
    let hidden_nodes = graph.nodes().filter(|n| n.is_hidden()).count();
    let hidden_edges = graph.edges().filter(|e| e.is_hidden()).count();
    VisibilityCounts {
        visible_nodes: graph.node_count() - hidden_nodes,
        hidden_nodes,
        visible_edges: graph.edge_count() - hidden_edges,
        hidden_edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Category, Edge, Node};

    fn graph() -> Graph {
        let mut g = Graph::new();
        g.add_node(Node::new("a", "A", Category::Person).with_valid_time(ValidTime::new(1890, 1910)))
            .unwrap();
        g.add_node(Node::new("b", "B", Category::Person).with_valid_time(ValidTime::new(1900, 1930)))
            .unwrap();
        g.add_node(Node::new("c", "C", Category::Person)).unwrap();
        g.add_edge(Edge::with_id("ab".into(), "a", "b", "knew")).unwrap();
        g.add_edge(
            Edge::with_id("bc".into(), "b", "c", "met").with_valid_time(ValidTime::new(1925, 1926)),
        )
        .unwrap();
        g
    }

    #[test]
    fn boundaries_are_inclusive() {
        let t = ValidTime::new(1900, 1910);
        assert!(is_visible(&t, 1900));
        assert!(is_visible(&t, 1910));
        assert!(!is_visible(&t, 1899));
        assert!(!is_visible(&t, 1911));
    }

    #[test]
    fn edge_hidden_when_endpoint_hidden() {
        let mut g = graph();
        let counts = apply_year(&mut g, 1920);
        assert!(g.node(&"a".into()).unwrap().is_hidden());
        // own interval contains 1920 but endpoint a is hidden
        assert!(g.edge(&"ab".into()).unwrap().is_hidden());
        // own interval excludes 1920
        assert!(g.edge(&"bc".into()).unwrap().is_hidden());
        assert_eq!(counts.hidden_nodes, 1);
        assert_eq!(counts.visible_nodes, 2);
        assert_eq!(counts.hidden_edges, 2);
    }

    #[test]
    fn filter_never_deletes() {
        let mut g = graph();
        apply_year(&mut g, 1800);
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert!(g.nodes().all(|n| n.is_hidden()));
        clear(&mut g);
        assert!(g.nodes().all(|n| !n.is_hidden()));
        assert!(g.edges().all(|e| !e.is_hidden()));
    }

    #[test]
    fn view_contains_only_visible() {
        let g = graph();
        let view = visible_view(&g, 1905);
        assert_eq!(view.node_count(), 3);
        assert_eq!(view.edge_count(), 1);
        view.validate().unwrap();

        let later = visible_view(&g, 1925);
        assert_eq!(later.node_count(), 2);
        assert_eq!(later.edge_count(), 1);
        assert!(later.edge(&"bc".into()).is_some());
    }
}
