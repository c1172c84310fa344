//! Shared fixtures for integration tests

#![allow(dead_code)]

use polity::{Category, Edge, Graph, Node, NodeId, Sign};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A loose document exercising key aliases, missing fields and bad records
pub const LOOSE_DOCUMENT: &str = r#"{
    "metadata": {"source": "lodge minutes"},
    "nodes": [
        {"id": "mathers", "name": "S. L. MacGregor Mathers", "type": "person", "dates": "1854-1918"},
        {"key": "golden-dawn", "label": "Hermetic Order of the Golden Dawn", "category": "Organization",
         "start_year": 1888, "end_year": 1903, "financial_weight": 0.4},
        {"id": "papus", "label": "Papus", "type": "person", "secrecy_level": 3},
        {"id": "martinist-order", "label": "Martinist Order", "type": "organization", "archive_ref": "F-17"},
        {"label": "no identity"},
        "not an object"
    ],
    "edges": [
        {"source": "mathers", "target": "golden-dawn", "relationship": "founded"},
        {"from": "papus", "to": "martinist-order", "label": "founded", "weight": 2},
        {"source": "mathers", "target": "papus", "relationship": "rivalry over succession"},
        {"source": "papus", "target": "ghost", "relationship": "knew"}
    ],
    "myths": [
        {"title": "Secret Chiefs", "related": ["mathers", "golden-dawn", "nobody"]}
    ]
}"#;

pub fn node(id: &str, category: Category) -> Node {
    Node::new(id, id.to_uppercase(), category)
}

/// X, Y, Z joined +1, +1, -1
pub fn signed_triangle() -> Graph {
    let mut g = Graph::new();
    for id in ["x", "y", "z"] {
        g.add_node(node(id, Category::Person)).unwrap();
    }
    g.add_edge(Edge::new("x", "y", "allied")).unwrap();
    g.add_edge(Edge::new("y", "z", "allied")).unwrap();
    g.add_edge(Edge::new("z", "x", "opposed").with_sign(Sign::Negative)).unwrap();
    g
}

/// Two nodes, no edges
pub fn isolated_pair() -> Graph {
    let mut g = Graph::new();
    g.add_node(node("a", Category::Person)).unwrap();
    g.add_node(node("b", Category::Person)).unwrap();
    g
}

/// Two dense cliques joined by a single hostile bridge
pub fn two_factions(size: usize) -> Graph {
    let mut g = Graph::new();
    for faction in ["l", "r"] {
        for i in 0..size {
            g.add_node(node(&format!("{faction}{i}"), Category::Person)).unwrap();
        }
        for i in 0..size {
            for j in (i + 1)..size {
                g.add_edge(Edge::new(format!("{faction}{i}"), format!("{faction}{j}"), "allied"))
                    .unwrap();
            }
        }
    }
    g.add_edge(Edge::new("l0", "r0", "opposed").with_sign(Sign::Negative)).unwrap();
    g
}

/// Erdős–Rényi style multigraph with random signs and occasional parallel
/// edges and self-loops
pub fn random_signed_graph(seed: u64, nodes: usize, p: f64) -> Graph {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut g = Graph::new();
    for i in 0..nodes {
        g.add_node(node(&format!("n{i}"), Category::Person)).unwrap();
    }
    for i in 0..nodes {
        for j in (i + 1)..nodes {
            if rng.gen_bool(p) {
                let sign = if rng.gen_bool(0.3) { Sign::Negative } else { Sign::Positive };
                let (s, t) = if rng.gen_bool(0.5) { (i, j) } else { (j, i) };
                g.add_edge(Edge::new(format!("n{s}"), format!("n{t}"), "tie").with_sign(sign))
                    .unwrap();
                if rng.gen_bool(0.1) {
                    g.add_edge(Edge::new(format!("n{i}"), format!("n{j}"), "second tie").with_sign(sign))
                        .unwrap();
                }
            }
        }
        if rng.gen_bool(0.05) {
            g.add_edge(Edge::new(format!("n{i}"), format!("n{i}"), "self")).unwrap();
        }
    }
    g
}

/// Every edge set to `sign`
pub fn with_all_signs(mut graph: Graph, sign: Sign) -> Graph {
    let ids: Vec<_> = graph.edges().map(|e| e.id().clone()).collect();
    for id in ids {
        if let Some(edge) = graph.edge_mut(&id) {
            edge.sign = sign;
        }
    }
    graph
}

pub fn id(s: &str) -> NodeId {
    NodeId::from(s)
}
