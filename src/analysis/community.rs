//! Louvain community detection
//!
//! Multi-level modularity optimisation on the undirected weighted
//! projection of the graph. Nodes are visited in snapshot order and only
//! move on a strictly positive gain, so the result is deterministic.

use super::snapshot::GraphSnapshot;
use super::types::{AnalysisError, CancellationToken};
use crate::graph::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

const GAIN_EPSILON: f64 = 1e-12;

/// Colors cycled through by community id
pub const PALETTE: [&str; 10] = [
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948", "#b07aa1", "#ff9da7",
    "#9c755f", "#bab0ac",
];

pub fn community_color(id: usize) -> &'static str {
    PALETTE[id % PALETTE.len()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunityConfig {
    pub resolution: f64,
    pub max_levels: usize,
    pub max_passes: usize,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            max_levels: 10,
            max_passes: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityResult {
    /// Dense community id per node, in snapshot order
    pub assignment: Vec<(NodeId, usize)>,
    pub community_count: usize,
    pub modularity: f64,
    pub levels: usize,
}

/// Symmetric weighted adjacency with self-loops doubled on the diagonal,
/// so that row sums are weighted degrees
#[derive(Debug, Clone)]
struct WeightedGraph {
    adjacency: Vec<BTreeMap<usize, f64>>,
    degree: Vec<f64>,
    total: f64,
}

impl WeightedGraph {
    fn from_snapshot(snapshot: &GraphSnapshot) -> Self {
        let mut adjacency = snapshot.undirected_weights();
        for (i, row) in adjacency.iter_mut().enumerate() {
            if let Some(w) = row.get_mut(&i) {
                *w *= 2.0;
            }
        }
        Self::from_adjacency(adjacency)
    }

    fn from_adjacency(adjacency: Vec<BTreeMap<usize, f64>>) -> Self {
        let degree: Vec<f64> = adjacency.iter().map(|row| row.values().sum()).collect();
        let total = degree.iter().sum();
        Self {
            adjacency,
            degree,
            total,
        }
    }

    fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// Collapse each community into a single node
    fn aggregate(&self, community: &[usize], count: usize) -> Self {
        let mut adjacency = vec![BTreeMap::new(); count];
        for (i, row) in self.adjacency.iter().enumerate() {
            for (&j, &w) in row {
                *adjacency[community[i]].entry(community[j]).or_insert(0.0) += w;
            }
        }
        Self::from_adjacency(adjacency)
    }

    fn modularity(&self, community: &[usize], resolution: f64) -> f64 {
        if self.total == 0.0 {
            return 0.0;
        }
        let count = community.iter().max().map_or(0, |m| m + 1);
        let mut internal = vec![0.0; count];
        let mut totals = vec![0.0; count];
        for (i, row) in self.adjacency.iter().enumerate() {
            totals[community[i]] += self.degree[i];
            for (&j, &w) in row {
                if community[i] == community[j] {
                    internal[community[i]] += w;
                }
            }
        }
        let m2 = self.total;
        internal
            .iter()
            .zip(&totals)
            .map(|(inner, tot)| inner / m2 - resolution * (tot / m2).powi(2))
            .sum()
    }
}

/// Detect communities
pub fn run(
    snapshot: &GraphSnapshot,
    config: &CommunityConfig,
    token: &CancellationToken,
) -> Result<CommunityResult, AnalysisError> {
    if !(config.resolution > 0.0) {
        return Err(AnalysisError::InvalidInput("resolution must be positive".to_string()));
    }
    let base = WeightedGraph::from_snapshot(snapshot);
    let mut membership: Vec<usize> = (0..base.len()).collect();
    let mut graph = base.clone();
    let mut levels = 0;

    while levels < config.max_levels {
        token.check()?;
        let (community, moved) = one_level(&graph, config, token)?;
        if !moved {
            break;
        }
        let (dense, count) = renumber(&community);
        for m in membership.iter_mut() {
            *m = dense[*m];
        }
        graph = graph.aggregate(&dense, count);
        levels += 1;
        debug!(level = levels, communities = count, "louvain level done");
    }

    let (dense, count) = renumber(&membership);
    let modularity = base.modularity(&dense, config.resolution);
    let assignment = snapshot
        .nodes
        .iter()
        .zip(&dense)
        .map(|(node, &c)| (node.id.clone(), c))
        .collect();
    Ok(CommunityResult {
        assignment,
        community_count: count,
        modularity,
        levels,
    })
}

/// Local moving phase. Returns the community of every node and whether any
/// node changed community.
fn one_level(
    graph: &WeightedGraph,
    config: &CommunityConfig,
    token: &CancellationToken,
) -> Result<(Vec<usize>, bool), AnalysisError> {
    let n = graph.len();
    let mut community: Vec<usize> = (0..n).collect();
    let mut totals = graph.degree.clone();
    let m2 = graph.total;
    let mut moved_any = false;
    if m2 == 0.0 {
        return Ok((community, false));
    }

    for _ in 0..config.max_passes {
        token.check()?;
        let mut moved = false;
        for i in 0..n {
            let current = community[i];
            let k_i = graph.degree[i];
            totals[current] -= k_i;

            // weight from i into each neighbouring community
            let mut links: BTreeMap<usize, f64> = BTreeMap::new();
            for (&j, &w) in &graph.adjacency[i] {
                if j != i {
                    *links.entry(community[j]).or_insert(0.0) += w;
                }
            }

            let gain = |c: usize, k_in: f64| k_in - config.resolution * totals[c] * k_i / m2;
            let mut best = current;
            let mut best_gain = gain(current, links.get(&current).copied().unwrap_or(0.0));
            for (&c, &k_in) in &links {
                let g = gain(c, k_in);
                if g > best_gain + GAIN_EPSILON {
                    best = c;
                    best_gain = g;
                }
            }

            totals[best] += k_i;
            if best != current {
                community[i] = best;
                moved = true;
                moved_any = true;
            }
        }
        if !moved {
            break;
        }
    }
    Ok((community, moved_any))
}

/// Map labels to 0.. by first appearance
fn renumber(labels: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping = HashMap::new();
    let dense = labels
        .iter()
        .map(|label| {
            let next = mapping.len();
            *mapping.entry(*label).or_insert(next)
        })
        .collect();
    (dense, mapping.len())
}

/// Modularity of an arbitrary assignment (one community id per snapshot
/// node) at resolution 1
pub fn modularity(snapshot: &GraphSnapshot, assignment: &[usize]) -> f64 {
    if assignment.len() != snapshot.node_count() {
        return 0.0;
    }
    let (dense, _) = renumber(assignment);
    WeightedGraph::from_snapshot(snapshot).modularity(&dense, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Category, Edge, Graph, Node};

    fn two_triangles() -> GraphSnapshot {
        let mut g = Graph::new();
        for id in ["a", "b", "c", "d", "e", "f"] {
            g.add_node(Node::new(id, id, Category::Person)).unwrap();
        }
        for (s, t) in [("a", "b"), ("b", "c"), ("a", "c"), ("d", "e"), ("e", "f"), ("d", "f"), ("c", "d")] {
            g.add_edge(Edge::new(s, t, "knew")).unwrap();
        }
        GraphSnapshot::from_graph(&g, 0)
    }

    fn ids(result: &CommunityResult) -> Vec<usize> {
        result.assignment.iter().map(|(_, c)| *c).collect()
    }

    #[test]
    fn finds_two_triangles() {
        let result = run(&two_triangles(), &CommunityConfig::default(), &CancellationToken::new()).unwrap();
        assert_eq!(ids(&result), vec![0, 0, 0, 1, 1, 1]);
        assert_eq!(result.community_count, 2);
        assert!((result.modularity - 5.0 / 14.0).abs() < 1e-9);
    }

    #[test]
    fn repeated_runs_agree() {
        let snap = two_triangles();
        let config = CommunityConfig::default();
        let token = CancellationToken::new();
        assert_eq!(run(&snap, &config, &token).unwrap(), run(&snap, &config, &token).unwrap());
    }

    #[test]
    fn isolated_nodes_are_singletons() {
        let mut g = Graph::new();
        g.add_node(Node::new("x", "x", Category::Person)).unwrap();
        g.add_node(Node::new("y", "y", Category::Person)).unwrap();
        let result = run(
            &GraphSnapshot::from_graph(&g, 0),
            &CommunityConfig::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(ids(&result), vec![0, 1]);
        assert_eq!(result.modularity, 0.0);
    }

    #[test]
    fn modularity_of_trivial_partitions() {
        let snap = two_triangles();
        assert!(modularity(&snap, &[0; 6]).abs() < 1e-12);
        assert!((modularity(&snap, &[3, 3, 3, 9, 9, 9]) - 5.0 / 14.0).abs() < 1e-9);
    }

    #[test]
    fn palette_wraps() {
        assert_eq!(community_color(0), community_color(PALETTE.len()));
    }

    #[test]
    fn cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(
            run(&two_triangles(), &CommunityConfig::default(), &token),
            Err(AnalysisError::Cancelled)
        );
    }
}
