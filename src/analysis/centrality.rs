//! Betweenness centrality (Brandes)
//!
//! Edge weight is treated as distance. Parallel edges collapse to the
//! shortest one; self-loops never lie on a shortest path.

use super::snapshot::GraphSnapshot;
use super::types::{AnalysisError, CancellationToken};
use crate::graph::NodeId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, VecDeque};

const DISTANCE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralityConfig {
    pub directed: bool,
    pub weighted: bool,
    pub normalized: bool,
}

impl Default for CentralityConfig {
    fn default() -> Self {
        Self {
            directed: false,
            weighted: true,
            normalized: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentralityResult {
    pub scores: Vec<(NodeId, f64)>,
    pub normalized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    distance: f64,
    node: usize,
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // min-heap on distance, ties by node index
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn adjacency(snapshot: &GraphSnapshot, config: &CentralityConfig) -> Vec<Vec<(usize, f64)>> {
    let mut best: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); snapshot.node_count()];
    let mut relax = |from: usize, to: usize, length: f64| {
        let slot = best[from].entry(to).or_insert(length);
        if length < *slot {
            *slot = length;
        }
    };
    for edge in snapshot.edges.iter().filter(|e| !e.is_self_loop()) {
        let length = if config.weighted { edge.positive_weight() } else { 1.0 };
        relax(edge.source, edge.target, length);
        if !config.directed {
            relax(edge.target, edge.source, length);
        }
    }
    best.into_iter().map(|row| row.into_iter().collect()).collect()
}

/// Raw betweenness, summed over ordered (source, target) pairs
fn brandes(
    graph: &[Vec<(usize, f64)>],
    weighted: bool,
    token: &CancellationToken,
) -> Result<Vec<f64>, AnalysisError> {
    let n = graph.len();
    let mut centrality = vec![0.0; n];

    for s in 0..n {
        token.check()?;
        let mut order = Vec::with_capacity(n);
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0f64; n];
        let mut dist = vec![f64::INFINITY; n];
        sigma[s] = 1.0;
        dist[s] = 0.0;

        if weighted {
            let mut heap = BinaryHeap::new();
            let mut done = vec![false; n];
            heap.push(Entry { distance: 0.0, node: s });
            while let Some(Entry { distance, node: v }) = heap.pop() {
                if done[v] {
                    continue;
                }
                done[v] = true;
                order.push(v);
                for &(w, length) in &graph[v] {
                    let candidate = distance + length;
                    if candidate < dist[w] - DISTANCE_EPSILON {
                        dist[w] = candidate;
                        sigma[w] = sigma[v];
                        preds[w].clear();
                        preds[w].push(v);
                        heap.push(Entry { distance: candidate, node: w });
                    } else if (candidate - dist[w]).abs() <= DISTANCE_EPSILON && !done[w] {
                        sigma[w] += sigma[v];
                        preds[w].push(v);
                    }
                }
            }
        } else {
            let mut queue = VecDeque::from([s]);
            while let Some(v) = queue.pop_front() {
                order.push(v);
                for &(w, _) in &graph[v] {
                    if dist[w].is_infinite() {
                        dist[w] = dist[v] + 1.0;
                        queue.push_back(w);
                    }
                    if dist[w] == dist[v] + 1.0 {
                        sigma[w] += sigma[v];
                        preds[w].push(v);
                    }
                }
            }
        }

        let mut delta = vec![0.0; n];
        while let Some(w) = order.pop() {
            for &v in &preds[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }
    Ok(centrality)
}

/// Compute betweenness for every node in snapshot order
pub fn run(
    snapshot: &GraphSnapshot,
    config: &CentralityConfig,
    token: &CancellationToken,
) -> Result<CentralityResult, AnalysisError> {
    let n = snapshot.node_count();
    let raw = if n < 3 {
        vec![0.0; n]
    } else {
        brandes(&adjacency(snapshot, config), config.weighted, token)?
    };
    let scale = if config.normalized && n >= 3 {
        1.0 / ((n - 1) * (n - 2)) as f64
    } else {
        1.0
    };
    let scores = snapshot
        .nodes
        .iter()
        .zip(raw)
        .map(|(node, score)| (node.id.clone(), score * scale))
        .collect();
    Ok(CentralityResult {
        scores,
        normalized: config.normalized,
    })
}

/// Divide by the maximum; all-zero input stays all zero
pub fn normalize_to_max(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(0.0, f64::max);
    if max > 0.0 {
        scores.iter().map(|s| s / max).collect()
    } else {
        vec![0.0; scores.len()]
    }
}

/// Linear map of a score in [0, 1] onto a display size
pub fn size_for(normalized: f64, min_size: f64, max_size: f64) -> f64 {
    min_size + normalized.clamp(0.0, 1.0) * (max_size - min_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Category, Edge, Graph, Node};

    fn snapshot(nodes: &[&str], edges: &[(&str, &str, i64)]) -> GraphSnapshot {
        let mut g = Graph::new();
        for id in nodes {
            g.add_node(Node::new(*id, *id, Category::Person)).unwrap();
        }
        for (s, t, w) in edges {
            g.add_edge(Edge::new(*s, *t, "knew").with_weight(*w)).unwrap();
        }
        GraphSnapshot::from_graph(&g, 0)
    }

    fn scores(result: &CentralityResult) -> Vec<f64> {
        result.scores.iter().map(|(_, s)| *s).collect()
    }

    fn run_default(snap: &GraphSnapshot) -> Vec<f64> {
        scores(&run(snap, &CentralityConfig::default(), &CancellationToken::new()).unwrap())
    }

    #[test]
    fn path_middle_is_fully_between() {
        let snap = snapshot(&["a", "b", "c"], &[("a", "b", 1), ("b", "c", 1)]);
        assert_eq!(run_default(&snap), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn star_center_and_isolated_node() {
        let snap = snapshot(
            &["hub", "l1", "l2", "l3", "lone"],
            &[("hub", "l1", 1), ("hub", "l2", 1), ("hub", "l3", 1)],
        );
        let s = run_default(&snap);
        // 6 ordered leaf pairs over (n-1)(n-2) = 12
        assert!((s[0] - 0.5).abs() < 1e-12);
        assert_eq!(&s[1..], &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn weights_are_distances() {
        // a-b-c is short, a-d-c is long: only b is between a and c
        let snap = snapshot(
            &["a", "b", "c", "d"],
            &[("a", "b", 1), ("b", "c", 1), ("a", "d", 5), ("d", "c", 5)],
        );
        let weighted = run_default(&snap);
        assert!(weighted[1] > 0.0);
        assert_eq!(weighted[3], 0.0);

        let unweighted = scores(
            &run(
                &snap,
                &CentralityConfig {
                    weighted: false,
                    ..Default::default()
                },
                &CancellationToken::new(),
            )
            .unwrap(),
        );
        assert!((unweighted[1] - unweighted[3]).abs() < 1e-12);
    }

    #[test]
    fn directed_paths_follow_edges() {
        let snap = snapshot(&["a", "b", "c"], &[("a", "b", 1), ("b", "c", 1)]);
        let config = CentralityConfig {
            directed: true,
            ..Default::default()
        };
        let s = scores(&run(&snap, &config, &CancellationToken::new()).unwrap());
        assert_eq!(s, vec![0.0, 0.5, 0.0]);
    }

    #[test]
    fn fewer_than_three_nodes_is_zero() {
        let snap = snapshot(&["a", "b"], &[("a", "b", 1)]);
        assert_eq!(run_default(&snap), vec![0.0, 0.0]);
    }

    #[test]
    fn normalize_and_size() {
        assert_eq!(normalize_to_max(&[0.0, 2.0, 1.0]), vec![0.0, 1.0, 0.5]);
        assert_eq!(normalize_to_max(&[0.0, 0.0]), vec![0.0, 0.0]);
        assert_eq!(size_for(0.5, 5.0, 25.0), 15.0);
        assert_eq!(size_for(2.0, 5.0, 25.0), 25.0);
    }
}
