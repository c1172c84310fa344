//! Structural balance and the frustration index
//!
//! A triangle is three pairwise-connected nodes, direction ignored and
//! self-loops excluded. It is balanced when the product of its edge signs is
//! positive; a zero product (any neutral edge) counts as unbalanced.
//!
//! The three counting modes differ only in multiplicity:
//! - `Compatible` takes the first-inserted edge of each node pair and counts
//!   each triangle once per edge (three times)
//! - `NodeWedges` counts each triangle once per ordered wedge (six times)
//! - `Exact` counts every combination of parallel edges once

use super::snapshot::GraphSnapshot;
use super::types::{AnalysisError, CancellationToken};
use crate::graph::{NodeId, Sign};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceMode {
    #[default]
    Compatible,
    NodeWedges,
    Exact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub mode: BalanceMode,
    pub balanced: u64,
    pub unbalanced: u64,
    /// Distinct node triangles
    pub triangles: u64,
    pub frustration_index: f64,
    /// Distinct triples whose representative edges multiply to <= 0
    pub unbalanced_triads: Vec<[NodeId; 3]>,
}

/// Signs between each unordered node pair, in edge insertion order
struct PairSigns {
    pairs: BTreeMap<(usize, usize), Vec<i64>>,
    neighbors: Vec<BTreeSet<usize>>,
}

impl PairSigns {
    fn new(snapshot: &GraphSnapshot) -> Self {
        let mut pairs: BTreeMap<(usize, usize), Vec<i64>> = BTreeMap::new();
        let mut neighbors = vec![BTreeSet::new(); snapshot.node_count()];
        for edge in snapshot.edges.iter().filter(|e| !e.is_self_loop()) {
            let key = ordered(edge.source, edge.target);
            pairs.entry(key).or_default().push(edge.sign.value());
            neighbors[edge.source].insert(edge.target);
            neighbors[edge.target].insert(edge.source);
        }
        Self { pairs, neighbors }
    }

    /// Sign of the first-inserted edge between two nodes
    fn representative(&self, a: usize, b: usize) -> i64 {
        self.pairs
            .get(&ordered(a, b))
            .and_then(|signs| signs.first().copied())
            .unwrap_or(Sign::Neutral.value())
    }

    fn all(&self, a: usize, b: usize) -> &[i64] {
        self.pairs.get(&ordered(a, b)).map_or(&[], Vec::as_slice)
    }

    /// Every triangle once, as sorted index triples
    fn triangles(&self) -> Vec<[usize; 3]> {
        let mut out = Vec::new();
        for (&(u, v), _) in &self.pairs {
            for &w in self.neighbors[u].intersection(&self.neighbors[v]) {
                if w > v {
                    out.push([u, v, w]);
                }
            }
        }
        out
    }
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Default)]
struct Tally {
    balanced: u64,
    unbalanced: u64,
}

impl Tally {
    fn add(&mut self, product: i64) {
        if product > 0 {
            self.balanced += 1;
        } else {
            self.unbalanced += 1;
        }
    }
}

/// Count balanced and unbalanced triangles
pub fn run(
    snapshot: &GraphSnapshot,
    mode: BalanceMode,
    token: &CancellationToken,
) -> Result<BalanceReport, AnalysisError> {
    let signs = PairSigns::new(snapshot);
    let mut tally = Tally::default();

    match mode {
        BalanceMode::Compatible => {
            for (&(u, v), _) in &signs.pairs {
                token.check()?;
                let s_uv = signs.representative(u, v);
                for &w in signs.neighbors[u].intersection(&signs.neighbors[v]) {
                    tally.add(s_uv * signs.representative(u, w) * signs.representative(v, w));
                }
            }
        }
        BalanceMode::NodeWedges => {
            for u in 0..snapshot.node_count() {
                token.check()?;
                for &v in &signs.neighbors[u] {
                    for &w in &signs.neighbors[u] {
                        if v != w && signs.neighbors[v].contains(&w) {
                            tally.add(
                                signs.representative(u, v)
                                    * signs.representative(u, w)
                                    * signs.representative(v, w),
                            );
                        }
                    }
                }
            }
        }
        BalanceMode::Exact => {
            for [u, v, w] in signs.triangles() {
                token.check()?;
                for a in signs.all(u, v) {
                    for b in signs.all(u, w) {
                        for c in signs.all(v, w) {
                            tally.add(a * b * c);
                        }
                    }
                }
            }
        }
    }

    let triangles = signs.triangles();
    let unbalanced_triads = triangles
        .iter()
        .filter(|[u, v, w]| {
            signs.representative(*u, *v) * signs.representative(*u, *w) * signs.representative(*v, *w) <= 0
        })
        .map(|t| {
            let mut ids = t.map(|i| snapshot.nodes[i].id.clone());
            ids.sort();
            ids
        })
        .collect();

    let total = tally.balanced + tally.unbalanced;
    let frustration_index = if total == 0 {
        0.0
    } else {
        tally.unbalanced as f64 / total as f64
    };
    Ok(BalanceReport {
        mode,
        balanced: tally.balanced,
        unbalanced: tally.unbalanced,
        triangles: triangles.len() as u64,
        frustration_index,
        unbalanced_triads,
    })
}
