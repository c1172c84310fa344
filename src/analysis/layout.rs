//! ForceAtlas2-style force-directed layout
//!
//! Degree-weighted repulsion between every pair of nodes (optionally
//! approximated with a Barnes–Hut quadtree), linear attraction along edges
//! and gravity toward the origin. A global speed adapts to how much the
//! nodes oscillate ("swing") versus how much they move coherently
//! ("traction"). No randomness: the same snapshot and config always give
//! the same positions.

use super::snapshot::GraphSnapshot;
use super::types::{AnalysisError, CancellationToken};
use crate::graph::{NodeId, Position};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Node count above which Barnes–Hut is used when not set explicitly
pub const BARNES_HUT_THRESHOLD: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub iterations: usize,
    pub gravity: f64,
    pub scaling_ratio: f64,
    /// `None` enables Barnes–Hut for graphs above the threshold
    pub barnes_hut: Option<bool>,
    pub theta: f64,
    pub edge_weight_influence: f64,
    pub strong_gravity: bool,
    pub jitter_tolerance: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            iterations: 300,
            gravity: 1.0,
            scaling_ratio: 10.0,
            barnes_hut: None,
            theta: 1.2,
            edge_weight_influence: 1.0,
            strong_gravity: false,
            jitter_tolerance: 1.0,
        }
    }
}

impl LayoutConfig {
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_barnes_hut(mut self, enabled: bool) -> Self {
        self.barnes_hut = Some(enabled);
        self
    }

    fn uses_barnes_hut(&self, n: usize) -> bool {
        self.barnes_hut.unwrap_or(n > BARNES_HUT_THRESHOLD)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub positions: Vec<(NodeId, Position)>,
    pub iterations: usize,
}

/// Run the layout from the snapshot's current positions
pub fn run(
    snapshot: &GraphSnapshot,
    config: &LayoutConfig,
    token: &CancellationToken,
) -> Result<LayoutResult, AnalysisError> {
    if !(config.theta > 0.0) || !config.scaling_ratio.is_finite() || !config.gravity.is_finite() {
        return Err(AnalysisError::InvalidInput(
            "layout parameters must be finite with theta > 0".to_string(),
        ));
    }

    let n = snapshot.node_count();
    let mut state = State::new(snapshot);
    let barnes_hut = config.uses_barnes_hut(n);
    debug!(nodes = n, barnes_hut, iterations = config.iterations, "layout started");

    for _ in 0..config.iterations {
        token.check()?;
        state.step(snapshot, config, barnes_hut);
    }

    let positions = snapshot
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id.clone(), Position::new(state.x[i], state.y[i])))
        .collect();
    Ok(LayoutResult {
        positions,
        iterations: config.iterations,
    })
}

struct State {
    x: Vec<f64>,
    y: Vec<f64>,
    mass: Vec<f64>,
    dx: Vec<f64>,
    dy: Vec<f64>,
    old_dx: Vec<f64>,
    old_dy: Vec<f64>,
    speed: f64,
    speed_efficiency: f64,
}

impl State {
    fn new(snapshot: &GraphSnapshot) -> Self {
        let n = snapshot.node_count();
        let mut x: Vec<f64> = snapshot.nodes.iter().map(|node| node.position.x).collect();
        let mut y: Vec<f64> = snapshot.nodes.iter().map(|node| node.position.y).collect();
        for i in 0..n {
            if !x[i].is_finite() {
                x[i] = 0.0;
            }
            if !y[i].is_finite() {
                y[i] = 0.0;
            }
        }
        separate_coincident(&mut x, &mut y);
        let mass = snapshot.degrees().iter().map(|&d| d as f64 + 1.0).collect();
        Self {
            x,
            y,
            mass,
            dx: vec![0.0; n],
            dy: vec![0.0; n],
            old_dx: vec![0.0; n],
            old_dy: vec![0.0; n],
            speed: 1.0,
            speed_efficiency: 1.0,
        }
    }

    fn step(&mut self, snapshot: &GraphSnapshot, config: &LayoutConfig, barnes_hut: bool) {
        let n = self.x.len();
        if n == 0 {
            return;
        }
        std::mem::swap(&mut self.dx, &mut self.old_dx);
        std::mem::swap(&mut self.dy, &mut self.old_dy);
        self.dx.iter_mut().for_each(|v| *v = 0.0);
        self.dy.iter_mut().for_each(|v| *v = 0.0);

        if barnes_hut {
            let tree = QuadTree::build(&self.x, &self.y, &self.mass);
            for i in 0..n {
                let (fx, fy) = tree.repulsion(i, self.x[i], self.y[i], self.mass[i], config);
                self.dx[i] += fx;
                self.dy[i] += fy;
            }
        } else {
            for i in 0..n {
                for j in (i + 1)..n {
                    let (ddx, ddy) = offset(self.x[i] - self.x[j], self.y[i] - self.y[j], i, j);
                    let d2 = ddx * ddx + ddy * ddy;
                    let factor = config.scaling_ratio * self.mass[i] * self.mass[j] / d2;
                    self.dx[i] += ddx * factor;
                    self.dy[i] += ddy * factor;
                    self.dx[j] -= ddx * factor;
                    self.dy[j] -= ddy * factor;
                }
            }
        }

        for i in 0..n {
            let distance = (self.x[i] * self.x[i] + self.y[i] * self.y[i]).sqrt();
            let factor = if config.strong_gravity {
                config.gravity * self.mass[i]
            } else if distance > 0.0 {
                config.gravity * self.mass[i] / distance
            } else {
                0.0
            };
            self.dx[i] -= self.x[i] * factor;
            self.dy[i] -= self.y[i] * factor;
        }

        for edge in snapshot.edges.iter().filter(|e| !e.is_self_loop()) {
            let (s, t) = (edge.source, edge.target);
            let w = if config.edge_weight_influence == 0.0 {
                1.0
            } else {
                edge.positive_weight().powf(config.edge_weight_influence)
            };
            let ddx = self.x[s] - self.x[t];
            let ddy = self.y[s] - self.y[t];
            self.dx[s] -= ddx * w;
            self.dy[s] -= ddy * w;
            self.dx[t] += ddx * w;
            self.dy[t] += ddy * w;
        }

        self.apply_forces(config);
    }

    fn apply_forces(&mut self, config: &LayoutConfig) {
        let n = self.x.len();
        let mut total_swinging = 0.0;
        let mut total_traction = 0.0;
        for i in 0..n {
            let sx = self.old_dx[i] - self.dx[i];
            let sy = self.old_dy[i] - self.dy[i];
            total_swinging += self.mass[i] * (sx * sx + sy * sy).sqrt();
            let tx = self.old_dx[i] + self.dx[i];
            let ty = self.old_dy[i] + self.dy[i];
            total_traction += self.mass[i] * 0.5 * (tx * tx + ty * ty).sqrt();
        }

        let estimated_jitter = 0.05 * (n as f64).sqrt();
        let min_jitter = estimated_jitter.sqrt();
        let max_jitter: f64 = 10.0;
        let mut jitter = config.jitter_tolerance
            * min_jitter.max(max_jitter.min(estimated_jitter * total_traction / (n * n) as f64));
        let min_speed_efficiency = 0.05;

        if total_traction > 0.0 && total_swinging / total_traction > 2.0 {
            if self.speed_efficiency > min_speed_efficiency {
                self.speed_efficiency *= 0.5;
            }
            jitter = jitter.max(config.jitter_tolerance);
        }

        if total_swinging > 0.0 {
            let target_speed = jitter * self.speed_efficiency * total_traction / total_swinging;
            if total_swinging > jitter * total_traction {
                if self.speed_efficiency > min_speed_efficiency {
                    self.speed_efficiency *= 0.7;
                }
            } else if self.speed < 1000.0 {
                self.speed_efficiency *= 1.3;
            }
            let max_rise = 0.5;
            self.speed += (target_speed - self.speed).min(max_rise * self.speed);
        }

        for i in 0..n {
            let sx = self.old_dx[i] - self.dx[i];
            let sy = self.old_dy[i] - self.dy[i];
            let swinging = self.mass[i] * (sx * sx + sy * sy).sqrt();
            let factor = self.speed / (1.0 + (self.speed * swinging).sqrt());
            let nx = self.x[i] + self.dx[i] * factor;
            let ny = self.y[i] + self.dy[i] * factor;
            if nx.is_finite() && ny.is_finite() {
                self.x[i] = nx;
                self.y[i] = ny;
            }
        }
    }
}

/// Displacement between two nodes, replaced by a small index-derived vector
/// when they coincide
fn offset(dx: f64, dy: f64, i: usize, j: usize) -> (f64, f64) {
    if dx == 0.0 && dy == 0.0 {
        let k = (i as f64) - (j as f64);
        (0.01 * k, 0.01)
    } else {
        (dx, dy)
    }
}

/// Spread nodes sharing a position onto a small circle around it
fn separate_coincident(x: &mut [f64], y: &mut [f64]) {
    let n = x.len();
    for i in 0..n {
        let mut k = 0usize;
        for j in 0..i {
            if x[j] == x[i] && y[j] == y[i] {
                k += 1;
            }
        }
        if k > 0 {
            let angle = (i as f64) * 2.399_963;
            let radius = 1.0 + k as f64 * 0.5;
            x[i] += radius * angle.cos();
            y[i] += radius * angle.sin();
        }
    }
}

const MAX_DEPTH: usize = 24;

#[derive(Debug, Clone)]
struct Cell {
    cx: f64,
    cy: f64,
    half: f64,
    depth: usize,
    mass: f64,
    com_x: f64,
    com_y: f64,
    /// Single body held by a leaf
    body: Option<(usize, f64, f64, f64)>,
    children: Option<[usize; 4]>,
}

impl Cell {
    fn empty(cx: f64, cy: f64, half: f64, depth: usize) -> Self {
        Self {
            cx,
            cy,
            half,
            depth,
            mass: 0.0,
            com_x: 0.0,
            com_y: 0.0,
            body: None,
            children: None,
        }
    }

    fn add_mass(&mut self, x: f64, y: f64, m: f64) {
        let total = self.mass + m;
        self.com_x = (self.com_x * self.mass + x * m) / total;
        self.com_y = (self.com_y * self.mass + y * m) / total;
        self.mass = total;
    }

    fn quadrant(&self, x: f64, y: f64) -> usize {
        (usize::from(x >= self.cx)) | (usize::from(y >= self.cy) << 1)
    }
}

/// Barnes–Hut quadtree over node positions, weighted by node mass
struct QuadTree {
    cells: Vec<Cell>,
}

impl QuadTree {
    fn build(x: &[f64], y: &[f64], mass: &[f64]) -> Self {
        let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
        for i in 0..x.len() {
            min_x = min_x.min(x[i]);
            max_x = max_x.max(x[i]);
            min_y = min_y.min(y[i]);
            max_y = max_y.max(y[i]);
        }
        let half = ((max_x - min_x).max(max_y - min_y) / 2.0).max(1e-6) * 1.01;
        let root = Cell::empty((min_x + max_x) / 2.0, (min_y + max_y) / 2.0, half, 0);
        let mut tree = Self { cells: vec![root] };
        for i in 0..x.len() {
            tree.insert(i, x[i], y[i], mass[i]);
        }
        tree
    }

    fn insert(&mut self, i: usize, x: f64, y: f64, m: f64) {
        let mut cell = 0;
        loop {
            if let Some(children) = self.cells[cell].children {
                self.cells[cell].add_mass(x, y, m);
                cell = children[self.cells[cell].quadrant(x, y)];
                continue;
            }
            let (existing, occupied, depth) = {
                let c = &self.cells[cell];
                (c.body, c.body.is_some() || c.mass > 0.0, c.depth)
            };
            if !occupied {
                let c = &mut self.cells[cell];
                c.body = Some((i, x, y, m));
                c.add_mass(x, y, m);
                return;
            }
            if depth >= MAX_DEPTH {
                // aggregate leaf: keeps mass, forgets individual bodies
                let c = &mut self.cells[cell];
                c.body = None;
                c.add_mass(x, y, m);
                return;
            }
            self.subdivide(cell);
            if let Some((b, bx, by, bm)) = existing {
                let children = self.cells[cell]
                    .children
                    .unwrap_or_else(|| unreachable!("subdivided cell has children"));
                let child = children[self.cells[cell].quadrant(bx, by)];
                let c = &mut self.cells[child];
                c.body = Some((b, bx, by, bm));
                c.add_mass(bx, by, bm);
                self.cells[cell].body = None;
            }
        }
    }

    fn subdivide(&mut self, cell: usize) {
        let Cell { cx, cy, half, depth, .. } = self.cells[cell];
        let h = half / 2.0;
        let base = self.cells.len();
        for q in 0..4 {
            let ox = if q & 1 == 1 { h } else { -h };
            let oy = if q & 2 == 2 { h } else { -h };
            self.cells.push(Cell::empty(cx + ox, cy + oy, h, depth + 1));
        }
        self.cells[cell].children = Some([base, base + 1, base + 2, base + 3]);
    }

    fn repulsion(&self, i: usize, x: f64, y: f64, m: f64, config: &LayoutConfig) -> (f64, f64) {
        let mut fx = 0.0;
        let mut fy = 0.0;
        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let cell = &self.cells[index];
            if cell.mass == 0.0 {
                continue;
            }
            match (cell.children, cell.body) {
                (None, Some((b, bx, by, bm))) => {
                    if b == i {
                        continue;
                    }
                    let (dx, dy) = offset(x - bx, y - by, i, b);
                    let factor = config.scaling_ratio * m * bm / (dx * dx + dy * dy);
                    fx += dx * factor;
                    fy += dy * factor;
                }
                (children, _) => {
                    let dx = x - cell.com_x;
                    let dy = y - cell.com_y;
                    let d2 = dx * dx + dy * dy;
                    let far = d2 > 0.0 && (2.0 * cell.half) / d2.sqrt() < config.theta;
                    match children {
                        Some(children) if !far => stack.extend(children),
                        _ if d2 > 0.0 => {
                            let factor = config.scaling_ratio * m * cell.mass / d2;
                            fx += dx * factor;
                            fy += dy * factor;
                        }
                        _ => {}
                    }
                }
            }
        }
        (fx, fy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::snapshot::GraphSnapshot;
    use crate::graph::{Category, Edge, Graph, Node};

    fn graph() -> Graph {
        let mut g = Graph::new();
        let coords = [("a", 0.0, 0.0), ("b", 100.0, 0.0), ("c", 0.0, 100.0), ("d", 100.0, 100.0)];
        for (id, x, y) in coords {
            g.add_node(Node::new(id, id, Category::Person).with_position(Position::new(x, y)))
                .unwrap();
        }
        g.add_edge(Edge::new("a", "b", "knew")).unwrap();
        g
    }

    fn distance(result: &LayoutResult, a: usize, b: usize) -> f64 {
        let (pa, pb) = (result.positions[a].1, result.positions[b].1);
        ((pa.x - pb.x).powi(2) + (pa.y - pb.y).powi(2)).sqrt()
    }

    #[test]
    fn layout_is_deterministic() {
        let snap = GraphSnapshot::from_graph(&graph(), 0);
        let config = LayoutConfig::default();
        let token = CancellationToken::new();
        let r1 = run(&snap, &config, &token).unwrap();
        let r2 = run(&snap, &config, &token).unwrap();
        assert_eq!(r1, r2);
        assert!(r1.positions.iter().all(|(_, p)| p.x.is_finite() && p.y.is_finite()));
    }

    #[test]
    fn connected_nodes_end_closer_than_unconnected() {
        let snap = GraphSnapshot::from_graph(&graph(), 0);
        let result = run(&snap, &LayoutConfig::default(), &CancellationToken::new()).unwrap();
        assert!(distance(&result, 0, 1) < distance(&result, 2, 3));
    }

    #[test]
    fn coincident_nodes_are_separated() {
        let mut g = Graph::new();
        g.add_node(Node::new("x", "x", Category::Concept)).unwrap();
        g.add_node(Node::new("y", "y", Category::Concept)).unwrap();
        let snap = GraphSnapshot::from_graph(&g, 0);
        let result = run(&snap, &LayoutConfig::default().with_iterations(10), &CancellationToken::new())
            .unwrap();
        assert!(distance(&result, 0, 1) > 0.0);
    }

    #[test]
    fn barnes_hut_gives_finite_deterministic_positions() {
        let mut g = Graph::new();
        for i in 0..60 {
            let angle = i as f64 * 0.7;
            g.add_node(
                Node::new(format!("n{:02}", i), "n", Category::Person)
                    .with_position(Position::new(angle.cos() * (10.0 + i as f64), angle.sin() * 50.0)),
            )
            .unwrap();
        }
        for i in 0..59 {
            g.add_edge(Edge::new(format!("n{:02}", i), format!("n{:02}", i + 1), "next")).unwrap();
        }
        let snap = GraphSnapshot::from_graph(&g, 0);
        let config = LayoutConfig::default().with_barnes_hut(true).with_iterations(50);
        let token = CancellationToken::new();
        let r1 = run(&snap, &config, &token).unwrap();
        let r2 = run(&snap, &config, &token).unwrap();
        assert_eq!(r1, r2);
        assert!(r1.positions.iter().all(|(_, p)| p.x.is_finite() && p.y.is_finite()));
    }

    #[test]
    fn cancelled_run_returns_cancelled() {
        let snap = GraphSnapshot::from_graph(&graph(), 0);
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(
            run(&snap, &LayoutConfig::default(), &token),
            Err(AnalysisError::Cancelled)
        );
    }

    #[test]
    fn empty_snapshot_is_fine() {
        let result = run(&GraphSnapshot::default(), &LayoutConfig::default(), &CancellationToken::new())
            .unwrap();
        assert!(result.positions.is_empty());
    }
}
