//! Signed representation learning
//!
//! Two GraphSAGE layers with a mean aggregator,
//! `H' = ReLU(H W_self + (ÂH) W_neighbor)` with `Â` the row-normalised
//! unsigned adjacency, trained full-batch so that positively linked nodes
//! end up close and negatively linked nodes end up at least `margin` apart:
//!
//! `L = Σ_pos ‖z_u − z_v‖² + Σ_neg max(0, margin − ‖z_u − z_v‖²)`
//!
//! Inputs are plain feature rows and index pairs so training never touches
//! the live graph.

use super::snapshot::GraphSnapshot;
use super::types::{AnalysisError, CancellationToken};
use crate::graph::{Category, Jurisdiction, NodeId, Sign};
use crate::lcg::Lcg;
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::optim::{Optimizer, SGD};
use candle_nn::{Linear, Module};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepresentationConfig {
    pub hidden_dim: usize,
    pub output_dim: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub margin: f64,
    pub seed: u32,
}

impl Default for RepresentationConfig {
    fn default() -> Self {
        Self {
            hidden_dim: 16,
            output_dim: 8,
            epochs: 100,
            learning_rate: 0.01,
            margin: 1.0,
            seed: 42,
        }
    }
}

/// Training data decoupled from the graph
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrainingInput {
    /// One feature row per node, all of equal length
    pub features: Vec<Vec<f32>>,
    /// Neighbour indices per node (unsigned)
    pub adjacency: Vec<Vec<usize>>,
    pub positive_pairs: Vec<(usize, usize)>,
    pub negative_pairs: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainedEmbeddings {
    pub embeddings: Vec<Vec<f32>>,
    pub loss_history: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepresentationResult {
    pub vectors: Vec<(NodeId, Vec<f32>)>,
    pub loss_history: Vec<f64>,
}

fn tensor_error(e: candle_core::Error) -> AnalysisError {
    AnalysisError::Tensor(e.to_string())
}

/// Xavier-uniform weight in `Linear` layout (out x in), drawn from the
/// seeded generator so runs are reproducible
fn seeded_weight(in_dim: usize, out_dim: usize, rng: &mut Lcg, device: &Device) -> candle_core::Result<Var> {
    let limit = (6.0 / (in_dim + out_dim) as f64).sqrt();
    let data: Vec<f32> = (0..in_dim * out_dim)
        .map(|_| (rng.next_signed() * limit) as f32)
        .collect();
    Var::from_tensor(&Tensor::from_vec(data, (out_dim, in_dim), device)?)
}

/// One mean-aggregator GraphSAGE layer without bias
struct SageLayer {
    lin_self: Linear,
    lin_neighbor: Linear,
}

impl SageLayer {
    fn new(in_dim: usize, out_dim: usize, rng: &mut Lcg, vars: &mut Vec<Var>, device: &Device) -> candle_core::Result<Self> {
        let w_self = seeded_weight(in_dim, out_dim, rng, device)?;
        let w_neighbor = seeded_weight(in_dim, out_dim, rng, device)?;
        let layer = Self {
            lin_self: Linear::new(w_self.as_tensor().clone(), None),
            lin_neighbor: Linear::new(w_neighbor.as_tensor().clone(), None),
        };
        vars.push(w_self);
        vars.push(w_neighbor);
        Ok(layer)
    }

    /// `adj` is already row-normalised, so `adj · x` is the neighbour mean
    fn forward(&self, x: &Tensor, adj: &Tensor) -> candle_core::Result<Tensor> {
        let h_self = self.lin_self.forward(x)?;
        let h_neighbor = self.lin_neighbor.forward(&adj.matmul(x)?)?;
        (h_self + h_neighbor)?.relu()
    }
}

struct Model {
    layers: [SageLayer; 2],
}

impl Model {
    fn forward(&self, x: &Tensor, adj: &Tensor) -> candle_core::Result<Tensor> {
        let h = self.layers[0].forward(x, adj)?;
        self.layers[1].forward(&h, adj)
    }
}

/// Index tensors for one side of each pair
fn pair_indices(pairs: &[(usize, usize)], device: &Device) -> candle_core::Result<Option<(Tensor, Tensor)>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let (u, v): (Vec<u32>, Vec<u32>) = pairs.iter().map(|&(u, v)| (u as u32, v as u32)).unzip();
    Ok(Some((Tensor::new(u.as_slice(), device)?, Tensor::new(v.as_slice(), device)?)))
}

/// Squared distance per pair
fn pair_distances(z: &Tensor, (u, v): &(Tensor, Tensor)) -> candle_core::Result<Tensor> {
    (z.index_select(u, 0)? - z.index_select(v, 0)?)?.sqr()?.sum(1)
}

struct Pairs {
    positive: Option<(Tensor, Tensor)>,
    negative: Option<(Tensor, Tensor)>,
    margin: f64,
}

impl Pairs {
    fn is_empty(&self) -> bool {
        self.positive.is_none() && self.negative.is_none()
    }

    fn loss(&self, z: &Tensor) -> candle_core::Result<Tensor> {
        let mut loss = Tensor::zeros((), DType::F32, z.device())?;
        if let Some(pos) = &self.positive {
            loss = (loss + pair_distances(z, pos)?.sum_all()?)?;
        }
        if let Some(neg) = &self.negative {
            let hinge = pair_distances(z, neg)?.affine(-1.0, self.margin)?.relu()?;
            loss = (loss + hinge.sum_all()?)?;
        }
        Ok(loss)
    }
}

/// Row-normalised dense adjacency; isolated nodes get an all-zero row
fn mean_adjacency(adjacency: &[Vec<usize>], device: &Device) -> candle_core::Result<Tensor> {
    let n = adjacency.len();
    let mut data = vec![0f32; n * n];
    for (i, neighbors) in adjacency.iter().enumerate() {
        let w = 1.0 / neighbors.len().max(1) as f32;
        for &j in neighbors {
            data[i * n + j] += w;
        }
    }
    Tensor::from_vec(data, (n, n), device)
}

fn validate(input: &TrainingInput, config: &RepresentationConfig) -> Result<usize, AnalysisError> {
    let n = input.features.len();
    let width = input.features.first().map_or(0, Vec::len);
    if input.features.iter().any(|row| row.len() != width) {
        return Err(AnalysisError::InvalidInput("feature rows differ in length".to_string()));
    }
    if input.adjacency.len() != n {
        return Err(AnalysisError::InvalidInput("adjacency size differs from features".to_string()));
    }
    let in_range = |&(u, v): &(usize, usize)| u < n && v < n;
    if !input.positive_pairs.iter().all(in_range)
        || !input.negative_pairs.iter().all(in_range)
        || !input.adjacency.iter().flatten().all(|&j| j < n)
    {
        return Err(AnalysisError::InvalidInput("node index out of range".to_string()));
    }
    if config.hidden_dim == 0 || config.output_dim == 0 || !(config.learning_rate > 0.0) {
        return Err(AnalysisError::InvalidInput(
            "dimensions and learning rate must be positive".to_string(),
        ));
    }
    Ok(width)
}

/// Train and return one embedding per input row
pub fn train(
    input: &TrainingInput,
    config: &RepresentationConfig,
    token: &CancellationToken,
) -> Result<TrainedEmbeddings, AnalysisError> {
    let width = validate(input, config)?;
    let n = input.features.len();
    if n == 0 {
        return Ok(TrainedEmbeddings {
            embeddings: Vec::new(),
            loss_history: Vec::new(),
        });
    }

    let device = Device::Cpu;
    let flat: Vec<f32> = input.features.iter().flatten().copied().collect();
    let x = Tensor::from_vec(flat, (n, width), &device).map_err(tensor_error)?;
    let adj = mean_adjacency(&input.adjacency, &device).map_err(tensor_error)?;

    let mut rng = Lcg::new(config.seed);
    let mut vars = Vec::with_capacity(4);
    let model = Model {
        layers: [
            SageLayer::new(width, config.hidden_dim, &mut rng, &mut vars, &device).map_err(tensor_error)?,
            SageLayer::new(config.hidden_dim, config.output_dim, &mut rng, &mut vars, &device)
                .map_err(tensor_error)?,
        ],
    };
    let pairs = Pairs {
        positive: pair_indices(&input.positive_pairs, &device).map_err(tensor_error)?,
        negative: pair_indices(&input.negative_pairs, &device).map_err(tensor_error)?,
        margin: config.margin,
    };
    let mut optimizer = SGD::new(vars, config.learning_rate).map_err(tensor_error)?;
    let mut loss_history = Vec::with_capacity(config.epochs);

    for _ in 0..config.epochs {
        token.check()?;
        if pairs.is_empty() {
            loss_history.push(0.0);
            continue;
        }
        let z = model.forward(&x, &adj).map_err(tensor_error)?;
        let loss = pairs.loss(&z).map_err(tensor_error)?;
        loss_history.push(loss.to_scalar::<f32>().map_err(tensor_error)? as f64);
        optimizer.backward_step(&loss).map_err(tensor_error)?;
    }

    let embeddings = model
        .forward(&x, &adj)
        .and_then(|z| z.to_vec2::<f32>())
        .map_err(tensor_error)?;
    debug!(
        nodes = n,
        epochs = config.epochs,
        final_loss = loss_history.last().copied().unwrap_or(0.0),
        "representation trained"
    );
    Ok(TrainedEmbeddings {
        embeddings,
        loss_history,
    })
}

/// Features: one-hot category, one-hot jurisdiction, financial weight and
/// secrecy level / 5. Pairs come from edge signs; neutral edges and
/// self-loops carry no training signal.
pub fn features_from_snapshot(snapshot: &GraphSnapshot) -> TrainingInput {
    let features = snapshot
        .nodes
        .iter()
        .map(|node| {
            let mut row: Vec<f32> = Category::ALL
                .iter()
                .map(|c| if *c == node.category { 1.0 } else { 0.0 })
                .collect();
            row.extend(
                Jurisdiction::ALL
                    .iter()
                    .map(|j| if *j == node.jurisdiction { 1.0 } else { 0.0 }),
            );
            row.push(node.financial_weight as f32);
            row.push(node.secrecy_level as f32 / 5.0);
            row
        })
        .collect();

    let mut positive_pairs = Vec::new();
    let mut negative_pairs = Vec::new();
    for edge in snapshot.edges.iter().filter(|e| !e.is_self_loop()) {
        match edge.sign {
            Sign::Positive => positive_pairs.push((edge.source, edge.target)),
            Sign::Negative => negative_pairs.push((edge.source, edge.target)),
            Sign::Neutral => {}
        }
    }

    TrainingInput {
        features,
        adjacency: snapshot.neighbor_lists(),
        positive_pairs,
        negative_pairs,
    }
}

/// Train on a snapshot and key the vectors by node id
pub fn run(
    snapshot: &GraphSnapshot,
    config: &RepresentationConfig,
    token: &CancellationToken,
) -> Result<RepresentationResult, AnalysisError> {
    let trained = train(&features_from_snapshot(snapshot), config, token)?;
    let vectors = snapshot
        .nodes
        .iter()
        .map(|node| node.id.clone())
        .zip(trained.embeddings)
        .collect();
    Ok(RepresentationResult {
        vectors,
        loss_history: trained.loss_history,
    })
}
