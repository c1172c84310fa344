//! Result merger: writes algorithm outputs back into the live graph
//!
//! A merge is all-or-nothing. The whole output is validated before the
//! first node is touched; a failed validation leaves the graph exactly as it
//! was. Nodes deleted since the snapshot was taken are skipped and counted.

use super::centrality::{normalize_to_max, size_for};
use super::community::community_color;
use super::types::AnalysisOutput;
use crate::graph::{Graph, GraphResult, NodeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    #[error("Non-finite value for node {0}")]
    NonFinite(NodeId),

    #[error("Embedding dimension mismatch for node {node}: expected {expected}, got {got}")]
    DimensionMismatch {
        node: NodeId,
        expected: usize,
        got: usize,
    },

    #[error("Negative centrality for node {0}")]
    NegativeScore(NodeId),
}

/// Counts from one merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergeSummary {
    pub updated: usize,
    /// Nodes present in the result but no longer in the graph
    pub skipped: usize,
}

impl MergeSummary {
    fn record(&mut self, outcome: GraphResult<()>) {
        match outcome {
            Ok(()) => self.updated += 1,
            Err(_) => self.skipped += 1,
        }
    }
}

/// Applies analysis outputs to the graph
#[derive(Debug, Clone)]
pub struct ResultMerger {
    /// Node size range used for centrality
    pub min_size: f64,
    pub max_size: f64,
}

impl Default for ResultMerger {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultMerger {
    pub fn new() -> Self {
        Self {
            min_size: 5.0,
            max_size: 25.0,
        }
    }

    pub fn with_size_range(mut self, min_size: f64, max_size: f64) -> Self {
        self.min_size = min_size;
        self.max_size = max_size;
        self
    }

    /// Check an output without touching the graph
    pub fn validate(&self, output: &AnalysisOutput) -> Result<(), MergeError> {
        match output {
            AnalysisOutput::Layout(result) => {
                for (id, p) in &result.positions {
                    if !p.x.is_finite() || !p.y.is_finite() {
                        return Err(MergeError::NonFinite(id.clone()));
                    }
                }
            }
            AnalysisOutput::Centrality(result) => {
                for (id, score) in &result.scores {
                    if !score.is_finite() {
                        return Err(MergeError::NonFinite(id.clone()));
                    }
                    if *score < 0.0 {
                        return Err(MergeError::NegativeScore(id.clone()));
                    }
                }
            }
            AnalysisOutput::Embeddings(result) => {
                validate_vectors(&result.vectors, Some(result.dimension))?;
            }
            AnalysisOutput::Representation(result) => {
                validate_vectors(&result.vectors, None)?;
            }
            AnalysisOutput::Community(_)
            | AnalysisOutput::Balance(_)
            | AnalysisOutput::Search { .. } => {}
        }
        Ok(())
    }

    /// Validate, then apply. Graph-level outputs (balance, search) merge
    /// nothing.
    pub fn merge(&self, graph: &mut Graph, output: &AnalysisOutput) -> Result<MergeSummary, MergeError> {
        self.validate(output)?;
        let mut summary = MergeSummary::default();
        match output {
            AnalysisOutput::Layout(result) => {
                for (id, position) in &result.positions {
                    summary.record(graph.update_node(id, |node| node.position = *position));
                }
            }
            AnalysisOutput::Community(result) => {
                for (id, community) in &result.assignment {
                    summary.record(graph.update_node(id, |node| {
                        node.community = Some(*community);
                        node.color = community_color(*community).to_string();
                    }));
                }
            }
            AnalysisOutput::Centrality(result) => {
                let raw: Vec<f64> = result.scores.iter().map(|(_, s)| *s).collect();
                let relative = normalize_to_max(&raw);
                for ((id, score), rel) in result.scores.iter().zip(relative) {
                    let size = size_for(rel, self.min_size, self.max_size);
                    summary.record(graph.update_node(id, |node| {
                        node.centrality = Some(*score);
                        node.size = size;
                    }));
                }
            }
            AnalysisOutput::Embeddings(result) => {
                for (id, vector) in &result.vectors {
                    summary.record(graph.update_node(id, |node| node.embedding = Some(vector.clone())));
                }
            }
            AnalysisOutput::Representation(result) => {
                for (id, vector) in &result.vectors {
                    summary.record(graph.update_node(id, |node| node.embedding = Some(vector.clone())));
                }
            }
            AnalysisOutput::Balance(_) | AnalysisOutput::Search { .. } => {}
        }

        info!(
            kind = %output.kind(),
            updated = summary.updated,
            skipped = summary.skipped,
            "merged analysis result"
        );
        Ok(summary)
    }
}

fn validate_vectors(vectors: &[(NodeId, Vec<f32>)], dimension: Option<usize>) -> Result<(), MergeError> {
    let expected = dimension.or_else(|| vectors.first().map(|(_, v)| v.len()));
    for (id, vector) in vectors {
        if let Some(expected) = expected {
            if vector.len() != expected {
                return Err(MergeError::DimensionMismatch {
                    node: id.clone(),
                    expected,
                    got: vector.len(),
                });
            }
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(MergeError::NonFinite(id.clone()));
        }
    }
    Ok(())
}
