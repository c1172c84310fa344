//! Requests, outputs and errors exchanged between the coordinator and the
//! algorithms

use super::balance::{BalanceMode, BalanceReport};
use super::centrality::{CentralityConfig, CentralityResult};
use super::community::{CommunityConfig, CommunityResult};
use super::embedding::{EmbeddingResult, SearchHit};
use super::layout::{LayoutConfig, LayoutResult};
use super::representation::{RepresentationConfig, RepresentationResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Identity of one graph instance. Bumped whenever the graph is replaced
/// wholesale.
pub type Generation = u64;

/// Correlates a submitted request with its completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Algorithm families. At most one request per kind is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Layout,
    Community,
    Centrality,
    Balance,
    EmbedNodes,
    Search,
    Representation,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Layout => "layout",
            AnalysisKind::Community => "community",
            AnalysisKind::Centrality => "centrality",
            AnalysisKind::Balance => "balance",
            AnalysisKind::EmbedNodes => "embed_nodes",
            AnalysisKind::Search => "search",
            AnalysisKind::Representation => "representation",
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One algorithm invocation with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisRequest {
    Layout(LayoutConfig),
    Community(CommunityConfig),
    Centrality(CentralityConfig),
    Balance { mode: BalanceMode },
    EmbedNodes,
    Search { query: String, top_k: usize },
    Representation(RepresentationConfig),
}

impl AnalysisRequest {
    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisRequest::Layout(_) => AnalysisKind::Layout,
            AnalysisRequest::Community(_) => AnalysisKind::Community,
            AnalysisRequest::Centrality(_) => AnalysisKind::Centrality,
            AnalysisRequest::Balance { .. } => AnalysisKind::Balance,
            AnalysisRequest::EmbedNodes => AnalysisKind::EmbedNodes,
            AnalysisRequest::Search { .. } => AnalysisKind::Search,
            AnalysisRequest::Representation(_) => AnalysisKind::Representation,
        }
    }

    /// Search with the default result count
    pub fn search(query: impl Into<String>) -> Self {
        AnalysisRequest::Search {
            query: query.into(),
            top_k: super::embedding::DEFAULT_TOP_K,
        }
    }
}

/// What an algorithm produced, keyed by node id so it can be merged into a
/// graph that changed since the snapshot was taken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisOutput {
    Layout(LayoutResult),
    Community(CommunityResult),
    Centrality(CentralityResult),
    Balance(BalanceReport),
    Embeddings(EmbeddingResult),
    Search { hits: Vec<SearchHit> },
    Representation(RepresentationResult),
}

impl AnalysisOutput {
    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisOutput::Layout(_) => AnalysisKind::Layout,
            AnalysisOutput::Community(_) => AnalysisKind::Community,
            AnalysisOutput::Centrality(_) => AnalysisKind::Centrality,
            AnalysisOutput::Balance(_) => AnalysisKind::Balance,
            AnalysisOutput::Embeddings(_) => AnalysisKind::EmbedNodes,
            AnalysisOutput::Search { .. } => AnalysisKind::Search,
            AnalysisOutput::Representation(_) => AnalysisKind::Representation,
        }
    }
}

/// Error types for analysis
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Analysis crashed: {0}")]
    Crashed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Tensor operation failed: {0}")]
    Tensor(String),
}

/// Stop flag shared by the coordinator and one running algorithm.
///
/// Set when the request is superseded or the graph replaced. Algorithms call
/// [`check`](Self::check) once per iteration or per source node.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Bail out of the current run with `AnalysisError::Cancelled`
    pub fn check(&self) -> Result<(), AnalysisError> {
        if self.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            Ok(())
        }
    }
}
