//! Text embeddings and similarity search
//!
//! Uses a trait-based embedding backend (`Embedder`) so production code can
//! use fastembed-rs while tests and offline runs use the deterministic
//! `HashEmbedder`. `ResilientEmbedder` puts the two together: the primary
//! backend is tried first and the hash fallback is substituted when it
//! fails.

use super::snapshot::GraphSnapshot;
use super::types::{AnalysisError, CancellationToken};
use crate::graph::NodeId;
use crate::lcg::Lcg;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default dimension of fallback vectors
pub const DEFAULT_DIMENSION: usize = 768;

/// Default number of search hits
pub const DEFAULT_TOP_K: usize = 10;

/// Error type for embedding operations.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding returned no results")]
    EmptyResult,

    #[error("embedding model error: {0}")]
    ModelError(String),

    #[error("embedding backend unavailable")]
    Unavailable,
}

/// Trait for embedding text into vectors.
///
/// Implementations handle model loading and inference.
/// fastembed-rs for production, hash vectors for tests and fallback.
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Name recorded alongside the vectors it produces
    fn name(&self) -> &str;
}

/// Deterministic pseudo-embeddings seeded from the text's character codes.
///
/// Same text always gives the same unit vector. Carries no semantics beyond
/// exact-text identity.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut rng = Lcg::from_text(text);
        let raw: Vec<f64> = (0..self.dimension).map(|_| rng.next_signed()).collect();
        let norm = raw.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm == 0.0 {
            return raw.into_iter().map(|v| v as f32).collect();
        }
        raw.into_iter().map(|v| (v / norm) as f32).collect()
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl Embedder for HashEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Primary embedder with a transparent hash fallback
pub struct ResilientEmbedder {
    primary: Option<Box<dyn Embedder>>,
    fallback: HashEmbedder,
}

impl ResilientEmbedder {
    pub fn new(primary: Box<dyn Embedder>, fallback: HashEmbedder) -> Self {
        Self {
            primary: Some(primary),
            fallback,
        }
    }

    /// Fallback only, for offline use
    pub fn fallback_only(fallback: HashEmbedder) -> Self {
        Self {
            primary: None,
            fallback,
        }
    }

    /// Embed and report whether the fallback produced the vectors
    pub fn embed_with_source(&self, texts: &[&str]) -> (Vec<Vec<f32>>, bool) {
        if let Some(primary) = &self.primary {
            match primary.embed_batch(texts) {
                Ok(vectors) if vectors.len() == texts.len() => return (vectors, false),
                Ok(vectors) => warn!(
                    embedder = primary.name(),
                    expected = texts.len(),
                    got = vectors.len(),
                    "embedder returned wrong batch size; using fallback"
                ),
                Err(e) => warn!(embedder = primary.name(), error = %e, "embedder failed; using fallback"),
            }
        }
        let vectors = texts.iter().map(|t| self.fallback.embed_one(t)).collect();
        (vectors, true)
    }
}

impl Embedder for ResilientEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(self.embed_with_source(texts).0)
    }

    fn name(&self) -> &str {
        self.primary.as_ref().map_or(self.fallback.name(), |p| p.name())
    }
}

// ---------------------------------------------------------------------------
// FastEmbedEmbedder: production embedder behind the `embeddings` feature
// ---------------------------------------------------------------------------

#[cfg(feature = "embeddings")]
mod fastembed_impl {
    use super::{Embedder, EmbeddingError};
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;

    /// Production embedder backed by fastembed (ONNX Runtime).
    ///
    /// Wraps `fastembed::TextEmbedding` in a `Mutex` because its `embed`
    /// method requires `&mut self`, while the `Embedder` trait uses `&self`.
    pub struct FastEmbedEmbedder {
        model: Mutex<TextEmbedding>,
        name: String,
    }

    impl FastEmbedEmbedder {
        pub fn new(model: EmbeddingModel) -> Result<Self, EmbeddingError> {
            let name = format!("fastembed:{:?}", model);
            let options = InitOptions::new(model).with_show_download_progress(false);
            let embedding = TextEmbedding::try_new(options)
                .map_err(|e| EmbeddingError::ModelError(e.to_string()))?;
            Ok(Self {
                model: Mutex::new(embedding),
                name,
            })
        }

        /// Default model (nomic-embed-text-v1.5, 768 dimensions)
        pub fn default_model() -> Result<Self, EmbeddingError> {
            Self::new(EmbeddingModel::NomicEmbedTextV15)
        }
    }

    impl Embedder for FastEmbedEmbedder {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let mut model = self
                .model
                .lock()
                .map_err(|_| EmbeddingError::ModelError("model lock poisoned".to_string()))?;
            let embeddings = model
                .embed(texts.to_vec(), None)
                .map_err(|e| EmbeddingError::ModelError(e.to_string()))?;
            if embeddings.is_empty() {
                return Err(EmbeddingError::EmptyResult);
            }
            Ok(embeddings)
        }

        fn name(&self) -> &str {
            &self.name
        }
    }
}

#[cfg(feature = "embeddings")]
pub use fastembed_impl::FastEmbedEmbedder;

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub node: NodeId,
    pub label: String,
    pub score: f32,
}

/// Rank nodes by cosine similarity to `query`, best first.
///
/// Nodes without a vector, or with a vector of another dimension, are
/// skipped. Equal scores keep snapshot order.
pub fn search(snapshot: &GraphSnapshot, query: &[f32], top_k: usize) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = snapshot
        .nodes
        .iter()
        .filter_map(|node| {
            let vector = node.embedding.as_deref()?;
            if vector.len() != query.len() {
                return None;
            }
            Some(SearchHit {
                node: node.id.clone(),
                label: node.label.clone(),
                score: cosine_similarity(query, vector),
            })
        })
        .collect();
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(top_k);
    hits
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub vectors: Vec<(NodeId, Vec<f32>)>,
    pub dimension: usize,
    pub model: String,
}

/// Embed every node's descriptive text
pub fn embed_nodes(
    snapshot: &GraphSnapshot,
    embedder: &dyn Embedder,
    token: &CancellationToken,
) -> Result<EmbeddingResult, AnalysisError> {
    token.check()?;
    let texts: Vec<&str> = snapshot.nodes.iter().map(|n| n.text.as_str()).collect();
    let vectors = embedder
        .embed_batch(&texts)
        .map_err(|e| AnalysisError::Embedding(e.to_string()))?;
    if vectors.len() != texts.len() {
        return Err(AnalysisError::Embedding(format!(
            "expected {} vectors, got {}",
            texts.len(),
            vectors.len()
        )));
    }
    token.check()?;
    let dimension = vectors.first().map_or(0, Vec::len);
    debug!(nodes = texts.len(), dimension, model = embedder.name(), "embedded nodes");
    Ok(EmbeddingResult {
        vectors: snapshot
            .nodes
            .iter()
            .map(|n| n.id.clone())
            .zip(vectors)
            .collect(),
        dimension,
        model: embedder.name().to_string(),
    })
}

/// Embed a query and search the snapshot
pub fn search_text(
    snapshot: &GraphSnapshot,
    embedder: &dyn Embedder,
    query: &str,
    top_k: usize,
    token: &CancellationToken,
) -> Result<Vec<SearchHit>, AnalysisError> {
    token.check()?;
    let vector = embedder
        .embed_batch(&[query])
        .map_err(|e| AnalysisError::Embedding(e.to_string()))?
        .into_iter()
        .next()
        .ok_or_else(|| AnalysisError::Embedding(EmbeddingError::EmptyResult.to_string()))?;
    Ok(search(snapshot, &vector, top_k))
}
