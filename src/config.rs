//! YAML configuration for hydration and every algorithm's tunables
//!
//! Every section is optional; a missing file section or field takes the
//! built-in default.
//!
//! ```yaml
//! hydration:
//!   seed: 7
//! layout:
//!   iterations: 500
//!   barnes_hut: true
//! balance:
//!   mode: exact
//! embedding:
//!   backend: hash
//!   dimension: 384
//! ```

use crate::analysis::embedding::{self, Embedder, HashEmbedder, ResilientEmbedder};
use crate::analysis::{BalanceMode, CentralityConfig, CommunityConfig, LayoutConfig, RepresentationConfig, ResultMerger};
use crate::ingest::HydrationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    pub mode: BalanceMode,
}

/// Which embedding backend to try first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// Deterministic hash vectors only
    #[default]
    Hash,
    /// fastembed when compiled in, with hash fallback
    Fastembed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    /// Dimension of fallback vectors
    pub dimension: usize,
    pub top_k: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Hash,
            dimension: embedding::DEFAULT_DIMENSION,
            top_k: embedding::DEFAULT_TOP_K,
        }
    }
}

impl EmbeddingConfig {
    /// Build the configured embedder. A backend that cannot be loaded
    /// degrades to the hash fallback with a warning.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        let fallback = HashEmbedder::new(self.dimension);
        match self.backend {
            EmbeddingBackend::Hash => Arc::new(ResilientEmbedder::fallback_only(fallback)),
            EmbeddingBackend::Fastembed => fastembed_or_fallback(fallback),
        }
    }
}

#[cfg(feature = "embeddings")]
fn fastembed_or_fallback(fallback: HashEmbedder) -> Arc<dyn Embedder> {
    match embedding::FastEmbedEmbedder::default_model() {
        Ok(model) => Arc::new(ResilientEmbedder::new(Box::new(model), fallback)),
        Err(e) => {
            warn!(error = %e, "fastembed failed to load; using hash embeddings");
            Arc::new(ResilientEmbedder::fallback_only(fallback))
        }
    }
}

#[cfg(not(feature = "embeddings"))]
fn fastembed_or_fallback(fallback: HashEmbedder) -> Arc<dyn Embedder> {
    warn!("built without the `embeddings` feature; using hash embeddings");
    Arc::new(ResilientEmbedder::fallback_only(fallback))
}

/// Node size range applied when merging centrality
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub min_size: f64,
    pub max_size: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        let merger = ResultMerger::new();
        Self {
            min_size: merger.min_size,
            max_size: merger.max_size,
        }
    }
}

impl MergeConfig {
    pub fn merger(&self) -> ResultMerger {
        ResultMerger::new().with_size_range(self.min_size, self.max_size)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolityConfig {
    pub hydration: HydrationConfig,
    pub layout: LayoutConfig,
    pub community: CommunityConfig,
    pub centrality: CentralityConfig,
    pub balance: BalanceConfig,
    pub embedding: EmbeddingConfig,
    pub representation: RepresentationConfig,
    pub merge: MergeConfig,
}

impl PolityConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        // An empty file parses as null
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loading config");
        Self::from_yaml(&text)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// `<config dir>/polity/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("polity").join("config.yaml"))
}
