//! Storage trait definitions

use crate::ingest::{CanonicalDocument, IngestError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Stored snapshot is not a valid graph: {0}")]
    Invalid(#[from] IngestError),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Listing entry for a stored snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub name: String,
    pub generation: u64,
    pub node_count: usize,
    pub edge_count: usize,
    pub saved_at: DateTime<Utc>,
}

impl SnapshotInfo {
    pub(crate) fn describe(name: &str, doc: &CanonicalDocument) -> Self {
        Self {
            name: name.to_string(),
            generation: doc.generation,
            node_count: doc.nodes.len(),
            edge_count: doc.edges.len(),
            saved_at: Utc::now(),
        }
    }
}

/// Named canonical exports.
///
/// Implementations must be thread-safe (Send + Sync). Saving under an
/// existing name replaces the previous snapshot.
pub trait SnapshotStore: Send + Sync {
    /// Save a document under `name`
    fn save(&self, name: &str, doc: &CanonicalDocument) -> StorageResult<SnapshotInfo>;

    /// Load a document by name; `NotFound` if absent
    fn load(&self, name: &str) -> StorageResult<CanonicalDocument>;

    /// All snapshots, ordered by name
    fn list(&self) -> StorageResult<Vec<SnapshotInfo>>;

    /// Delete a snapshot. Returns whether it existed.
    fn delete(&self, name: &str) -> StorageResult<bool>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: SnapshotStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
