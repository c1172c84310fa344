//! Snapshot persistence
//!
//! Graphs are stored as named canonical exports through the
//! `SnapshotStore` trait. `SqliteSnapshotStore` persists to a database
//! file; `InMemorySnapshotStore` keeps everything in process.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemorySnapshotStore;
pub use sqlite::SqliteSnapshotStore;
pub use traits::{OpenStore, SnapshotInfo, SnapshotStore, StorageError, StorageResult};

use crate::graph::Graph;
use crate::ingest;

/// Export `graph` and save it under `name`
pub fn save_graph(
    store: &dyn SnapshotStore,
    name: &str,
    graph: &Graph,
    generation: u64,
) -> StorageResult<SnapshotInfo> {
    store.save(name, &ingest::export(graph, generation))
}

/// Load and import the snapshot saved under `name`
pub fn load_graph(store: &dyn SnapshotStore, name: &str) -> StorageResult<Graph> {
    Ok(ingest::import(store.load(name)?)?)
}
