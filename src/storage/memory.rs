//! In-process snapshot store

use super::traits::{OpenStore, SnapshotInfo, SnapshotStore, StorageError, StorageResult};
use crate::ingest::CanonicalDocument;
use dashmap::DashMap;
use std::path::Path;

/// Snapshots held as serialized JSON in a concurrent map.
///
/// Documents are serialized on save so a stored snapshot never aliases the
/// caller's data.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: DashMap<String, (SnapshotInfo, String)>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn save(&self, name: &str, doc: &CanonicalDocument) -> StorageResult<SnapshotInfo> {
        let json = serde_json::to_string(doc)?;
        let info = SnapshotInfo::describe(name, doc);
        self.snapshots.insert(name.to_string(), (info.clone(), json));
        Ok(info)
    }

    fn load(&self, name: &str) -> StorageResult<CanonicalDocument> {
        let entry = self
            .snapshots
            .get(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        Ok(serde_json::from_str(&entry.value().1)?)
    }

    fn list(&self) -> StorageResult<Vec<SnapshotInfo>> {
        let mut infos: Vec<SnapshotInfo> = self.snapshots.iter().map(|e| e.value().0.clone()).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    fn delete(&self, name: &str) -> StorageResult<bool> {
        Ok(self.snapshots.remove(name).is_some())
    }
}

impl OpenStore for InMemorySnapshotStore {
    /// The path is ignored; nothing touches the filesystem
    fn open(_path: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self::new())
    }

    fn open_in_memory() -> StorageResult<Self> {
        Ok(Self::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Category, Graph, Node};
    use crate::ingest::export;

    fn doc(nodes: &[&str]) -> CanonicalDocument {
        let mut g = Graph::new();
        for id in nodes {
            g.add_node(Node::new(*id, *id, Category::Concept)).unwrap();
        }
        export(&g, 3)
    }

    #[test]
    fn save_load_list_delete() {
        let store = InMemorySnapshotStore::new();
        store.save("beta", &doc(&["x"])).unwrap();
        let info = store.save("alpha", &doc(&["a", "b"])).unwrap();
        assert_eq!(info.node_count, 2);
        assert_eq!(info.generation, 3);

        let names: Vec<_> = store.list().unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["alpha", "beta"]);

        assert_eq!(store.load("alpha").unwrap().nodes.len(), 2);
        assert!(store.delete("alpha").unwrap());
        assert!(!store.delete("alpha").unwrap());
        assert!(matches!(store.load("alpha"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn save_replaces_existing() {
        let store = InMemorySnapshotStore::new();
        store.save("s", &doc(&["a"])).unwrap();
        store.save("s", &doc(&["a", "b", "c"])).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load("s").unwrap().nodes.len(), 3);
    }
}
