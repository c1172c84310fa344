//! SQLite snapshot store

use super::traits::{OpenStore, SnapshotInfo, SnapshotStore, StorageError, StorageResult};
use crate::ingest::CanonicalDocument;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// SQLite-backed snapshot store
///
/// One row per snapshot; the document is stored as JSON next to the
/// columns `list` needs. Thread-safe via internal mutex on the connection.
pub struct SqliteSnapshotStore {
    conn: Mutex<Connection>,
}

impl SqliteSnapshotStore {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                name TEXT PRIMARY KEY,
                generation INTEGER NOT NULL,
                node_count INTEGER NOT NULL,
                edge_count INTEGER NOT NULL,
                saved_at TEXT NOT NULL,
                document_json TEXT NOT NULL
            );

            -- Concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves SQLite consistent; keep using it
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn row_to_info(row: &Row) -> rusqlite::Result<(String, i64, i64, i64, String)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    }

    fn info_from_columns(columns: (String, i64, i64, i64, String)) -> StorageResult<SnapshotInfo> {
        let (name, generation, node_count, edge_count, saved_at) = columns;
        Ok(SnapshotInfo {
            name,
            generation: generation as u64,
            node_count: node_count as usize,
            edge_count: edge_count as usize,
            saved_at: DateTime::parse_from_rfc3339(&saved_at)
                .map_err(|e| StorageError::DateParse(e.to_string()))?
                .with_timezone(&Utc),
        })
    }
}

impl OpenStore for SqliteSnapshotStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn save(&self, name: &str, doc: &CanonicalDocument) -> StorageResult<SnapshotInfo> {
        let info = SnapshotInfo::describe(name, doc);
        let document_json = serde_json::to_string(doc)?;
        let conn = self.conn();
        conn.execute(
            r#"
            INSERT INTO snapshots (name, generation, node_count, edge_count, saved_at, document_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(name) DO UPDATE SET
                generation = excluded.generation,
                node_count = excluded.node_count,
                edge_count = excluded.edge_count,
                saved_at = excluded.saved_at,
                document_json = excluded.document_json
            "#,
            params![
                info.name,
                info.generation as i64,
                info.node_count as i64,
                info.edge_count as i64,
                info.saved_at.to_rfc3339(),
                document_json,
            ],
        )?;
        debug!(name, nodes = info.node_count, edges = info.edge_count, "saved snapshot");
        Ok(info)
    }

    fn load(&self, name: &str) -> StorageResult<CanonicalDocument> {
        let conn = self.conn();
        let json: Option<String> = conn
            .query_row(
                "SELECT document_json FROM snapshots WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        let json = json.ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        Ok(serde_json::from_str(&json)?)
    }

    fn list(&self) -> StorageResult<Vec<SnapshotInfo>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT name, generation, node_count, edge_count, saved_at FROM snapshots ORDER BY name",
        )?;
        let rows = stmt.query_map([], Self::row_to_info)?;
        let mut infos = Vec::new();
        for row in rows {
            infos.push(Self::info_from_columns(row?)?);
        }
        Ok(infos)
    }

    fn delete(&self, name: &str) -> StorageResult<bool> {
        let conn = self.conn();
        let deleted = conn.execute("DELETE FROM snapshots WHERE name = ?1", params![name])?;
        Ok(deleted > 0)
    }
}
