// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! SQLite graph store
//!
//! Nodes and edges live in two tables with uniqueness constraints on their
//! identities, so every upsert is a single `ON CONFLICT` statement. Per-label
//! name indexes are partial indexes on `nodes(name)`.
//!
//! The connection is synchronous; every call is moved onto the blocking pool.

use super::{validate_label, EdgeUpsert, GraphStore};
use crate::error::{GraphError, GraphResult};
use annalist_core::{GraphStats, NodeSummary, RelationRecord, FALLBACK_COLOR};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS nodes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        label TEXT NOT NULL,
        name TEXT NOT NULL,
        color TEXT NOT NULL,
        UNIQUE (label, name)
    );
    CREATE TABLE IF NOT EXISTS edges (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        head_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
        relation_type TEXT NOT NULL,
        tail_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
        color TEXT NOT NULL,
        original_type TEXT NOT NULL,
        context TEXT NOT NULL,
        UNIQUE (head_id, relation_type, tail_id)
    );
    CREATE INDEX IF NOT EXISTS idx_edges_tail ON edges(tail_id);
    CREATE TABLE IF NOT EXISTS name_indexes (
        label TEXT PRIMARY KEY
    );
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value INTEGER NOT NULL
    );
    INSERT OR IGNORE INTO meta (key, value) VALUES ('revision', 0);
";

const BUMP_REVISION: &str = "UPDATE meta SET value = value + 1 WHERE key = 'revision'";

const RECORD_COLUMNS: &str = "
    SELECT h.name, e.relation_type, t.name, e.context
    FROM edges e
    JOIN nodes h ON h.id = e.head_id
    JOIN nodes t ON t.id = e.tail_id
";

fn apply_pragmas(conn: &Connection) -> GraphResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        ",
    )?;
    Ok(())
}

fn index_name(label: &str) -> String {
    format!("idx_nodes_name_{}", hex::encode(label.as_bytes()))
}

fn read_records(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> GraphResult<Vec<RelationRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok(RelationRecord::new(
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn count_by(conn: &Connection, sql: &str) -> GraphResult<Vec<(String, usize)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Graph store persisted in a SQLite database file
pub struct SqliteGraphStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGraphStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> GraphResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                GraphError::Unavailable(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| GraphError::Unavailable(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Opened sqlite graph database");
        Self::init(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> GraphResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| GraphError::Unavailable(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> GraphResult<Self> {
        apply_pragmas(&conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, f: F) -> GraphResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> GraphResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| GraphError::Backend(format!("blocking task failed: {}", e)))?
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn ping(&self) -> GraphResult<()> {
        self.run(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }

    async fn ensure_index(&self, label: &str) -> GraphResult<()> {
        validate_label(label)?;
        let label = label.to_string();

        self.run(move |conn| {
            let sql = format!(
                "CREATE INDEX IF NOT EXISTS {} ON nodes(name) WHERE label = '{}'",
                index_name(&label),
                label.replace('\'', "''")
            );
            let tx = conn.transaction()?;
            tx.execute_batch(&sql)?;
            tx.execute(
                "INSERT OR IGNORE INTO name_indexes (label) VALUES (?1)",
                params![label],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn indexed_labels(&self) -> GraphResult<Vec<String>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT label FROM name_indexes ORDER BY label")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn upsert_entity(&self, label: &str, name: &str, color: &str) -> GraphResult<()> {
        validate_label(label)?;
        let (label, name, color) = (label.to_string(), name.to_string(), color.to_string());

        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO nodes (label, name, color) VALUES (?1, ?2, ?3)
                 ON CONFLICT (label, name) DO UPDATE SET color = excluded.color",
                params![label, name, color],
            )?;
            tx.execute(BUMP_REVISION, [])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn upsert_edge(&self, edge: &EdgeUpsert) -> GraphResult<()> {
        validate_label(&edge.head_label)?;
        validate_label(&edge.tail_label)?;
        let edge = edge.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;

            let endpoint = |label: &str, name: &str| -> GraphResult<i64> {
                tx.execute(
                    "INSERT INTO nodes (label, name, color) VALUES (?1, ?2, ?3)
                     ON CONFLICT (label, name) DO NOTHING",
                    params![label, name, FALLBACK_COLOR],
                )?;
                Ok(tx.query_row(
                    "SELECT id FROM nodes WHERE label = ?1 AND name = ?2",
                    params![label, name],
                    |row| row.get(0),
                )?)
            };
            let head_id = endpoint(&edge.head_label, &edge.head_name)?;
            let tail_id = endpoint(&edge.tail_label, &edge.tail_name)?;

            tx.execute(
                "INSERT INTO edges (head_id, relation_type, tail_id, color, original_type, context)
                 VALUES (?1, ?2, ?3, ?4, ?2, ?5)
                 ON CONFLICT (head_id, relation_type, tail_id) DO UPDATE SET
                    color = excluded.color,
                    original_type = excluded.original_type,
                    context = excluded.context",
                params![head_id, edge.relation_type, tail_id, edge.color, edge.context],
            )?;
            tx.execute(BUMP_REVISION, [])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn neighbors(&self, name: &str) -> GraphResult<Vec<RelationRecord>> {
        let name = name.to_string();

        self.run(move |conn| {
            let mut records = read_records(
                conn,
                &format!("{} WHERE h.name = ?1 ORDER BY e.id", RECORD_COLUMNS),
                params![name],
            )?;
            // self-loops were already returned as outgoing
            records.extend(read_records(
                conn,
                &format!(
                    "{} WHERE t.name = ?1 AND h.name <> ?1 ORDER BY e.id",
                    RECORD_COLUMNS
                ),
                params![name],
            )?);
            Ok(records)
        })
        .await
    }

    async fn all_edges(&self) -> GraphResult<Vec<RelationRecord>> {
        self.run(|conn| {
            read_records(conn, &format!("{} ORDER BY e.id", RECORD_COLUMNS), [])
        })
        .await
    }

    async fn node_names(&self) -> GraphResult<Vec<NodeSummary>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT label, name FROM nodes ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok(NodeSummary {
                    label: row.get(0)?,
                    name: row.get(1)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn stats(&self) -> GraphResult<GraphStats> {
        self.run(|conn| {
            let node_count: i64 = conn.query_row("SELECT COUNT(*) FROM nodes", [], |r| r.get(0))?;
            let edge_count: i64 = conn.query_row("SELECT COUNT(*) FROM edges", [], |r| r.get(0))?;

            Ok(GraphStats {
                node_count: node_count as usize,
                edge_count: edge_count as usize,
                nodes_by_label: count_by(
                    conn,
                    "SELECT label, COUNT(*) FROM nodes GROUP BY label",
                )?
                .into_iter()
                .collect(),
                edges_by_relation: count_by(
                    conn,
                    "SELECT relation_type, COUNT(*) FROM edges GROUP BY relation_type",
                )?
                .into_iter()
                .collect(),
            })
        })
        .await
    }

    async fn revision(&self) -> GraphResult<u64> {
        self.run(|conn| {
            let value: Option<i64> = conn
                .query_row("SELECT value FROM meta WHERE key = 'revision'", [], |r| {
                    r.get(0)
                })
                .optional()?;
            Ok(value.unwrap_or(0) as u64)
        })
        .await
    }

    async fn clear(&self) -> GraphResult<()> {
        self.run(|conn| {
            let tx = conn.transaction()?;
            let labels: Vec<String> = {
                let mut stmt = tx.prepare("SELECT label FROM name_indexes")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            for label in &labels {
                tx.execute_batch(&format!("DROP INDEX IF EXISTS {}", index_name(label)))?;
            }
            tx.execute_batch(
                "DELETE FROM edges;
                 DELETE FROM nodes;
                 DELETE FROM name_indexes;",
            )?;
            tx.execute(BUMP_REVISION, [])?;
            tx.commit()?;
            debug!(indexes = labels.len(), "Cleared sqlite graph");
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn edge(head: &str, relation: &str, tail: &str, context: &str) -> EdgeUpsert {
        EdgeUpsert {
            head_label: "人物".into(),
            head_name: head.into(),
            relation_type: relation.into(),
            tail_label: "地点".into(),
            tail_name: tail.into(),
            color: "#FFA07A".into(),
            context: context.into(),
        }
    }

    #[test]
    fn test_index_name_is_sql_safe() {
        let name = index_name("人物");
        assert!(name.starts_with("idx_nodes_name_"));
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[tokio::test]
    async fn test_edge_merge() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store.upsert_edge(&edge("甲", "任职", "长安", "one")).await.unwrap();
        store.upsert_edge(&edge("甲", "任职", "长安", "two")).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.edge_count, 1);
        assert_eq!(
            store.all_edges().await.unwrap(),
            vec![RelationRecord::new("甲", "任职", "长安", "two")]
        );
    }

    #[tokio::test]
    async fn test_ensure_index_is_idempotent() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store.ensure_index("人物").await.unwrap();
        store.ensure_index("人物").await.unwrap();
        store.ensure_index("地点").await.unwrap();

        assert_eq!(store.indexed_labels().await.unwrap(), vec!["人物", "地点"]);

        store.clear().await.unwrap();
        assert!(store.indexed_labels().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("graph.db");

        {
            let store = SqliteGraphStore::open(&path).unwrap();
            store.upsert_entity("人物", "甲", "#FF6B6B").await.unwrap();
            store.upsert_edge(&edge("甲", "到达", "洛阳", "")).await.unwrap();
        }

        let store = SqliteGraphStore::open(&path).unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.edges_of_type("到达"), 1);
        assert!(store.revision().await.unwrap() >= 2);
    }
}
