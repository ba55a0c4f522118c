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

//! Entity → relations adjacency index
//!
//! Maps every entity name to the records of all edges it touches, in the
//! canonical head → tail orientation. An edge `A -[R]-> B` is listed under
//! both `A` and `B`, so a graph of N edges yields exactly 2N
//! `(entity, record)` pairs; a self-loop lists its record twice under the
//! same name.
//!
//! ## Refresh
//!
//! The index is never mutated in place. [`EntityRelationIndex::rebuild`]
//! builds a complete snapshot off to the side and swaps the `Arc` under a
//! short write lock; readers keep whatever snapshot they already hold.
//!
//! Each snapshot remembers the store revision it was built from, so
//! [`EntityRelationIndex::is_stale`] can tell when the graph moved on.

use crate::error::IndexResult;
use annalist_core::RelationRecord;
use annalist_storage::{GraphStore, KvBackend};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cache key the snapshot is persisted under
pub const SNAPSHOT_KEY: &str = "entity_relation_index";

/// Immutable, fully built view of the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    entries: HashMap<String, Vec<RelationRecord>>,
    revision: u64,
    edge_count: usize,
    built_at: DateTime<Utc>,
}

impl IndexSnapshot {
    /// Snapshot with no entries at revision 0
    pub fn empty() -> Self {
        Self::from_records(Vec::new(), 0)
    }

    /// Build from a full edge scan taken at `revision`
    pub fn from_records(records: Vec<RelationRecord>, revision: u64) -> Self {
        let edge_count = records.len();
        let mut entries: HashMap<String, Vec<RelationRecord>> = HashMap::new();

        for record in records {
            entries
                .entry(record.entity2.clone())
                .or_default()
                .push(record.clone());
            entries.entry(record.entity1.clone()).or_default().push(record);
        }

        Self {
            entries,
            revision,
            edge_count,
            built_at: Utc::now(),
        }
    }

    /// Records touching `name`, in scan order
    pub fn lookup(&self, name: &str) -> &[RelationRecord] {
        self.entries.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Records touching `name` in the order `GraphStore::neighbors` returns
    /// them: outgoing first, then incoming, each in scan order, with every
    /// self-loop once
    pub fn neighbors(&self, name: &str) -> Vec<RelationRecord> {
        let records = self.lookup(name);
        let mut outgoing = Vec::new();
        let mut incoming = Vec::new();
        // each self-loop edge was pushed twice in a row; keep the first copy
        let mut loop_copy = false;

        for record in records {
            if record.entity1 == name && record.entity2 == name {
                if !loop_copy {
                    outgoing.push(record.clone());
                }
                loop_copy = !loop_copy;
            } else if record.entity1 == name {
                outgoing.push(record.clone());
            } else {
                incoming.push(record.clone());
            }
        }

        outgoing.extend(incoming);
        outgoing
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Store revision this snapshot was built from
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of edges scanned
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Number of distinct entity names
    pub fn entity_count(&self) -> usize {
        self.entries.len()
    }

    /// Total `(entity, record)` pairs
    pub fn pair_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for IndexSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Entity-relation index with atomic snapshot replacement
#[derive(Debug)]
pub struct EntityRelationIndex {
    current: RwLock<Arc<IndexSnapshot>>,
}

impl EntityRelationIndex {
    /// Empty index; every lookup misses until the first rebuild
    pub fn new() -> Self {
        Self::from_snapshot(IndexSnapshot::empty())
    }

    pub fn from_snapshot(snapshot: IndexSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Build an index from a full scan of `store`
    pub async fn build(store: &dyn GraphStore) -> IndexResult<Self> {
        Ok(Self::from_snapshot(scan(store).await?))
    }

    /// The snapshot currently being served
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current.read().clone()
    }

    /// Records touching `name`, or an empty list
    pub fn lookup(&self, name: &str) -> Vec<RelationRecord> {
        self.snapshot().lookup(name).to_vec()
    }

    /// Rebuild from `store` and swap the new snapshot in
    pub async fn rebuild(&self, store: &dyn GraphStore) -> IndexResult<Arc<IndexSnapshot>> {
        let fresh = Arc::new(scan(store).await?);
        *self.current.write() = Arc::clone(&fresh);

        info!(
            entities = fresh.entity_count(),
            edges = fresh.edge_count(),
            revision = fresh.revision(),
            "Entity-relation index rebuilt"
        );
        Ok(fresh)
    }

    /// Whether the store has been written since the current snapshot was built
    pub async fn is_stale(&self, store: &dyn GraphStore) -> IndexResult<bool> {
        let revision = store.revision().await?;
        Ok(self.snapshot().revision() != revision)
    }

    /// Write the current snapshot to `kv` under [`SNAPSHOT_KEY`]
    pub async fn persist(&self, kv: &dyn KvBackend, ttl: Duration) -> IndexResult<()> {
        let snapshot = self.snapshot();
        let bytes = serde_json::to_vec(snapshot.as_ref())?;
        kv.set_ex(SNAPSHOT_KEY, ttl, bytes).await?;

        debug!(revision = snapshot.revision(), "Entity-relation index persisted");
        Ok(())
    }

    /// Load a persisted snapshot that still matches `store`, otherwise build
    /// one from the store and persist it
    ///
    /// Cache problems are logged and never fail the call; only graph store
    /// errors do.
    pub async fn warm_start(
        kv: Option<&dyn KvBackend>,
        store: &dyn GraphStore,
        ttl: Duration,
    ) -> IndexResult<Self> {
        if let Some(kv) = kv {
            if let Some(snapshot) = load_persisted(kv).await {
                let stats = store.stats().await?;
                let revision = store.revision().await?;
                if snapshot.revision() == revision && snapshot.edge_count() == stats.edge_count {
                    info!(
                        entities = snapshot.entity_count(),
                        revision,
                        "Entity-relation index loaded from cache"
                    );
                    return Ok(Self::from_snapshot(snapshot));
                }
                debug!(
                    cached = snapshot.revision(),
                    current = revision,
                    "Persisted index is stale"
                );
            }
        }

        let index = Self::new();
        index.rebuild(store).await?;

        if let Some(kv) = kv {
            if let Err(e) = index.persist(kv, ttl).await {
                warn!(error = %e, "Failed to persist entity-relation index");
            }
        }
        Ok(index)
    }
}

impl Default for EntityRelationIndex {
    fn default() -> Self {
        Self::new()
    }
}

async fn scan(store: &dyn GraphStore) -> IndexResult<IndexSnapshot> {
    // revision first: writes racing the scan leave the snapshot looking stale
    let revision = store.revision().await?;
    let records = store.all_edges().await?;
    Ok(IndexSnapshot::from_records(records, revision))
}

async fn load_persisted(kv: &dyn KvBackend) -> Option<IndexSnapshot> {
    let bytes = match kv.get(SNAPSHOT_KEY).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return None,
        Err(e) => {
            warn!(error = %e, "Could not read persisted entity-relation index");
            return None;
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!(error = %e, "Discarding undecodable entity-relation index");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<RelationRecord> {
        vec![
            RelationRecord::new("甲", "父母", "乙", "c1"),
            RelationRecord::new("丙", "兄弟", "甲", "c2"),
            RelationRecord::new("丁", "别名", "丁", "c3"),
        ]
    }

    #[test]
    fn test_pairs_are_twice_the_edges() {
        let snapshot = IndexSnapshot::from_records(records(), 7);
        assert_eq!(snapshot.edge_count(), 3);
        assert_eq!(snapshot.pair_count(), 6);
        assert_eq!(snapshot.revision(), 7);
    }

    #[test]
    fn test_lookup_keeps_orientation_and_order() {
        let snapshot = IndexSnapshot::from_records(records(), 0);
        let for_jia = snapshot.lookup("甲");
        assert_eq!(for_jia.len(), 2);
        assert_eq!(for_jia[0].entity1, "甲");
        assert_eq!(for_jia[1].entity1, "丙");
        assert_eq!(for_jia[1].entity2, "甲");

        let for_yi = snapshot.lookup("乙");
        assert_eq!(for_yi, &[RelationRecord::new("甲", "父母", "乙", "c1")]);
    }

    #[test]
    fn test_self_loop_listed_twice() {
        let snapshot = IndexSnapshot::from_records(records(), 0);
        assert_eq!(snapshot.lookup("丁").len(), 2);
        assert_eq!(snapshot.entity_count(), 4);
    }

    #[test]
    fn test_neighbors_put_outgoing_before_incoming() {
        let snapshot = IndexSnapshot::from_records(records(), 0);
        assert_eq!(
            snapshot.neighbors("甲"),
            vec![
                RelationRecord::new("甲", "父母", "乙", "c1"),
                RelationRecord::new("丙", "兄弟", "甲", "c2"),
            ]
        );

        let incoming_first = IndexSnapshot::from_records(
            vec![
                RelationRecord::new("丙", "兄弟", "甲", "c2"),
                RelationRecord::new("甲", "父母", "乙", "c1"),
            ],
            0,
        );
        assert_eq!(incoming_first.neighbors("甲"), snapshot.neighbors("甲"));
    }

    #[test]
    fn test_neighbors_list_each_self_loop_once() {
        // two identical self-loops from nodes under different labels
        let snapshot = IndexSnapshot::from_records(
            vec![
                RelationRecord::new("丁", "别名", "丁", "c3"),
                RelationRecord::new("丁", "别名", "丁", "c3"),
                RelationRecord::new("戊", "兄弟", "丁", "c4"),
            ],
            0,
        );
        assert_eq!(snapshot.lookup("丁").len(), 5);
        assert_eq!(
            snapshot.neighbors("丁"),
            vec![
                RelationRecord::new("丁", "别名", "丁", "c3"),
                RelationRecord::new("丁", "别名", "丁", "c3"),
                RelationRecord::new("戊", "兄弟", "丁", "c4"),
            ]
        );
    }

    #[test]
    fn test_neighbors_keep_identical_edges_from_distinct_nodes() {
        let snapshot = IndexSnapshot::from_records(
            vec![
                RelationRecord::new("甲", "父母", "乙", "c1"),
                RelationRecord::new("甲", "父母", "乙", "c1"),
            ],
            0,
        );
        assert_eq!(snapshot.neighbors("甲").len(), 2);
        assert_eq!(snapshot.neighbors("乙").len(), 2);
    }

    #[test]
    fn test_unknown_name_is_empty() {
        let index = EntityRelationIndex::new();
        assert!(index.lookup("戊").is_empty());
        assert!(!index.snapshot().contains("戊"));
    }

    #[test]
    fn test_snapshot_serde() {
        let snapshot = IndexSnapshot::from_records(records(), 3);
        let bytes = serde_json::to_vec(&snapshot).unwrap();
        let decoded: IndexSnapshot = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded.revision(), 3);
        assert_eq!(decoded.lookup("甲"), snapshot.lookup("甲"));
    }
}
