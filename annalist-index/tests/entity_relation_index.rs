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

// Entity-relation index built against a live graph store

use annalist_index::{EntityRelationIndex, SNAPSHOT_KEY};
use annalist_storage::{
    EdgeUpsert, GraphStore, KvBackend, MemoryGraphStore, MokaKvBackend, UnavailableKvBackend,
};
use std::time::Duration;

const TTL: Duration = Duration::from_secs(60);

fn edge(head: &str, relation: &str, tail: &str) -> EdgeUpsert {
    EdgeUpsert {
        head_label: "人物".into(),
        head_name: head.into(),
        relation_type: relation.into(),
        tail_label: "人物".into(),
        tail_name: tail.into(),
        color: "#CCCCCC".into(),
        context: format!("{}{}{}", head, relation, tail),
    }
}

async fn seeded_store() -> MemoryGraphStore {
    let store = MemoryGraphStore::new();
    for (h, r, t) in [
        ("甲", "父母", "乙"),
        ("乙", "同僚", "丙"),
        ("丙", "上下级", "甲"),
        ("丁", "到达", "甲"),
    ] {
        store.upsert_edge(&edge(h, r, t)).await.unwrap();
    }
    store
}

#[tokio::test]
async fn test_every_endpoint_has_an_entry() {
    let store = seeded_store().await;
    let index = EntityRelationIndex::build(&store).await.unwrap();
    let snapshot = index.snapshot();

    let edges = store.all_edges().await.unwrap();
    assert_eq!(snapshot.pair_count(), 2 * edges.len());
    for record in &edges {
        assert!(!snapshot.lookup(&record.entity1).is_empty());
        assert!(!snapshot.lookup(&record.entity2).is_empty());
    }
}

#[tokio::test]
async fn test_orientation_is_canonical_from_both_sides() {
    let store = seeded_store().await;
    let index = EntityRelationIndex::build(&store).await.unwrap();

    let from_head = index.lookup("丁");
    let from_tail: Vec<_> = index
        .lookup("甲")
        .into_iter()
        .filter(|r| r.relation == "到达")
        .collect();

    assert_eq!(from_head, from_tail);
    assert_eq!(from_head[0].entity1, "丁");
    assert_eq!(from_head[0].entity2, "甲");
}

#[tokio::test]
async fn test_rebuild_swaps_and_clears_staleness() {
    let store = seeded_store().await;
    let index = EntityRelationIndex::build(&store).await.unwrap();
    assert!(!index.is_stale(&store).await.unwrap());

    let held = index.snapshot();
    store.upsert_edge(&edge("戊", "兄弟", "甲")).await.unwrap();
    assert!(index.is_stale(&store).await.unwrap());
    assert!(index.lookup("戊").is_empty());

    index.rebuild(&store).await.unwrap();
    assert!(!index.is_stale(&store).await.unwrap());
    assert_eq!(index.lookup("戊").len(), 1);

    // readers holding the old snapshot are unaffected
    assert!(held.lookup("戊").is_empty());
    assert_eq!(held.edge_count(), 4);
}

#[tokio::test]
async fn test_warm_start_reuses_persisted_snapshot() {
    let store = seeded_store().await;
    let kv = MokaKvBackend::new(16);

    let first = EntityRelationIndex::warm_start(Some(&kv as &dyn KvBackend), &store, TTL)
        .await
        .unwrap();
    assert!(kv.exists(SNAPSHOT_KEY).await.unwrap());
    let built_at = first.snapshot().built_at();

    let second = EntityRelationIndex::warm_start(Some(&kv as &dyn KvBackend), &store, TTL)
        .await
        .unwrap();
    assert_eq!(second.snapshot().built_at(), built_at);
    assert_eq!(second.lookup("甲"), first.lookup("甲"));
}

#[tokio::test]
async fn test_warm_start_rebuilds_stale_snapshot() {
    let store = seeded_store().await;
    let kv = MokaKvBackend::new(16);

    EntityRelationIndex::warm_start(Some(&kv as &dyn KvBackend), &store, TTL)
        .await
        .unwrap();
    store.upsert_edge(&edge("己", "别名", "庚")).await.unwrap();

    let index = EntityRelationIndex::warm_start(Some(&kv as &dyn KvBackend), &store, TTL)
        .await
        .unwrap();
    assert_eq!(index.lookup("己").len(), 1);
    assert!(!index.is_stale(&store).await.unwrap());
}

#[tokio::test]
async fn test_warm_start_without_working_cache() {
    let store = seeded_store().await;
    let kv = UnavailableKvBackend::new("down");

    let index = EntityRelationIndex::warm_start(Some(&kv as &dyn KvBackend), &store, TTL)
        .await
        .unwrap();
    assert_eq!(index.snapshot().edge_count(), 4);

    let index = EntityRelationIndex::warm_start(None, &store, TTL)
        .await
        .unwrap();
    assert_eq!(index.snapshot().edge_count(), 4);
}
