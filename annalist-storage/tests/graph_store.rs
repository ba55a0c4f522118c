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

// Graph store behavior shared by every backend
//
// Each scenario runs against the in-memory store and a temporary SQLite file.

use annalist_core::{RelationRecord, FALLBACK_COLOR};
use annalist_storage::{EdgeUpsert, GraphStore, MemoryGraphStore, SqliteGraphStore};
use std::sync::Arc;
use tempfile::TempDir;

fn backends() -> (TempDir, Vec<(&'static str, Arc<dyn GraphStore>)>) {
    let dir = TempDir::new().unwrap();
    let sqlite = SqliteGraphStore::open(dir.path().join("graph.db")).unwrap();
    let stores: Vec<(&'static str, Arc<dyn GraphStore>)> = vec![
        ("memory", Arc::new(MemoryGraphStore::new())),
        ("sqlite", Arc::new(sqlite)),
    ];
    (dir, stores)
}

fn person_edge(head: &str, relation: &str, tail: &str, context: &str) -> EdgeUpsert {
    EdgeUpsert {
        head_label: "人物".into(),
        head_name: head.into(),
        relation_type: relation.into(),
        tail_label: "人物".into(),
        tail_name: tail.into(),
        color: "#F0E68C".into(),
        context: context.into(),
    }
}

async fn load_family(store: &dyn GraphStore) {
    store.upsert_entity("人物", "甲", "#FF6B6B").await.unwrap();
    store.upsert_entity("人物", "乙", "#FF6B6B").await.unwrap();
    store.upsert_entity("人物", "丙", "#FF6B6B").await.unwrap();
    store
        .upsert_edge(&person_edge("甲", "父母", "乙", "甲为乙之父"))
        .await
        .unwrap();
    store
        .upsert_edge(&person_edge("丙", "兄弟", "甲", "丙与甲为兄弟"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_import_twice_is_idempotent() {
    let (_dir, stores) = backends();
    for (name, store) in stores {
        load_family(store.as_ref()).await;
        let first = store.stats().await.unwrap();
        load_family(store.as_ref()).await;
        let second = store.stats().await.unwrap();

        assert_eq!(first, second, "backend {}", name);
        assert_eq!(second.node_count, 3, "backend {}", name);
        assert_eq!(second.edge_count, 2, "backend {}", name);
    }
}

#[tokio::test]
async fn test_neighbors_preserve_orientation() {
    let (_dir, stores) = backends();
    for (name, store) in stores {
        load_family(store.as_ref()).await;

        let records = store.neighbors("甲").await.unwrap();
        assert_eq!(
            records,
            vec![
                RelationRecord::new("甲", "父母", "乙", "甲为乙之父"),
                RelationRecord::new("丙", "兄弟", "甲", "丙与甲为兄弟"),
            ],
            "backend {}",
            name
        );

        let records = store.neighbors("乙").await.unwrap();
        assert_eq!(records.len(), 1, "backend {}", name);
        assert_eq!(records[0].entity1, "甲", "backend {}", name);
        assert_eq!(records[0].entity2, "乙", "backend {}", name);
    }
}

#[tokio::test]
async fn test_same_name_under_two_labels_is_two_nodes() {
    let (_dir, stores) = backends();
    for (name, store) in stores {
        store.upsert_entity("人物", "长安", "#FF6B6B").await.unwrap();
        store.upsert_entity("地点", "长安", "#4ECDC4").await.unwrap();
        store
            .upsert_edge(&EdgeUpsert {
                head_label: "人物".into(),
                head_name: "甲".into(),
                relation_type: "到达".into(),
                tail_label: "地点".into(),
                tail_name: "长安".into(),
                color: "#DDA0DD".into(),
                context: String::new(),
            })
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.node_count, 3, "backend {}", name);
        assert_eq!(stats.nodes_with_label("地点"), 1, "backend {}", name);
        assert_eq!(stats.nodes_with_label("人物"), 2, "backend {}", name);
        assert_eq!(store.neighbors("长安").await.unwrap().len(), 1, "backend {}", name);
    }
}

#[tokio::test]
async fn test_missing_endpoint_gets_fallback_color() {
    let (_dir, stores) = backends();
    for (name, store) in stores {
        store
            .upsert_edge(&person_edge("甲", "别名", "子美", ""))
            .await
            .unwrap();

        let nodes = store.node_names().await.unwrap();
        assert_eq!(nodes.len(), 2, "backend {}", name);

        // an explicit upsert afterwards sets the real color
        store.upsert_entity("人物", "子美", "#FF6B6B").await.unwrap();
        assert_eq!(store.stats().await.unwrap().node_count, 2, "backend {}", name);
    }
    assert_eq!(FALLBACK_COLOR, "#CCCCCC");
}

#[tokio::test]
async fn test_stats_by_relation_and_clear() {
    let (_dir, stores) = backends();
    for (name, store) in stores {
        load_family(store.as_ref()).await;
        store.ensure_index("人物").await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.edges_of_type("父母"), 1, "backend {}", name);
        assert_eq!(stats.edges_of_type("兄弟"), 1, "backend {}", name);
        assert_eq!(stats.edges_of_type("同僚"), 0, "backend {}", name);

        let revision = store.revision().await.unwrap();
        store.clear().await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.node_count, 0, "backend {}", name);
        assert_eq!(stats.edge_count, 0, "backend {}", name);
        assert!(store.all_edges().await.unwrap().is_empty(), "backend {}", name);
        assert!(store.indexed_labels().await.unwrap().is_empty(), "backend {}", name);
        assert!(store.revision().await.unwrap() > revision, "backend {}", name);
    }
}
