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

//! Context retrieval
//!
//! ```text
//! names ──► index lookup / store.neighbors (concurrent, ordered fan-in)
//!       ──► render passages ──► cache key
//!                                  │
//!                  hit ◄───────────┤
//!                                  ▼ miss
//!                    chunk ──► VectorIndexBuilder ──► cache put
//! ```

use crate::cache::{cache_key, ContextCache};
use crate::error::{CollaboratorError, QueryError, QueryResult};
use annalist_core::{render_passage, Chunk, RelationRecord, TextChunker};
use annalist_index::EntityRelationIndex;
use annalist_storage::SharedGraphStore;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds the similarity index the answer generator searches
#[async_trait]
pub trait VectorIndexBuilder: Send + Sync {
    /// Index `chunks`; `key` identifies the relation set they came from
    async fn build(&self, key: &str, chunks: &[Chunk]) -> Result<(), CollaboratorError>;
}

/// Builder that accepts and discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullIndexBuilder;

#[async_trait]
impl VectorIndexBuilder for NullIndexBuilder {
    async fn build(&self, _key: &str, _chunks: &[Chunk]) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Outcome of a retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieval {
    /// No names, or no relations for any of them
    NoContext,
    Context {
        passages: Vec<String>,
        cache_hit: bool,
        key: String,
    },
}

impl Retrieval {
    pub fn passages(&self) -> &[String] {
        match self {
            Retrieval::NoContext => &[],
            Retrieval::Context { passages, .. } => passages,
        }
    }

    pub fn is_cache_hit(&self) -> bool {
        matches!(self, Retrieval::Context { cache_hit: true, .. })
    }
}

pub struct ContextRetriever {
    store: SharedGraphStore,
    index: Option<Arc<EntityRelationIndex>>,
    cache: Arc<ContextCache>,
    builder: Arc<dyn VectorIndexBuilder>,
    chunker: TextChunker,
}

impl ContextRetriever {
    pub fn new(store: SharedGraphStore, cache: Arc<ContextCache>) -> Self {
        Self {
            store,
            index: None,
            cache,
            builder: Arc::new(NullIndexBuilder),
            chunker: TextChunker::default(),
        }
    }

    pub fn with_index(mut self, index: Arc<EntityRelationIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_builder(mut self, builder: Arc<dyn VectorIndexBuilder>) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn cache(&self) -> &ContextCache {
        &self.cache
    }

    /// Relations touching each name, concatenated in input order
    pub async fn fetch_relations(&self, names: &[String]) -> QueryResult<Vec<RelationRecord>> {
        if let Some(index) = &self.index {
            if index.is_stale(self.store.as_ref()).await? {
                warn!("Entity-relation index is stale, reading from the graph store");
            } else {
                let snapshot = index.snapshot();
                return Ok(names
                    .iter()
                    .flat_map(|name| snapshot.neighbors(name))
                    .collect());
            }
        }

        let per_name = try_join_all(names.iter().map(|name| self.store.neighbors(name))).await?;
        Ok(per_name.into_iter().flatten().collect())
    }

    /// Passages for `names`, from the cache when possible
    ///
    /// On a miss the passages are chunked and handed to the vector index
    /// builder before being cached.
    pub async fn retrieve(&self, names: &[String]) -> QueryResult<Retrieval> {
        if names.is_empty() {
            return Ok(Retrieval::NoContext);
        }

        let records = self.fetch_relations(names).await?;
        if records.is_empty() {
            debug!(names = ?names, "No relations found");
            return Ok(Retrieval::NoContext);
        }

        let key = cache_key(&records);
        if let Some(passages) = self.cache.get(&key).await {
            return Ok(Retrieval::Context {
                passages,
                cache_hit: true,
                key,
            });
        }

        let _flight = match self.cache.begin_flight(&key).await {
            Some(guard) => {
                // another request may have finished the build while we waited
                if let Some(passages) = self.cache.get(&key).await {
                    return Ok(Retrieval::Context {
                        passages,
                        cache_hit: true,
                        key,
                    });
                }
                Some(guard)
            }
            None => None,
        };

        let passages: Vec<String> = records.iter().map(render_passage).collect();
        let chunks = self.chunker.chunk(&passages);
        self.builder
            .build(&key, &chunks)
            .await
            .map_err(|e| QueryError::IndexBuild(e.to_string()))?;

        self.cache.put(&key, &passages).await;
        info!(
            names = ?names,
            relations = records.len(),
            chunks = chunks.len(),
            "Context built"
        );

        Ok(Retrieval::Context {
            passages,
            cache_hit: false,
            key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annalist_storage::{EdgeUpsert, GraphStore, MemoryGraphStore};
    use parking_lot::Mutex;

    fn edge(head: &str, relation: &str, tail: &str, context: &str) -> EdgeUpsert {
        EdgeUpsert {
            head_label: "人物".into(),
            head_name: head.into(),
            relation_type: relation.into(),
            tail_label: "人物".into(),
            tail_name: tail.into(),
            color: "#8D6E63".into(),
            context: context.into(),
        }
    }

    async fn store_with(edges: &[EdgeUpsert]) -> SharedGraphStore {
        let store = MemoryGraphStore::new();
        for e in edges {
            store.upsert_edge(e).await.unwrap();
        }
        Arc::new(store)
    }

    #[derive(Default)]
    struct RecordingBuilder {
        calls: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl VectorIndexBuilder for RecordingBuilder {
        async fn build(&self, key: &str, chunks: &[Chunk]) -> Result<(), CollaboratorError> {
            self.calls.lock().push((key.to_string(), chunks.len()));
            Ok(())
        }
    }

    struct FailingBuilder;

    #[async_trait]
    impl VectorIndexBuilder for FailingBuilder {
        async fn build(&self, _key: &str, _chunks: &[Chunk]) -> Result<(), CollaboratorError> {
            Err("embedding service down".into())
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_no_names_or_relations_is_no_context() {
        let store = store_with(&[edge("甲", "父母", "乙", "")]).await;
        let retriever = ContextRetriever::new(store, Arc::new(ContextCache::disabled()));

        assert_eq!(retriever.retrieve(&[]).await.unwrap(), Retrieval::NoContext);
        assert_eq!(
            retriever.retrieve(&names(&["丙"])).await.unwrap(),
            Retrieval::NoContext
        );
    }

    #[tokio::test]
    async fn test_fan_in_keeps_name_order() {
        let store = store_with(&[
            edge("甲", "父母", "乙", ""),
            edge("丙", "兄弟", "丁", ""),
        ])
        .await;
        let retriever = ContextRetriever::new(store, Arc::new(ContextCache::disabled()));

        let records = retriever
            .fetch_relations(&names(&["丁", "甲"]))
            .await
            .unwrap();
        let heads: Vec<&str> = records.iter().map(|r| r.entity1.as_str()).collect();
        assert_eq!(heads, vec!["丙", "甲"]);
    }

    async fn assert_paths_agree(store: SharedGraphStore, queries: &[&[&str]]) {
        let index = Arc::new(EntityRelationIndex::build(store.as_ref()).await.unwrap());
        let cache = Arc::new(ContextCache::disabled());

        let direct = ContextRetriever::new(store.clone(), cache.clone());
        let indexed = ContextRetriever::new(store, cache).with_index(index);

        for query in queries {
            let from_store = direct.fetch_relations(&names(query)).await.unwrap();
            let from_index = indexed.fetch_relations(&names(query)).await.unwrap();
            assert_eq!(from_store, from_index, "mismatch for {query:?}");
        }
    }

    #[tokio::test]
    async fn test_index_and_store_paths_agree() {
        let store = store_with(&[
            edge("丙", "任职", "甲", ""),
            edge("甲", "父母", "乙", "甲之父乙也"),
            edge("乙", "兄弟", "乙", "自指"),
            edge("乙", "同僚", "丁", ""),
        ])
        .await;
        assert_paths_agree(store, &[&["甲"], &["乙"], &["丙"], &["乙", "甲"]]).await;
    }

    #[tokio::test]
    async fn test_incoming_edge_stored_first_still_follows_outgoing() {
        let store = store_with(&[
            edge("丙", "兄弟", "甲", "c2"),
            edge("甲", "父母", "乙", "c1"),
        ])
        .await;
        let index = Arc::new(EntityRelationIndex::build(store.as_ref()).await.unwrap());
        let retriever = ContextRetriever::new(store, Arc::new(ContextCache::disabled()))
            .with_index(index);

        let retrieval = retriever.retrieve(&names(&["甲"])).await.unwrap();
        assert_eq!(
            retrieval.passages(),
            [
                "甲与乙之间的关系是父母。具体描述：c1".to_string(),
                "丙与甲之间的关系是兄弟。具体描述：c2".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_same_name_under_two_labels_keeps_both_edges() {
        let mut untyped = edge("甲", "父母", "乙", "甲之父乙也");
        untyped.head_label = "Entity".into();
        let store = store_with(&[edge("甲", "父母", "乙", "甲之父乙也"), untyped]).await;
        assert_eq!(store.stats().await.unwrap().edge_count, 2);

        assert_paths_agree(store.clone(), &[&["甲"], &["乙"]]).await;

        let index = Arc::new(EntityRelationIndex::build(store.as_ref()).await.unwrap());
        let indexed = ContextRetriever::new(store, Arc::new(ContextCache::disabled()))
            .with_index(index);
        assert_eq!(indexed.fetch_relations(&names(&["甲"])).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_index_falls_back_to_store() {
        let store = store_with(&[edge("甲", "父母", "乙", "")]).await;
        let index = Arc::new(EntityRelationIndex::build(store.as_ref()).await.unwrap());
        store.upsert_edge(&edge("甲", "兄弟", "丙", "")).await.unwrap();

        let retriever = ContextRetriever::new(store, Arc::new(ContextCache::disabled()))
            .with_index(index);
        let records = retriever.fetch_relations(&names(&["甲"])).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_miss_builds_chunks_then_hit_skips_builder() {
        let store = store_with(&[edge("甲", "父母", "乙", "甲之父乙也")]).await;
        let backend: annalist_storage::SharedKvBackend =
            Arc::new(annalist_storage::MokaKvBackend::new(100));
        let cache = Arc::new(
            ContextCache::connect(Some(backend), &annalist_core::CacheConfig::default()).await,
        );
        let builder = Arc::new(RecordingBuilder::default());
        let retriever = ContextRetriever::new(store, cache).with_builder(builder.clone());

        let first = retriever.retrieve(&names(&["甲"])).await.unwrap();
        let second = retriever.retrieve(&names(&["甲"])).await.unwrap();

        assert!(!first.is_cache_hit());
        assert!(second.is_cache_hit());
        assert_eq!(first.passages(), second.passages());
        assert_eq!(
            first.passages(),
            ["甲与乙之间的关系是父母。具体描述：甲之父乙也".to_string()]
        );
        assert_eq!(builder.calls.lock().len(), 1);
        assert_eq!(builder.calls.lock()[0].1, 1);
    }

    #[tokio::test]
    async fn test_builder_failure_is_index_build_error() {
        let store = store_with(&[edge("甲", "父母", "乙", "")]).await;
        let retriever = ContextRetriever::new(store, Arc::new(ContextCache::disabled()))
            .with_builder(Arc::new(FailingBuilder));

        let err = retriever.retrieve(&names(&["甲"])).await.unwrap_err();
        assert!(matches!(err, QueryError::IndexBuild(_)));
    }
}
