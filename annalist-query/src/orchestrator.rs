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

//! Question answering entry point
//!
//! [`AppContext`] owns every long-lived handle (graph store, index, cache,
//! resolver, collaborators). [`Orchestrator`] wires them into the
//! question → names → passages → answer flow and has an explicit
//! `open` / `close` lifecycle.

use crate::cache::{CacheStats, ContextCache};
use crate::error::{CollaboratorError, QueryError, QueryResult};
use crate::resolver::{LexiconResolver, NameResolver};
use crate::retriever::{ContextRetriever, NullIndexBuilder, Retrieval, VectorIndexBuilder};
use annalist_core::{AnnalistConfig, TextChunker};
use annalist_index::EntityRelationIndex;
use annalist_storage::{open_graph_store, open_kv_backend, KvBackend, SharedGraphStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Reply when no entity name can be found in the question
pub const NO_NAMES_MESSAGE: &str = "抱歉，我无法从问题中识别出人名或地名。";

/// Produces a natural-language answer from retrieved passages
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(
        &self,
        question: &str,
        passages: &[String],
    ) -> Result<String, CollaboratorError>;
}

/// Reply when the names are known but have no relations
pub fn not_found_message(names: &[String]) -> String {
    format!("抱歉，我没有找到关于 {} 的相关历史记载。", names.join(", "))
}

/// Long-lived handles shared by every request
pub struct AppContext {
    pub store: SharedGraphStore,
    /// `None` when lookups go straight to the store
    pub index: Option<Arc<EntityRelationIndex>>,
    pub cache: Arc<ContextCache>,
    pub resolver: Arc<dyn NameResolver>,
    pub builder: Arc<dyn VectorIndexBuilder>,
    pub generator: Option<Arc<dyn AnswerGenerator>>,
    pub chunker: TextChunker,
    /// Write the index into the cache on reindex and close
    pub persist_index: bool,
}

impl AppContext {
    /// Open the graph store and cache described by `config`, then warm the
    /// index and the name lexicon
    ///
    /// An unreachable graph store fails; an unreachable cache only disables
    /// caching.
    pub async fn from_config(config: &AnnalistConfig) -> QueryResult<Self> {
        config.validate()?;
        let store = open_graph_store(&config.graph).await?;

        let backend = open_kv_backend(&config.cache).unwrap_or_else(|e| {
            warn!(error = %e, "Could not open cache backend, caching disabled");
            None
        });
        let cache = Arc::new(ContextCache::connect(backend, &config.cache).await);
        let persist_index = config.cache.persist_index && cache.is_enabled();

        let index = if config.retrieval.use_index {
            let kv: Option<&dyn KvBackend> = cache
                .backend()
                .filter(|_| persist_index)
                .map(|backend| backend.as_ref());
            let index = EntityRelationIndex::warm_start(kv, store.as_ref(), cache.ttl()).await?;
            Some(Arc::new(index))
        } else {
            None
        };

        let resolver = LexiconResolver::load(store.as_ref()).await?;
        let chunker = TextChunker::new(config.retrieval.chunk_size, config.retrieval.chunk_overlap)?;

        Ok(Self {
            store,
            index,
            cache,
            resolver: Arc::new(resolver),
            builder: Arc::new(NullIndexBuilder),
            generator: None,
            chunker,
            persist_index,
        })
    }

    /// Context over an already opened store, with an index built from it
    pub async fn with_store(store: SharedGraphStore, cache: ContextCache) -> QueryResult<Self> {
        let index = EntityRelationIndex::build(store.as_ref()).await?;
        let resolver = LexiconResolver::load(store.as_ref()).await?;

        Ok(Self {
            store,
            index: Some(Arc::new(index)),
            cache: Arc::new(cache),
            resolver: Arc::new(resolver),
            builder: Arc::new(NullIndexBuilder),
            generator: None,
            chunker: TextChunker::default(),
            persist_index: false,
        })
    }

    pub fn with_builder(mut self, builder: Arc<dyn VectorIndexBuilder>) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn NameResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn without_index(mut self) -> Self {
        self.index = None;
        self
    }
}

/// What the graph knows about a question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionContext {
    /// No entity names in the question
    NoNames,
    /// Names found, but no relations touch them
    NotFound { names: Vec<String> },
    Found {
        names: Vec<String>,
        passages: Vec<String>,
        cache_hit: bool,
    },
}

pub struct Orchestrator {
    ctx: AppContext,
    retriever: ContextRetriever,
}

impl Orchestrator {
    pub fn open(ctx: AppContext) -> Self {
        let mut retriever = ContextRetriever::new(ctx.store.clone(), ctx.cache.clone())
            .with_builder(ctx.builder.clone())
            .with_chunker(ctx.chunker);
        if let Some(index) = &ctx.index {
            retriever = retriever.with_index(index.clone());
        }

        info!(
            indexed = ctx.index.is_some(),
            cache = ctx.cache.is_enabled(),
            generator = ctx.generator.is_some(),
            "Orchestrator opened"
        );
        Self { ctx, retriever }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Resolve names in `question` and gather their passages
    pub async fn context_for_question(&self, question: &str) -> QueryResult<QuestionContext> {
        let names = self.ctx.resolver.resolve(question);
        self.context_for_names(names).await
    }

    /// Gather passages for names the caller already knows
    pub async fn context_for_names(&self, names: Vec<String>) -> QueryResult<QuestionContext> {
        if names.is_empty() {
            return Ok(QuestionContext::NoNames);
        }

        match self.retriever.retrieve(&names).await? {
            Retrieval::NoContext => Ok(QuestionContext::NotFound { names }),
            Retrieval::Context {
                passages,
                cache_hit,
                ..
            } => Ok(QuestionContext::Found {
                names,
                passages,
                cache_hit,
            }),
        }
    }

    /// Answer `question` from the graph
    ///
    /// Without an answer generator the passages themselves are returned,
    /// one per line.
    pub async fn answer_question(&self, question: &str) -> QueryResult<String> {
        match self.context_for_question(question).await? {
            QuestionContext::NoNames => Ok(NO_NAMES_MESSAGE.to_string()),
            QuestionContext::NotFound { names } => Ok(not_found_message(&names)),
            QuestionContext::Found { passages, .. } => match &self.ctx.generator {
                Some(generator) => generator
                    .generate(question, &passages)
                    .await
                    .map_err(|e| QueryError::Generation(e.to_string())),
                None => Ok(passages.join("\n")),
            },
        }
    }

    /// Rebuild the index and reload the resolver after the graph changed
    pub async fn reindex(&self) -> QueryResult<()> {
        if let Some(index) = &self.ctx.index {
            index.rebuild(self.ctx.store.as_ref()).await?;
            self.persist_index().await;
        }
        self.ctx.resolver.reload(self.ctx.store.as_ref()).await
    }

    async fn persist_index(&self) {
        let (Some(index), Some(kv)) = (&self.ctx.index, self.ctx.cache.backend()) else {
            return;
        };
        if !self.ctx.persist_index {
            return;
        }
        if let Err(e) = index.persist(kv.as_ref(), self.ctx.cache.ttl()).await {
            warn!(error = %e, "Failed to persist entity-relation index");
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.ctx.cache.stats()
    }

    /// Persist the index if configured and release every handle
    pub async fn close(self) -> CacheStats {
        self.persist_index().await;
        let stats = self.cache_stats();
        info!(
            hits = stats.hits,
            misses = stats.misses,
            puts = stats.puts,
            errors = stats.errors,
            hit_rate = stats.hit_rate,
            "Orchestrator closed"
        );
        stats
    }
}
