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

//! Graph Store
//!
//! Labeled nodes keyed by `(label, name)` and directed edges keyed by
//! `(head, relation_type, tail)`. Every write is a merge: importing the same
//! triples twice leaves the node and edge counts unchanged.
//!
//! ## Identity
//!
//! A node is identified by its label *and* its name. The same name stored
//! under two labels is two nodes; name-based reads (`neighbors`) see both.
//!
//! ## Orientation
//!
//! Every [`RelationRecord`] returned by a store is head → tail. Readers that
//! query by name must check which side holds the name instead of assuming
//! the queried entity is `entity1`.

mod memory;
mod sqlite;

pub use memory::MemoryGraphStore;
pub use sqlite::SqliteGraphStore;

use crate::error::{GraphError, GraphResult};
use annalist_core::{GraphBackendKind, GraphConfig, GraphStats, NodeSummary, RelationRecord};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Shared handle to a graph store
pub type SharedGraphStore = Arc<dyn GraphStore>;

/// A merge request for one directed edge and its two endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeUpsert {
    pub head_label: String,
    pub head_name: String,
    pub relation_type: String,
    pub tail_label: String,
    pub tail_name: String,
    pub color: String,
    pub context: String,
}

/// Backing graph database
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Connectivity check
    async fn ping(&self) -> GraphResult<()>;

    /// Create a name lookup index for `label` if it does not exist yet
    async fn ensure_index(&self, label: &str) -> GraphResult<()>;

    /// Labels that currently have a name index
    async fn indexed_labels(&self) -> GraphResult<Vec<String>>;

    /// Merge a node and (re)set its color
    async fn upsert_entity(&self, label: &str, name: &str, color: &str) -> GraphResult<()>;

    /// Merge an edge on `(head, relation_type, tail)`; endpoints are created
    /// when missing. `color`, `original_type` and `context` are overwritten.
    async fn upsert_edge(&self, edge: &EdgeUpsert) -> GraphResult<()>;

    /// Edges touching any node named `name`: outgoing first, then incoming,
    /// each in store order
    async fn neighbors(&self, name: &str) -> GraphResult<Vec<RelationRecord>>;

    /// Every edge, in store order
    async fn all_edges(&self) -> GraphResult<Vec<RelationRecord>>;

    /// Every node, in store order
    async fn node_names(&self) -> GraphResult<Vec<NodeSummary>>;

    /// Node and edge counts
    async fn stats(&self) -> GraphResult<GraphStats>;

    /// Write counter; changes whenever nodes or edges change
    async fn revision(&self) -> GraphResult<u64>;

    /// Remove all nodes, edges and indexes
    async fn clear(&self) -> GraphResult<()>;
}

/// Reject labels that cannot be used as a node label
pub fn validate_label(label: &str) -> GraphResult<()> {
    let invalid = label.trim().is_empty()
        || label
            .chars()
            .any(|c| c.is_control() || c == '`' || c == '\'' || c == '"');
    if invalid {
        return Err(GraphError::InvalidLabel(label.to_string()));
    }
    Ok(())
}

/// Applies a time budget to every call of the wrapped store
pub struct BoundedGraphStore {
    inner: SharedGraphStore,
    timeout: Duration,
}

impl BoundedGraphStore {
    pub fn new(inner: SharedGraphStore, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T: Send>(
        &self,
        op: impl Future<Output = GraphResult<T>> + Send,
    ) -> GraphResult<T> {
        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| GraphError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl GraphStore for BoundedGraphStore {
    async fn ping(&self) -> GraphResult<()> {
        self.bounded(self.inner.ping()).await
    }

    async fn ensure_index(&self, label: &str) -> GraphResult<()> {
        self.bounded(self.inner.ensure_index(label)).await
    }

    async fn indexed_labels(&self) -> GraphResult<Vec<String>> {
        self.bounded(self.inner.indexed_labels()).await
    }

    async fn upsert_entity(&self, label: &str, name: &str, color: &str) -> GraphResult<()> {
        self.bounded(self.inner.upsert_entity(label, name, color))
            .await
    }

    async fn upsert_edge(&self, edge: &EdgeUpsert) -> GraphResult<()> {
        self.bounded(self.inner.upsert_edge(edge)).await
    }

    async fn neighbors(&self, name: &str) -> GraphResult<Vec<RelationRecord>> {
        self.bounded(self.inner.neighbors(name)).await
    }

    async fn all_edges(&self) -> GraphResult<Vec<RelationRecord>> {
        self.bounded(self.inner.all_edges()).await
    }

    async fn node_names(&self) -> GraphResult<Vec<NodeSummary>> {
        self.bounded(self.inner.node_names()).await
    }

    async fn stats(&self) -> GraphResult<GraphStats> {
        self.bounded(self.inner.stats()).await
    }

    async fn revision(&self) -> GraphResult<u64> {
        self.bounded(self.inner.revision()).await
    }

    async fn clear(&self) -> GraphResult<()> {
        self.bounded(self.inner.clear()).await
    }
}

/// Open the configured graph store and verify it is reachable
///
/// Failure here is fatal for the caller: without its system of record the
/// pipeline cannot answer anything.
pub async fn open_graph_store(config: &GraphConfig) -> GraphResult<SharedGraphStore> {
    let inner: SharedGraphStore = match config.backend {
        GraphBackendKind::Memory => Arc::new(MemoryGraphStore::new()),
        GraphBackendKind::Sqlite => {
            let path = config.path.as_ref().ok_or_else(|| {
                GraphError::Unavailable("sqlite graph backend requires a path".into())
            })?;
            Arc::new(SqliteGraphStore::open(path)?)
        }
    };

    let store: SharedGraphStore = Arc::new(BoundedGraphStore::new(inner, config.op_timeout()));
    store.ping().await?;

    info!(backend = ?config.backend, "Graph store opened");
    Ok(store)
}
