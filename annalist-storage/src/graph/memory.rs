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

//! In-process graph store
//!
//! Node and edge tables in insertion order, with identity maps for merge
//! lookups. Used for tests and one-shot pipelines; nothing survives the
//! process.

use super::{validate_label, EdgeUpsert, GraphStore};
use crate::error::GraphResult;
use annalist_core::{GraphStats, NodeSummary, RelationRecord, FALLBACK_COLOR};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

type NodeId = usize;

#[derive(Debug, Clone)]
struct NodeRow {
    label: String,
    name: String,
    color: String,
}

#[derive(Debug, Clone)]
struct EdgeRow {
    head: NodeId,
    relation_type: String,
    tail: NodeId,
    color: String,
    original_type: String,
    context: String,
}

#[derive(Debug, Default)]
struct Tables {
    nodes: Vec<NodeRow>,
    /// (label, name) -> node
    node_ids: HashMap<(String, String), NodeId>,
    edges: Vec<EdgeRow>,
    /// (head, relation_type, tail) -> edge
    edge_ids: HashMap<(NodeId, String, NodeId), usize>,
    indexes: BTreeSet<String>,
}

impl Tables {
    /// Find or create a node; `color` is only applied when `set_color` is true
    /// or the node is new.
    fn merge_node(&mut self, label: &str, name: &str, color: &str, set_color: bool) -> NodeId {
        let key = (label.to_string(), name.to_string());
        if let Some(&id) = self.node_ids.get(&key) {
            if set_color {
                self.nodes[id].color = color.to_string();
            }
            return id;
        }

        let id = self.nodes.len();
        self.nodes.push(NodeRow {
            label: label.to_string(),
            name: name.to_string(),
            color: color.to_string(),
        });
        self.node_ids.insert(key, id);
        id
    }

    fn record(&self, edge: &EdgeRow) -> RelationRecord {
        RelationRecord::new(
            self.nodes[edge.head].name.clone(),
            edge.relation_type.clone(),
            self.nodes[edge.tail].name.clone(),
            edge.context.clone(),
        )
    }
}

/// Graph store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    tables: RwLock<Tables>,
    revision: AtomicU64,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn ping(&self) -> GraphResult<()> {
        Ok(())
    }

    async fn ensure_index(&self, label: &str) -> GraphResult<()> {
        validate_label(label)?;
        self.tables.write().indexes.insert(label.to_string());
        Ok(())
    }

    async fn indexed_labels(&self) -> GraphResult<Vec<String>> {
        Ok(self.tables.read().indexes.iter().cloned().collect())
    }

    async fn upsert_entity(&self, label: &str, name: &str, color: &str) -> GraphResult<()> {
        validate_label(label)?;
        self.tables.write().merge_node(label, name, color, true);
        self.bump();
        Ok(())
    }

    async fn upsert_edge(&self, edge: &EdgeUpsert) -> GraphResult<()> {
        validate_label(&edge.head_label)?;
        validate_label(&edge.tail_label)?;

        {
            let mut tables = self.tables.write();
            let head = tables.merge_node(&edge.head_label, &edge.head_name, FALLBACK_COLOR, false);
            let tail = tables.merge_node(&edge.tail_label, &edge.tail_name, FALLBACK_COLOR, false);

            let key = (head, edge.relation_type.clone(), tail);
            match tables.edge_ids.get(&key).copied() {
                Some(existing) => {
                    let row = &mut tables.edges[existing];
                    row.color = edge.color.clone();
                    row.original_type = edge.relation_type.clone();
                    row.context = edge.context.clone();
                }
                None => {
                    let id = tables.edges.len();
                    tables.edges.push(EdgeRow {
                        head,
                        relation_type: edge.relation_type.clone(),
                        tail,
                        color: edge.color.clone(),
                        original_type: edge.relation_type.clone(),
                        context: edge.context.clone(),
                    });
                    tables.edge_ids.insert(key, id);
                }
            }
        }

        self.bump();
        Ok(())
    }

    async fn neighbors(&self, name: &str) -> GraphResult<Vec<RelationRecord>> {
        let tables = self.tables.read();

        let outgoing = tables
            .edges
            .iter()
            .filter(|e| tables.nodes[e.head].name == name);
        // self-loops were already returned as outgoing
        let incoming = tables
            .edges
            .iter()
            .filter(|e| tables.nodes[e.tail].name == name && tables.nodes[e.head].name != name);

        Ok(outgoing
            .chain(incoming)
            .map(|e| tables.record(e))
            .collect())
    }

    async fn all_edges(&self) -> GraphResult<Vec<RelationRecord>> {
        let tables = self.tables.read();
        Ok(tables.edges.iter().map(|e| tables.record(e)).collect())
    }

    async fn node_names(&self) -> GraphResult<Vec<NodeSummary>> {
        Ok(self
            .tables
            .read()
            .nodes
            .iter()
            .map(|n| NodeSummary {
                label: n.label.clone(),
                name: n.name.clone(),
            })
            .collect())
    }

    async fn stats(&self) -> GraphResult<GraphStats> {
        let tables = self.tables.read();
        let mut stats = GraphStats {
            node_count: tables.nodes.len(),
            edge_count: tables.edges.len(),
            ..GraphStats::default()
        };

        for node in &tables.nodes {
            *stats.nodes_by_label.entry(node.label.clone()).or_default() += 1;
        }
        for edge in &tables.edges {
            *stats
                .edges_by_relation
                .entry(edge.relation_type.clone())
                .or_default() += 1;
        }

        Ok(stats)
    }

    async fn revision(&self) -> GraphResult<u64> {
        Ok(self.revision.load(Ordering::SeqCst))
    }

    async fn clear(&self) -> GraphResult<()> {
        *self.tables.write() = Tables::default();
        self.bump();
        Ok(())
    }
}
