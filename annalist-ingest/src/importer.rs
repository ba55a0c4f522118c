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

//! Graph import
//!
//! Loads a deduplicated triple set into the graph store in two passes:
//! every head and tail entity first, then every edge. Both passes merge, so
//! re-running an import over the same triples changes nothing.
//!
//! The entity-relation index is rebuilt at the end of every batch; it never
//! serves a graph older than the last completed import.

use crate::error::IngestResult;
use annalist_core::{EntityStyles, GraphStats, RelationPalette, Triple};
use annalist_index::EntityRelationIndex;
use annalist_storage::{EdgeUpsert, SharedGraphStore};
use tracing::{debug, info};

/// Summary of one import batch
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Entity upserts issued (two per triple)
    pub entities_upserted: usize,
    pub edges_upserted: usize,
    /// Store counts after the batch
    pub stats: GraphStats,
    /// Store revision the rebuilt index was built from
    pub index_revision: u64,
}

/// Writes triples into a graph store
pub struct Importer {
    store: SharedGraphStore,
    styles: EntityStyles,
    palette: RelationPalette,
    clear_first: bool,
}

impl Importer {
    /// Importer with the default style tables that clears the store first
    pub fn new(store: SharedGraphStore) -> Self {
        Self {
            store,
            styles: EntityStyles::default(),
            palette: RelationPalette::default(),
            clear_first: true,
        }
    }

    pub fn with_styles(mut self, styles: EntityStyles, palette: RelationPalette) -> Self {
        self.styles = styles;
        self.palette = palette;
        self
    }

    /// Whether to wipe the store before loading
    pub fn clear_first(mut self, clear: bool) -> Self {
        self.clear_first = clear;
        self
    }

    /// Import `triples` and rebuild `index` from the result
    pub async fn import(
        &self,
        triples: &[Triple],
        index: &EntityRelationIndex,
    ) -> IngestResult<ImportReport> {
        let store = self.store.as_ref();

        if self.clear_first {
            store.clear().await?;
            info!("Graph store cleared");
        }

        for label in self.styles.labels() {
            store.ensure_index(label).await?;
        }

        let mut report = ImportReport::default();

        for triple in triples {
            for (name, code) in [
                (&triple.head, &triple.head_type),
                (&triple.tail, &triple.tail_type),
            ] {
                let style = self.styles.resolve(code);
                store.upsert_entity(&style.label, name, &style.color).await?;
                report.entities_upserted += 1;
            }
        }
        debug!(count = report.entities_upserted, "Entities merged");

        for triple in triples {
            store.upsert_edge(&self.edge_for(triple)).await?;
            report.edges_upserted += 1;
        }
        debug!(count = report.edges_upserted, "Edges merged");

        let snapshot = index.rebuild(store).await?;
        report.index_revision = snapshot.revision();
        report.stats = store.stats().await?;

        for label in self.styles.labels() {
            info!(label, count = report.stats.nodes_with_label(label), "Entities by label");
        }
        for (relation, count) in &report.stats.edges_by_relation {
            info!(relation = %relation, count, "Edges by relation");
        }
        info!(
            nodes = report.stats.node_count,
            edges = report.stats.edge_count,
            "Import complete"
        );

        Ok(report)
    }

    fn edge_for(&self, triple: &Triple) -> EdgeUpsert {
        let head = self.styles.resolve(&triple.head_type);
        let tail = self.styles.resolve(&triple.tail_type);
        EdgeUpsert {
            head_label: head.label.clone(),
            head_name: triple.head.clone(),
            relation_type: triple.relation.clone(),
            tail_label: tail.label.clone(),
            tail_name: triple.tail.clone(),
            color: self.palette.color(&triple.relation).to_string(),
            context: triple.context.clone(),
        }
    }
}
