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

//! Annalist Core
//!
//! Shared types for the Annalist knowledge-graph question answering pipeline:
//!
//! - **Entities**: triples, entity types, relation records, graph statistics
//! - **Styles**: label/color tables for entity types and relation types
//! - **Passages**: rendering relation records into retrieval passages and
//!   chunking them for vectorization
//! - **Config**: TOML/env configuration shared by every crate
//!
//! ```text
//! annotated docs → Triple → GraphStore → RelationRecord → passage → chunks
//! ```

pub mod config;
pub mod entities;
pub mod error;
pub mod passage;
pub mod style;

pub use config::{
    AnnalistConfig, CacheBackendKind, CacheConfig, GraphBackendKind, GraphConfig, ImportConfig,
    RetrievalConfig,
};
pub use entities::{EntityType, GraphStats, NodeSummary, RelationRecord, Triple};
pub use error::{CoreError, CoreResult};
pub use passage::{render_passage, Chunk, TextChunker};
pub use style::{EntityStyles, RelationPalette, Style, FALLBACK_COLOR, FALLBACK_LABEL};
