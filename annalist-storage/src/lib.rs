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

//! Annalist Storage
//!
//! Backends for the two stores the retrieval pipeline talks to:
//!
//! - **Graph stores** ([`GraphStore`]): the system of record for entity
//!   nodes and typed relation edges. Upserts merge on identity so imports
//!   can be re-run without duplicating anything.
//! - **Key-value backends** ([`KvBackend`]): the `GET`/`SETEX`/`EXISTS`
//!   surface the context cache is layered on.
//!
//! ```text
//! ┌─────────────────────┐      ┌─────────────────────┐
//! │     GraphStore      │      │      KvBackend      │
//! │  memory │ sqlite    │      │ moka │ sqlite │ n/a │
//! └─────────┬───────────┘      └──────────┬──────────┘
//!           │ BoundedGraphStore           │ BoundedKvBackend
//!           ▼                             ▼
//!     index / retriever              context cache
//! ```

pub mod error;
pub mod graph;
pub mod kv;

pub use error::{GraphError, GraphResult, KvError, KvResult};
pub use graph::{
    open_graph_store, BoundedGraphStore, EdgeUpsert, GraphStore, MemoryGraphStore,
    SqliteGraphStore, SharedGraphStore,
};
pub use kv::{
    open_kv_backend, BoundedKvBackend, KvBackend, MokaKvBackend, SharedKvBackend, SqliteKvBackend,
    UnavailableKvBackend,
};
