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

//! Annalist Index Layer
//!
//! Derived, rebuildable projections of the graph store. The graph store
//! stays the system of record; anything here can be thrown away and rebuilt
//! from a full scan.

pub mod entity_relation;
pub mod error;

pub use entity_relation::{EntityRelationIndex, IndexSnapshot, SNAPSHOT_KEY};
pub use error::{IndexError, IndexResult};
