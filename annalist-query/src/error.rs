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

//! Query-side error types
//!
//! Cache failures never show up here; the context cache absorbs them.

use annalist_core::CoreError;
use annalist_index::IndexError;
use annalist_storage::GraphError;
use thiserror::Error;

pub type QueryResult<T> = Result<T, QueryError>;

/// Error type returned by external collaborators (vector index builder,
/// answer generator)
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum QueryError {
    /// The graph store failed or timed out while fetching relations
    #[error("Graph store error: {0}")]
    Graph(#[from] GraphError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// The vector index builder rejected the chunks
    #[error("Vector index build failed: {0}")]
    IndexBuild(String),

    /// The answer generator failed
    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error("Configuration error: {0}")]
    Config(#[from] CoreError),
}
