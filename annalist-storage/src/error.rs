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

//! Storage error types

use std::time::Duration;
use thiserror::Error;

/// Result type for graph store operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type for key-value backend operations
pub type KvResult<T> = Result<T, KvError>;

/// Errors raised by graph stores
#[derive(Debug, Error)]
pub enum GraphError {
    /// The store could not be opened or reached
    #[error("Graph store unavailable: {0}")]
    Unavailable(String),

    /// Label cannot be used as a node label
    #[error("Invalid node label: {0:?}")]
    InvalidLabel(String),

    /// Operation exceeded its time budget
    #[error("Graph operation timed out after {0:?}")]
    Timeout(Duration),

    /// Backend reported an error
    #[error("Graph backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for GraphError {
    fn from(e: rusqlite::Error) -> Self {
        GraphError::Backend(e.to_string())
    }
}

/// Errors raised by key-value backends
#[derive(Debug, Error)]
pub enum KvError {
    /// Backend could not be opened or reached
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    /// Operation exceeded its time budget
    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    /// Backend reported an error
    #[error("Cache backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for KvError {
    fn from(e: rusqlite::Error) -> Self {
        KvError::Backend(e.to_string())
    }
}
