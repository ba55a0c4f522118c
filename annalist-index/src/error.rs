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

use annalist_storage::{GraphError, KvError};
use thiserror::Error;

pub type IndexResult<T> = Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    /// Scanning the graph store failed
    #[error("Failed to read graph: {0}")]
    Graph(#[from] GraphError),

    /// Reading or writing the persisted snapshot failed
    #[error("Snapshot cache error: {0}")]
    Cache(#[from] KvError),

    #[error("Snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}
