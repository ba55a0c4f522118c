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

//! Passage rendering and chunking
//!
//! A passage is one relation rendered as a sentence. Passages are split into
//! overlapping character windows before they are handed to the vector index
//! builder. Window sizes count `char`s, not bytes, since most of the corpus
//! is CJK text.

use crate::entities::RelationRecord;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Default chunk size in characters
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Default overlap between consecutive chunks in characters
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Render one relation record into a retrieval passage
pub fn render_passage(record: &RelationRecord) -> String {
    format!(
        "{}与{}之间的关系是{}。具体描述：{}",
        record.entity1, record.entity2, record.relation, record.context
    )
}

/// A window of passage text handed to the vector index builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Index of the passage this chunk was cut from
    pub passage_index: usize,
    pub text: String,
}

/// Fixed-size sliding window splitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker. `overlap` must be smaller than `chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> CoreResult<Self> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(CoreError::InvalidChunking {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split passages into chunks. Empty passages produce no chunks.
    pub fn chunk(&self, passages: &[String]) -> Vec<Chunk> {
        let mut chunks = Vec::with_capacity(passages.len());
        for (passage_index, passage) in passages.iter().enumerate() {
            let chars: Vec<char> = passage.chars().collect();
            if chars.is_empty() {
                continue;
            }

            let step = self.chunk_size - self.overlap;
            let mut start = 0;
            loop {
                let end = (start + self.chunk_size).min(chars.len());
                chunks.push(Chunk {
                    passage_index,
                    text: chars[start..end].iter().collect(),
                });
                if end == chars.len() {
                    break;
                }
                start += step;
            }
        }
        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}
