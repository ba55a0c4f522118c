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

//! Annalist Query Layer
//!
//! Turns a question into graph-backed context:
//!
//! - [`resolver`]: entity names mentioned in the question
//! - [`retriever`]: relations for those names, rendered as passages
//! - [`cache`]: cache-aside storage for rendered passages
//! - [`orchestrator`]: the `open` / `answer` / `close` lifecycle

pub mod cache;
pub mod error;
pub mod orchestrator;
pub mod resolver;
pub mod retriever;

pub use cache::{cache_key, CacheStats, ContextCache, FlightGuard, KEY_PREFIX};
pub use error::{CollaboratorError, QueryError, QueryResult};
pub use orchestrator::{
    not_found_message, AnswerGenerator, AppContext, Orchestrator, QuestionContext,
    NO_NAMES_MESSAGE,
};
pub use resolver::{
    IdentityNormalizer, LexiconResolver, NameLexicon, NameResolver, ScriptNormalizer,
    COMMON_WORDS,
};
pub use retriever::{ContextRetriever, NullIndexBuilder, Retrieval, VectorIndexBuilder};
