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

//! Annalist Ingest
//!
//! The offline half of the pipeline:
//!
//! ```text
//! annotated JSON ──► TripleExtractor ──► TripleSet ──┬──► export_csv
//!                                                    └──► Importer ──► GraphStore
//!                                                                  └─► index rebuild
//! ```

pub mod error;
pub mod extractor;
pub mod importer;
pub mod tabular;

pub use error::{IngestError, IngestResult};
pub use extractor::{ExtractionReport, TripleExtractor, TripleSet, PAYLOAD_SENTINEL};
pub use importer::{ImportReport, Importer};
pub use tabular::{export_csv, write_triples, CSV_HEADER};
