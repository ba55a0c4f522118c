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

//! Triple Extraction from annotated relation documents
//!
//! ## Input
//!
//! A payload is a JSON list of records (a single object counts as a list of
//! one), optionally prefixed with the `0|` sentinel:
//!
//! ```text
//! 0|[{"entities": [{"span": "甲", "type": "PER"}, ...],
//!     "relations": [{"head_span": "甲", "tail_span": "乙", "type": "父母"}],
//!     "tokens": "甲之父乙也"}]
//! ```
//!
//! ## Extraction Process
//!
//! 1. Trim, strip the sentinel, parse
//! 2. Per record, map each entity span to its type code (last one wins)
//! 3. Emit one triple per relation, typing head and tail through that map
//!
//! Records that are not objects or have no `relations` are skipped. Spans
//! without an entity annotation stay untyped.
//!
//! ## Deduplication
//!
//! [`TripleSet`] keeps the first triple seen for each `(head, relation, tail)`
//! across a whole run, context included.

use crate::error::{IngestError, IngestResult};
use annalist_core::Triple;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Prefix some exported payloads carry before the JSON body
pub const PAYLOAD_SENTINEL: &str = "0|";

/// Ordered set of triples unique on `(head, relation, tail)`
#[derive(Debug, Clone, Default)]
pub struct TripleSet {
    triples: Vec<Triple>,
    seen: HashSet<(String, String, String)>,
}

impl TripleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a triple; returns false when its identity was already present
    pub fn insert(&mut self, triple: Triple) -> bool {
        let key = (
            triple.head.clone(),
            triple.relation.clone(),
            triple.tail.clone(),
        );
        if !self.seen.insert(key) {
            return false;
        }
        self.triples.push(triple);
        true
    }

    /// Add many triples; returns how many were duplicates
    pub fn extend(&mut self, triples: impl IntoIterator<Item = Triple>) -> usize {
        let mut dropped = 0;
        for triple in triples {
            if !self.insert(triple) {
                dropped += 1;
            }
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    pub fn as_slice(&self) -> &[Triple] {
        &self.triples
    }

    pub fn into_vec(self) -> Vec<Triple> {
        self.triples
    }
}

impl FromIterator<Triple> for TripleSet {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

/// Outcome of a bulk extraction run
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Deduplicated triples in first-seen order
    pub triples: Vec<Triple>,
    pub files_read: usize,
    pub files_missing: usize,
    /// Files that existed but could not be read or parsed
    pub files_failed: usize,
    /// Triples emitted before deduplication
    pub raw_triples: usize,
    pub duplicates_dropped: usize,
}

/// Extracts relation triples from annotated documents
#[derive(Debug, Clone, Default)]
pub struct TripleExtractor;

impl TripleExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Parse one payload into triples, in record and relation order
    ///
    /// An empty payload yields no triples. Invalid JSON is an error.
    pub fn parse_payload(&self, payload: &str) -> IngestResult<Vec<Triple>> {
        let trimmed = payload.trim();
        let body = trimmed.strip_prefix(PAYLOAD_SENTINEL).unwrap_or(trimmed);
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let data: Value = serde_json::from_str(body)?;
        let records = match data {
            Value::Array(items) => items,
            other => vec![other],
        };

        Ok(records.iter().flat_map(extract_record).collect())
    }

    /// Extract triples from one file
    ///
    /// Read and parse failures are returned to the caller; use
    /// [`TripleExtractor::extract_dir`] for the forgiving bulk behavior.
    pub fn extract_file(&self, path: &Path) -> IngestResult<Vec<Triple>> {
        let content = std::fs::read_to_string(path).map_err(|source| IngestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_payload(&content)
    }

    /// Extract and deduplicate triples from `files` inside `dir`, in order
    ///
    /// Missing, unreadable and unparsable files are logged and contribute
    /// nothing; the run itself never fails.
    pub fn extract_dir(&self, dir: &Path, files: &[String]) -> ExtractionReport {
        let mut report = ExtractionReport::default();
        let mut set = TripleSet::new();

        for name in files {
            let path = dir.join(name);
            if !path.exists() {
                warn!(file = %path.display(), "Source file not found, skipping");
                report.files_missing += 1;
                continue;
            }

            match self.extract_file(&path) {
                Ok(triples) => {
                    info!(file = %name, triples = triples.len(), "Processed source file");
                    report.files_read += 1;
                    report.raw_triples += triples.len();
                    report.duplicates_dropped += set.extend(triples);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Could not extract triples");
                    report.files_failed += 1;
                }
            }
        }

        report.triples = set.into_vec();
        debug!(
            unique = report.triples.len(),
            dropped = report.duplicates_dropped,
            "Extraction finished"
        );
        report
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

fn context_of(record: &Value) -> String {
    match record.get("tokens") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(tokens)) => tokens.iter().filter_map(Value::as_str).collect(),
        _ => String::new(),
    }
}

fn extract_record(record: &Value) -> Vec<Triple> {
    let Some(relations) = record.as_object().and_then(|obj| obj.get("relations")) else {
        return Vec::new();
    };
    let Some(relations) = relations.as_array() else {
        debug!("Record has non-list relations, skipping");
        return Vec::new();
    };

    let mut span_types: HashMap<&str, &str> = HashMap::new();
    if let Some(entities) = record.get("entities").and_then(Value::as_array) {
        for entity in entities {
            if let Some(span) = entity.get("span").and_then(Value::as_str) {
                span_types.insert(span, str_field(entity, "type"));
            }
        }
    }

    let context = context_of(record);
    relations
        .iter()
        .map(|relation| {
            let head = str_field(relation, "head_span");
            let tail = str_field(relation, "tail_span");
            Triple::new(
                head,
                span_types.get(head).copied().unwrap_or(""),
                str_field(relation, "type"),
                tail,
                span_types.get(tail).copied().unwrap_or(""),
                context.clone(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"[{
        "entities": [{"span": "甲", "type": "PER"}, {"span": "乙", "type": "PER"}],
        "relations": [{"head_span": "甲", "tail_span": "乙", "type": "父母"}],
        "tokens": "甲之父乙也"
    }]"#;

    #[test]
    fn test_parse_basic_record() {
        let triples = TripleExtractor::new().parse_payload(RECORD).unwrap();
        assert_eq!(
            triples,
            vec![Triple::new("甲", "PER", "父母", "乙", "PER", "甲之父乙也")]
        );
    }

    #[test]
    fn test_sentinel_and_whitespace_stripped() {
        let payload = format!("  \n0|{}\n", RECORD);
        let triples = TripleExtractor::new().parse_payload(&payload).unwrap();
        assert_eq!(triples.len(), 1);
    }

    #[test]
    fn test_empty_payloads() {
        let extractor = TripleExtractor::new();
        assert!(extractor.parse_payload("").unwrap().is_empty());
        assert!(extractor.parse_payload("   ").unwrap().is_empty());
        assert!(extractor.parse_payload("0|").unwrap().is_empty());
        assert!(extractor.parse_payload("[]").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(matches!(
            TripleExtractor::new().parse_payload("0|{not json"),
            Err(IngestError::Parse(_))
        ));
    }

    #[test]
    fn test_single_object_and_skipped_records() {
        let payload = r#"{"relations": [{"head_span": "甲", "type": "别名"}], "tokens": ["甲", "字", "子"]}"#;
        let triples = TripleExtractor::new().parse_payload(payload).unwrap();
        assert_eq!(triples, vec![Triple::new("甲", "", "别名", "", "", "甲字子")]);

        let payload = r#"[1, "text", {"entities": []}, {"relations": []}]"#;
        assert!(TripleExtractor::new().parse_payload(payload).unwrap().is_empty());
    }

    #[test]
    fn test_later_entity_overrides_span_type() {
        let payload = r#"[{
            "entities": [{"span": "长安", "type": "PER"}, {"span": "长安", "type": "LOC"}],
            "relations": [{"head_span": "甲", "tail_span": "长安", "type": "到达"}]
        }]"#;
        let triples = TripleExtractor::new().parse_payload(payload).unwrap();
        assert_eq!(triples[0].head_type, "");
        assert_eq!(triples[0].tail_type, "LOC");
        assert_eq!(triples[0].context, "");
    }

    #[test]
    fn test_triple_set_keeps_first_context() {
        let mut set = TripleSet::new();
        assert!(set.insert(Triple::new("甲", "PER", "父母", "乙", "PER", "first")));
        assert!(!set.insert(Triple::new("甲", "PER", "父母", "乙", "PER", "second")));
        assert!(set.insert(Triple::new("乙", "PER", "父母", "甲", "PER", "reversed")));

        assert_eq!(set.len(), 2);
        assert_eq!(set.as_slice()[0].context, "first");
    }
}
