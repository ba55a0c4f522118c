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

//! Entity name resolution
//!
//! The default resolver is a dictionary scan: the question is walked left to
//! right and at each position the longest lexicon entry starting there is
//! taken. Entries come from the graph's node names plus a few common words.
//! Common words only stop a shorter name from matching inside them; they are
//! never reported as names.

use crate::error::QueryResult;
use annalist_storage::GraphStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Words that segment as a unit but are not entity names
pub const COMMON_WORDS: [&str; 4] = ["官职", "父母", "兄弟", "任职"];

/// Extracts candidate entity names from a question
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Names mentioned in `question`, in order of first appearance
    fn resolve(&self, question: &str) -> Vec<String>;

    /// Refresh whatever the resolver learned from the graph
    async fn reload(&self, _store: &dyn GraphStore) -> QueryResult<()> {
        Ok(())
    }
}

/// Maps text into the script variant the graph stores names in
pub trait ScriptNormalizer: Send + Sync {
    fn normalize(&self, text: &str) -> String;
}

/// Leaves text unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNormalizer;

impl ScriptNormalizer for IdentityNormalizer {
    fn normalize(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Dictionary of known names and blocking words
#[derive(Debug, Clone, Default)]
pub struct NameLexicon {
    names: HashSet<String>,
    common: HashSet<String>,
    /// Longest entry, in chars
    max_len: usize,
}

impl NameLexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lexicon of `names` plus [`COMMON_WORDS`]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lexicon = Self::new();
        for word in COMMON_WORDS {
            lexicon.add_common_word(word);
        }
        for name in names {
            lexicon.add_name(name);
        }
        lexicon
    }

    /// Load every node name from `store`
    pub async fn load(store: &dyn GraphStore) -> QueryResult<Self> {
        let nodes = store.node_names().await?;
        let lexicon = Self::from_names(nodes.into_iter().map(|n| n.name));
        info!(names = lexicon.len(), "Name lexicon loaded");
        Ok(lexicon)
    }

    pub fn add_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if name.trim().is_empty() {
            return;
        }
        self.max_len = self.max_len.max(name.chars().count());
        self.names.insert(name);
    }

    pub fn add_common_word(&mut self, word: impl Into<String>) {
        let word = word.into();
        if word.is_empty() {
            return;
        }
        self.max_len = self.max_len.max(word.chars().count());
        self.common.insert(word);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of names (common words excluded)
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Greedy longest-match scan; duplicates are reported once
    pub fn scan(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut found: Vec<String> = Vec::new();
        let mut pos = 0;

        while pos < chars.len() {
            let longest = self.max_len.min(chars.len() - pos);
            let matched = (1..=longest).rev().find_map(|len| {
                let candidate: String = chars[pos..pos + len].iter().collect();
                if self.names.contains(&candidate) {
                    Some((len, Some(candidate)))
                } else if self.common.contains(&candidate) {
                    Some((len, None))
                } else {
                    None
                }
            });

            match matched {
                Some((len, name)) => {
                    if let Some(name) = name.filter(|n| !found.contains(n)) {
                        found.push(name);
                    }
                    pos += len;
                }
                None => pos += 1,
            }
        }

        found
    }
}

/// Dictionary resolver over a reloadable [`NameLexicon`]
pub struct LexiconResolver {
    lexicon: RwLock<NameLexicon>,
    normalizer: Arc<dyn ScriptNormalizer>,
}

impl LexiconResolver {
    pub fn new(lexicon: NameLexicon) -> Self {
        Self {
            lexicon: RwLock::new(lexicon),
            normalizer: Arc::new(IdentityNormalizer),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn ScriptNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Resolver over the names currently in `store`
    pub async fn load(store: &dyn GraphStore) -> QueryResult<Self> {
        Ok(Self::new(NameLexicon::load(store).await?))
    }

    pub fn lexicon_size(&self) -> usize {
        self.lexicon.read().len()
    }
}

#[async_trait]
impl NameResolver for LexiconResolver {
    fn resolve(&self, question: &str) -> Vec<String> {
        let normalized = self.normalizer.normalize(question);
        let names: Vec<String> = self
            .lexicon
            .read()
            .scan(&normalized)
            .into_iter()
            .map(|name| self.normalizer.normalize(&name))
            .collect();

        debug!(question, names = ?names, "Resolved names");
        names
    }

    /// Replace the lexicon with the names currently in `store`
    async fn reload(&self, store: &dyn GraphStore) -> QueryResult<()> {
        let fresh = NameLexicon::load(store).await?;
        *self.lexicon.write() = fresh;
        Ok(())
    }
}
