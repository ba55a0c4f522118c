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

use crate::error::{CoreError, CoreResult};
use crate::passage::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Annalist configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AnnalistConfig {
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

/// Which graph store implementation to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphBackendKind {
    /// In-process store, lost on exit
    Memory,
    /// SQLite file
    Sqlite,
}

impl FromStr for GraphBackendKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(CoreError::Config(format!("unknown graph backend: {other}"))),
        }
    }
}

/// Which cache backend to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
    Memory,
    Sqlite,
    /// No caching; every retrieval rebuilds
    Disabled,
}

impl FromStr for CacheBackendKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            "disabled" | "none" | "off" => Ok(Self::Disabled),
            other => Err(CoreError::Config(format!("unknown cache backend: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_backend")]
    pub backend: GraphBackendKind,

    /// Database file for the sqlite backend
    #[serde(default = "default_graph_path")]
    pub path: Option<PathBuf>,

    /// Upper bound for a single graph store call, in milliseconds
    #[serde(default = "default_graph_timeout_ms")]
    pub op_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackendKind,

    /// Database file for the sqlite backend
    #[serde(default = "default_cache_path")]
    pub path: Option<PathBuf>,

    /// Time-to-live for cache entries, in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum entries held by the in-memory backend
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,

    /// Upper bound for a single cache call, in milliseconds
    #[serde(default = "default_cache_timeout_ms")]
    pub op_timeout_ms: u64,

    /// Share one build between concurrent misses on the same key
    #[serde(default)]
    pub single_flight: bool,

    /// Persist the entity-relation index into the cache for warm restarts
    #[serde(default = "default_true")]
    pub persist_index: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Serve lookups from the in-memory index instead of querying the store
    #[serde(default = "default_true")]
    pub use_index: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportConfig {
    /// Directory holding the annotated relation files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// File names processed from `data_dir`, in order
    #[serde(default = "default_import_files")]
    pub files: Vec<String>,

    /// Tabular export of the deduplicated triples
    #[serde(default = "default_csv_output")]
    pub csv_output: PathBuf,

    /// Wipe the graph before importing
    #[serde(default = "default_true")]
    pub clear_before_import: bool,
}

// Default values
fn default_graph_backend() -> GraphBackendKind {
    GraphBackendKind::Sqlite
}

fn default_graph_path() -> Option<PathBuf> {
    Some(PathBuf::from("./annalist-data/graph.db"))
}

fn default_graph_timeout_ms() -> u64 {
    10_000
}

fn default_cache_backend() -> CacheBackendKind {
    CacheBackendKind::Sqlite
}

fn default_cache_path() -> Option<PathBuf> {
    Some(PathBuf::from("./annalist-data/cache.db"))
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_max_entries() -> u64 {
    10_000
}

fn default_cache_timeout_ms() -> u64 {
    500
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/re")
}

fn default_import_files() -> Vec<String> {
    vec![
        "coling_test.json".to_string(),
        "coling_train.json".to_string(),
        "coling_train_dev.json".to_string(),
    ]
}

fn default_csv_output() -> PathBuf {
    PathBuf::from("triples.csv")
}

fn default_true() -> bool {
    true
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: default_graph_backend(),
            path: default_graph_path(),
            op_timeout_ms: default_graph_timeout_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            path: default_cache_path(),
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
            op_timeout_ms: default_cache_timeout_ms(),
            single_flight: false,
            persist_index: true,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            use_index: true,
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            files: default_import_files(),
            csv_output: default_csv_output(),
            clear_before_import: true,
        }
    }
}

impl GraphConfig {
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

impl AnnalistConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Override fields from environment variables
    ///
    /// Supported environment variables:
    /// - ANNALIST_GRAPH_BACKEND: `memory` or `sqlite`
    /// - ANNALIST_GRAPH_PATH: graph database file
    /// - ANNALIST_CACHE_BACKEND: `memory`, `sqlite` or `disabled`
    /// - ANNALIST_CACHE_PATH: cache database file
    /// - ANNALIST_CACHE_TTL_SECS: cache entry time-to-live
    /// - ANNALIST_DATA_DIR: directory with the annotated relation files
    pub fn apply_env(mut self) -> CoreResult<Self> {
        if let Ok(backend) = std::env::var("ANNALIST_GRAPH_BACKEND") {
            self.graph.backend = backend.parse()?;
        }

        if let Ok(path) = std::env::var("ANNALIST_GRAPH_PATH") {
            self.graph.path = Some(PathBuf::from(path));
        }

        if let Ok(backend) = std::env::var("ANNALIST_CACHE_BACKEND") {
            self.cache.backend = backend.parse()?;
        }

        if let Ok(path) = std::env::var("ANNALIST_CACHE_PATH") {
            self.cache.path = Some(PathBuf::from(path));
        }

        if let Ok(ttl) = std::env::var("ANNALIST_CACHE_TTL_SECS") {
            self.cache.ttl_secs = ttl
                .parse()
                .map_err(|_| CoreError::Config(format!("invalid ANNALIST_CACHE_TTL_SECS: {ttl}")))?;
        }

        if let Ok(data_dir) = std::env::var("ANNALIST_DATA_DIR") {
            self.import.data_dir = PathBuf::from(data_dir);
        }

        Ok(self)
    }

    /// Load configuration with priority: file > env > defaults
    pub fn load(config_file: Option<&Path>) -> CoreResult<Self> {
        let config = match config_file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(path)?
            }
            Some(path) => {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default().apply_env()?
            }
            None => Self::default().apply_env()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.graph.backend == GraphBackendKind::Sqlite && self.graph.path.is_none() {
            return Err(CoreError::Config(
                "graph backend is sqlite but no graph.path is set".into(),
            ));
        }

        if self.cache.backend == CacheBackendKind::Sqlite && self.cache.path.is_none() {
            return Err(CoreError::Config(
                "cache backend is sqlite but no cache.path is set".into(),
            ));
        }

        if self.cache.ttl_secs == 0 {
            return Err(CoreError::Config("cache.ttl_secs must be positive".into()));
        }

        if self.retrieval.chunk_size == 0
            || self.retrieval.chunk_overlap >= self.retrieval.chunk_size
        {
            return Err(CoreError::InvalidChunking {
                chunk_size: self.retrieval.chunk_size,
                overlap: self.retrieval.chunk_overlap,
            });
        }

        Ok(())
    }
}
