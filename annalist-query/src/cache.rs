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

//! Context Caching Layer
//!
//! Caches the rendered passages of a retrieval result set so the expensive
//! vectorization step runs once per distinct set of relations.
//!
//! ## Cache Key Generation
//!
//! ```text
//! canon(r) = "{len}:{entity1}|{len}:{relation}|{len}:{entity2}"   (len in bytes)
//! key      = "vector_store:" + hex(SHA256(for c in sort(canon(rs)): c || "\n"))
//! ```
//!
//! Sorting makes the key independent of record order. Length prefixes keep
//! names containing `|` from colliding with other splits of the same text.
//!
//! ## Availability
//!
//! The cache is an optimization, never a dependency. An unreachable backend
//! at startup disables caching for the process; a failing or slow call
//! later degrades to a miss (get) or a no-op (put). Only the first failure
//! is logged at `warn`.
//!
//! ## Concurrency
//!
//! Cache-aside without a build lock: concurrent misses on one key may build
//! twice and the last writer wins. With `single_flight` enabled, callers can
//! take a per-key [`FlightGuard`] so only one of them builds.

use annalist_core::{CacheConfig, RelationRecord};
use annalist_storage::{BoundedKvBackend, KvBackend, SharedKvBackend};
use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Prefix of every context cache key
pub const KEY_PREFIX: &str = "vector_store:";

fn canonical(record: &RelationRecord) -> String {
    format!(
        "{}:{}|{}:{}|{}:{}",
        record.entity1.len(),
        record.entity1,
        record.relation.len(),
        record.relation,
        record.entity2.len(),
        record.entity2
    )
}

/// Content-addressed key for a set of relation records
pub fn cache_key(records: &[RelationRecord]) -> String {
    let mut canon: Vec<String> = records.iter().map(canonical).collect();
    canon.sort();

    let mut hasher = Sha256::new();
    for c in &canon {
        hasher.update(c.as_bytes());
        hasher.update(b"\n");
    }

    format!("{}{}", KEY_PREFIX, hex::encode(hasher.finalize()))
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Whether a backend is in use
    pub enabled: bool,
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    /// Backend failures, timeouts and undecodable values
    pub errors: u64,
    /// Cache hit rate (0.0 - 1.0)
    pub hit_rate: f64,
}

type FlightRegistry = DashMap<String, Arc<Mutex<()>>>;

/// Exclusive right to build the value for one key
///
/// Dropping the guard lets the next waiter in; the registry entry is
/// removed when nobody else is waiting.
pub struct FlightGuard {
    key: String,
    registry: Arc<FlightRegistry>,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        // registry + this guard
        self.registry
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) <= 2);
    }
}

/// Passage cache over a key-value backend
pub struct ContextCache {
    backend: Option<SharedKvBackend>,
    ttl: Duration,
    flights: Option<Arc<FlightRegistry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    errors: AtomicU64,
    failure_logged: AtomicBool,
}

impl ContextCache {
    /// Cache that never stores anything
    pub fn disabled() -> Self {
        Self::with_backend(None, Duration::from_secs(0), false)
    }

    fn with_backend(backend: Option<SharedKvBackend>, ttl: Duration, single_flight: bool) -> Self {
        Self {
            backend,
            ttl,
            flights: single_flight.then(|| Arc::new(FlightRegistry::new())),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            puts: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            failure_logged: AtomicBool::new(false),
        }
    }

    /// Wrap `backend` with the configured timeout and check it is reachable
    ///
    /// A `None` backend or a failed ping yields a disabled cache.
    pub async fn connect(backend: Option<SharedKvBackend>, config: &CacheConfig) -> Self {
        let Some(backend) = backend else {
            return Self::disabled();
        };

        let bounded: SharedKvBackend =
            Arc::new(BoundedKvBackend::new(backend, config.op_timeout()));
        if let Err(e) = bounded.ping().await {
            warn!(
                backend = bounded.name(),
                error = %e,
                "Cache backend unreachable, caching disabled"
            );
            return Self::disabled();
        }

        info!(
            backend = bounded.name(),
            ttl_secs = config.ttl_secs,
            single_flight = config.single_flight,
            "Context cache connected"
        );
        Self::with_backend(Some(bounded), config.ttl(), config.single_flight)
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// The timeout-bounded backend, when caching is enabled
    pub fn backend(&self) -> Option<&SharedKvBackend> {
        self.backend.as_ref()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn record_failure(&self, op: &str, error: &dyn std::fmt::Display) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        if !self.failure_logged.swap(true, Ordering::Relaxed) {
            warn!(op, error = %error, "Cache operation failed, continuing without cache");
        } else {
            debug!(op, error = %error, "Cache operation failed");
        }
    }

    /// Cached passages for `key`; any failure is a miss
    pub async fn get(&self, key: &str) -> Option<Vec<String>> {
        let found = match &self.backend {
            None => None,
            Some(backend) => match backend.get(key).await {
                Ok(Some(bytes)) => match serde_json::from_slice::<Vec<String>>(&bytes) {
                    Ok(passages) => Some(passages),
                    Err(e) => {
                        self.errors.fetch_add(1, Ordering::Relaxed);
                        warn!(key, error = %e, "Discarding corrupt cache entry");
                        None
                    }
                },
                Ok(None) => None,
                Err(e) => {
                    self.record_failure("get", &e);
                    None
                }
            },
        };

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key, "Context cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Store `passages` under `key` with the configured TTL, overwriting
    pub async fn put(&self, key: &str, passages: &[String]) {
        let Some(backend) = &self.backend else {
            return;
        };

        let bytes = match serde_json::to_vec(passages) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.record_failure("encode", &e);
                return;
            }
        };

        match backend.set_ex(key, self.ttl, bytes).await {
            Ok(()) => {
                self.puts.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => self.record_failure("put", &e),
        }
    }

    /// Whether a live entry exists for `key`; failures read as absent
    pub async fn exists(&self, key: &str) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        match backend.exists(key).await {
            Ok(found) => found,
            Err(e) => {
                self.record_failure("exists", &e);
                false
            }
        }
    }

    /// Wait for exclusive build rights on `key`
    ///
    /// Returns `None` when single-flight is off or caching is disabled.
    pub async fn begin_flight(&self, key: &str) -> Option<FlightGuard> {
        let registry = self.flights.as_ref().filter(|_| self.is_enabled())?;
        let lock = registry.entry(key.to_string()).or_default().clone();
        let guard = lock.lock_owned().await;

        Some(FlightGuard {
            key: key.to_string(),
            registry: Arc::clone(registry),
            _guard: guard,
        })
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            enabled: self.is_enabled(),
            hits,
            misses,
            puts: self.puts.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annalist_core::CacheBackendKind;
    use annalist_storage::{KvResult, MokaKvBackend, UnavailableKvBackend};
    use async_trait::async_trait;

    fn config() -> CacheConfig {
        CacheConfig {
            backend: CacheBackendKind::Memory,
            path: None,
            ttl_secs: 60,
            max_entries: 100,
            op_timeout_ms: 50,
            single_flight: false,
            persist_index: false,
        }
    }

    async fn memory_cache() -> ContextCache {
        ContextCache::connect(Some(Arc::new(MokaKvBackend::new(100))), &config()).await
    }

    fn record(e1: &str, rel: &str, e2: &str) -> RelationRecord {
        RelationRecord::new(e1, rel, e2, "")
    }

    #[test]
    fn test_key_is_order_independent() {
        let a = vec![record("甲", "父母", "乙"), record("丙", "兄弟", "甲")];
        let b = vec![record("丙", "兄弟", "甲"), record("甲", "父母", "乙")];
        assert_eq!(cache_key(&a), cache_key(&b));
        assert!(cache_key(&a).starts_with(KEY_PREFIX));
        assert_eq!(cache_key(&a).len(), KEY_PREFIX.len() + 64);
    }

    #[test]
    fn test_key_ignores_context() {
        let a = vec![RelationRecord::new("甲", "父母", "乙", "one")];
        let b = vec![RelationRecord::new("甲", "父母", "乙", "two")];
        assert_eq!(cache_key(&a), cache_key(&b));
    }

    #[test]
    fn test_key_separator_ambiguity() {
        let a = vec![record("a|b", "r", "c")];
        let b = vec![record("a", "b|r", "c")];
        assert_ne!(cache_key(&a), cache_key(&b));
    }

    #[test]
    fn test_key_direction_matters() {
        let a = vec![record("甲", "父母", "乙")];
        let b = vec![record("乙", "父母", "甲")];
        assert_ne!(cache_key(&a), cache_key(&b));
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = memory_cache().await;
        let passages = vec!["甲与乙之间的关系是父母。具体描述：".to_string()];

        assert_eq!(cache.get("vector_store:x").await, None);
        cache.put("vector_store:x", &passages).await;
        assert!(cache.exists("vector_store:x").await);
        assert_eq!(cache.get("vector_store:x").await, Some(passages));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.puts), (1, 1, 1));
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_miss() {
        let backend = Arc::new(MokaKvBackend::new(10));
        backend
            .set_ex("vector_store:bad", Duration::from_secs(60), b"not json".to_vec())
            .await
            .unwrap();
        let cache = ContextCache::connect(Some(backend), &config()).await;

        assert_eq!(cache.get("vector_store:bad").await, None);
        assert_eq!(cache.stats().errors, 1);
    }

    #[tokio::test]
    async fn test_unreachable_backend_disables_cache() {
        let cache =
            ContextCache::connect(Some(Arc::new(UnavailableKvBackend::new("refused"))), &config())
                .await;
        assert!(!cache.is_enabled());

        cache.put("k", &["p".to_string()]).await;
        assert_eq!(cache.get("k").await, None);
        assert!(cache.begin_flight("k").await.is_none());
    }

    /// Answers the ping, then hangs on every other call
    struct StallingBackend;

    #[async_trait]
    impl KvBackend for StallingBackend {
        fn name(&self) -> &'static str {
            "stalling"
        }

        async fn ping(&self) -> KvResult<()> {
            Ok(())
        }

        async fn get(&self, _key: &str) -> KvResult<Option<Vec<u8>>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }

        async fn set_ex(&self, _key: &str, _ttl: Duration, _value: Vec<u8>) -> KvResult<()> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }

        async fn exists(&self, _key: &str) -> KvResult<bool> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_slow_backend_degrades_to_miss() {
        let cache = ContextCache::connect(Some(Arc::new(StallingBackend)), &config()).await;
        assert!(cache.is_enabled());

        assert_eq!(cache.get("k").await, None);
        cache.put("k", &["p".to_string()]).await;

        let stats = cache.stats();
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.puts, 0);
    }

    #[tokio::test]
    async fn test_single_flight_serializes_builders() {
        let cache = Arc::new(
            ContextCache::connect(
                Some(Arc::new(MokaKvBackend::new(10))),
                &CacheConfig {
                    single_flight: true,
                    ..config()
                },
            )
            .await,
        );

        let first = cache.begin_flight("k").await;
        assert!(first.is_some());

        let waiter = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.begin_flight("k").await.is_some() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        assert!(waiter.await.unwrap());
        assert!(cache.flights.as_ref().unwrap().is_empty());
    }
}
