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

//! Key-value backends
//!
//! The minimal `GET` / `SETEX` / `EXISTS` surface the context cache needs.
//! Values are opaque bytes; each entry carries its own time-to-live.

mod memory;
mod sqlite;

pub use memory::MokaKvBackend;
pub use sqlite::SqliteKvBackend;

use crate::error::{KvError, KvResult};
use annalist_core::{CacheBackendKind, CacheConfig};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Shared handle to a key-value backend
pub type SharedKvBackend = Arc<dyn KvBackend>;

/// Byte-valued store with per-entry expiry
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Connectivity check
    async fn ping(&self) -> KvResult<()>;

    /// Value for `key`, or `None` when absent or expired
    async fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value, expiring
    /// after `ttl`
    async fn set_ex(&self, key: &str, ttl: Duration, value: Vec<u8>) -> KvResult<()>;

    /// Whether a live entry exists for `key`
    async fn exists(&self, key: &str) -> KvResult<bool>;
}

/// Applies a time budget to every call of the wrapped backend
pub struct BoundedKvBackend {
    inner: SharedKvBackend,
    timeout: Duration,
}

impl BoundedKvBackend {
    pub fn new(inner: SharedKvBackend, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T: Send>(
        &self,
        op: impl Future<Output = KvResult<T>> + Send,
    ) -> KvResult<T> {
        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| KvError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl KvBackend for BoundedKvBackend {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn ping(&self) -> KvResult<()> {
        self.bounded(self.inner.ping()).await
    }

    async fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        self.bounded(self.inner.get(key)).await
    }

    async fn set_ex(&self, key: &str, ttl: Duration, value: Vec<u8>) -> KvResult<()> {
        self.bounded(self.inner.set_ex(key, ttl, value)).await
    }

    async fn exists(&self, key: &str) -> KvResult<bool> {
        self.bounded(self.inner.exists(key)).await
    }
}

/// Backend that fails every call
///
/// Stands in for an unreachable cache server.
#[derive(Debug, Clone)]
pub struct UnavailableKvBackend {
    reason: String,
}

impl UnavailableKvBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> KvResult<T> {
        Err(KvError::Unavailable(self.reason.clone()))
    }
}

#[async_trait]
impl KvBackend for UnavailableKvBackend {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn ping(&self) -> KvResult<()> {
        self.fail()
    }

    async fn get(&self, _key: &str) -> KvResult<Option<Vec<u8>>> {
        self.fail()
    }

    async fn set_ex(&self, _key: &str, _ttl: Duration, _value: Vec<u8>) -> KvResult<()> {
        self.fail()
    }

    async fn exists(&self, _key: &str) -> KvResult<bool> {
        self.fail()
    }
}

/// Build the configured cache backend
///
/// Returns `Ok(None)` when caching is disabled. The backend is not pinged
/// here; the cache decides what an unreachable backend means.
pub fn open_kv_backend(config: &CacheConfig) -> KvResult<Option<SharedKvBackend>> {
    let backend: SharedKvBackend = match config.backend {
        CacheBackendKind::Disabled => {
            info!("Context cache disabled by configuration");
            return Ok(None);
        }
        CacheBackendKind::Memory => Arc::new(MokaKvBackend::new(config.max_entries)),
        CacheBackendKind::Sqlite => {
            let path = config.path.as_ref().ok_or_else(|| {
                KvError::Unavailable("sqlite cache backend requires a path".into())
            })?;
            Arc::new(SqliteKvBackend::open(path)?)
        }
    };

    info!(backend = backend.name(), "Cache backend opened");
    Ok(Some(backend))
}
