//! The multi-pool cache store.
//!
//! One pool per data class, each with its own TTL and sweep interval:
//!
//! - `metadata`: space enumeration and pages. Changes often upstream.
//! - `downloads`: attachment payloads. Effectively immutable per identity tuple.
//! - `responses`: whole proxied HTTP responses.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::pool::{Pool, PoolConfig};
use crate::Error;
use crate::model::{CachedResponse, Download, Page, Space};

/// Value stored in the metadata pool.
#[derive(Debug, Clone)]
pub enum Metadata {
    Spaces(Arc<Vec<Space>>),
    Page(Arc<Page>),
}

impl Metadata {
    pub fn into_spaces(self) -> Result<Arc<Vec<Space>>, Error> {
        match self {
            Metadata::Spaces(spaces) => Ok(spaces),
            Metadata::Page(page) => {
                Err(Error::Parse(format!("expected space listing in cache, found page {}", page.id)))
            }
        }
    }

    pub fn into_page(self) -> Result<Arc<Page>, Error> {
        match self {
            Metadata::Page(page) => Ok(page),
            Metadata::Spaces(_) => Err(Error::Parse("expected page in cache, found space listing".into())),
        }
    }
}

/// Expiration settings for every pool in a [`CacheStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub metadata: PoolConfig,
    pub downloads: PoolConfig,
    pub responses: PoolConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            metadata: PoolConfig::new(Duration::from_secs(30 * 60), Duration::from_secs(5 * 60)),
            downloads: PoolConfig::new(Duration::from_secs(24 * 60 * 60), Duration::from_secs(60 * 60)),
            responses: PoolConfig::new(Duration::from_secs(60 * 60), Duration::from_secs(10 * 60)),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(mut self, config: PoolConfig) -> Self {
        self.metadata = config;
        self
    }

    pub fn downloads(mut self, config: PoolConfig) -> Self {
        self.downloads = config;
        self
    }

    pub fn responses(mut self, config: PoolConfig) -> Self {
        self.responses = config;
        self
    }
}

/// Process-local cache shared by the mirror and the passthrough proxy.
///
/// Constructed explicitly and passed by `Arc` to its users. Lifecycle:
/// [`CacheStore::new`], optionally [`CacheStore::spawn_sweepers`],
/// [`CacheStore::reset`] any number of times, [`CacheStore::teardown`].
pub struct CacheStore {
    metadata: Arc<Pool<Metadata>>,
    downloads: Arc<Pool<Download>>,
    responses: Arc<Pool<CachedResponse>>,
    sweepers: Mutex<Vec<JoinHandle<()>>>,
}

impl CacheStore {
    /// Create a store with empty pools. No background tasks are started.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            metadata: Arc::new(Pool::new("metadata", config.metadata)),
            downloads: Arc::new(Pool::new("downloads", config.downloads)),
            responses: Arc::new(Pool::new("responses", config.responses)),
            sweepers: Mutex::new(Vec::new()),
        }
    }

    pub fn metadata(&self) -> &Pool<Metadata> {
        &self.metadata
    }

    pub fn downloads(&self) -> &Pool<Download> {
        &self.downloads
    }

    pub fn responses(&self) -> &Pool<CachedResponse> {
        &self.responses
    }

    /// Start one sweep task per pool. Must be called inside a tokio runtime.
    ///
    /// Calling it again replaces the running sweepers.
    pub fn spawn_sweepers(&self) {
        let handles = vec![
            self.metadata.spawn_sweeper(),
            self.downloads.spawn_sweeper(),
            self.responses.spawn_sweeper(),
        ];

        let mut sweepers = self.sweepers.lock().unwrap_or_else(PoisonError::into_inner);
        for old in sweepers.drain(..) {
            old.abort();
        }
        *sweepers = handles;
    }

    /// Empty every pool immediately.
    pub fn reset(&self) {
        self.metadata.reset();
        self.downloads.reset();
        self.responses.reset();
    }

    /// Stop the sweepers and drop all cached contents.
    pub fn teardown(&self) {
        let mut sweepers = self.sweepers.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in sweepers.drain(..) {
            handle.abort();
        }
        drop(sweepers);

        self.reset();
        tracing::info!("cache store torn down");
    }
}

impl Drop for CacheStore {
    fn drop(&mut self) {
        let sweepers = self.sweepers.get_mut().unwrap_or_else(PoisonError::into_inner);
        for handle in sweepers.drain(..) {
            handle.abort();
        }
    }
}
