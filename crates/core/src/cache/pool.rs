//! A single TTL cache pool.
//!
//! Each pool wraps a moka cache configured with a time-to-live. The live
//! cache sits behind a swappable handle: [`Pool::reset`] installs a fresh,
//! empty cache while callers that already cloned the previous handle finish
//! against it undisturbed.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use moka::future::Cache;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::Error;

/// Expiration tunables for one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// How long an entry stays valid after insertion.
    pub ttl: Duration,
    /// How often expired entries are purged, independent of reads.
    pub sweep_interval: Duration,
}

impl PoolConfig {
    pub const fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        Self { ttl, sweep_interval }
    }
}

/// Independently configured TTL cache keyed by string.
pub struct Pool<V> {
    name: &'static str,
    config: PoolConfig,
    current: RwLock<Cache<String, V>>,
}

impl<V> Pool<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty pool.
    pub fn new(name: &'static str, config: PoolConfig) -> Self {
        Self { name, config, current: RwLock::new(Self::build(name, &config)) }
    }

    fn build(name: &'static str, config: &PoolConfig) -> Cache<String, V> {
        Cache::builder().name(name).time_to_live(config.ttl).build()
    }

    /// Clone the live cache handle. The lock is held only for the clone.
    fn handle(&self) -> Cache<String, V> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                tracing::warn!(pool = self.name, "recovered poisoned cache handle lock");
                poisoned.into_inner().clone()
            }
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Look up a live entry. Expired entries are never returned.
    pub async fn get(&self, key: &str) -> Option<V> {
        let value = self.handle().get(key).await;
        tracing::debug!(pool = self.name, key, hit = value.is_some(), "cache lookup");
        value
    }

    /// Insert or replace an entry, restarting its TTL.
    pub async fn insert(&self, key: String, value: V) {
        tracing::debug!(pool = self.name, key = %key, "cache insert");
        self.handle().insert(key, value).await;
    }

    /// Return the cached value or run `init` to produce it.
    ///
    /// Concurrent callers missing on the same key share one `init` run and
    /// all observe its outcome. Errors are handed to every waiter and never
    /// stored.
    pub async fn get_or_try_insert_with<F>(&self, key: String, init: F) -> Result<V, Error>
    where
        F: Future<Output = Result<V, Error>>,
    {
        self.handle()
            .try_get_with(key, init)
            .await
            .map_err(Arc::unwrap_or_clone)
    }

    /// Like [`Pool::get_or_try_insert_with`], but `init` also yields extra
    /// entries that describe the same value under other keys.
    ///
    /// The extra entries are written to the same cache generation as `key`.
    /// If the pool is reset while `init` runs, none of them reach the fresh
    /// cache.
    pub async fn get_or_try_insert_linked<F>(&self, key: String, init: F) -> Result<V, Error>
    where
        F: Future<Output = Result<(V, Vec<(String, V)>), Error>>,
    {
        let cache = self.handle();
        let generation = cache.clone();

        cache
            .try_get_with(key, async move {
                let (value, linked) = init.await?;
                for (linked_key, linked_value) in linked {
                    generation.insert(linked_key, linked_value).await;
                }
                Ok(value)
            })
            .await
            .map_err(Arc::unwrap_or_clone)
    }

    /// Replace the live cache with an empty one.
    ///
    /// Holders of the previous handle keep a consistent view until they
    /// drop it; the old cache is abandoned, never mutated.
    pub fn reset(&self) {
        let fresh = Self::build(self.name, &self.config);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = fresh;
        tracing::info!(pool = self.name, "cache pool reset");
    }

    /// Purge expired entries now.
    pub async fn sweep(&self) {
        let handle = self.handle();
        handle.run_pending_tasks().await;
        tracing::debug!(pool = self.name, entries = handle.entry_count(), "cache pool swept");
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.handle().entry_count()
    }

    /// Start the periodic sweep task for this pool.
    ///
    /// The task holds only a weak reference and exits once the pool is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let pool = Arc::downgrade(self);
        let period = self.config.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(pool) = pool.upgrade() else { break };
                pool.sweep().await;
            }
        })
    }
}
