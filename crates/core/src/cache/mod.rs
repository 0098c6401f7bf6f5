//! In-memory TTL cache with independently tuned pools.
//!
//! This module provides the memory-resident cache in front of the upstream
//! store. It supports:
//!
//! - One pool per data class (metadata, downloads, proxied responses)
//! - Per-pool TTL and background sweep interval
//! - Atomic reset that never disturbs in-flight readers
//! - Coalescing of concurrent misses on the same key

pub mod hash;
pub mod pool;
pub mod store;

pub use pool::{Pool, PoolConfig};
pub use store::{CacheConfig, CacheStore, Metadata};
