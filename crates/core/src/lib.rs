//! Core types and shared functionality for convergence.
//!
//! This crate provides:
//! - Domain model for mirrored spaces, pages and downloads
//! - Multi-pool TTL cache
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod model;

pub use cache::{CacheConfig, CacheStore, Metadata, PoolConfig};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use model::{CachedResponse, Download, DownloadId, Page, Space};
