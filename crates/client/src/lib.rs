//! Client code for convergence.
//!
//! This crate provides the upstream HTTP client, the cache-fronted mirror
//! interface, body transformation and the passthrough proxy used by the
//! server.

pub mod mirror;
pub mod proxy;
pub mod transform;
pub mod upstream;

pub use mirror::Mirror;
pub use proxy::{ProxyPassthrough, ProxyRequest};
pub use transform::{BodyProcessor, LinkStrategy, TransformConfig, Transformer};
pub use upstream::{UpstreamClient, UpstreamConfig};
