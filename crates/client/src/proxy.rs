//! Authenticated passthrough to the upstream host.
//!
//! Only `GET` is mirrored. A request is answered from the response pool when
//! its exact path and query were seen before; otherwise it is forwarded with
//! credentials injected, read in full, stored and replayed. Bodies are kept
//! byte-exact: no decompression, no transformation.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use convergence_core::cache::hash::response_key;
use convergence_core::{CacheStore, CachedResponse, Error};
use reqwest::{Client, Method, redirect};
use url::Url;

use crate::upstream::UpstreamConfig;

/// Response headers that describe the upstream connection rather than the
/// resource, or that must not be replayed to other clients.
const STRIPPED_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "set-cookie",
];

/// An inbound request to forward.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Path relative to the local root, e.g. `/wiki/s/batch.css`.
    pub path: String,
    pub query: Option<String>,
    pub body: Bytes,
}

impl ProxyRequest {
    pub fn get(path: impl Into<String>, query: Option<String>) -> Self {
        Self { method: Method::GET, path: path.into(), query, body: Bytes::new() }
    }
}

/// Cached, credential-injecting forwarder.
#[derive(Clone)]
pub struct ProxyPassthrough {
    http: Client,
    config: UpstreamConfig,
    cache: Arc<CacheStore>,
}

impl ProxyPassthrough {
    pub fn new(config: UpstreamConfig, cache: Arc<CacheStore>) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(false)
            .brotli(false)
            .deflate(false)
            .redirect(redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Transport(format!("failed to build proxy HTTP client: {e}")))?;

        Ok(Self { http, config, cache })
    }

    /// Answer `request` from cache or upstream.
    ///
    /// Non-GET requests are rejected without contacting the upstream. Upstream
    /// 5xx responses are returned but not stored.
    pub async fn handle(&self, request: ProxyRequest) -> Result<CachedResponse, Error> {
        if request.method != Method::GET {
            return Err(Error::MethodNotAllowed(format!("{} {}", request.method, request.path)));
        }

        let key = response_key(&request.path, request.query.as_deref());
        if let Some(cached) = self.cache.responses().get(&key).await {
            return Ok(cached);
        }

        let response = self.forward(&request).await?;

        if response.status < 500 {
            self.cache.responses().insert(key, response.clone()).await;
        } else {
            tracing::warn!(key = %key, status = response.status, "upstream server error not cached");
        }

        Ok(response)
    }

    fn upstream_url(&self, request: &ProxyRequest) -> Result<Url, Error> {
        let mut url = self
            .config
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|e| Error::InvalidInput(format!("invalid proxy path '{}': {e}", request.path)))?;
        url.set_query(request.query.as_deref());
        Ok(url)
    }

    async fn forward(&self, request: &ProxyRequest) -> Result<CachedResponse, Error> {
        let url = self.upstream_url(request)?;
        let start = Instant::now();

        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .basic_auth(&self.config.username, Some(&self.config.password));
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(format!("proxy {url}: network error: {e}")))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !STRIPPED_HEADERS.contains(&name.as_str()))
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("proxy {url}: failed to read response: {e}")))?;

        tracing::debug!(
            url = %url,
            status,
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "proxied upstream request"
        );

        Ok(CachedResponse { status, headers, body, fetched_at: Utc::now() })
    }
}
