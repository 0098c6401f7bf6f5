//! Authenticated client for the upstream REST API.
//!
//! ### Endpoints (relative to the configured base URL)
//! - `wiki/rest/api/space`: full space collection with description and homepage body
//! - `wiki/rest/api/content`: title search scoped to a space
//! - `wiki/rest/api/content/{id}`: a single page
//! - `wiki/download/{type}/{id}/{file}`: attachment bytes
//!
//! ### Failure policy
//! - Every request carries the same basic-auth credentials.
//! - Nothing is retried; transport failures, empty bodies and malformed JSON
//!   surface as distinct [`Error`] variants.
//! - This client does not cache. See [`crate::Mirror`].

pub mod response;

use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use convergence_core::{AppConfig, ConfigError, Download, DownloadId, Error, Page, Space};
use reqwest::{Client, RequestBuilder, StatusCode, header};
use serde::de::DeserializeOwned;
use url::Url;

use response::{ApiContent, ContentList, SpaceList};

/// Expansions requested on the space collection.
const SPACE_EXPAND: &str = "description.view,homepage.body.view";

/// Expansions requested on content lookups.
const CONTENT_EXPAND: &str = "body.view";

/// Connection settings for the upstream host.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL, always ending in `/`.
    pub base_url: Url,
    pub username: String,
    pub password: String,
    /// User agent string (default: "convergence/0.1")
    pub user_agent: String,
    /// Request timeout (default: 20s)
    pub timeout: Duration,
    /// Page size requested from the space collection (default: 100)
    pub space_limit: u32,
}

impl UpstreamConfig {
    /// Create a config with defaults for everything but the host and credentials.
    pub fn new(base_url: Url, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base_url,
            username: username.into(),
            password: password.into(),
            user_agent: "convergence/0.1".to_string(),
            timeout: Duration::from_millis(20_000),
            space_limit: 100,
        }
    }

    /// Derive the upstream settings from the application config.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: config.base_url()?,
            username: config.username.clone(),
            password: config.password.clone(),
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            space_limit: config.space_limit,
        })
    }
}

/// Raw HTTP access to spaces, pages and downloads.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    /// Create a new upstream client with the given configuration.
    pub fn new(config: UpstreamConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Fetch and parse the full space collection in one round trip.
    ///
    /// Bodies are returned exactly as the upstream rendered them.
    pub async fn fetch_spaces(&self) -> Result<Vec<Space>, Error> {
        let url = self.endpoint(&["wiki", "rest", "api", "space"])?;
        let limit = self.config.space_limit.to_string();
        let request = self
            .http
            .get(url)
            .query(&[("expand", SPACE_EXPAND), ("limit", limit.as_str())]);

        let list: SpaceList = self.send_json(request, "space listing").await?;
        Ok(list.results.into_iter().map(Space::from).collect())
    }

    /// Fetch a page through the direct content resource.
    pub async fn fetch_page_by_id(&self, id: &str) -> Result<Page, Error> {
        let url = self.endpoint(&["wiki", "rest", "api", "content", id])?;
        let request = self.http.get(url).query(&[("expand", CONTENT_EXPAND)]);

        let content: ApiContent = self.send_json(request, &format!("page {id}")).await?;
        Ok(Page::from(content))
    }

    /// Find a page by exact title within one space.
    ///
    /// Zero search results is reported as [`Error::NotFound`].
    pub async fn fetch_page_by_title(&self, space_key: &str, title: &str) -> Result<Page, Error> {
        let url = self.endpoint(&["wiki", "rest", "api", "content"])?;
        let request = self.http.get(url).query(&[
            ("title", title),
            ("type", "page"),
            ("spaceKey", space_key),
            ("expand", CONTENT_EXPAND),
        ]);

        let what = format!("page '{title}' in space {space_key}");
        let list: ContentList = self.send_json(request, &what).await?;

        list.results
            .into_iter()
            .next()
            .map(Page::from)
            .ok_or(Error::NotFound(what))
    }

    /// Fetch attachment bytes.
    ///
    /// The upstream answers missing attachments with `200` and an empty body,
    /// so an empty payload is [`Error::NotFound`] rather than a success.
    pub async fn fetch_download(&self, download: &DownloadId) -> Result<Download, Error> {
        let url = self.endpoint(&["wiki", "download", &download.kind, &download.id, &download.file])?;
        let request = self
            .http
            .get(url)
            .header(header::ACCEPT, "*/*")
            .query(&[
                ("version", download.version.as_str()),
                ("modificationDate", download.modification_date.as_str()),
                ("api", download.api_token.as_str()),
            ]);

        let what = format!("download {}/{}/{}", download.kind, download.id, download.file);
        let (headers, data) = self.send(request, &what).await?;

        if data.is_empty() {
            return Err(Error::NotFound(what));
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        Ok(Download { data, content_type, fetched_at: Utc::now() })
    }

    /// Build an endpoint URL under the base, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidInput(format!("base URL cannot be a base: {}", self.config.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send an authenticated request, returning headers and the full body.
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<(header::HeaderMap, Bytes), Error> {
        let start = Instant::now();

        let response = request
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{what}: network error: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(what.to_string()));
        }
        if !status.is_success() {
            return Err(Error::Transport(format!("{what}: status {}", status.as_u16())));
        }

        let headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("{what}: failed to read response: {e}")))?;

        tracing::debug!(
            what,
            status = status.as_u16(),
            bytes = bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "upstream request completed"
        );

        Ok((headers, bytes))
    }

    /// Send an authenticated JSON request and parse the body.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T, Error> {
        let request = request.header(header::ACCEPT, "application/json, */*");
        let (_, bytes) = self.send(request, what).await?;

        if bytes.is_empty() {
            return Err(Error::EmptyResponse(what.to_string()));
        }

        serde_json::from_slice(&bytes).map_err(|e| Error::Parse(format!("{what}: {e}")))
    }
}
