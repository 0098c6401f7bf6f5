//! Cache-fronted access to spaces, pages and downloads.
//!
//! Every accessor checks its pool first and only reaches the upstream on a
//! miss. Concurrent misses on one key share a single upstream call. Bodies are
//! transformed once, before they are stored, so every cache hit is already in
//! its served form.

use std::sync::Arc;

use convergence_core::cache::hash::{SPACES_KEY, download_key, page_id_key, page_title_key};
use convergence_core::{CacheStore, Download, DownloadId, Error, Metadata, Page, Space};

use crate::transform::BodyProcessor;
use crate::upstream::UpstreamClient;

/// The interface consumed by the routing layer.
#[derive(Clone)]
pub struct Mirror {
    upstream: UpstreamClient,
    cache: Arc<CacheStore>,
    processor: Arc<dyn BodyProcessor>,
}

impl Mirror {
    pub fn new(upstream: UpstreamClient, cache: Arc<CacheStore>, processor: Arc<dyn BodyProcessor>) -> Self {
        Self { upstream, cache, processor }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// All spaces, with descriptions and homepage bodies transformed.
    pub async fn list_spaces(&self) -> Result<Arc<Vec<Space>>, Error> {
        self.cache
            .metadata()
            .get_or_try_insert_with(SPACES_KEY.to_string(), async {
                let spaces = self.upstream.fetch_spaces().await?;
                let spaces = spaces.into_iter().map(|space| self.transform_space(space)).collect();
                tracing::info!(key = SPACES_KEY, "space listing fetched");
                Ok(Metadata::Spaces(Arc::new(spaces)))
            })
            .await?
            .into_spaces()
    }

    /// One space from the cached listing.
    pub async fn get_space(&self, key: &str) -> Result<Space, Error> {
        require("space key", key)?;

        self.list_spaces()
            .await?
            .iter()
            .find(|space| space.key == key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("space {key}")))
    }

    /// A page by its numeric id, transformed in the context of `space_key`.
    ///
    /// The result is also stored under its title key.
    pub async fn get_page_by_id(&self, space_key: &str, id: &str) -> Result<Arc<Page>, Error> {
        require("space key", space_key)?;
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidInput(format!("page id must be numeric, got '{id}'")));
        }

        self.cache
            .metadata()
            .get_or_try_insert_linked(page_id_key(space_key, id), async {
                let page = self.prepare_page(self.upstream.fetch_page_by_id(id).await?, space_key);
                let title_key = page_title_key(space_key, &page.title);
                Ok((Metadata::Page(page.clone()), vec![(title_key, Metadata::Page(page))]))
            })
            .await?
            .into_page()
    }

    /// A page by exact title within `space_key`.
    ///
    /// The result is also stored under its id key.
    pub async fn get_page_by_title(&self, space_key: &str, title: &str) -> Result<Arc<Page>, Error> {
        require("space key", space_key)?;
        require("page title", title)?;

        self.cache
            .metadata()
            .get_or_try_insert_linked(page_title_key(space_key, title), async {
                let page = self.prepare_page(self.upstream.fetch_page_by_title(space_key, title).await?, space_key);
                let id_key = page_id_key(space_key, &page.id);
                Ok((Metadata::Page(page.clone()), vec![(id_key, Metadata::Page(page))]))
            })
            .await?
            .into_page()
    }

    /// Attachment bytes for an identity tuple.
    pub async fn get_download(&self, download: &DownloadId) -> Result<Download, Error> {
        require("download type", &download.kind)?;
        require("download id", &download.id)?;
        require("download file", &download.file)?;

        self.cache
            .downloads()
            .get_or_try_insert_with(download_key(download), self.upstream.fetch_download(download))
            .await
    }

    /// Drop every cached entry.
    pub fn reset(&self) {
        self.cache.reset();
        tracing::info!("mirror cache reset");
    }

    fn transform_space(&self, mut space: Space) -> Space {
        space.description = self.processor.process(&space.description, &space.key);
        space.homepage.body = self.processor.process(&space.homepage.body, &space.key);
        space
    }

    fn prepare_page(&self, mut page: Page, space_key: &str) -> Arc<Page> {
        page.body = self.processor.process(&page.body, space_key);
        Arc::new(page)
    }
}

fn require(what: &str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{what} must not be empty")));
    }
    Ok(())
}
