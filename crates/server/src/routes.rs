//! HTTP routes over the mirror interface.
//!
//! Paths match the links produced by body rewriting:
//!
//! - `/`: configured home page
//! - `/{key}`: space homepage
//! - `/{key}/{title}`: page by title, `+` read as a space
//! - `/{key}/{id}/{slug}`: page by id; the slug is ignored
//! - `/download/{type}/{id}/{file}`: attachment bytes
//! - `/reset`: drop every cache entry, then go back where the user came from
//! - `/wiki/...`: authenticated passthrough

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{any, get},
};
use bytes::Bytes;
use convergence_client::{Mirror, ProxyPassthrough, ProxyRequest};
use convergence_core::{AppConfig, CachedResponse, DownloadId, Error, Page};
use serde::Deserialize;

use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub mirror: Mirror,
    pub proxy: ProxyPassthrough,
    pub home_space_key: Arc<str>,
    pub home_page: Arc<str>,
    pub local_root: Arc<str>,
}

impl AppState {
    pub fn new(mirror: Mirror, proxy: ProxyPassthrough, config: &AppConfig) -> Self {
        Self {
            mirror,
            proxy,
            home_space_key: config.home_space_key.as_str().into(),
            home_page: config.home_page.as_str().into(),
            local_root: config.local_root.as_str().into(),
        }
    }
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/reset", get(reset))
        .route("/download/{kind}/{id}/{file}", get(download))
        .route("/wiki", any(passthrough))
        .route("/wiki/{*path}", any(passthrough))
        .route("/{key}", get(space))
        .route("/{key}/", get(space))
        .route("/{key}/{page}", get(page_by_title))
        .route("/{key}/{page}/", get(page_by_id))
        .route("/{key}/{page}/{*slug}", get(page_by_id))
        .fallback(not_found)
}

/// The router, mounted under `local_root` unless that is `/`.
///
/// A nested `/` only answers the bare prefix, so `{prefix}/` is routed to the
/// home page explicitly. Rewritten links and the reset redirect both use it.
pub fn build_app(state: AppState, local_root: &str) -> Router {
    let prefix = local_root.trim_end_matches('/');
    let app = if prefix.is_empty() {
        routes()
    } else {
        Router::new().route(&format!("{prefix}/"), get(home)).nest(prefix, routes())
    };
    app.with_state(state)
}

async fn home(State(state): State<AppState>) -> Result<Response, AppError> {
    if state.home_space_key.is_empty() || state.home_page.is_empty() {
        return Err(Error::NotFound("home page is not configured".into()).into());
    }

    let page = if is_page_id(&state.home_page) {
        state.mirror.get_page_by_id(&state.home_space_key, &state.home_page).await?
    } else {
        state.mirror.get_page_by_title(&state.home_space_key, &state.home_page).await?
    };

    Ok(render_page(&page).into_response())
}

async fn space(State(state): State<AppState>, Path(key): Path<String>) -> Result<Html<String>, AppError> {
    let space = state.mirror.get_space(&key).await?;
    Ok(render_document(&space.name, &space.homepage.body))
}

async fn page_by_title(
    State(state): State<AppState>, Path((key, title)): Path<(String, String)>,
) -> Result<Html<String>, AppError> {
    let title = title.replace('+', " ");
    let page = state.mirror.get_page_by_title(&key, &title).await?;
    Ok(render_page(&page))
}

#[derive(Debug, Deserialize)]
struct PageIdPath {
    key: String,
    page: String,
}

async fn page_by_id(
    State(state): State<AppState>, Path(PageIdPath { key, page }): Path<PageIdPath>,
) -> Result<Html<String>, AppError> {
    state.mirror.get_space(&key).await?;
    let page = state.mirror.get_page_by_id(&key, &page).await?;
    Ok(render_page(&page))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DownloadQuery {
    version: String,
    modification_date: String,
    api: String,
}

async fn download(
    State(state): State<AppState>, Path((kind, id, file)): Path<(String, String, String)>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    let download_id = DownloadId {
        kind,
        id,
        file,
        version: query.version,
        modification_date: query.modification_date,
        api_token: query.api,
    };

    let download = state.mirror.get_download(&download_id).await?;
    let content_type = download
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok(([(header::CONTENT_TYPE, content_type)], download.data).into_response())
}

async fn reset(State(state): State<AppState>, headers: HeaderMap) -> Redirect {
    state.mirror.reset();

    let target = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(&*state.local_root);

    Redirect::temporary(target)
}

async fn passthrough(
    State(state): State<AppState>, method: Method, uri: Uri, body: Bytes,
) -> Result<Response, AppError> {
    let request = ProxyRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        body,
    };

    let response = state.proxy.handle(request).await?;
    Ok(replay(response))
}

async fn not_found() -> AppError {
    AppError(Error::NotFound("no route".into()))
}

fn replay(cached: CachedResponse) -> Response {
    let mut response = Response::new(Body::from(cached.body));
    *response.status_mut() = StatusCode::from_u16(cached.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let headers = response.headers_mut();
    for (name, value) in &cached.headers {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            headers.append(name, value);
        }
    }

    response
}

fn is_page_id(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn render_page(page: &Page) -> Html<String> {
    render_document(&page.title, &page.body)
}

/// Minimal document around an already-sanitized body.
fn render_document(title: &str, body: &str) -> Html<String> {
    let title = escape_text(title);
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n\
         <body>\n<h1>{title}</h1>\n{body}\n</body>\n</html>\n"
    ))
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
