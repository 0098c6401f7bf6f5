//! Cache key composition.
//!
//! One key scheme per data class. Nothing is normalized, so two requests that
//! differ in any field never share an entry. Page key components have their
//! `:` separators escaped.

use std::borrow::Cow;

use crate::model::DownloadId;
use sha2::{Digest, Sha256};

/// Key of the single entry holding the full space enumeration.
pub const SPACES_KEY: &str = "spaces:all";

/// Key for a page addressed by id.
pub fn page_id_key(space_key: &str, id: &str) -> String {
    format!("page:{}:id:{}", escape_component(space_key), escape_component(id))
}

/// Key for a page addressed by title.
pub fn page_title_key(space_key: &str, title: &str) -> String {
    format!("page:{}:title:{}", escape_component(space_key), escape_component(title))
}

/// Percent-escape the separator so a component can never spill into the next field.
fn escape_component(value: &str) -> Cow<'_, str> {
    if value.contains(['%', ':']) {
        Cow::Owned(value.replace('%', "%25").replace(':', "%3A"))
    } else {
        Cow::Borrowed(value)
    }
}

/// Content-addressed key for a download identity tuple.
///
/// Fields are separated by `\n`, which cannot occur in a request path or
/// query value, so adjacent fields never bleed into each other.
pub fn download_key(id: &DownloadId) -> String {
    let mut hasher = Sha256::new();
    for field in [&id.kind, &id.id, &id.file, &id.version, &id.modification_date, &id.api_token] {
        hasher.update(field.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Key for a proxied response: the exact inbound path and query.
pub fn response_key(path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) => format!("{path}?{q}"),
        None => path.to_string(),
    }
}
