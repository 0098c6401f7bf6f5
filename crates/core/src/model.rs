//! Domain entities mirrored from the upstream store.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named collection of pages, addressed by its short key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    pub key: String,
    pub name: String,
    /// Sanitized, link-rewritten HTML.
    pub description: String,
    pub homepage: Page,
}

/// A single document within a space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub title: String,
    pub status: String,
    /// Sanitized, link-rewritten HTML.
    pub body: String,
    /// Upstream web UI path for this page, e.g. `/spaces/ENG/pages/42/Title`.
    pub link: String,
}

/// Identity tuple of a binary attachment.
///
/// Opaque: fields are compared and hashed exactly as received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DownloadId {
    /// Resource type path segment, e.g. `attachments` or `thumbnails`.
    pub kind: String,
    pub id: String,
    pub file: String,
    pub version: String,
    pub modification_date: String,
    pub api_token: String,
}

/// Raw attachment payload.
#[derive(Debug, Clone)]
pub struct Download {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// A whole upstream HTTP response kept for byte-exact replay.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    /// Header multimap in upstream order; repeated names are kept.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub fetched_at: DateTime<Utc>,
}

impl CachedResponse {
    /// All values for a header name, compared case-insensitively.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_values_multimap() {
        let response = CachedResponse {
            status: 200,
            headers: vec![
                ("Vary".to_string(), "Accept".to_string()),
                ("content-type".to_string(), "image/png".to_string()),
                ("vary".to_string(), "Accept-Encoding".to_string()),
            ],
            body: Bytes::from_static(b"\x89PNG"),
            fetched_at: Utc::now(),
        };

        let vary: Vec<_> = response.header_values("VARY").collect();
        assert_eq!(vary, vec!["Accept", "Accept-Encoding"]);
        assert_eq!(response.header_values("content-type").next(), Some("image/png"));
        assert!(response.header_values("etag").next().is_none());
    }

    #[test]
    fn test_download_id_is_exact() {
        let a = DownloadId {
            kind: "attachments".into(),
            id: "42".into(),
            file: "diagram.png".into(),
            version: "1".into(),
            modification_date: "1500000000000".into(),
            api_token: "v2".into(),
        };
        let b = DownloadId { version: "01".into(), ..a.clone() };
        assert_ne!(a, b);
    }
}
