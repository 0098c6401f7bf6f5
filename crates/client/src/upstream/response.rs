//! Upstream REST API response types and conversion into domain entities.

use convergence_core::{Page, Space};
use serde::{Deserialize, Deserializer, de};
use serde_json::Value;

/// Raw response from the space collection endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct SpaceList {
    pub results: Vec<ApiSpace>,
}

/// Raw response from the content search endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ContentList {
    pub results: Vec<ApiContent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiSpace {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<ApiRendered>,
    #[serde(default)]
    pub homepage: Option<ApiContent>,
}

/// A single content item: the page returned by id, or one search hit.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiContent {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub body: Option<ApiRendered>,
    #[serde(rename = "_links", default)]
    pub links: Option<ApiLinks>,
}

/// Expandable rendered representation (`description.view`, `body.view`).
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiRendered {
    #[serde(default)]
    pub view: Option<ApiValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiValue {
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiLinks {
    #[serde(default)]
    pub webui: Option<String>,
}

impl ApiRendered {
    fn into_html(self) -> String {
        self.view.map(|v| v.value).unwrap_or_default()
    }
}

impl From<ApiContent> for Page {
    fn from(content: ApiContent) -> Self {
        Page {
            id: content.id,
            title: content.title,
            status: content.status,
            body: content.body.map(ApiRendered::into_html).unwrap_or_default(),
            link: content.links.and_then(|l| l.webui).unwrap_or_default(),
        }
    }
}

impl From<ApiSpace> for Space {
    fn from(space: ApiSpace) -> Self {
        Space {
            id: space.id,
            key: space.key,
            name: space.name,
            description: space.description.map(ApiRendered::into_html).unwrap_or_default(),
            homepage: space.homepage.map(Page::from).unwrap_or_default(),
        }
    }
}

/// Identifiers arrive as JSON strings for content and as numbers for spaces.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("expected string or number id, got {other}"))),
    }
}
