//! Link rewriting from upstream URL shapes to local routes.
//!
//! Two strategies produce the same routes for every known shape:
//!
//! - [`rewrite_links`] walks the document and rewrites only reference
//!   attributes (`a[href]`, `img[src]`, `link[href]`, `source[src]`).
//! - [`rewrite_links_legacy`] performs literal substitution over the raw
//!   markup. Kept for compatibility testing and as a fallback when the
//!   document cannot be streamed.
//!
//! Known shapes, relative to the upstream base:
//!
//! | upstream                                        | local                           |
//! |-------------------------------------------------|---------------------------------|
//! | `/wiki/spaces/{KEY}/pages/{ID}/{rest}`          | `{root}{current}/{ID}/{rest}`   |
//! | `/wiki/pages/viewpage.action?pageId={ID}`       | `{root}{current}/{ID}/`         |
//! | `/wiki/download/{type}/{id}/{file}?{query}`     | `{root}download/{type}/{id}/{file}?{query}` |
//! | `/wiki/display/{KEY}/{Title}`                   | `{root}{KEY}/{Title}`           |
//! | `/wiki/spaces/{KEY}[/overview]`                 | `{root}{KEY}`                   |
//!
//! Anything else under the upstream base keeps its path and becomes relative
//! to the local root. Markup matching none of these is left untouched.

use std::sync::LazyLock;

use lol_html::errors::RewritingError;
use lol_html::{RewriteStrSettings, element, rewrite_str};
use regex::{Captures, Regex};
use url::Url;

static PAGE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/wiki/spaces/[^/?#]+/pages/([0-9]+)/?(.*)$").expect("valid page path regex"));

static VIEWPAGE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/wiki/pages/viewpage\.action\?(?:[^#]*&(?:amp;)?)?pageId=([0-9]+)[^#]*(#.*)?$")
        .expect("valid viewpage regex")
});

static DOWNLOAD_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/wiki/download/(.+)$").expect("valid download regex"));

static SPACE_OVERVIEW_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/wiki/spaces/([^/?#]+)(?:/overview)?/?((?:[?#].*)?)$").expect("valid space overview regex")
});

static LEGACY_PAGE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""/wiki/spaces/([A-Za-z0-9~]+)/pages/([0-9]+)/?([^"\s]*)""#).expect("valid legacy link regex")
});

static LEGACY_VIEWPAGE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r##""/wiki/pages/viewpage\.action\?pageId=([0-9]+)[^"#]*(#[^"]*)?""##)
        .expect("valid legacy viewpage regex")
});

/// Where rewritten links point.
#[derive(Debug, Clone, Copy)]
pub struct LinkContext<'a> {
    /// Upstream base URL, ending in `/`.
    pub base_url: &'a Url,
    /// Local path prefix, starting and ending in `/`.
    pub local_root: &'a str,
    /// Key of the space the body belongs to.
    pub space_key: &'a str,
}

impl LinkContext<'_> {
    /// Map one reference to its local route, or `None` to leave it alone.
    pub fn rewrite_url(&self, url: &str) -> Option<String> {
        let trimmed = url.trim();
        let path = self.strip_base(trimmed)?;
        let root = self.local_root;
        let key = self.space_key;

        if let Some(caps) = PAGE_PATH.captures(&path) {
            return Some(format!("{root}{key}/{}/{}", &caps[1], &caps[2]));
        }

        if let Some(caps) = VIEWPAGE_PATH.captures(&path) {
            let fragment = caps.get(2).map_or("", |m| m.as_str());
            return Some(format!("{root}{key}/{}/{fragment}", &caps[1]));
        }

        if let Some(caps) = DOWNLOAD_PATH.captures(&path) {
            return Some(format!("{root}download/{}", &caps[1]));
        }

        if let Some(rest) = path.strip_prefix("/wiki/display/") {
            return Some(format!("{root}{rest}"));
        }

        if let Some(caps) = SPACE_OVERVIEW_PATH.captures(&path) {
            return Some(format!("{root}{}{}", &caps[1], &caps[2]));
        }

        if let Some(rest) = path.strip_prefix("/wiki/spaces/") {
            return Some(format!("{root}{rest}"));
        }

        Some(format!("{root}{}", path.trim_start_matches('/')))
    }

    fn rewrite_changed(&self, url: &str) -> Option<String> {
        self.rewrite_url(url).filter(|local| local != url)
    }

    /// Upstream-relative path of `url`, if it points at the upstream.
    ///
    /// Absolute URLs under the base have the base removed; root-relative
    /// `/wiki` references are taken as they are.
    fn strip_base(&self, url: &str) -> Option<String> {
        let base = self.base_url.as_str();
        if let Some(rest) = url.strip_prefix(base) {
            return Some(format!("/{rest}"));
        }
        if url == base.trim_end_matches('/') {
            return Some("/".to_string());
        }
        if url == "/wiki" || url.starts_with("/wiki/") {
            return Some(url.to_string());
        }
        None
    }
}

/// Rewrite reference attributes in `html` to local routes.
pub fn rewrite_links(html: &str, ctx: &LinkContext<'_>) -> Result<String, RewritingError> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("a[href], link[href]", |el| {
                    if let Some(local) = el.get_attribute("href").and_then(|v| ctx.rewrite_changed(&v)) {
                        el.set_attribute("href", &local)?;
                    }
                    Ok(())
                }),
                element!("img[src], source[src]", |el| {
                    if let Some(local) = el.get_attribute("src").and_then(|v| ctx.rewrite_changed(&v)) {
                        el.set_attribute("src", &local)?;
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
}

/// Literal substitution over the raw markup.
///
/// Order matters: the base URL is made relative first, then page links are
/// pinned to the current space, then the remaining prefixes are collapsed.
pub fn rewrite_links_legacy(html: &str, ctx: &LinkContext<'_>) -> String {
    let root = ctx.local_root;
    let key = ctx.space_key;

    let body = html.replace(ctx.base_url.as_str(), "/");

    let body = LEGACY_PAGE_LINK.replace_all(&body, |caps: &Captures| {
        format!("\"{root}{key}/{}/{}\"", &caps[2], &caps[3])
    });

    let body = LEGACY_VIEWPAGE_LINK.replace_all(&body, |caps: &Captures| {
        let fragment = caps.get(2).map_or("", |m| m.as_str());
        format!("\"{root}{key}/{}/{fragment}\"", &caps[1])
    });

    body.replace("\"/wiki/download/", &format!("\"{root}download/"))
        .replace("/wiki/display/", root)
        .replace("/wiki/spaces/", root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://wiki.example.com/").unwrap()
    }

    fn ctx<'a>(base: &'a Url, key: &'a str) -> LinkContext<'a> {
        LinkContext { base_url: base, local_root: "/", space_key: key }
    }

    #[test]
    fn test_rewrite_url_page_link() {
        let base = base();
        let ctx = ctx(&base, "ENG");
        assert_eq!(ctx.rewrite_url("/wiki/spaces/ENG/pages/42/Runbook").as_deref(), Some("/ENG/42/Runbook"));
        assert_eq!(ctx.rewrite_url("/wiki/spaces/ENG/pages/42").as_deref(), Some("/ENG/42/"));
        assert_eq!(
            ctx.rewrite_url("https://wiki.example.com/wiki/spaces/ENG/pages/42/Runbook#steps").as_deref(),
            Some("/ENG/42/Runbook#steps")
        );
    }

    #[test]
    fn test_rewrite_url_page_link_pins_current_space() {
        let base = base();
        let ctx = ctx(&base, "ENG");
        assert_eq!(ctx.rewrite_url("/wiki/spaces/OPS/pages/7/Oncall").as_deref(), Some("/ENG/7/Oncall"));
    }

    #[test]
    fn test_rewrite_url_viewpage() {
        let base = base();
        let ctx = ctx(&base, "ENG");
        assert_eq!(ctx.rewrite_url("/wiki/pages/viewpage.action?pageId=42").as_deref(), Some("/ENG/42/"));
        assert_eq!(
            ctx.rewrite_url("/wiki/pages/viewpage.action?pageId=42#section").as_deref(),
            Some("/ENG/42/#section")
        );
        assert_eq!(
            ctx.rewrite_url("/wiki/pages/viewpage.action?spaceKey=ENG&pageId=42").as_deref(),
            Some("/ENG/42/")
        );
    }

    #[test]
    fn test_rewrite_url_download() {
        let base = base();
        let ctx = ctx(&base, "ENG");
        assert_eq!(
            ctx.rewrite_url("/wiki/download/attachments/42/diagram.png?version=1&modificationDate=1500000000000&api=v2")
                .as_deref(),
            Some("/download/attachments/42/diagram.png?version=1&modificationDate=1500000000000&api=v2")
        );
    }

    #[test]
    fn test_rewrite_url_display_and_spaces() {
        let base = base();
        let ctx = ctx(&base, "ENG");
        assert_eq!(ctx.rewrite_url("/wiki/display/OPS/On+Call").as_deref(), Some("/OPS/On+Call"));
        assert_eq!(ctx.rewrite_url("/wiki/spaces/OPS").as_deref(), Some("/OPS"));
        assert_eq!(ctx.rewrite_url("/wiki/spaces/OPS/overview").as_deref(), Some("/OPS"));
        assert_eq!(ctx.rewrite_url("/wiki/spaces/OPS/blog/2020").as_deref(), Some("/OPS/blog/2020"));
    }

    #[test]
    fn test_rewrite_url_other_upstream_paths_become_relative() {
        let base = base();
        let ctx = ctx(&base, "ENG");
        assert_eq!(
            ctx.rewrite_url("https://wiki.example.com/wiki/s/batch.css").as_deref(),
            Some("/wiki/s/batch.css")
        );
        assert_eq!(ctx.rewrite_url("https://wiki.example.com").as_deref(), Some("/"));
    }

    #[test]
    fn test_rewrite_url_leaves_unknown_alone() {
        let base = base();
        let ctx = ctx(&base, "ENG");
        assert_eq!(ctx.rewrite_url("https://other.example.org/wiki/spaces/ENG"), None);
        assert_eq!(ctx.rewrite_url("/assets/site.css"), None);
        assert_eq!(ctx.rewrite_url("#top"), None);
        assert_eq!(ctx.rewrite_url("/wikipedia"), None);
    }

    #[test]
    fn test_rewrite_url_custom_root() {
        let base = base();
        let ctx = LinkContext { base_url: &base, local_root: "/mirror/", space_key: "ENG" };
        assert_eq!(ctx.rewrite_url("/wiki/spaces/ENG/pages/42/x").as_deref(), Some("/mirror/ENG/42/x"));
        assert_eq!(ctx.rewrite_url("/wiki/s/a.css").as_deref(), Some("/mirror/wiki/s/a.css"));
    }

    #[test]
    fn test_rewrite_links_attributes_only() {
        let base = base();
        let ctx = ctx(&base, "ENG");
        let html = concat!(
            r#"<p>See <a href="https://wiki.example.com/wiki/spaces/ENG/pages/42/Runbook">runbook</a>"#,
            r#" and <img src="/wiki/download/attachments/42/a.png?version=1"></p>"#,
            r#"<p>Text mentioning /wiki/spaces/ENG/pages/42 stays.</p>"#,
        );

        let out = rewrite_links(html, &ctx).unwrap();

        assert!(out.contains(r#"<a href="/ENG/42/Runbook">runbook</a>"#));
        assert!(out.contains(r#"<img src="/download/attachments/42/a.png?version=1">"#));
        assert!(out.contains("Text mentioning /wiki/spaces/ENG/pages/42 stays."));
    }

    #[test]
    fn test_rewrite_links_untouched_when_nothing_matches() {
        let base = base();
        let ctx = ctx(&base, "ENG");
        let html = r#"<a href="https://other.example.org/">x</a><a href="/assets/a">y</a>"#;
        assert_eq!(rewrite_links(html, &ctx).unwrap(), html);
    }

    #[test]
    fn test_legacy_rewrites_known_shapes() {
        let base = base();
        let ctx = ctx(&base, "ENG");
        let html = concat!(
            r#"<a href="https://wiki.example.com/wiki/spaces/ENG/pages/42/Runbook">a</a>"#,
            r#"<a href="/wiki/pages/viewpage.action?pageId=7">b</a>"#,
            r#"<a href="/wiki/display/OPS/Home">c</a>"#,
            r#"<a href="/wiki/spaces/OPS">d</a>"#,
        );

        let out = rewrite_links_legacy(html, &ctx);

        assert!(out.contains(r#"href="/ENG/42/Runbook""#));
        assert!(out.contains(r#"href="/ENG/7/""#));
        assert!(out.contains(r#"href="/OPS/Home""#));
        assert!(out.contains(r#"href="/OPS""#));
        assert!(!out.contains("/wiki/"));
    }

    #[test]
    fn test_legacy_viewpage_keeps_fragment() {
        let base = base();
        let ctx = ctx(&base, "ENG");
        let html = concat!(
            r#"<a href="/wiki/pages/viewpage.action?pageId=7#setup">a</a>"#,
            r#"<a href="/wiki/pages/viewpage.action?pageId=8&amp;focused=true">b</a>"#,
        );

        let out = rewrite_links_legacy(html, &ctx);

        assert!(out.contains(r#"href="/ENG/7/#setup""#));
        assert!(out.contains(r#"href="/ENG/8/""#));
    }

    #[test]
    fn test_tree_and_legacy_agree_on_known_shapes() {
        let base = base();
        let ctx = ctx(&base, "ENG");
        let html = concat!(
            r#"<a href="/wiki/spaces/ENG/pages/42/Runbook">a</a>"#,
            r#"<a href="https://wiki.example.com/wiki/spaces/ENG/pages/43">b</a>"#,
            r#"<a href="/wiki/pages/viewpage.action?pageId=7">c</a>"#,
            r#"<a href="/wiki/display/OPS/Home">d</a>"#,
            r#"<img src="/wiki/download/attachments/42/a.png?version=1">"#,
        );

        assert_eq!(rewrite_links(html, &ctx).unwrap(), rewrite_links_legacy(html, &ctx));
    }
}
