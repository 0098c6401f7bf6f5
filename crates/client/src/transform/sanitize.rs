//! HTML sanitization for upstream bodies.
//!
//! Whitelist policy suited to user-generated content, plus:
//! - `class` allowed on every element (upstream layout depends on it)
//! - `rel="nofollow"` forced on fully-qualified external links only
//! - removal of upstream UI boilerplate fragments

use ammonia::Builder as AmmoniaBuilder;
use lol_html::errors::RewritingError;
use lol_html::html_content::ContentType;
use lol_html::{RewriteStrSettings, doc_text, element, rewrite_str};
use url::Url;

/// Text fragments emitted by the upstream UI that mean nothing once mirrored.
pub const DEFAULT_BOILERPLATE: &[&str] = &["Expand source", "Collapse source"];

pub(crate) fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    builder.add_generic_attributes(&["class"]);
    builder.add_tag_attributes("a", &["name", "target"]);
    builder.add_tag_attributes("img", &["title", "loading"]);
    builder.add_tag_attributes("th", &["scope"]);
    builder.add_url_schemes(["http", "https", "mailto", "tel"].iter().copied());

    // rel is decided per link in `add_nofollow`.
    builder.link_rel(None);

    builder
}

/// Force `rel="nofollow"` on absolute http(s) links that leave the upstream host.
///
/// Relative links and links into the upstream base are left untouched; they
/// become local routes during link rewriting.
pub(crate) fn add_nofollow(html: &str, base_url: &Url) -> Result<String, RewritingError> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("a[href]", |el| {
                if let Some(href) = el.get_attribute("href")
                    && is_external(&href, base_url)
                {
                    let rel = merge_rel(el.get_attribute("rel"), "nofollow");
                    el.set_attribute("rel", &rel)?;
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
}

/// Remove text nodes whose trimmed content is exactly a boilerplate fragment.
///
/// Prose that merely contains a fragment is kept. A text node may arrive in
/// several chunks, so chunks are held back until the node is complete.
pub(crate) fn strip_boilerplate(html: &str, fragments: &[String]) -> Result<String, RewritingError> {
    if fragments.iter().all(|f| f.trim().is_empty()) {
        return Ok(html.to_string());
    }

    let mut pending = String::new();
    rewrite_str(
        html,
        RewriteStrSettings {
            document_content_handlers: vec![doc_text!(move |chunk| {
                pending.push_str(chunk.as_str());
                chunk.remove();
                if chunk.last_in_text_node() {
                    let node = std::mem::take(&mut pending);
                    let text = node.trim();
                    if !fragments.iter().any(|f| !f.trim().is_empty() && f.trim() == text) {
                        chunk.replace(&node, ContentType::Html);
                    }
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
}

fn is_external(href: &str, base_url: &Url) -> bool {
    match Url::parse(href.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && !url.as_str().starts_with(base_url.as_str()),
        Err(_) => false,
    }
}

fn merge_rel(existing: Option<String>, token: &str) -> String {
    match existing {
        Some(rel) if rel.split_ascii_whitespace().any(|t| t.eq_ignore_ascii_case(token)) => rel,
        Some(rel) if !rel.trim().is_empty() => format!("{} {token}", rel.trim()),
        _ => token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://wiki.example.com/").unwrap()
    }

    #[test]
    fn test_sanitizer_strips_script_keeps_class() {
        let html = build_sanitizer()
            .clean(r#"<p class="lead">Hi<script>alert(1)</script></p><div class="panel" onclick="x()">Body</div>"#)
            .to_string();

        assert!(!html.contains("<script"));
        assert!(!html.contains("alert(1)"));
        assert!(!html.contains("onclick"));
        assert!(html.contains(r#"<p class="lead">"#));
        assert!(html.contains(r#"<div class="panel">"#));
    }

    #[test]
    fn test_sanitizer_does_not_add_rel() {
        let html = build_sanitizer().clean(r#"<a href="/ENG/42/">x</a>"#).to_string();
        assert_eq!(html, r#"<a href="/ENG/42/">x</a>"#);
    }

    #[test]
    fn test_add_nofollow_external_only() {
        let html = concat!(
            r#"<a href="https://other.example.org/x">ext</a>"#,
            r#"<a href="/ENG/42/">rel</a>"#,
            r#"<a href="https://wiki.example.com/wiki/spaces/ENG">up</a>"#,
        );
        let out = add_nofollow(html, &base()).unwrap();

        assert!(out.contains(r#"<a href="https://other.example.org/x" rel="nofollow">"#));
        assert!(out.contains(r#"<a href="/ENG/42/">"#));
        assert!(out.contains(r#"<a href="https://wiki.example.com/wiki/spaces/ENG">"#));
    }

    #[test]
    fn test_merge_rel() {
        assert_eq!(merge_rel(None, "nofollow"), "nofollow");
        assert_eq!(merge_rel(Some("noopener".into()), "nofollow"), "noopener nofollow");
        assert_eq!(merge_rel(Some("NOFOLLOW".into()), "nofollow"), "NOFOLLOW");
        assert_eq!(merge_rel(Some("  ".into()), "nofollow"), "nofollow");
    }

    #[test]
    fn test_is_external() {
        assert!(is_external("http://other.example.org/", &base()));
        assert!(!is_external("https://wiki.example.com/wiki/x", &base()));
        assert!(!is_external("/relative", &base()));
        assert!(!is_external("mailto:someone@example.org", &base()));
    }

    fn boilerplate() -> Vec<String> {
        DEFAULT_BOILERPLATE.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_strip_boilerplate() {
        let html = r#"<span class="expand-control-text">Expand source</span><pre>code</pre>"#;
        assert_eq!(
            strip_boilerplate(html, &boilerplate()).unwrap(),
            r#"<span class="expand-control-text"></span><pre>code</pre>"#
        );
    }

    #[test]
    fn test_strip_boilerplate_keeps_prose() {
        let html = "<p>Expand source code is a phrase</p><p>Click Collapse source to hide it</p>";
        assert_eq!(strip_boilerplate(html, &boilerplate()).unwrap(), html);
    }

    #[test]
    fn test_strip_boilerplate_matches_trimmed_node() {
        let html = "<span>\n  Collapse source  \n</span><b>&amp; more</b>";
        assert_eq!(strip_boilerplate(html, &boilerplate()).unwrap(), "<span></span><b>&amp; more</b>");
    }

    #[test]
    fn test_strip_boilerplate_ignores_empty_fragment() {
        assert_eq!(strip_boilerplate("<p>x</p>", &[String::new()]).unwrap(), "<p>x</p>");
        assert_eq!(strip_boilerplate("<p> </p>", &[" ".into()]).unwrap(), "<p> </p>");
    }
}
