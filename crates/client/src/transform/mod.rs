//! Body transformation: sanitize upstream HTML, then point its links at
//! local routes.
//!
//! Pipeline, in order:
//! 1. Whitelist sanitization (see [`sanitize`])
//! 2. `rel="nofollow"` on external absolute links
//! 3. Boilerplate removal
//! 4. Link rewriting (see [`links`])
//!
//! Proxied responses never pass through here.

pub mod links;
pub mod sanitize;

use ammonia::Builder as AmmoniaBuilder;
use convergence_core::{AppConfig, ConfigError};
use url::Url;

pub use links::{LinkContext, rewrite_links, rewrite_links_legacy};
pub use sanitize::DEFAULT_BOILERPLATE;

/// Seam between the mirror and whatever prepares bodies for storage.
pub trait BodyProcessor: Send + Sync {
    /// Produce the stored form of an upstream body belonging to `space_key`.
    fn process(&self, body: &str, space_key: &str) -> String;
}

/// Which link rewriting pass to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkStrategy {
    /// Attribute-level rewriting over the parsed document.
    #[default]
    Tree,
    /// Literal substitution over the raw markup.
    Legacy,
}

/// Configuration for the body transformer.
#[derive(Debug, Clone)]
pub struct TransformConfig {
    /// Upstream base URL, ending in `/`.
    pub base_url: Url,
    /// Local path prefix, starting and ending in `/` (default: "/")
    pub local_root: String,
    /// Text node contents removed after sanitization when matched exactly.
    pub boilerplate: Vec<String>,
    pub strategy: LinkStrategy,
}

impl TransformConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            local_root: "/".to_string(),
            boilerplate: DEFAULT_BOILERPLATE.iter().map(|s| s.to_string()).collect(),
            strategy: LinkStrategy::default(),
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self { local_root: config.local_root.clone(), ..Self::new(config.base_url()?) })
    }
}

/// Sanitizer and link rewriter for upstream bodies.
pub struct Transformer {
    config: TransformConfig,
    sanitizer: AmmoniaBuilder<'static>,
}

impl Transformer {
    pub fn new(config: TransformConfig) -> Self {
        Self { config, sanitizer: sanitize::build_sanitizer() }
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Whitelist-sanitize `html`, force `nofollow` on external links and strip
    /// boilerplate. Links are not rewritten.
    pub fn sanitize(&self, html: &str) -> String {
        let cleaned = self.sanitizer.clean(html).to_string();

        let cleaned = match sanitize::add_nofollow(&cleaned, &self.config.base_url) {
            Ok(marked) => marked,
            Err(e) => {
                tracing::warn!(error = %e, "nofollow pass failed; keeping sanitized body");
                cleaned
            }
        };

        match sanitize::strip_boilerplate(&cleaned, &self.config.boilerplate) {
            Ok(stripped) => stripped,
            Err(e) => {
                tracing::warn!(error = %e, "boilerplate pass failed; keeping sanitized body");
                cleaned
            }
        }
    }

    /// Run the full pipeline for a body belonging to `space_key`.
    ///
    /// Never fails: if the tree pass cannot process the document, the legacy
    /// substitution runs instead.
    pub fn process(&self, html: &str, space_key: &str) -> String {
        if html.is_empty() {
            return String::new();
        }

        let sanitized = self.sanitize(html);
        let ctx = LinkContext {
            base_url: &self.config.base_url,
            local_root: &self.config.local_root,
            space_key,
        };

        match self.config.strategy {
            LinkStrategy::Legacy => rewrite_links_legacy(&sanitized, &ctx),
            LinkStrategy::Tree => rewrite_links(&sanitized, &ctx).unwrap_or_else(|e| {
                tracing::warn!(error = %e, space_key, "tree link rewrite failed; using legacy substitution");
                rewrite_links_legacy(&sanitized, &ctx)
            }),
        }
    }
}

impl BodyProcessor for Transformer {
    fn process(&self, body: &str, space_key: &str) -> String {
        Transformer::process(self, body, space_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn transformer() -> Transformer {
        Transformer::new(TransformConfig::new(Url::parse("https://wiki.example.com/").unwrap()))
    }

    fn hrefs(html: &str) -> Vec<String> {
        let doc = Html::parse_fragment(html);
        let selector = Selector::parse("a[href]").unwrap();
        doc.select(&selector)
            .filter_map(|a| a.value().attr("href").map(str::to_string))
            .collect()
    }

    #[test]
    fn test_process_rewrites_page_link_into_space_route() {
        let body = r#"<p><a href="https://wiki.example.com/wiki/spaces/ENG/pages/42/Runbook">Runbook</a></p>"#;
        let out = transformer().process(body, "ENG");

        assert_eq!(hrefs(&out), vec!["/ENG/42/Runbook"]);
        assert!(!out.contains("wiki.example.com"));
        assert!(!out.contains("/wiki/spaces/"));
    }

    #[test]
    fn test_process_strips_script_keeps_class() {
        let body = r#"<div class="confluence-information-macro"><script>steal()</script><p>Note</p></div>"#;
        let out = transformer().process(body, "ENG");

        let doc = Html::parse_fragment(&out);
        let div = Selector::parse("div.confluence-information-macro").unwrap();
        let script = Selector::parse("script").unwrap();
        assert_eq!(doc.select(&div).count(), 1);
        assert_eq!(doc.select(&script).count(), 0);
        assert!(!out.contains("steal()"));
    }

    #[test]
    fn test_process_nofollow_only_on_external() {
        let body = r#"<a href="https://other.example.org/">ext</a><a href="/wiki/display/ENG/Home">int</a>"#;
        let out = transformer().process(body, "ENG");

        let doc = Html::parse_fragment(&out);
        let selector = Selector::parse("a").unwrap();
        let rels: Vec<_> = doc.select(&selector).map(|a| a.value().attr("rel")).collect();
        assert_eq!(rels, vec![Some("nofollow"), None]);
        assert_eq!(hrefs(&out), vec!["https://other.example.org/", "/ENG/Home"]);
    }

    #[test]
    fn test_process_removes_boilerplate() {
        let body = r#"<div class="code panel"><span>Expand source</span><pre>fn main() {}</pre></div>"#;
        let out = transformer().process(body, "ENG");
        assert!(!out.contains("Expand source"));
        assert!(out.contains("fn main() {}"));
    }

    #[test]
    fn test_process_keeps_prose_mentioning_boilerplate() {
        let out = transformer().process("<p>Expand source code is a phrase</p>", "ENG");
        assert_eq!(out, "<p>Expand source code is a phrase</p>");
    }

    #[test]
    fn test_process_empty_body() {
        assert_eq!(transformer().process("", "ENG"), "");
    }

    #[test]
    fn test_process_custom_root() {
        let mut config = TransformConfig::new(Url::parse("https://wiki.example.com/").unwrap());
        config.local_root = "/mirror/".into();
        let out = Transformer::new(config).process(r#"<a href="/wiki/spaces/ENG/pages/42">x</a>"#, "ENG");
        assert_eq!(hrefs(&out), vec!["/mirror/ENG/42/"]);
    }

    #[test]
    fn test_strategies_agree() {
        let body = concat!(
            r#"<p><a href="https://wiki.example.com/wiki/spaces/ENG/pages/42/Runbook">a</a>"#,
            r#"<a href="/wiki/pages/viewpage.action?pageId=7">b</a>"#,
            r#"<img src="/wiki/download/attachments/42/a.png?version=1"></p>"#,
        );

        let tree = transformer().process(body, "ENG");
        let mut config = TransformConfig::new(Url::parse("https://wiki.example.com/").unwrap());
        config.strategy = LinkStrategy::Legacy;
        let legacy = Transformer::new(config).process(body, "ENG");

        assert_eq!(hrefs(&tree), hrefs(&legacy));
        assert_eq!(hrefs(&tree), vec!["/ENG/42/Runbook", "/ENG/7/"]);
    }

    #[test]
    fn test_transform_config_from_app_config() {
        let app = AppConfig {
            base_url: "https://wiki.example.com".into(),
            local_root: "/mirror/".into(),
            ..Default::default()
        };
        let config = TransformConfig::from_app_config(&app).unwrap();
        assert_eq!(config.base_url.as_str(), "https://wiki.example.com/");
        assert_eq!(config.local_root, "/mirror/");
        assert_eq!(config.strategy, LinkStrategy::Tree);
    }
}
