// src/fetch/mod.rs
// =============================================================================
// This module is the boundary between the crawl engine and the web.
//
// The crawl engine never talks HTTP or parses HTML itself. It only sees:
// - PageUrl: an absolute http/https page address
// - ResourceElement: one <img>, <script> or <link> found on a page
// - PageContent: everything a fetch discovered
// - PageFetcher: the trait that turns a PageUrl into PageContent
//
// Submodules:
// - html: pulls page links and resource elements out of an HTML document
// - http: the real fetcher built on reqwest
//
// Rust concepts:
// - Traits: PageFetcher lets tests swap the network for a scripted fake
// - Newtypes: PageUrl wraps a String so page URLs can't be mixed up with
//   arbitrary strings
// =============================================================================

mod html;
mod http;

use async_trait::async_trait;
use std::fmt;
use url::Url;

pub use crate::error::FetchError;
pub use http::HttpPageFetcher;

/// An absolute, normalized page URL. Equality is plain string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageUrl(String);

impl PageUrl {
    /// Parses an absolute http/https URL and drops its fragment, so
    /// `page#a` and `page#b` name the same page.
    pub fn parse(raw: &str) -> Option<PageUrl> {
        let mut url = Url::parse(raw).ok()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return None;
        }
        url.set_fragment(None);
        Some(PageUrl(url.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The tag of a resource-bearing element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementTag {
    Link,
    Img,
    Script,
    Other(String),
}

impl ElementTag {
    pub fn from_name(name: &str) -> ElementTag {
        match name {
            "link" => ElementTag::Link,
            "img" => ElementTag::Img,
            "script" => ElementTag::Script,
            other => ElementTag::Other(other.to_string()),
        }
    }
}

/// One resource-bearing HTML node, already absolutized by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceElement {
    pub tag: ElementTag,
    /// Absolute value of `src` (img, script) or `href` (link).
    /// Empty when the raw attribute was blank.
    pub url: String,
    pub rel: Option<String>,
    /// The `type` attribute of a `<link>`.
    pub link_type: Option<String>,
    /// The page the element was found on.
    pub page_url: String,
}

/// Everything one page fetch discovered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    pub page_links: Vec<PageUrl>,
    pub resources: Vec<ResourceElement>,
}

/// Turns a page URL into its outbound links and resource elements.
///
/// Implementations must be shareable across the worker pool, hence
/// `Send + Sync`.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &PageUrl) -> Result<PageContent, FetchError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url_strips_fragment() {
        let url = PageUrl::parse("https://example.com/docs#install").unwrap();
        assert_eq!(url.as_str(), "https://example.com/docs");
    }

    #[test]
    fn test_page_url_rejects_other_schemes() {
        assert!(PageUrl::parse("mailto:someone@example.com").is_none());
        assert!(PageUrl::parse("ftp://example.com/file").is_none());
        assert!(PageUrl::parse("/relative/path").is_none());
    }

    #[test]
    fn test_element_tag_from_name() {
        assert_eq!(ElementTag::from_name("img"), ElementTag::Img);
        assert_eq!(ElementTag::from_name("link"), ElementTag::Link);
        assert_eq!(
            ElementTag::from_name("video"),
            ElementTag::Other("video".to_string())
        );
    }
}
