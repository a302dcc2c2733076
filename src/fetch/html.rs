// src/fetch/html.rs
// =============================================================================
// This module pulls crawlable links and resource elements out of HTML pages.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
//
// And the `url` crate to resolve relative attributes against the page URL.
//
// Two kinds of things come out of a page:
// - Page links: every <a href> that resolves to an http/https URL
// - Resource elements: every <img src>, <link href> and <script src>,
//   with the attributes the classifier needs (rel, type)
// =============================================================================

use super::{ElementTag, PageContent, PageUrl, ResourceElement};
use log::warn;
use scraper::{ElementRef, Html, Selector};
use url::Url;

const PAGE_LINKS: &str = "a[href]";
const RESOURCE_LINKS: &str = "img[src],link[href],script[src]";

// Extracts page links and resource elements from HTML content
//
// Parameters:
//   html: the HTML content to parse
//   page_url: the URL of the page (for resolving relative links)
//
// Example:
//   html = "<a href='/docs'>Docs</a><img src='logo.png'>"
//   page_url = "https://example.com/"
//   page_links = ["https://example.com/docs"]
//   resources = [img "https://example.com/logo.png"]
pub fn extract_page(html: &str, page_url: &PageUrl) -> PageContent {
    let mut content = PageContent::default();

    let base = match Url::parse(page_url.as_str()) {
        Ok(url) => url,
        Err(_) => {
            warn!("Invalid base URL: {}", page_url);
            return content;
        }
    };

    let (Ok(page_links), Ok(resource_links)) =
        (Selector::parse(PAGE_LINKS), Selector::parse(RESOURCE_LINKS))
    else {
        return content;
    };

    let document = Html::parse_document(html);

    for element in document.select(&page_links) {
        if let Some(href) = element.value().attr("href") {
            if let Some(link) = resolve_page_link(&base, href) {
                content.page_links.push(link);
            }
        }
    }

    for element in document.select(&resource_links) {
        content.resources.push(resource_element(element, &base));
    }

    content
}

// Builds a ResourceElement from an <img>, <link> or <script> node
fn resource_element(element: ElementRef<'_>, base: &Url) -> ResourceElement {
    let node = element.value();
    let tag = ElementTag::from_name(node.name());

    let url_attribute = match tag {
        ElementTag::Link => "href",
        _ => "src",
    };

    // A blank attribute stays blank. Resolving "" against the base would
    // silently turn it into the page URL itself.
    let url = match node.attr(url_attribute).map(str::trim) {
        Some(raw) if !raw.is_empty() => resolve_url(base, raw).unwrap_or_default(),
        _ => String::new(),
    };

    ResourceElement {
        tag,
        url,
        rel: node.attr("rel").map(str::to_string),
        link_type: node.attr("type").map(str::to_string),
        page_url: base.to_string(),
    }
}

// Resolves an <a href> to a crawlable page URL
//
// Skips anchors and special protocols, keeps only http/https
fn resolve_page_link(base: &Url, href: &str) -> Option<PageUrl> {
    if href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
    {
        return None;
    }

    PageUrl::parse(&resolve_url(base, href)?)
}

// Resolves a possibly-relative URL to an absolute URL
fn resolve_url(base: &Url, href: &str) -> Option<String> {
    match Url::parse(href) {
        Ok(url) => Some(url.to_string()),
        Err(_) => base.join(href).ok().map(|url| url.to_string()),
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is let-else?
//    - `let (Ok(a), Ok(b)) = (...) else { return ... };`
//    - Binds the values if the pattern matches, otherwise runs the else block
//    - The else block must leave the function (return, break, continue)
//
// 2. Why map(str::to_string)?
//    - attr() returns Option<&str> borrowed from the document
//    - The document is dropped at the end of extract_page
//    - We copy the values into owned Strings so they can outlive it
//
// 3. Why a comma in the selector?
//    - "img[src],link[href],script[src]" is a CSS selector list
//    - It matches any element that matches one of the parts, in document order
// -----------------------------------------------------------------------------
