// src/classify.rs
// =============================================================================
// This module turns a resource element into a download task line.
//
// Every <img>, <script> and <link> found on a page is sorted into a category.
// The category decides the target directory and how the file name is built:
//
//   img                          -> imgs/     basename (jpg/ and png/ nested)
//   script                       -> scripts/  basename
//   link type=application/rss+xml -> rss/     <resource host>.xml
//   link type=image/x-icon       -> icons/    <page host>_<basename>
//   link type=text/css           -> css/      basename
//   link with any other type     -> other/    basename
//
// Links with rel=alternate or rel=canonical, links without a type and any
// other tag produce nothing.
//
// classify() is a pure function: no shared state, safe to call from every
// page task at once.
// =============================================================================

use crate::fetch::{ElementTag, ResourceElement};
use log::{debug, warn};
use std::fmt;
use url::Url;

/// One output record: where a resource lives and where it should be saved.
///
/// Two lines are the same download when their `resource_url` matches; the
/// target path does not take part in deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTaskLine {
    pub resource_url: String,
    pub target_path: String,
}

impl fmt::Display for DownloadTaskLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.resource_url, self.target_path)
    }
}

/// The kind of resource an element points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Image,
    Script,
    Feed,
    Icon,
    Stylesheet,
    Generic,
}

impl Category {
    /// Picks the category for an element, or `None` if it isn't worth
    /// downloading.
    pub fn of(element: &ResourceElement) -> Option<Category> {
        match &element.tag {
            ElementTag::Img => {
                if element.url.trim().is_empty() {
                    None
                } else {
                    Some(Category::Image)
                }
            }
            ElementTag::Script => Some(Category::Script),
            ElementTag::Link => {
                if matches!(element.rel.as_deref(), Some("alternate" | "canonical")) {
                    return None;
                }

                match element.link_type.as_deref().unwrap_or("") {
                    "application/rss+xml" => Some(Category::Feed),
                    "image/x-icon" => Some(Category::Icon),
                    "text/css" => Some(Category::Stylesheet),
                    "" => {
                        warn!("Empty link type for element {}", element.url);
                        None
                    }
                    _ => Some(Category::Generic),
                }
            }
            ElementTag::Other(name) => {
                warn!("Unsupported tag name {}", name);
                None
            }
        }
    }

    pub fn directory(self) -> &'static str {
        match self {
            Category::Image => "imgs",
            Category::Script => "scripts",
            Category::Feed => "rss",
            Category::Icon => "icons",
            Category::Stylesheet => "css",
            Category::Generic => "other",
        }
    }

    /// File name (relative to `directory()`) for a resource of this
    /// category, or `None` when no usable name can be derived.
    pub fn file_name(self, element: &ResourceElement) -> Option<String> {
        match self {
            Category::Image => {
                let name = basename(&element.url)?;
                match name.rsplit_once('.').map(|(_, ext)| ext) {
                    Some("jpg") => Some(format!("jpg/{}", name)),
                    Some("png") => Some(format!("png/{}", name)),
                    _ => Some(name.to_string()),
                }
            }
            Category::Feed => {
                let host = host_of(&element.url, "rss link")?;
                Some(format!("{}.xml", host))
            }
            Category::Icon => {
                let host = host_of(&element.page_url, "favicon page")?;
                let name = basename(&element.url)?;
                Some(format!("{}_{}", host, name))
            }
            Category::Script | Category::Stylesheet | Category::Generic => {
                basename(&element.url).map(str::to_string)
            }
        }
    }
}

/// Maps a resource element to its download task line, if it has one.
pub fn classify(element: &ResourceElement) -> Option<DownloadTaskLine> {
    let category = Category::of(element)?;

    let Some(file_name) = category.file_name(element) else {
        debug!("No file name for {:?} element {}", category, element.url);
        return None;
    };

    Some(DownloadTaskLine {
        resource_url: element.url.clone(),
        target_path: format!("{}/{}", category.directory(), file_name),
    })
}

// The part of the URL after the last '/', cut at the first '?'
//
// Examples:
//   "http://x.test/a/b.jpg"       -> Some("b.jpg")
//   "http://x.test/app.js?v=3"    -> Some("app.js")
//   "http://x.test/dir/"          -> None
fn basename(url: &str) -> Option<&str> {
    let after_slash = url.rsplit('/').next().unwrap_or(url);
    let name = after_slash.split('?').next().unwrap_or(after_slash);

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn host_of(url: &str, what: &str) -> Option<String> {
    match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) {
        Some(host) => Some(host),
        None => {
            warn!("Unable to get host for {} {}", what, url);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{img, link, script};

    const PAGE: &str = "http://example.com/index.html";

    fn target(element: &ResourceElement) -> Option<String> {
        classify(element).map(|line| line.target_path)
    }

    #[test]
    fn test_img_jpg_nested() {
        let element = img("http://x.test/a/b.jpg", PAGE);
        assert_eq!(target(&element).as_deref(), Some("imgs/jpg/b.jpg"));
    }

    #[test]
    fn test_img_png_nested_and_other_flat() {
        assert_eq!(
            target(&img("http://x.test/logo.png?size=2", PAGE)).as_deref(),
            Some("imgs/png/logo.png")
        );
        assert_eq!(
            target(&img("http://x.test/anim.gif", PAGE)).as_deref(),
            Some("imgs/anim.gif")
        );
    }

    #[test]
    fn test_img_extension_is_case_sensitive() {
        assert_eq!(
            target(&img("http://x.test/photo.PNG", PAGE)).as_deref(),
            Some("imgs/photo.PNG")
        );
    }

    #[test]
    fn test_img_blank_src_excluded() {
        assert_eq!(classify(&img("", PAGE)), None);
        assert_eq!(classify(&img("   ", PAGE)), None);
    }

    #[test]
    fn test_script_same_url_flat() {
        let element = script("http://x.test/a/b.jpg", PAGE);
        assert_eq!(target(&element).as_deref(), Some("scripts/b.jpg"));
    }

    #[test]
    fn test_rss_named_after_resource_host() {
        let element = link(
            "http://feeds.example.com/out.rss",
            PAGE,
            None,
            Some("application/rss+xml"),
        );
        assert_eq!(target(&element).as_deref(), Some("rss/feeds.example.com.xml"));
    }

    #[test]
    fn test_icon_named_after_page_host() {
        let element = link(
            "http://cdn.example.net/favicon.ico",
            PAGE,
            Some("icon"),
            Some("image/x-icon"),
        );
        let line = classify(&element).unwrap();
        assert_eq!(
            line.to_string(),
            "http://cdn.example.net/favicon.ico icons/example.com_favicon.ico"
        );
    }

    #[test]
    fn test_icon_unparsable_page_url_skipped() {
        let element = link("http://x.test/favicon.ico", "not a url", None, Some("image/x-icon"));
        assert_eq!(classify(&element), None);
    }

    #[test]
    fn test_css_and_other_types() {
        let css = link("http://x.test/s/site.css?v=1", PAGE, Some("stylesheet"), Some("text/css"));
        assert_eq!(target(&css).as_deref(), Some("css/site.css"));

        let manifest = link("http://x.test/app.webmanifest", PAGE, Some("manifest"), Some("application/manifest+json"));
        assert_eq!(target(&manifest).as_deref(), Some("other/app.webmanifest"));
    }

    #[test]
    fn test_canonical_and_alternate_excluded() {
        let canonical = link("http://x.test/page", PAGE, Some("canonical"), Some("text/html"));
        assert_eq!(classify(&canonical), None);

        let alternate = link("http://x.test/feed.rss", PAGE, Some("alternate"), Some("application/rss+xml"));
        assert_eq!(classify(&alternate), None);
    }

    #[test]
    fn test_link_without_type_excluded() {
        assert_eq!(classify(&link("http://x.test/s.css", PAGE, Some("stylesheet"), None)), None);
        assert_eq!(classify(&link("http://x.test/s.css", PAGE, Some("stylesheet"), Some(""))), None);
    }

    #[test]
    fn test_empty_basename_excluded() {
        assert_eq!(classify(&script("http://x.test/js/", PAGE)), None);
        assert_eq!(classify(&script("http://x.test/js/?v=2", PAGE)), None);
    }

    #[test]
    fn test_unknown_tag_excluded() {
        let element = ResourceElement {
            tag: ElementTag::Other("video".to_string()),
            ..img("http://x.test/clip.mp4", PAGE)
        };
        assert_eq!(classify(&element), None);
    }

    #[test]
    fn test_line_rendering() {
        let line = classify(&img("http://x.test/a/b.jpg", PAGE)).unwrap();
        assert_eq!(line.to_string(), "http://x.test/a/b.jpg imgs/jpg/b.jpg");
    }
}
