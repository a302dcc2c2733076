// src/fetch/http.rs
// =============================================================================
// The real page fetcher: downloads a page with reqwest and hands the body to
// the HTML extractor.
//
// Key functionality:
// - Makes HTTP GET requests with a per-request timeout
// - Follows a limited number of redirects
// - Turns non-2xx responses into FetchError::Http(status)
// - Categorizes transport failures (timeout, DNS, SSL, ...) into a
//   readable FetchError::Other message
// =============================================================================

use super::{html, FetchError, PageContent, PageFetcher, PageUrl};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use std::time::Duration;

/// Fetches pages over HTTP and extracts links with `scraper`.
///
/// The client is created once and reused for every request (connection
/// pooling), so one fetcher should be shared by all workers.
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &PageUrl) -> Result<PageContent, FetchError> {
        debug!("Fetching {}...", url);

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(categorize_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        let body = response.text().await.map_err(categorize_error)?;
        let content = html::extract_page(&body, url);

        debug!(
            "{}: {} page link(s), {} resource link(s)",
            url,
            content.page_links.len(),
            content.resources.len()
        );
        Ok(content)
    }
}

// Categorizes different error types from reqwest
//
// reqwest errors can happen for many reasons:
// - Network timeout
// - DNS resolution failure
// - SSL certificate issues
// - Too many redirects
fn categorize_error(error: reqwest::Error) -> FetchError {
    let error_string = error.to_string();

    let message = if error.is_timeout() {
        "Request timed out".to_string()
    } else if error.is_redirect() {
        "Too many redirects".to_string()
    } else if error.is_connect() {
        // Connection errors often mean DNS issues or host unreachable
        if error_string.contains("dns") {
            "Could not resolve hostname".to_string()
        } else {
            "Connection failed".to_string()
        }
    } else if error_string.contains("certificate") || error_string.contains("ssl") {
        "SSL certificate error".to_string()
    } else {
        error_string
    };

    FetchError::Other(message)
}
