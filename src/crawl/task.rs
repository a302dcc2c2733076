// src/crawl/task.rs
// =============================================================================
// The unit of work the scheduler runs for every page URL.
//
// Steps:
// 1. Give up right away if the crawl already stopped
// 2. Fetch the page (HTTP errors and other failures end the task quietly)
// 3. Classify every resource element and hand the lines to the sink,
//    re-checking the stop signal before each one
// 4. Queue every newly discovered page link on the frontier
//
// Nothing that goes wrong with one page leaves this file, except an
// interruption: that is reported to the caller so the scheduler can shut
// down.
// =============================================================================

use super::frontier::{Enqueued, Frontier};
use crate::classify::classify;
use crate::error::{FetchError, SinkError, TaskInterrupted};
use crate::fetch::{PageFetcher, PageUrl};
use crate::sink::SinkHandle;
use log::{debug, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a page task needs, shared by all workers.
pub struct PageTaskContext {
    pub fetcher: Arc<dyn PageFetcher>,
    pub frontier: Arc<Frontier>,
    pub sink: SinkHandle,
    /// Cancelled to interrupt in-flight fetches.
    pub interrupt: CancellationToken,
}

/// What happened to one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// The crawl had stopped before the fetch started.
    Skipped,
    /// The fetch failed; logged and otherwise ignored.
    FetchFailed,
    Crawled {
        lines_submitted: usize,
        links_enqueued: usize,
    },
}

pub async fn crawl_page(
    ctx: &PageTaskContext,
    url: &PageUrl,
) -> Result<PageOutcome, TaskInterrupted> {
    let stop = ctx.sink.stop_signal();
    if stop.is_set() {
        return Ok(PageOutcome::Skipped);
    }

    let fetched = tokio::select! {
        biased;
        _ = ctx.interrupt.cancelled() => Err(FetchError::Interrupted),
        result = ctx.fetcher.fetch(url) => result,
    };

    let content = match fetched {
        Ok(content) => content,
        Err(FetchError::Http(status)) => {
            warn!("Unexpected http error - {} for {}", status, url);
            return Ok(PageOutcome::FetchFailed);
        }
        Err(FetchError::Other(message)) => {
            warn!("Failed to fetch {}: {}", url, message);
            return Ok(PageOutcome::FetchFailed);
        }
        Err(FetchError::Interrupted) => {
            return Err(TaskInterrupted {
                url: url.to_string(),
            });
        }
    };

    let mut lines_submitted = 0;
    for element in &content.resources {
        let Some(line) = classify(element) else {
            continue;
        };

        if stop.is_set() {
            debug!("Stop signal set, skipping remaining resources of {}", url);
            break;
        }

        match ctx.sink.write(line).await {
            Ok(true) => lines_submitted += 1,
            // The sink stopped while we waited for room
            Ok(false) => break,
            Err(SinkError::Stopped) => {
                debug!("Sink stopped before {} was done", url);
                break;
            }
            Err(e) => {
                warn!("Could not submit line from {}: {}", url, e);
                break;
            }
        }
    }

    let mut links_enqueued = 0;
    for link in content.page_links {
        if ctx.frontier.mark_visited_if_new(&link)
            && ctx.frontier.enqueue(link).await == Enqueued::Queued
        {
            links_enqueued += 1;
        }
    }

    debug!(
        "{}: {} line(s) submitted, {} link(s) queued",
        url, lines_submitted, links_enqueued
    );
    Ok(PageOutcome::Crawled {
        lines_submitted,
        links_enqueued,
    })
}
