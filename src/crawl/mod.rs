// src/crawl/mod.rs
// =============================================================================
// This module handles website crawling.
//
// Pieces:
// - frontier: visited set + bounded queue of pages waiting to be fetched
// - task: what happens to one page (fetch, classify, submit, discover)
// - scheduler: worker pool + admission control + the dispatch loop
//
// crawl() wires them to a sink and runs one crawl from start to finish:
//
//   start URL -> frontier -> scheduler -> page task -> sink
//                   ^                        |
//                   +------- new links ------+
//
// Rust concepts:
// - Arc: the frontier and the task context are shared by every worker
// - CancellationToken: Ctrl-C fans out to the sink and the running fetches
// =============================================================================

mod frontier;
mod scheduler;
mod task;

use crate::error::SinkError;
use crate::fetch::{PageFetcher, PageUrl};
use crate::sink::{Sink, SinkConfig, SinkReport, SinkState};
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use frontier::Frontier;
use scheduler::{Admission, Scheduler};
use task::PageTaskContext;

pub use frontier::{FrontierConfig, FrontierPolicy};
pub use scheduler::{CrawlOutcome, SchedulerConfig};

/// Everything one crawl run needs to know.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub start_url: PageUrl,
    pub scheduler: SchedulerConfig,
    pub frontier: FrontierConfig,
    pub sink: SinkConfig,
}

/// Summary of one crawl run.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub outcome: CrawlOutcome,
    pub pages_dispatched: u64,
    pub pages_discovered: usize,
    /// Links lost to a full frontier.
    pub links_dropped: u64,
    pub sink: SinkReport,
}

// Crawls from config.start_url until the sink has written
// config.sink.max_lines lines, no page is left, or `cancel` fires.
//
// Parameters:
//   config: crawl settings
//   fetcher: turns page URLs into links and resource elements
//   out: where the download task lines go (owned by the sink)
//   cancel: external stop request (e.g. Ctrl-C)
pub async fn crawl<W>(
    config: &CrawlConfig,
    fetcher: Arc<dyn PageFetcher>,
    out: W,
    cancel: CancellationToken,
) -> Result<CrawlReport, SinkError>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let sink = Sink::start(out, &config.sink, cancel.child_token());

    let frontier = Arc::new(Frontier::new(
        &config.frontier,
        sink.stop_signal(),
        Admission::new(&config.scheduler),
    ));
    frontier.seed(config.start_url.clone()).await;

    let ctx = Arc::new(PageTaskContext {
        fetcher,
        frontier: frontier.clone(),
        sink: sink.handle(),
        interrupt: cancel.child_token(),
    });

    info!("Crawling from {}", config.start_url);
    let mut scheduler = Scheduler::new(&config.scheduler, ctx);
    let outcome = scheduler.run().await;
    let pages_dispatched = scheduler.pages_dispatched();
    debug!("Dispatch loop ended: {:?}", outcome);

    // The workers own the last task context, and with it the sink handles
    scheduler.shutdown().await;
    let cleared = frontier.clear().await;
    if cleared > 0 {
        debug!("Cleared {} pending page(s) from the frontier", cleared);
    }

    let sink_report = if outcome == CrawlOutcome::Exhausted && sink.state() == SinkState::Running {
        sink.finish().await?
    } else {
        sink.stop().await?
    };

    Ok(CrawlReport {
        outcome,
        pages_dispatched,
        pages_discovered: frontier.visited_count(),
        links_dropped: frontier.dropped_count(),
        sink: sink_report,
    })
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why finish() for an exhausted crawl but stop() otherwise?
//    - finish() lets the sink write everything that is still queued, then
//      it stops on its own once the last handle is gone
//    - stop() throws the queue away; that's what we want once the limit was
//      reached or the user pressed Ctrl-C
//
// 2. What is child_token()?
//    - A CancellationToken that is cancelled when its parent is
//    - Cancelling the child doesn't touch the parent
//    - A page task can interrupt the scheduler without pretending the
//      user pressed Ctrl-C
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{img, link, page_url, script, ScriptedFetcher};
    use crate::sink::StopReason;
    use std::collections::HashSet;
    use std::time::Duration;

    const A: &str = "https://site.test/";
    const B: &str = "https://site.test/b";
    const C: &str = "https://site.test/c";

    fn config(start: &str, max_lines: u64, threads: usize) -> CrawlConfig {
        CrawlConfig {
            start_url: page_url(start),
            scheduler: SchedulerConfig {
                threads,
                task_bound: 8,
                shutdown_timeout: Duration::from_secs(5),
            },
            frontier: FrontierConfig {
                capacity: 64,
                policy: FrontierPolicy::Drop,
                insert_delay: Duration::from_millis(20),
            },
            sink: SinkConfig {
                max_lines,
                queue_capacity: 4,
                insert_delay: Duration::from_millis(20),
            },
        }
    }

    // A, B and C all link to each other
    fn triangle() -> ScriptedFetcher {
        ScriptedFetcher::new()
            .page(
                A,
                &[B, C, A],
                vec![
                    img("https://site.test/img/a.jpg", A),
                    script("https://site.test/js/app.js", A),
                    link("https://site.test/favicon.ico", A, Some("icon"), Some("image/x-icon")),
                ],
            )
            .page(
                B,
                &[A, C],
                vec![
                    img("https://site.test/img/b.png", B),
                    script("https://site.test/js/app.js", B),
                ],
            )
            .page(
                C,
                &[A, B, "https://site.test/c#top"],
                vec![
                    link("https://site.test/c.css", C, Some("stylesheet"), Some("text/css")),
                    link("https://site.test/c", C, Some("canonical"), Some("text/html")),
                ],
            )
    }

    async fn crawl_to_file(
        config: &CrawlConfig,
        fetcher: Arc<dyn PageFetcher>,
    ) -> (CrawlReport, Vec<String>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.txt");
        let out = tokio::fs::File::create(&path).await.unwrap();

        let report = tokio::time::timeout(
            Duration::from_secs(10),
            crawl(config, fetcher, out, CancellationToken::new()),
        )
        .await
        .expect("crawl deadlocked")
        .unwrap();

        let lines = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        (report, lines)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cyclic_site_crawled_once_per_page() {
        let fetcher = Arc::new(triangle());
        let (report, lines) = crawl_to_file(&config(A, 100, 3), fetcher.clone()).await;

        assert_eq!(report.outcome, CrawlOutcome::Exhausted);
        assert_eq!(report.pages_dispatched, 3);
        for page in [A, B, C] {
            assert_eq!(fetcher.calls(page), 1, "{} fetched more than once", page);
        }
        assert_eq!(fetcher.total_calls(), 3);

        // app.js shows up on A and B but is written once
        let expected: HashSet<String> = [
            "https://site.test/img/a.jpg imgs/jpg/a.jpg",
            "https://site.test/js/app.js scripts/app.js",
            "https://site.test/favicon.ico icons/site.test_favicon.ico",
            "https://site.test/img/b.png imgs/png/b.png",
            "https://site.test/c.css css/c.css",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();
        let written: HashSet<String> = lines.iter().cloned().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(written, expected);

        assert_eq!(report.sink.lines_written, 5);
        assert_eq!(report.sink.reason, StopReason::ProducersGone);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_line_ceiling_stops_everything() {
        // a wide site: the start page links to 50 pages with 10 resources each
        let links: Vec<String> = (0..50).map(|i| format!("https://wide.test/p{}", i)).collect();
        let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();

        let mut fetcher = ScriptedFetcher::new().page(
            "https://wide.test/",
            &link_refs,
            vec![script("https://wide.test/root.js", "https://wide.test/")],
        );
        for (i, page) in links.iter().enumerate() {
            let resources = (0..10)
                .map(|r| img(&format!("https://wide.test/{}/{}.png", i, r), page))
                .collect();
            fetcher = fetcher.page(page, &[], resources);
        }

        let (report, lines) =
            crawl_to_file(&config("https://wide.test/", 1, 4), Arc::new(fetcher)).await;

        assert_eq!(lines, vec!["https://wide.test/root.js scripts/root.js"]);
        assert_ne!(report.outcome, CrawlOutcome::Interrupted);
        assert_eq!(report.sink.lines_written, 1);
        assert_eq!(report.sink.reason, StopReason::CeilingReached);
    }

    #[tokio::test]
    async fn test_failed_start_page_exhausts() {
        let fetcher = Arc::new(ScriptedFetcher::new().failing(A, 500));
        let (report, lines) = crawl_to_file(&config(A, 10, 2), fetcher.clone()).await;

        assert_eq!(report.outcome, CrawlOutcome::Exhausted);
        assert_eq!(fetcher.total_calls(), 1);
        assert!(lines.is_empty());
    }

    // The start page links to `fan_out` pages that have no links of their own
    fn star(fan_out: usize) -> (ScriptedFetcher, Vec<String>) {
        let leaves: Vec<String> = (0..fan_out).map(|i| format!("https://star.test/{}", i)).collect();
        let refs: Vec<&str> = leaves.iter().map(String::as_str).collect();
        let fetcher = ScriptedFetcher::new().page(
            "https://star.test/",
            &refs,
            vec![script("https://star.test/app.js", "https://star.test/")],
        );
        (fetcher, leaves)
    }

    fn narrow(policy: FrontierPolicy) -> CrawlConfig {
        let mut config = config("https://star.test/", 100, 1);
        config.scheduler.task_bound = 1;
        config.frontier.capacity = 1;
        config.frontier.policy = policy;
        config
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_block_policy_finishes_when_frontier_cannot_drain() {
        // one worker, one permit, one frontier slot: the start page's task
        // holds the permit while waiting for room that only it could free
        let (fetcher, leaves) = star(4);
        let fetcher = Arc::new(fetcher);
        let (report, lines) = crawl_to_file(&narrow(FrontierPolicy::Block), fetcher.clone()).await;

        assert_eq!(report.outcome, CrawlOutcome::Exhausted);
        assert_eq!(fetcher.calls("https://star.test/"), 1);
        for leaf in &leaves {
            assert!(fetcher.calls(leaf) <= 1, "{} fetched more than once", leaf);
        }
        assert!(report.links_dropped > 0);
        assert_eq!(
            fetcher.total_calls() as u64 + report.links_dropped,
            report.pages_discovered as u64
        );
        assert_eq!(lines, vec!["https://star.test/app.js scripts/app.js"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_block_policy_keeps_links_while_frontier_drains() {
        let (fetcher, leaves) = star(12);
        let fetcher = Arc::new(fetcher);
        let mut config = config("https://star.test/", 100, 2);
        config.scheduler.task_bound = 32;
        config.frontier.capacity = 2;
        config.frontier.policy = FrontierPolicy::Block;
        config.frontier.insert_delay = Duration::from_millis(200);

        let (report, _) = crawl_to_file(&config, fetcher.clone()).await;

        assert_eq!(report.outcome, CrawlOutcome::Exhausted);
        assert_eq!(report.links_dropped, 0);
        for leaf in &leaves {
            assert_eq!(fetcher.calls(leaf), 1, "{} not fetched exactly once", leaf);
        }
        assert_eq!(report.pages_dispatched, 13);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_drop_policy_discards_overflow() {
        let (fetcher, leaves) = star(4);
        let fetcher = Arc::new(fetcher);
        let (report, _) = crawl_to_file(&narrow(FrontierPolicy::Drop), fetcher.clone()).await;

        assert_eq!(report.outcome, CrawlOutcome::Exhausted);
        assert!(report.links_dropped > 0);
        for leaf in &leaves {
            assert!(fetcher.calls(leaf) <= 1);
        }
        assert_eq!(
            fetcher.total_calls() as u64 + report.links_dropped,
            report.pages_discovered as u64
        );
    }

    #[tokio::test]
    async fn test_cancel_stops_crawl() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .page(A, &[B], vec![])
                .with_delay(Duration::from_secs(30)),
        );
        let dir = tempfile::tempdir().unwrap();
        let out = tokio::fs::File::create(dir.path().join("links.txt")).await.unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            crawl(&config(A, 10, 2), fetcher, out, cancel),
        )
        .await
        .expect("crawl ignored cancellation")
        .unwrap();

        assert_ne!(report.outcome, CrawlOutcome::Exhausted);
        assert_eq!(report.sink.reason, StopReason::Requested);
        assert_eq!(report.sink.lines_written, 0);
    }

    #[tokio::test]
    async fn test_zero_ceiling_writes_nothing() {
        let fetcher = Arc::new(triangle());
        let (report, lines) = crawl_to_file(&config(A, 0, 2), fetcher.clone()).await;

        assert!(lines.is_empty());
        assert_eq!(report.sink.lines_written, 0);
        assert_eq!(report.sink.reason, StopReason::CeilingReached);
        // the start page may already be in flight when the sink stops
        assert!(fetcher.total_calls() <= 1);
    }
}
