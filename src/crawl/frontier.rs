// src/crawl/frontier.rs
// =============================================================================
// The frontier: which pages were already handed out, and which are waiting.
//
// Two pieces:
// - VisitedSet: every page URL ever accepted for dispatch. A URL goes in the
//   moment it is discovered, before anyone fetches it, so two pages linking
//   to the same URL at the same time can't both schedule it.
// - A bounded FIFO of URLs waiting for the scheduler.
//
// When the FIFO is full the configured policy decides:
// - Drop: the link is thrown away right away (default)
// - Block: the producer waits, retrying until there is room or the crawl
//   stops. If every worker is stuck waiting like this and no new task can
//   be admitted, nobody is left to take from the FIFO; the link is then
//   dropped after one more insert delay
// =============================================================================

use super::scheduler::Admission;
use crate::fetch::PageUrl;
use crate::sink::{RetryQueue, StopSignal};
use clap::ValueEnum;
use log::debug;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

/// What to do with a discovered link when the frontier is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FrontierPolicy {
    /// Wait for room while the frontier is still being drained.
    Block,
    /// Discard the link.
    Drop,
}

#[derive(Debug, Clone)]
pub struct FrontierConfig {
    pub capacity: usize,
    pub policy: FrontierPolicy,
    /// Wait per attempt for the Block policy.
    pub insert_delay: Duration,
}

/// Result of `Frontier::enqueue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    Dropped,
}

/// Page URLs already dispatched (or about to be). Only ever grows.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: Mutex<HashSet<PageUrl>>,
}

impl VisitedSet {
    /// Inserts `url` and returns true iff this call inserted it.
    ///
    /// Check and insert happen under one lock, so among any number of
    /// concurrent callers with the same URL exactly one gets `true`.
    pub fn mark_visited_if_new(&self, url: &PageUrl) -> bool {
        let mut urls = self.urls.lock().unwrap_or_else(PoisonError::into_inner);
        urls.insert(url.clone())
    }

    pub fn len(&self) -> usize {
        self.urls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

pub struct Frontier {
    visited: VisitedSet,
    queue: RetryQueue<PageUrl>,
    // Only the scheduler takes from here; the lock just satisfies &self
    pending: tokio::sync::Mutex<mpsc::Receiver<PageUrl>>,
    policy: FrontierPolicy,
    stop: StopSignal,
    admission: Arc<Admission>,
    // producers currently waiting for room under the Block policy
    blocked: AtomicUsize,
    dropped: AtomicU64,
}

impl Frontier {
    pub fn new(config: &FrontierConfig, stop: StopSignal, admission: Arc<Admission>) -> Self {
        let (queue, receiver) = RetryQueue::bounded(config.capacity, config.insert_delay);

        Self {
            visited: VisitedSet::default(),
            queue,
            pending: tokio::sync::Mutex::new(receiver),
            policy: config.policy,
            stop,
            admission,
            blocked: AtomicUsize::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// See `VisitedSet::mark_visited_if_new`.
    pub fn mark_visited_if_new(&self, url: &PageUrl) -> bool {
        self.visited.mark_visited_if_new(url)
    }

    /// Marks and queues the start page.
    pub async fn seed(&self, url: PageUrl) -> Enqueued {
        if !self.mark_visited_if_new(&url) {
            return Enqueued::Dropped;
        }
        self.enqueue(url).await
    }

    /// Appends a URL for dispatch, applying the full-queue policy.
    /// Once the crawl has stopped nothing is queued anymore.
    pub async fn enqueue(&self, url: PageUrl) -> Enqueued {
        if self.stop.is_set() {
            return Enqueued::Dropped;
        }

        let queued = match self.policy {
            FrontierPolicy::Drop => self.queue.try_insert(url).map_err(|url| {
                debug!("Frontier full, dropping {}", url);
            }),
            FrontierPolicy::Block => {
                self.blocked.fetch_add(1, Ordering::SeqCst);
                let inserted = self
                    .queue
                    .try_insert_until(url, || self.stop.is_set() || self.stalled())
                    .await;
                self.blocked.fetch_sub(1, Ordering::SeqCst);

                if inserted {
                    Ok(())
                } else {
                    Err(())
                }
            }
        };

        match queued {
            Ok(()) => Enqueued::Queued,
            Err(()) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Enqueued::Dropped
            }
        }
    }

    /// Waits until a URL is available. Cancel-safe: dropping the future
    /// never loses a URL.
    pub async fn take_next(&self) -> Option<PageUrl> {
        let mut pending = self.pending.lock().await;
        pending.recv().await
    }

    /// True when nothing is waiting.
    ///
    /// Only exact while nobody is inside `take_next`: a contended lock
    /// reports false. The dispatch loop calls it after dropping its own
    /// `take_next` future.
    pub(super) fn is_empty_when_idle(&self) -> bool {
        self.pending
            .try_lock()
            .map(|pending| pending.is_empty())
            .unwrap_or(false)
    }

    /// Discards everything still waiting and refuses further URLs.
    /// Returns how many URLs were discarded.
    pub async fn clear(&self) -> usize {
        let mut pending = self.pending.lock().await;
        pending.close();

        let mut cleared = 0;
        while pending.try_recv().is_ok() {
            cleared += 1;
        }
        cleared
    }

    pub fn admission(&self) -> &Arc<Admission> {
        &self.admission
    }

    // The queue is full and every producer that could run is waiting on it
    fn stalled(&self) -> bool {
        let stalled = self
            .admission
            .saturated_by(self.blocked.load(Ordering::SeqCst));
        if stalled {
            debug!("Frontier full and nobody can take from it, dropping a link");
        }
        stalled
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why is VisitedSet a std Mutex and the queue a tokio Mutex?
//    - The visited check never awaits, it locks, inserts, unlocks
//    - take_next() holds its lock across recv().await, which needs an
//      async-aware lock
//
// 2. Why mark at discovery and not at dispatch?
//    - The frontier never holds the same URL twice, so a link-dense site
//      can't fill it with duplicates
//    - A URL dropped because the frontier was full stays marked and will
//      not be crawled later
// -----------------------------------------------------------------------------
