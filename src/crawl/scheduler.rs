// src/crawl/scheduler.rs
// =============================================================================
// The scheduler drives the crawl: it takes URLs off the frontier and runs a
// page task for each one on a fixed pool of workers.
//
// Two limits keep memory flat no matter how big the site is:
// - The pool has `threads` workers, so at most that many pages are fetched
//   at once
// - An admission semaphore with `task_bound` permits caps how many tasks may
//   be queued or running. A permit is taken before a task is submitted and
//   given back when the task ends (or is rejected)
//
// The dispatch loop ends when:
// - the sink raises the global stop signal (ceiling reached or stop request)
// - a page task reports an interruption
// - the frontier is empty and no task is outstanding (nothing left to find)
//
// Rust concepts:
// - Semaphore: a counter of permits; acquire waits while it's at zero
// - Notify: wakes the dispatch loop when a task finishes
// - Drop: TaskSlot gives its permit back however the task ends
//
// The frontier shares the Admission with the loop. A page task blocked on a
// full frontier under the Block policy uses it to tell whether anyone can
// still take from the frontier.
// =============================================================================

use super::frontier::Frontier;
use super::task::{crawl_page, PageOutcome, PageTaskContext};
use crate::fetch::PageUrl;
use crate::sink::StopSignal;
use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of workers fetching pages in parallel.
    pub threads: usize,
    /// Admission permits: tasks queued or running at once.
    pub task_bound: usize,
    /// How long shutdown waits for in-flight tasks.
    pub shutdown_timeout: Duration,
}

/// Why the dispatch loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlOutcome {
    /// The global stop signal was raised.
    Stopped,
    /// No page left to crawl.
    Exhausted,
    /// A task or the owner interrupted the crawl.
    Interrupted,
}

/// Admission permits plus what it takes to tell the frontier has stalled.
#[derive(Debug)]
pub struct Admission {
    permits: Arc<Semaphore>,
    bound: usize,
    workers: usize,
}

impl Admission {
    pub fn new(config: &SchedulerConfig) -> Arc<Admission> {
        let bound = config.task_bound.max(1);
        Arc::new(Admission {
            permits: Arc::new(Semaphore::new(bound)),
            bound,
            workers: config.threads.max(1),
        })
    }

    /// Waits for a free permit. `None` only if the semaphore was closed.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.permits.clone().acquire_owned().await.ok()
    }

    /// Tasks queued or running right now.
    pub fn outstanding(&self) -> usize {
        self.bound - self.permits.available_permits()
    }

    /// True when no new task can be admitted and `blocked` tasks already
    /// occupy every worker that could run. Those tasks are then the only
    /// ones that could make progress, and they are all waiting.
    pub fn saturated_by(&self, blocked: usize) -> bool {
        self.permits.available_permits() == 0 && blocked >= self.workers.min(self.bound)
    }
}

pub struct Scheduler {
    pool: WorkerPool,
    admission: Arc<Admission>,
    task_done: Arc<Notify>,
    frontier: Arc<Frontier>,
    stop: StopSignal,
    interrupt: CancellationToken,
    dispatched: u64,
    shutdown_timeout: Duration,
}

impl Scheduler {
    /// Spawns the worker pool. The pool keeps `ctx` alive until shutdown.
    ///
    /// Admission comes from the frontier so both sides see the same permits.
    pub fn new(config: &SchedulerConfig, ctx: Arc<PageTaskContext>) -> Scheduler {
        let admission = ctx.frontier.admission().clone();
        let (workers, capacity) = (admission.workers, admission.bound);

        Scheduler {
            admission,
            task_done: Arc::new(Notify::new()),
            frontier: ctx.frontier.clone(),
            stop: ctx.sink.stop_signal().clone(),
            interrupt: ctx.interrupt.clone(),
            dispatched: 0,
            shutdown_timeout: config.shutdown_timeout,
            pool: WorkerPool::new(workers, capacity, ctx),
        }
    }

    /// Dispatches pages until the crawl stops, is interrupted or runs out
    /// of pages.
    pub async fn run(&mut self) -> CrawlOutcome {
        loop {
            if self.stop.is_set() {
                return CrawlOutcome::Stopped;
            }

            let next = tokio::select! {
                biased;
                _ = self.stop.wait() => Next::Stopped,
                _ = self.interrupt.cancelled() => Next::Interrupted,
                url = self.frontier.take_next() => Next::Page(url),
                _ = self.idle() => Next::Idle,
            };

            match next {
                Next::Stopped => return CrawlOutcome::Stopped,
                Next::Interrupted => return CrawlOutcome::Interrupted,
                Next::Page(Some(url)) => self.dispatch(url).await,
                Next::Page(None) => return CrawlOutcome::Exhausted,
                Next::Idle => {
                    // take_next was dropped with the select, so the
                    // frontier lock is free and the check is exact
                    if self.frontier.is_empty_when_idle() {
                        info!("Frontier exhausted after {} page(s)", self.dispatched);
                        return CrawlOutcome::Exhausted;
                    }
                }
            }
        }
    }

    /// Number of page tasks accepted by the pool so far.
    pub fn pages_dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Stops accepting tasks and waits (bounded) for the workers.
    pub async fn shutdown(self) {
        self.pool.shutdown(self.shutdown_timeout).await;
    }

    // Tasks queued or running right now
    fn outstanding(&self) -> usize {
        self.admission.outstanding()
    }

    // Resolves once no task is outstanding
    async fn idle(&self) {
        loop {
            let finished = self.task_done.notified();
            if self.outstanding() == 0 {
                return;
            }
            finished.await;
        }
    }

    async fn dispatch(&mut self, url: PageUrl) {
        let permit = tokio::select! {
            biased;
            _ = self.stop.wait() => None,
            _ = self.interrupt.cancelled() => None,
            permit = self.admission.acquire() => permit,
        };

        let Some(permit) = permit else {
            debug!("Not dispatching {}, crawl is stopping", url);
            return;
        };

        let job = Job {
            url,
            _slot: TaskSlot {
                permit: Some(permit),
                done: self.task_done.clone(),
            },
        };

        match self.pool.submit(job) {
            Ok(()) => self.dispatched += 1,
            // Dropping the job gives the permit back
            Err(job) => warn!("Task for {} was rejected", job.url),
        }
    }
}

enum Next {
    Stopped,
    Interrupted,
    Page(Option<PageUrl>),
    Idle,
}

// Holds an admission permit for as long as its task is queued or running
struct TaskSlot {
    permit: Option<OwnedSemaphorePermit>,
    done: Arc<Notify>,
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        // release first so the woken dispatch loop sees the new count
        drop(self.permit.take());
        self.done.notify_one();
    }
}

struct Job {
    url: PageUrl,
    _slot: TaskSlot,
}

// A fixed number of workers pulling jobs from one bounded channel
struct WorkerPool {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn new(threads: usize, capacity: usize, ctx: Arc<PageTaskContext>) -> WorkerPool {
        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..threads)
            .map(|id| tokio::spawn(worker(id, receiver.clone(), ctx.clone())))
            .collect();

        WorkerPool {
            sender: Some(sender),
            workers,
        }
    }

    // Never waits: a full or closed pool hands the job back
    fn submit(&self, job: Job) -> Result<(), Job> {
        match &self.sender {
            Some(sender) => sender.try_send(job).map_err(|e| e.into_inner()),
            None => Err(job),
        }
    }

    fn close(&mut self) {
        self.sender = None;
    }

    async fn shutdown(mut self, timeout: Duration) {
        self.close();

        let finished = tokio::time::timeout(timeout, join_all(self.workers.iter_mut())).await;
        if finished.is_err() {
            warn!("Workers still busy after {:?}, aborting them", timeout);
            for worker in &self.workers {
                worker.abort();
            }
            // wait for the aborted tasks to drop their state
            join_all(self.workers.iter_mut()).await;
        }
        debug!("Worker pool stopped");
    }
}

async fn worker(id: usize, jobs: Arc<Mutex<mpsc::Receiver<Job>>>, ctx: Arc<PageTaskContext>) {
    loop {
        let job = {
            let mut jobs = jobs.lock().await;
            jobs.recv().await
        };
        let Some(job) = job else {
            break;
        };

        match crawl_page(&ctx, &job.url).await {
            Ok(PageOutcome::Skipped) => debug!("worker {}: skipped {}", id, job.url),
            Ok(_) => {}
            Err(e) => {
                info!("worker {}: {}", id, e);
                ctx.interrupt.cancel();
            }
        }
    }
    debug!("worker {} stopped", id);
}
