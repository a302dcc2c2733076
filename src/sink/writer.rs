// src/sink/writer.rs
// =============================================================================
// The backpressured sink: one task that writes download task lines to the
// output and decides when the whole crawl is done.
//
// How it works:
// 1. Producers (page tasks) push lines into a bounded channel through a
//    SinkHandle
// 2. A single consumer task takes lines one by one
// 3. Lines whose resource URL was already written are skipped
// 4. After writing line number `max_lines` the consumer stops reading
// 5. Stopping: flush and close the output, throw away whatever is still
//    queued, raise the global stop signal
//
// States: Running -> Stopping -> Stopped
//
// Only the consumer task touches the written-set and the counter, so they
// need no lock at all.
// =============================================================================

use super::{RetryQueue, StopSignal};
use crate::classify::DownloadTaskLine;
use crate::error::SinkError;
use log::{debug, error, info};
use serde::Serialize;
use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Sink tuning, usually derived from the command line.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Hard ceiling on distinct lines written.
    pub max_lines: u64,
    /// Capacity of the producer -> writer channel.
    pub queue_capacity: usize,
    /// Wait per insert attempt while the channel is full.
    pub insert_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SinkState {
    Running = 0,
    Stopping = 1,
    Stopped = 2,
}

impl SinkState {
    fn from_u8(value: u8) -> SinkState {
        match value {
            0 => SinkState::Running,
            1 => SinkState::Stopping,
            _ => SinkState::Stopped,
        }
    }
}

/// Why the sink left the Running state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `max_lines` distinct lines were written.
    CeilingReached,
    /// Someone asked the sink to stop (Ctrl-C, end of crawl).
    Requested,
    /// Every producer handle was dropped and the queue is drained.
    ProducersGone,
    /// The output could not be written.
    WriteFailed,
}

/// What the sink did over its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkReport {
    pub lines_written: u64,
    pub duplicates_skipped: u64,
    /// Lines still queued when the sink stopped; they are never written.
    pub discarded: u64,
    pub reason: StopReason,
}

/// Cloneable producer side of the sink.
#[derive(Debug, Clone)]
pub struct SinkHandle {
    queue: RetryQueue<DownloadTaskLine>,
    stopped: StopSignal,
}

impl SinkHandle {
    /// Queues a line for writing.
    ///
    /// Returns `Ok(false)` when the sink stopped while we were waiting for
    /// room (the line is dropped). Calling this after the sink is already
    /// stopped is a sequencing bug and fails with `SinkError::Stopped`.
    pub async fn write(&self, line: DownloadTaskLine) -> Result<bool, SinkError> {
        if self.stopped.is_set() {
            return Err(SinkError::Stopped);
        }

        let stopped = self.stopped.clone();
        Ok(self.queue.try_insert_until(line, move || stopped.is_set()).await)
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stopped
    }
}

/// The running sink. Dropping it does not stop the writer task; call
/// `stop()` or `finish()`.
pub struct Sink {
    handle: SinkHandle,
    stop_request: CancellationToken,
    state: Arc<AtomicU8>,
    consumer: JoinHandle<Result<SinkReport, SinkError>>,
}

impl Sink {
    /// Spawns the writer task over `out`.
    ///
    /// Cancelling `stop_request` moves the sink to Stopping; anything still
    /// queued at that point is discarded.
    pub fn start<W>(out: W, config: &SinkConfig, stop_request: CancellationToken) -> Sink
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (queue, receiver) = RetryQueue::bounded(config.queue_capacity, config.insert_delay);
        let stop_token = CancellationToken::new();
        let state = Arc::new(AtomicU8::new(SinkState::Running as u8));

        let writer = Writer {
            receiver,
            out: BufWriter::new(out),
            max_lines: config.max_lines,
            stop_request: stop_request.clone(),
            stop_token: stop_token.clone(),
            state: state.clone(),
            written: HashSet::new(),
            lines_written: 0,
            duplicates_skipped: 0,
        };

        info!("Starting writer, max {} line(s)", config.max_lines);
        let consumer = tokio::spawn(writer.run());

        Sink {
            handle: SinkHandle {
                queue,
                stopped: StopSignal::new(stop_token),
            },
            stop_request,
            state,
            consumer,
        }
    }

    pub fn handle(&self) -> SinkHandle {
        self.handle.clone()
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.handle.stopped.clone()
    }

    pub fn state(&self) -> SinkState {
        SinkState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Requests a stop and waits until the writer is Stopped.
    pub async fn stop(self) -> Result<SinkReport, SinkError> {
        debug!("Stop request received");
        self.stop_request.cancel();
        self.join().await
    }

    /// Lets the writer drain everything already queued, then stop.
    ///
    /// Only returns once every other SinkHandle clone has been dropped (or
    /// the ceiling/a stop request ends the writer first).
    pub async fn finish(self) -> Result<SinkReport, SinkError> {
        self.join().await
    }

    async fn join(self) -> Result<SinkReport, SinkError> {
        let Sink { handle, consumer, .. } = self;
        drop(handle);

        match consumer.await {
            Ok(result) => result,
            Err(e) => Err(SinkError::Io(io::Error::other(e))),
        }
    }
}

// The consumer task's private state
struct Writer<W> {
    receiver: mpsc::Receiver<DownloadTaskLine>,
    out: BufWriter<W>,
    max_lines: u64,
    stop_request: CancellationToken,
    stop_token: CancellationToken,
    state: Arc<AtomicU8>,
    written: HashSet<String>,
    lines_written: u64,
    duplicates_skipped: u64,
}

impl<W: AsyncWrite + Unpin> Writer<W> {
    async fn run(mut self) -> Result<SinkReport, SinkError> {
        let (reason, failure) = self.write_until_stopped().await;

        self.set_state(SinkState::Stopping);
        info!(
            "Stopping writer ({:?}) after {} line(s)",
            reason, self.lines_written
        );

        let closed = self.close_output().await;

        self.receiver.close();
        let mut discarded = 0;
        while self.receiver.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("Discarded {} queued line(s)", discarded);
        }

        self.set_state(SinkState::Stopped);
        self.stop_token.cancel();

        if let Some(e) = failure.or(closed.err()) {
            error!("Writer failed: {}", e);
            return Err(SinkError::Io(e));
        }

        Ok(SinkReport {
            lines_written: self.lines_written,
            duplicates_skipped: self.duplicates_skipped,
            discarded,
            reason,
        })
    }

    // The Running state. Returns why it ended and, for WriteFailed, the error.
    async fn write_until_stopped(&mut self) -> (StopReason, Option<io::Error>) {
        if self.max_lines == 0 {
            return (StopReason::CeilingReached, None);
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = self.stop_request.cancelled() => None,
                line = self.receiver.recv() => Some(line),
            };

            let line = match next {
                None => return (StopReason::Requested, None),
                Some(None) => return (StopReason::ProducersGone, None),
                Some(Some(line)) => line,
            };

            if self.written.contains(&line.resource_url) {
                self.duplicates_skipped += 1;
                continue;
            }

            let mut text = line.to_string();
            text.push('\n');
            if let Err(e) = self.out.write_all(text.as_bytes()).await {
                return (StopReason::WriteFailed, Some(e));
            }

            self.lines_written += 1;
            debug!("Write {} link {} to out", self.lines_written, line);
            self.written.insert(line.resource_url);

            if self.lines_written == self.max_lines {
                return (StopReason::CeilingReached, None);
            }
        }
    }

    async fn close_output(&mut self) -> io::Result<()> {
        self.out.flush().await?;
        self.out.shutdown().await
    }

    fn set_state(&self, state: SinkState) {
        self.state.store(state as u8, Ordering::Release);
    }
}
