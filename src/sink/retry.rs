// src/sink/retry.rs
// =============================================================================
// A bounded queue insert that keeps retrying until it succeeds or a stop
// condition says there is no point anymore.
//
// Why not just `send().await`?
// - A plain send on a full channel waits forever
// - If the consumer has stopped draining (the sink hit its limit), a
//   producer stuck in send() would never come back
// - So we wait at most `delay` per attempt, then look at the stop condition
//
// Rust concepts:
// - Generics: RetryQueue<T> works for any item type
// - Closures: the stop condition is any `Fn() -> bool`
// =============================================================================

use std::time::Duration;
use tokio::sync::mpsc::{self, error::SendTimeoutError, error::TrySendError};

/// Producer side of a bounded channel with timed, stop-aware inserts.
#[derive(Debug)]
pub struct RetryQueue<T> {
    sender: mpsc::Sender<T>,
    delay: Duration,
}

// Derive would require T: Clone, which the sender doesn't need
impl<T> Clone for RetryQueue<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            delay: self.delay,
        }
    }
}

impl<T> RetryQueue<T> {
    /// Creates a channel holding at most `capacity` items and returns the
    /// retrying producer side together with the receiver.
    pub fn bounded(capacity: usize, delay: Duration) -> (Self, mpsc::Receiver<T>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender, delay }, receiver)
    }

    /// Inserts `item`, waiting up to `delay` per attempt.
    ///
    /// After every timed-out attempt `stop` is consulted; once it returns
    /// true the item is dropped and `false` is returned. A closed receiver
    /// also returns `false` right away, there is nobody left to read.
    pub async fn try_insert_until<F>(&self, item: T, stop: F) -> bool
    where
        F: Fn() -> bool,
    {
        let mut item = item;
        loop {
            match self.sender.send_timeout(item, self.delay).await {
                Ok(()) => return true,
                Err(SendTimeoutError::Closed(_)) => return false,
                Err(SendTimeoutError::Timeout(rejected)) => {
                    if stop() {
                        return false;
                    }
                    item = rejected;
                }
            }
        }
    }

    /// Inserts without waiting. Hands the item back when the queue is full
    /// or closed.
    pub fn try_insert(&self, item: T) -> Result<(), T> {
        self.sender.try_send(item).map_err(|e| match e {
            TrySendError::Full(item) | TrySendError::Closed(item) => item,
        })
    }
}
