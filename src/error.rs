// src/error.rs
// =============================================================================
// Error types shared by the crawl components.
//
// Each component gets its own small enum so callers can match on exactly the
// failures that component produces. The binary edge (main.rs) wraps all of
// them in anyhow::Error.
// =============================================================================

use std::io;
use thiserror::Error;

/// Why a page fetch did not produce any content.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The site answered with a non-success status (4xx, 5xx, ...).
    #[error("HTTP {0}")]
    Http(u16),

    /// Anything else: DNS, TLS, timeouts, unreadable body.
    #[error("{0}")]
    Other(String),

    /// The crawl is shutting down and the fetch was abandoned.
    #[error("fetch interrupted by shutdown")]
    Interrupted,
}

/// Failures reported by the sink to its producers.
#[derive(Debug, Error)]
pub enum SinkError {
    /// A line was submitted after the sink reached its terminal state.
    /// This is a sequencing bug in the caller, never a runtime condition.
    #[error("sink already stopped")]
    Stopped,

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// A page task observed cooperative cancellation and unwound.
#[derive(Debug, Error)]
#[error("page task interrupted while processing {url}")]
pub struct TaskInterrupted {
    pub url: String,
}

/// Invalid command-line options.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{option} must be a positive number")]
    NotPositive { option: &'static str },

    #[error("{option} must be a valid http or https url: {value}")]
    InvalidUrl { option: &'static str, value: String },

    #[error("{option} must be a file, not a directory: {path}")]
    IsDirectory { option: &'static str, path: String },

    #[error("{option} isn't writable: {path}")]
    NotWritable { option: &'static str, path: String },
}
