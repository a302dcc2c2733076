// src/settings.rs
// =============================================================================
// Validated settings built from the command line.
//
// clap only checks that numbers are numbers. Here we check what the crawl
// relies on: positive thread count and queue sizes, a real http/https start
// URL, and an output path we can actually write to.
// =============================================================================

use crate::cli::Cli;
use crate::crawl::{CrawlConfig, FrontierConfig, FrontierPolicy, SchedulerConfig};
use crate::error::SettingsError;
use crate::fetch::PageUrl;
use crate::sink::SinkConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub threads_number: usize,
    pub out_file_path: PathBuf,
    pub max_links_number: u64,
    pub start_url: PageUrl,
    pub frontier_capacity: usize,
    pub frontier_policy: FrontierPolicy,
    pub sink_capacity: usize,
    pub insert_delay: Duration,
    pub task_bound: usize,
    pub shutdown_timeout: Duration,
    pub fetch_timeout: Duration,
}

impl TryFrom<&Cli> for Settings {
    type Error = SettingsError;

    fn try_from(cli: &Cli) -> Result<Self, Self::Error> {
        Ok(Settings {
            threads_number: positive(cli.threads_number, "--threads-number")?,
            out_file_path: writable_file(&cli.out_file_path)?,
            max_links_number: cli.max_links_number,
            start_url: start_url(&cli.start_url)?,
            frontier_capacity: positive(cli.frontier_capacity, "--frontier-capacity")?,
            frontier_policy: cli.frontier_policy,
            sink_capacity: positive(cli.sink_capacity, "--sink-capacity")?,
            insert_delay: Duration::from_millis(cli.insert_delay_ms),
            task_bound: positive(cli.task_bound, "--task-bound")?,
            shutdown_timeout: Duration::from_secs(cli.shutdown_timeout_secs),
            fetch_timeout: Duration::from_secs(cli.fetch_timeout_secs),
        })
    }
}

impl Settings {
    /// The part of the settings the crawl engine consumes.
    pub fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            start_url: self.start_url.clone(),
            scheduler: SchedulerConfig {
                threads: self.threads_number,
                task_bound: self.task_bound,
                shutdown_timeout: self.shutdown_timeout,
            },
            frontier: FrontierConfig {
                capacity: self.frontier_capacity,
                policy: self.frontier_policy,
                insert_delay: self.insert_delay,
            },
            sink: SinkConfig {
                max_lines: self.max_links_number,
                queue_capacity: self.sink_capacity,
                insert_delay: self.insert_delay,
            },
        }
    }
}

fn positive(value: usize, option: &'static str) -> Result<usize, SettingsError> {
    if value == 0 {
        return Err(SettingsError::NotPositive { option });
    }
    Ok(value)
}

fn start_url(value: &str) -> Result<PageUrl, SettingsError> {
    PageUrl::parse(value).ok_or_else(|| SettingsError::InvalidUrl {
        option: "--start-url",
        value: value.to_string(),
    })
}

// A missing file is fine (the writer creates it); an existing one must be a
// regular file that isn't read-only.
fn writable_file(value: &str) -> Result<PathBuf, SettingsError> {
    const OPTION: &str = "--out-file-path";
    let path = Path::new(value);

    if path.is_dir() {
        return Err(SettingsError::IsDirectory {
            option: OPTION,
            path: value.to_string(),
        });
    }

    if let Ok(metadata) = path.metadata() {
        if metadata.permissions().readonly() {
            return Err(SettingsError::NotWritable {
                option: OPTION,
                path: value.to_string(),
            });
        }
    }

    Ok(path.to_path_buf())
}
