// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things).
//
// The four required options describe the crawl; the rest tune queue sizes
// and timeouts and have sensible defaults.
// =============================================================================

use crate::crawl::FrontierPolicy;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "link-harvester",
    version = "0.1.0",
    about = "Crawls a website and writes a list of resources to download",
    long_about = "link-harvester starts at one page, follows links across the site and writes \
                  one line per image, script, stylesheet, icon or feed it finds: \
                  '<resource url> <target path>'. It stops after --max-links-number lines."
)]
pub struct Cli {
    /// Number of pages fetched concurrently
    #[arg(short = 'n', long)]
    pub threads_number: usize,

    /// File the download task lines are written to
    ///
    /// Created if missing, truncated otherwise. Must not be a directory.
    #[arg(short = 'o', long)]
    pub out_file_path: String,

    /// Maximum number of distinct lines to write
    #[arg(short = 'm', long)]
    pub max_links_number: u64,

    /// Page the crawl starts from (http or https)
    #[arg(short = 'u', long)]
    pub start_url: String,

    /// How many discovered pages may wait for a worker
    #[arg(long, default_value_t = 2000)]
    pub frontier_capacity: usize,

    /// What to do with new links when the frontier is full
    #[arg(long, value_enum, default_value_t = FrontierPolicy::Drop)]
    pub frontier_policy: FrontierPolicy,

    /// How many lines may wait for the writer
    #[arg(long, default_value_t = 100)]
    pub sink_capacity: usize,

    /// Wait between attempts to insert into a full queue, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub insert_delay_ms: u64,

    /// Page tasks allowed to be queued or running at once
    #[arg(long, default_value_t = 200)]
    pub task_bound: usize,

    /// How long to wait for running page tasks on shutdown, in seconds
    #[arg(long, default_value_t = 60)]
    pub shutdown_timeout_secs: u64,

    /// Per-request HTTP timeout, in seconds
    #[arg(long, default_value_t = 10)]
    pub fetch_timeout_secs: u64,

    /// Print the final report as JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}
