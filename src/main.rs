// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap and validate them
// 2. Open the output file and build the HTTP page fetcher
// 3. Run one crawl, with Ctrl-C wired to a cancellation token
// 4. Print the report and exit with proper code
//    (0 = success, 2 = error, 130 = interrupted by Ctrl-C)
//
// Rust concepts used:
// - async/await: pages are fetched concurrently by a pool of workers
// - Result<T, E>: errors bubble up to run() and become exit code 2
// - Arc<dyn Trait>: the crawl only knows the fetcher through a trait
// =============================================================================

// Module declarations - tells Rust about our other source files
mod classify;      // src/classify.rs - resource element -> download task line
mod cli;           // src/cli.rs - command-line parsing
mod crawl;         // src/crawl/ - frontier, page tasks and the scheduler
mod error;         // src/error.rs - error types
mod fetch;         // src/fetch/ - fetching pages and extracting links
mod settings;      // src/settings.rs - validated options
mod sink;          // src/sink/ - deduplicating, bounded output writer

use clap::Parser;
use cli::Cli;
use crawl::CrawlReport;
use fetch::HttpPageFetcher;
use settings::Settings;

use anyhow::{Context, Result};
use log::{error, info};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const EXIT_OK: i32 = 0;
const EXIT_ERROR: i32 = 2;
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    // RUST_LOG overrides the default "info" level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    // This will automatically handle --help, --version, etc.
    let cli = Cli::parse();
    let settings = Settings::try_from(&cli)?;

    let fetcher = HttpPageFetcher::new(settings.fetch_timeout)
        .context("failed to build the HTTP client")?;

    let out = tokio::fs::File::create(&settings.out_file_path)
        .await
        .with_context(|| format!("failed to open {}", settings.out_file_path.display()))?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping the crawl");
            on_ctrl_c.cancel();
        }
    });

    info!(
        "Writing up to {} line(s) to {} with {} worker(s)",
        settings.max_links_number,
        settings.out_file_path.display(),
        settings.threads_number
    );

    let report = crawl::crawl(&settings.crawl_config(), Arc::new(fetcher), out, cancel.clone())
        .await
        .context("crawl failed")?;

    print_report(&report, cli.json)?;

    if cancel.is_cancelled() {
        Ok(EXIT_INTERRUPTED)
    } else {
        Ok(EXIT_OK)
    }
}

// Prints the report either as a summary or JSON
fn print_report(report: &CrawlReport, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(report)?;
        println!("{}", json_output);
    } else {
        print_summary(report);
    }
    Ok(())
}

fn print_summary(report: &CrawlReport) {
    let sink = &report.sink;

    println!("{:<24} {:?}", "Outcome", report.outcome);
    println!("{:<24} {:?}", "Sink stopped", sink.reason);
    println!("{}", "=".repeat(40));
    println!("{:<24} {}", "Lines written", sink.lines_written);
    println!("{:<24} {}", "Duplicates skipped", sink.duplicates_skipped);
    println!("{:<24} {}", "Lines discarded", sink.discarded);
    println!("{:<24} {}", "Pages dispatched", report.pages_dispatched);
    println!("{:<24} {}", "Pages discovered", report.pages_discovered);
    println!("{:<24} {}", "Links dropped", report.links_dropped);
}
