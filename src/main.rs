//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `registry_transport` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use registry_transport::initialization::init_logger_with;
use registry_transport::{run_fetch, Opt};

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();

    init_logger_with(opt.log_level.clone().into(), opt.log_format.clone())
        .context("Failed to initialize logger")?;

    let report = match run_fetch(&opt).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("registry_transport error: {:#}", e);
            process::exit(1);
        }
    };

    for result in &report.results {
        match (&result.status, &result.error) {
            (_, Some(err)) => println!("{}\tERROR\t{}", result.url, err),
            (Some(status), None) => println!(
                "{}\t{}\t{} bytes in {} ms",
                result.url,
                status,
                result.bytes.unwrap_or(0),
                result.elapsed_ms
            ),
            (None, None) => println!("{}\t-", result.url),
        }
    }
    println!(
        "Fetched {} URL{} ({} succeeded, {} failed, {} retries) in {:.1}s",
        report.results.len(),
        if report.results.len() == 1 { "" } else { "s" },
        report.succeeded(),
        report.failed(),
        report.stats.transient_retries
            + report.stats.rate_limited_retries
            + report.stats.server_error_retries,
        report.elapsed_seconds
    );

    if report.failed() > 0 {
        process::exit(1);
    }
    Ok(())
}
