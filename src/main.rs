// src/main.rs

//! debugrun
//!
//! Entry point for the debugrun CLI.
//!
//! This binary runs a snippet of code in one of the supported languages and
//! prints a single marked summary of what happened. It delegates all real
//! work to the `runner` module.
//!
//! Responsibilities of this file:
//! - Load `.env` and install the log subscriber
//! - Parse CLI arguments
//! - Hand off execution to the runner

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use debugrun::{cli, runner};

/// Program entry point.
///
/// Uses Tokio because executions spawn and wait on compiler and
/// interpreter processes asynchronously.
#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout carries only the summary
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();

    runner::run(cli).await
}
