// src/main.rs

//! dutyrun
//!
//! Entry point for the dutyrun CLI.
//!
//! This binary hands a duty roster workbook to the external assignment tool
//! and presents the tool's result. It delegates all real work to the
//! `runner` module.
//!
//! Responsibilities of this file:
//! - Load `.env` and set up logging
//! - Parse CLI arguments
//! - Hand off execution to the runner

mod app;
mod auth;
mod cli;
mod config;
mod deployment;
mod engine;
mod execution_id;
mod metrics;
mod picker;
mod present;
mod process;
mod runner;
mod runtime;
mod sinks;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Uses Tokio because the tool is spawned and awaited asynchronously.
#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();

    let default_filter = if cli.debug { "dutyrun=debug" } else { "dutyrun=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Logs go to stderr; stdout is reserved for presented results.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    runner::run(cli).await
}
