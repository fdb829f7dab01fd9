// src/cli.rs

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::deployment::DeploymentMode;

/// Hand a duty roster workbook to the external assignment tool.
///
/// `config.yaml` is the primary source of truth.
/// CLI flags only override config values.
#[derive(Parser, Debug)]
#[command(name = "dutyrun", version, disable_help_subcommand = true)]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command that needs the tool setup.
#[derive(Args, Debug, Clone)]
pub struct ToolArgs {
    /// Path to config file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Override the deployment mode from config
    #[arg(long, value_enum)]
    pub mode: Option<DeploymentMode>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the roster tool on a workbook and show the result.
    ///
    /// Without FILE, a workbook is picked interactively from picker.dir
    /// (or taken from the clipboard with --clipboard).
    Run {
        /// Workbook to process
        file: Option<PathBuf>,

        #[command(flatten)]
        tool: ToolArgs,

        /// Kill the tool after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Re-run whenever the workbook changes
        #[arg(long)]
        watch: bool,

        /// Read the workbook path from the clipboard
        #[arg(long, conflicts_with = "file")]
        clipboard: bool,
    },

    /// Check the tool setup (and optionally a workbook) without running anything.
    Check {
        file: Option<PathBuf>,

        #[command(flatten)]
        tool: ToolArgs,
    },

    /// Serve the runner over a loopback HTTP API.
    ///
    /// Requests must carry `Authorization: Bearer $DUTYRUN_API_KEY`.
    Serve {
        #[arg(long, default_value = "127.0.0.1:7878")]
        addr: String,

        #[command(flatten)]
        tool: ToolArgs,
    },

    /// Create a starter config.yaml in the current directory.
    Init,
}
