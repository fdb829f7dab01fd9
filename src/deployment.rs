// src/deployment.rs

//! How the roster tool is located and invoked.
//!
//! In development the tool is a script run by an interpreter; once packaged
//! it is a self-contained executable. The mode is resolved once at startup
//! and [`build_request`] is the only place that turns it into a command line.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::config::{ModeSetting, ToolConfig};
use crate::process::ExecutionRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// Interpreter + script, e.g. `python dutyAssign.py <file>`.
    Development,
    /// Self-contained executable, e.g. `dutyAssign <file>`.
    Packaged,
}

impl DeploymentMode {
    /// Pick the mode for this process.
    ///
    /// A CLI override wins, then an explicit config value. `auto` chooses
    /// `Packaged` when the packaged executable exists on disk.
    pub fn resolve(tool: &ToolConfig, override_mode: Option<DeploymentMode>) -> Self {
        if let Some(mode) = override_mode {
            return mode;
        }

        match tool.mode {
            ModeSetting::Development => Self::Development,
            ModeSetting::Packaged => Self::Packaged,
            ModeSetting::Auto => match &tool.executable {
                Some(exe) if exe.is_file() => Self::Packaged,
                _ => Self::Development,
            },
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Packaged => f.write_str("packaged"),
        }
    }
}

/// Build the invocation of the roster tool for `input`.
///
/// - development: `<interpreter> <script> <input>`
/// - packaged:    `<executable> <input>`
///
/// The input path is always the last argument. Nothing is checked on disk.
pub fn build_request(mode: DeploymentMode, tool: &ToolConfig, input: &Path) -> Result<ExecutionRequest> {
    let working_dir = tool.working_dir.clone();

    let request = match mode {
        DeploymentMode::Development => {
            let script = tool
                .script
                .as_ref()
                .context("tool.script must be set in development mode")?;
            ExecutionRequest::new(
                &tool.interpreter,
                [script.as_os_str(), input.as_os_str()],
                working_dir,
            )
        }
        DeploymentMode::Packaged => {
            let exe = tool
                .executable
                .as_ref()
                .context("tool.executable must be set in packaged mode")?;
            ExecutionRequest::new(exe, [input.as_os_str()], working_dir)
        }
    };

    Ok(request)
}
