// src/present.rs

//! Showing an [`ExecutionResult`] to the user.
//!
//! Success and failure get a different title and severity, so a user can tell
//! "the tool could not run" from "the tool ran and produced a roster".

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

use crate::config::{OutputConfig, OutputMode};
use crate::process::ExecutionResult;
use crate::util::ensure_dir;

pub trait ResultPresenter: Send {
    fn present_result(&mut self, result: &ExecutionResult) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Error,
}

/// Title, severity and headline for a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub title: &'static str,
    pub headline: &'static str,
}

impl Notice {
    pub fn for_result(result: &ExecutionResult) -> Self {
        if result.success {
            Self {
                severity: Severity::Info,
                title: "Success",
                headline: "The roster tool finished successfully",
            }
        } else {
            Self {
                severity: Severity::Error,
                title: "Error",
                headline: "The roster tool failed",
            }
        }
    }
}

/// Writes results to a terminal stream in one of the text/JSON modes.
pub struct ConsolePresenter<W> {
    mode: OutputMode,
    use_color: bool,
    out: W,
}

impl ConsolePresenter<std::io::Stdout> {
    pub fn stdout(mode: OutputMode) -> Self {
        Self::new(mode, should_use_color(), std::io::stdout())
    }
}

impl<W: Write> ConsolePresenter<W> {
    pub fn new(mode: OutputMode, use_color: bool, out: W) -> Self {
        Self {
            mode,
            use_color,
            out,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> ResultPresenter for ConsolePresenter<W> {
    fn present_result(&mut self, result: &ExecutionResult) -> Result<()> {
        let rendered = match self.mode {
            OutputMode::Simple => format_simple(result, self.use_color),
            OutputMode::Pretty => serde_json::to_string_pretty(&envelope(result, None))
                .context("Failed to format result as pretty JSON")?,
            OutputMode::Stdout => serde_json::to_string(&envelope(result, None))
                .context("Failed to format result as JSON")?,
            OutputMode::File => bail!("output.mode = file should be handled by FilePresenter"),
        };

        writeln!(self.out, "{}", rendered).context("Failed to write result")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Writes each result as a pretty JSON envelope to a file, replacing it.
#[derive(Debug, Clone)]
pub struct FilePresenter {
    path: PathBuf,
}

impl FilePresenter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ResultPresenter for FilePresenter {
    fn present_result(&mut self, result: &ExecutionResult) -> Result<()> {
        let stamp = chrono::Utc::now().to_rfc3339();
        write_output_file(&self.path, &envelope(result, Some(stamp)))?;
        tracing::info!(path = %self.path.display(), "result written");
        Ok(())
    }
}

/// Build the presenter configured in `output`.
pub fn presenter_for(output: &OutputConfig) -> Result<Box<dyn ResultPresenter>> {
    match output.mode {
        OutputMode::File => {
            let path = output
                .file
                .clone()
                .context("output.file must be set when output.mode = file")?;
            Ok(Box::new(FilePresenter::new(path)))
        }
        mode => Ok(Box::new(ConsolePresenter::stdout(mode))),
    }
}

fn envelope(result: &ExecutionResult, presented_at: Option<String>) -> Value {
    let notice = Notice::for_result(result);

    let mut map = serde_json::Map::new();
    map.insert("success".to_string(), Value::Bool(result.success));
    map.insert("severity".to_string(), serde_json::json!(notice.severity));
    map.insert("title".to_string(), Value::String(notice.title.to_string()));
    map.insert("message".to_string(), Value::String(result.message.clone()));
    if let Some(stamp) = presented_at {
        map.insert("presented_at".to_string(), Value::String(stamp));
    }

    Value::Object(map)
}

fn format_simple(result: &ExecutionResult, use_color: bool) -> String {
    let notice = Notice::for_result(result);
    let color = match notice.severity {
        Severity::Info => "32",
        Severity::Error => "31",
    };

    let mut out = String::new();
    out.push_str(&format!(
        "{} {}\n",
        paint(notice.title, color, use_color),
        notice.headline
    ));

    let detail = result.message.trim_end();
    if !detail.is_empty() {
        out.push('\n');
        out.push_str(detail);
    }

    out.trim_end().to_string()
}

fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    std::io::stdout().is_terminal()
}

fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("\x1b[{}m{}\x1b[0m", color, text)
    } else {
        text.to_string()
    }
}

fn write_output_file(path: &Path, payload: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }

    let bytes = serde_json::to_vec_pretty(payload).context("Failed to serialize result JSON")?;

    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write output file {:?}", path))?;

    Ok(())
}
