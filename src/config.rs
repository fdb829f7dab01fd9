// src/config.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::util::resolve_relative_to_config;

/// Root configuration loaded from `config.yaml`.
///
/// This file controls:
/// - Where the roster tool lives for each deployment mode
/// - Which extra environment variables the tool receives
/// - Where the terminal picker looks for workbooks
/// - How results are presented
///
/// Relative paths are resolved against the directory holding the config
/// file by [`Config::load`].
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub tool: ToolConfig,

    /// Environment variables added to the tool process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub picker: PickerConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Deployment mode as written in the config; `auto` is resolved at startup.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModeSetting {
    #[default]
    Auto,
    Development,
    Packaged,
}

/// Location of the external roster tool.
///
/// Example:
///
/// tool:
///   mode: auto
///   interpreter: .venv/bin/python
///   script: dutyAssign.py
///   executable: dist/dutyAssign
#[derive(Debug, Deserialize, Clone)]
pub struct ToolConfig {
    #[serde(default)]
    pub mode: ModeSetting,

    /// Interpreter used in development mode. A bare name is looked up on `PATH`.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Script handed to the interpreter in development mode.
    #[serde(default)]
    pub script: Option<PathBuf>,

    /// Self-contained executable used in packaged mode.
    #[serde(default)]
    pub executable: Option<PathBuf>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Kill the tool after this many milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

/// Where the terminal picker looks for input workbooks.
#[derive(Debug, Deserialize, Clone)]
pub struct PickerConfig {
    #[serde(default = "default_picker_dir")]
    pub dir: PathBuf,

    /// Accepted extensions without the dot; `*` accepts any file.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            dir: default_picker_dir(),
            extensions: default_extensions(),
        }
    }
}

fn default_picker_dir() -> PathBuf {
    PathBuf::from(".")
}

pub fn default_extensions() -> Vec<String> {
    ["xlsx", "xls", "xlsm"].iter().map(|s| s.to_string()).collect()
}

/// Output configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default)]
    pub mode: OutputMode,

    /// Only used when mode = file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::default(),
            file: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Simple,
    Pretty,
    Stdout,
    File,
}

impl Config {
    /// Load and parse `config.yaml` from disk, resolving relative paths.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let cfg = Self::parse(&raw)?;
        cfg.resolve_paths(path)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("Failed to parse YAML config")
    }

    fn resolve_paths(mut self, config_path: &Path) -> Result<Self> {
        let resolve = |p: &Path| resolve_relative_to_config(config_path, p);

        if looks_like_path(&self.tool.interpreter) {
            let resolved = resolve(Path::new(&self.tool.interpreter))?;
            self.tool.interpreter = resolved.to_string_lossy().into_owned();
        }
        if let Some(script) = &self.tool.script {
            self.tool.script = Some(resolve(script)?);
        }
        if let Some(exe) = &self.tool.executable {
            self.tool.executable = Some(resolve(exe)?);
        }
        if let Some(dir) = &self.tool.working_dir {
            self.tool.working_dir = Some(resolve(dir)?);
        }
        self.picker.dir = resolve(&self.picker.dir)?;
        if let Some(file) = &self.output.file {
            self.output.file = Some(resolve(file)?);
        }

        Ok(self)
    }
}

/// Bare command names (`python3`) are left for `PATH` lookup.
pub fn looks_like_path(command: &str) -> bool {
    command.contains('/') || command.contains('\\')
}
