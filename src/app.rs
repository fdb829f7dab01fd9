// src/app.rs

//! Application lifecycle.
//!
//! `App` is created on startup, owns the resolved deployment mode and the
//! runner, and holds at most one front-end [`Session`] at a time. Closing
//! every session either quits or, on macOS, keeps the app resident until it
//! is activated again.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::deployment::{build_request, DeploymentMode};
use crate::picker::InputSelector;
use crate::present::ResultPresenter;
use crate::process::{ExecutionRequest, ExecutionResult, ProcessRunner};

/// Startup-time choices that override `config.yaml`.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mode: Option<DeploymentMode>,
    pub timeout_ms: Option<u64>,
}

/// One open front-end: where inputs come from and where results go.
pub struct Session {
    pub selector: Box<dyn InputSelector>,
    pub presenter: Box<dyn ResultPresenter>,
}

impl Session {
    pub fn new(selector: Box<dyn InputSelector>, presenter: Box<dyn ResultPresenter>) -> Self {
        Self {
            selector,
            presenter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterClose {
    Quit,
    StayResident,
}

pub struct App {
    config: Config,
    mode: DeploymentMode,
    runner: ProcessRunner,
    session: Option<Session>,
    stay_resident: bool,
}

impl App {
    /// Startup event: resolve the deployment mode once and build the runner.
    pub fn start(config: Config, overrides: Overrides) -> Self {
        let mode = DeploymentMode::resolve(&config.tool, overrides.mode);
        let timeout = overrides
            .timeout_ms
            .or(config.tool.timeout_ms)
            .map(Duration::from_millis);

        let runner = ProcessRunner::new()
            .with_timeout(timeout)
            .with_env(config.env.clone());

        tracing::info!(
            %mode,
            timeout_ms = ?runner.timeout().map(|t| t.as_millis() as u64),
            "app started"
        );

        Self {
            config,
            mode,
            runner,
            session: None,
            stay_resident: cfg!(target_os = "macos"),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Replace any open session with `session`.
    pub fn open_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    /// Activation event: open a session only if none is open.
    ///
    /// Returns `true` when a new session was created.
    pub fn activate(&mut self, make: impl FnOnce() -> Session) -> bool {
        if self.has_session() {
            return false;
        }
        self.open_session(make());
        true
    }

    /// All front-ends closed.
    pub fn close_all(&mut self) -> AfterClose {
        self.session = None;
        if self.stay_resident {
            AfterClose::StayResident
        } else {
            AfterClose::Quit
        }
    }

    /// Build the tool invocation for `input` under the resolved mode.
    pub fn request_for(&self, input: &Path) -> Result<ExecutionRequest> {
        build_request(self.mode, &self.config.tool, input)
    }

    /// The "open file" action: select, run, present.
    ///
    /// Returns `None` if the user cancelled the selection.
    pub async fn open_file(&mut self, cancel: &CancellationToken) -> Result<Option<ExecutionResult>> {
        let session = self.session.as_mut().context("No session is open")?;

        let Some(input) = session.selector.select_input_file()? else {
            tracing::info!("selection cancelled");
            return Ok(None);
        };

        let result = self.run_file(&input, cancel).await?;
        self.present(&result)?;
        Ok(Some(result))
    }

    /// Run the tool on `input` without presenting.
    pub async fn run_file(&self, input: &Path, cancel: &CancellationToken) -> Result<ExecutionResult> {
        tracing::info!(input = %input.display(), "running roster tool");
        let request = self.request_for(input)?;
        Ok(self.runner.run_until(&request, cancel).await)
    }

    pub fn present(&mut self, result: &ExecutionResult) -> Result<()> {
        let session = self.session.as_mut().context("No session is open")?;
        session.presenter.present_result(result)
    }

    /// Ask the open session for an input without running anything.
    pub fn select(&mut self) -> Result<Option<PathBuf>> {
        let session = self.session.as_mut().context("No session is open")?;
        session.selector.select_input_file()
    }

    #[cfg(test)]
    fn set_stay_resident(&mut self, stay: bool) {
        self.stay_resident = stay;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picker::Preselected;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<ExecutionResult>>>);

    impl ResultPresenter for Recorder {
        fn present_result(&mut self, result: &ExecutionResult) -> Result<()> {
            self.0.lock().unwrap().push(result.clone());
            Ok(())
        }
    }

    fn config(yaml: &str) -> Config {
        Config::parse(yaml).unwrap()
    }

    fn session(input: Option<&str>, recorder: &Recorder) -> Session {
        Session::new(
            Box::new(Preselected(input.map(PathBuf::from))),
            Box::new(recorder.clone()),
        )
    }

    #[test]
    fn activate_only_creates_missing_session() {
        let mut app = App::start(config("tool: {}\n"), Overrides::default());
        let recorder = Recorder::default();

        assert!(!app.has_session());
        assert!(app.activate(|| session(None, &recorder)));
        assert!(!app.activate(|| session(None, &recorder)));
        assert!(app.has_session());
    }

    #[test]
    fn close_all_quits_or_stays_resident() {
        let mut app = App::start(config("tool: {}\n"), Overrides::default());
        let recorder = Recorder::default();

        app.set_stay_resident(false);
        app.open_session(session(None, &recorder));
        assert_eq!(app.close_all(), AfterClose::Quit);
        assert!(!app.has_session());

        app.set_stay_resident(true);
        app.open_session(session(None, &recorder));
        assert_eq!(app.close_all(), AfterClose::StayResident);
        assert!(app.activate(|| session(None, &recorder)));
    }

    #[test]
    fn overrides_win_over_config() {
        let app = App::start(
            config("tool:\n  mode: development\n  timeout_ms: 1000\n"),
            Overrides {
                mode: Some(DeploymentMode::Packaged),
                timeout_ms: Some(50),
            },
        );

        assert_eq!(app.mode(), DeploymentMode::Packaged);
        assert_eq!(app.runner().timeout(), Some(Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn cancelled_selection_runs_nothing() {
        let mut app = App::start(config("tool:\n  mode: packaged\n  executable: /nope\n"), Overrides::default());
        let recorder = Recorder::default();
        app.open_session(session(None, &recorder));

        let outcome = app.open_file(&CancellationToken::new()).await.unwrap();

        assert!(outcome.is_none());
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_file_without_session_is_an_error() {
        let mut app = App::start(config("tool: {}\n"), Overrides::default());
        assert!(app.open_file(&CancellationToken::new()).await.is_err());
    }

    #[tokio::test]
    async fn launch_failure_is_presented_not_raised() {
        let mut app = App::start(
            config("tool:\n  mode: packaged\n  executable: /definitely/missing/dutyAssign\n"),
            Overrides::default(),
        );
        let recorder = Recorder::default();
        app.open_session(session(Some("roster.xlsx"), &recorder));

        let result = app.open_file(&CancellationToken::new()).await.unwrap().unwrap();

        assert!(!result.success);
        assert!(result.message.starts_with("Failed to start dutyAssign"));
        assert_eq!(recorder.0.lock().unwrap().as_slice(), &[result]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn development_mode_passes_script_then_input() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("tool.sh");
        std::fs::write(&script, "printf '%s|' \"$0\" \"$1\"\n").unwrap();

        let yaml = format!(
            "tool:\n  mode: development\n  interpreter: sh\n  script: {}\n",
            script.display()
        );
        let mut app = App::start(config(&yaml), Overrides::default());
        let recorder = Recorder::default();
        app.open_session(session(Some("june.xlsx"), &recorder));

        let result = app.open_file(&CancellationToken::new()).await.unwrap().unwrap();

        assert!(result.success, "{}", result.message);
        assert_eq!(result.message, format!("{}|june.xlsx|", script.display()));
    }
}
