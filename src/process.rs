// src/process.rs

//! Managed execution of the external roster tool.
//!
//! [`ProcessRunner`] launches a program, drains its stdout and stderr while it
//! runs, waits for it to exit and folds everything that can go wrong into a
//! single [`ExecutionResult`]. Nothing here returns `Err`: launch failures,
//! non-zero exits, timeouts and cancellation are all ordinary results.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::engine::events::{execution_created, ExecutionEvent, ExecutionEventKind, FailureReason};
use crate::execution_id::ExecutionId;
use crate::metrics::{InvocationMetrics, MemoryTracker, SAMPLE_INTERVAL};
use crate::sinks::{EventSink, LoggingEventSink};

/// What to run. Built once per invocation and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    command: PathBuf,
    arguments: Vec<OsString>,
    working_directory: Option<PathBuf>,
}

impl ExecutionRequest {
    pub fn new<C, I, A>(command: C, arguments: I, working_directory: Option<PathBuf>) -> Self
    where
        C: Into<PathBuf>,
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            command: command.into(),
            arguments: arguments.into_iter().map(Into::into).collect(),
            working_directory,
        }
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.arguments
    }

    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    /// Short name used in failure messages: the file name of the command.
    pub fn program_name(&self) -> String {
        self.command
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.command.display().to_string())
    }
}

/// The whole contract a front-end sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
}

/// Every way a run can fail. `Display` is the user-facing message.
#[derive(Debug, Error)]
pub enum RunFailure {
    #[error("Failed to start {program}: {reason}")]
    LaunchFailure { program: String, reason: String },

    #[error("{program} exited with code {code}: {stderr}")]
    NonZeroExit {
        program: String,
        code: String,
        stderr: String,
    },

    #[error("{program} timed out after {}ms", .after.as_millis())]
    TimedOut { program: String, after: Duration },

    #[error("{program} was cancelled")]
    Cancelled { program: String },

    #[error("Failed while waiting for {program}: {reason}")]
    Wait { program: String, reason: String },
}

impl RunFailure {
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::LaunchFailure { .. } => FailureReason::LaunchFailure,
            Self::NonZeroExit { .. } => FailureReason::NonZeroExit,
            Self::TimedOut { .. } => FailureReason::TimedOut,
            Self::Cancelled { .. } => FailureReason::Cancelled,
            Self::Wait { .. } => FailureReason::Wait,
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Succeeded { stdout: String },
    Failed(RunFailure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn to_result(&self) -> ExecutionResult {
        match self {
            Self::Succeeded { stdout } => ExecutionResult {
                success: true,
                message: stdout.clone(),
            },
            Self::Failed(failure) => ExecutionResult {
                success: false,
                message: failure.to_string(),
            },
        }
    }

    fn terminal_event(&self) -> ExecutionEventKind {
        match self {
            Self::Succeeded { .. } => ExecutionEventKind::Succeeded,
            Self::Failed(failure) => ExecutionEventKind::Failed {
                reason: failure.reason(),
            },
        }
    }
}

impl From<Outcome> for ExecutionResult {
    fn from(outcome: Outcome) -> Self {
        outcome.to_result()
    }
}

/// A finished execution with its id and, if the process started, metrics.
#[derive(Debug)]
pub struct Execution {
    pub id: ExecutionId,
    pub outcome: Outcome,
    pub metrics: Option<InvocationMetrics>,
}

impl Execution {
    pub fn result(&self) -> ExecutionResult {
        self.outcome.to_result()
    }
}

/// Runs external programs. Holds only configuration, so one runner can
/// serve any number of concurrent invocations.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
    env: BTreeMap<String, String>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the child and fail if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extra variables layered on top of the inherited environment.
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub async fn run(&self, request: &ExecutionRequest) -> ExecutionResult {
        self.run_until(request, &CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), but kills the child once `cancel` fires.
    pub async fn run_until(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        let mut sink = LoggingEventSink;
        self.execute(request, cancel, &mut sink).await.outcome.into()
    }

    /// Full execution with lifecycle events delivered to `sink`.
    ///
    /// Emits `Created`, then `Started` only if the process was spawned, then
    /// exactly one of `Succeeded` / `Failed`.
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
        sink: &mut dyn EventSink,
    ) -> Execution {
        let id = ExecutionId::new();
        sink.emit(execution_created(&id));

        let (outcome, metrics) = self.drive(&id, request, cancel, sink).await;

        sink.emit(ExecutionEvent::now(&id, outcome.terminal_event()));

        if let Some(m) = &metrics {
            tracing::info!(
                execution_id = %id,
                success = outcome.is_success(),
                duration_ms = m.duration_ms as u64,
                max_rss_kb = ?m.max_rss_kb,
                "tool finished"
            );
        }

        Execution {
            id,
            outcome,
            metrics,
        }
    }

    async fn drive(
        &self,
        id: &ExecutionId,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
        sink: &mut dyn EventSink,
    ) -> (Outcome, Option<InvocationMetrics>) {
        let program = request.program_name();

        let mut cmd = Command::new(request.command());
        cmd.args(request.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = request.working_directory() {
            cmd.current_dir(dir);
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }

        tracing::debug!(
            execution_id = %id,
            command = %request.command().display(),
            args = ?request.arguments(),
            "spawning tool"
        );

        let start = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let failure = RunFailure::LaunchFailure {
                    program,
                    reason: e.to_string(),
                };
                return (Outcome::Failed(failure), None);
            }
        };

        let pid = child.id();
        sink.emit(ExecutionEvent::now(id, ExecutionEventKind::Started { pid }));
        let memory = pid.map(|pid| MemoryTracker::start(pid, SAMPLE_INTERVAL));

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);
        let drains: Vec<AbortHandle> = stdout
            .iter()
            .chain(stderr.iter())
            .map(JoinHandle::abort_handle)
            .collect();

        // The deadline covers draining too: the tool may exit while a
        // grandchild keeps its pipes open.
        let deadline = self.timeout.map(|after| tokio::time::Instant::now() + after);
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        let finished = async {
            let status = child.wait().await.map_err(|e| RunFailure::Wait {
                program: program.clone(),
                reason: e.to_string(),
            })?;
            let stdout = collect(&program, stdout).await?;
            let stderr = collect(&program, stderr).await?;
            Ok::<_, RunFailure>((status, stdout, stderr))
        };

        let settled = tokio::select! {
            finished = finished => Ok(finished),
            _ = cancel.cancelled() => Err(RunFailure::Cancelled { program: program.clone() }),
            _ = expired => Err(RunFailure::TimedOut {
                program: program.clone(),
                after: self.timeout.unwrap_or_default(),
            }),
        };

        let outcome = match settled {
            Ok(Ok((status, stdout, stderr))) => resolve_exit(program, status, stdout, stderr),
            Ok(Err(failure)) => {
                abandon(&drains);
                Outcome::Failed(failure)
            }
            Err(failure) => {
                if !matches!(child.try_wait(), Ok(Some(_))) {
                    if let Err(e) = child.kill().await {
                        tracing::warn!(execution_id = %id, "failed to kill tool: {e}");
                    }
                }
                abandon(&drains);
                Outcome::Failed(failure)
            }
        };

        let max_rss_kb = match memory {
            Some(tracker) => tokio::task::spawn_blocking(move || tracker.stop_and_take())
                .await
                .ok()
                .flatten(),
            None => None,
        };
        let metrics = InvocationMetrics {
            duration_ms: start.elapsed().as_millis(),
            max_rss_kb,
        };

        (outcome, Some(metrics))
    }
}

fn resolve_exit(program: String, status: ExitStatus, stdout: Vec<u8>, stderr: Vec<u8>) -> Outcome {
    if status.success() {
        return Outcome::Succeeded {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
        };
    }

    Outcome::Failed(RunFailure::NonZeroExit {
        program,
        code: describe_code(status),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

#[cfg(unix)]
fn describe_code(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => code.to_string(),
        (None, Some(signal)) => format!("none (killed by signal {signal})"),
        (None, None) => "unknown".to_string(),
    }
}

#[cfg(not(unix))]
fn describe_code(status: ExitStatus) -> String {
    status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Append everything the stream yields, chunk by chunk, until EOF.
fn drain<R>(mut stream: R) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    tracing::debug!("tool stream closed with error: {e}");
                    break;
                }
            }
        }
        buf
    })
}

async fn collect(program: &str, handle: Option<JoinHandle<Vec<u8>>>) -> Result<Vec<u8>, RunFailure> {
    match handle {
        Some(h) => h.await.map_err(|e| RunFailure::Wait {
            program: program.to_string(),
            reason: format!("output reader failed: {e}"),
        }),
        None => Ok(Vec::new()),
    }
}

// A grandchild may still hold the pipes open after the child is gone.
fn abandon(drains: &[AbortHandle]) {
    for handle in drains {
        handle.abort();
    }
}
