// src/runner.rs

use crate::app::{App, Overrides, Session};
use crate::auth::API_KEY_ENV;
use crate::cli::{Cli, Command, ToolArgs};
use crate::config::Config;
use crate::deployment::DeploymentMode;
use crate::engine::validate_setup;
use crate::picker::{InputSelector, Preselected, TerminalPicker};
use crate::present::presenter_for;
use crate::runtime::{serve, ServerState};

use anyhow::{bail, Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

/// Pause after a change so a save that touches the file several times
/// triggers a single run.
const WATCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Entry point from `main.rs`.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Init => init_scaffold(Path::new(".")),

        Command::Check { file, tool } => check(file, tool),

        Command::Serve { addr, tool } => {
            let cfg = Config::load(&tool.config)?;
            let app = App::start(cfg, Overrides {
                mode: tool.mode,
                timeout_ms: None,
            });

            let state = Arc::new(ServerState {
                config: app.config().clone(),
                mode: app.mode(),
                runner: app.runner().clone(),
                api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()),
                shutdown: CancellationToken::new(),
            });

            serve(&addr, state).await
        }

        Command::Run {
            file,
            tool,
            timeout_ms,
            watch,
            clipboard,
        } => {
            let cfg = Config::load(&tool.config)?;
            let selector = selector_for(file, clipboard, &cfg)?;
            let presenter = presenter_for(&cfg.output)?;

            let mut app = App::start(cfg, Overrides {
                mode: tool.mode,
                timeout_ms,
            });
            app.activate(|| Session::new(selector, presenter));

            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());

            if watch {
                let outcome = run_with_watch(&mut app, &cancel).await;
                app.close_all();
                return outcome;
            }

            let outcome = app.open_file(&cancel).await;
            app.close_all();

            match outcome? {
                Some(result) if !result.success => bail!("Roster tool failed"),
                _ => Ok(()),
            }
        }
    }
}

fn selector_for(file: Option<PathBuf>, clipboard: bool, cfg: &Config) -> Result<Box<dyn InputSelector>> {
    if file.is_some() {
        return Ok(Box::new(Preselected(file)));
    }

    if clipboard {
        #[cfg(feature = "clipboard")]
        return Ok(Box::new(crate::picker::ClipboardSelector));

        #[cfg(not(feature = "clipboard"))]
        bail!("dutyrun was built without clipboard support");
    }

    Ok(Box::new(TerminalPicker::stdio(
        cfg.picker.dir.clone(),
        cfg.picker.extensions.clone(),
    )))
}

fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, stopping tool");
            cancel.cancel();
        }
    });
}

/* ---------------- check ---------------- */

fn check(file: Option<PathBuf>, tool: ToolArgs) -> Result<()> {
    let cfg = Config::load(&tool.config)?;
    let mode = DeploymentMode::resolve(&cfg.tool, tool.mode);

    let result = validate_setup(&cfg, mode, file.as_deref());
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.is_valid() {
        bail!("Setup check failed ({} mode): {}", mode, result.codes().join(", "));
    }
    Ok(())
}

/* ---------------- watch mode ---------------- */

async fn run_with_watch(app: &mut App, cancel: &CancellationToken) -> Result<()> {
    let Some(input) = app.select()? else {
        return Ok(());
    };
    let input = input
        .canonicalize()
        .with_context(|| format!("Unable to resolve input {:?}", input))?;
    let dir = input
        .parent()
        .context("Input file has no parent directory")?
        .to_path_buf();

    let (tx, mut rx) = unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = tx.send(res);
    })
    .context("Failed to initialise file watcher")?;

    // Editors often replace the file on save, so watch the directory.
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    loop {
        let result = app.run_file(&input, cancel).await?;
        app.present(&result)?;

        if cancel.is_cancelled() {
            break;
        }
        eprintln!("Watching {} for changes (Ctrl-C to stop)", input.display());

        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = wait_for_change(&mut rx, &input) => {
                if !changed {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Wait until `input` is written; `false` once the watcher is gone.
async fn wait_for_change(
    rx: &mut UnboundedReceiver<notify::Result<Event>>,
    input: &Path,
) -> bool {
    loop {
        match rx.recv().await {
            None => return false,
            Some(Ok(event)) if touches(&event, input) => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => tracing::warn!("watch error: {e}"),
        }
    }

    tokio::time::sleep(WATCH_DEBOUNCE).await;
    while rx.try_recv().is_ok() {}
    true
}

fn touches(event: &Event, input: &Path) -> bool {
    let relevant = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
    relevant && event.paths.iter().any(|p| p.file_name() == input.file_name())
}

/* ---------------- init ---------------- */

fn init_scaffold(dir: &Path) -> Result<()> {
    let path = dir.join("config.yaml");
    if path.exists() {
        eprintln!("config.yaml already exists (skipping)");
        return Ok(());
    }

    std::fs::write(&path, default_config_yaml())
        .with_context(|| format!("Failed to write {:?}", path))?;
    eprintln!("Created config.yaml");
    Ok(())
}

fn default_config_yaml() -> &'static str {
    r#"# dutyrun configuration. Relative paths are resolved against this file.

tool:
  mode: auto # auto | development | packaged
  interpreter: .venv/bin/python
  script: dutyAssign.py
  executable: dist/dutyAssign
  # working_dir: .
  # timeout_ms: 600000

env: {}

picker:
  dir: .
  extensions: [xlsx, xls, xlsm]

output:
  mode: simple # simple | pretty | stdout | file
  # file: result.json
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModeSetting;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn scaffold_parses_and_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        init_scaffold(dir.path()).unwrap();

        let path = dir.path().join("config.yaml");
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.tool.mode, ModeSetting::Auto);
        assert_eq!(cfg.tool.script, Some(dir.path().join("dutyAssign.py")));

        std::fs::write(&path, "tool: {}\n").unwrap();
        init_scaffold(dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "tool: {}\n");
    }

    #[test]
    fn only_writes_to_the_input_count_as_changes() {
        let input = Path::new("/data/june.xlsx");

        let modified = Event::new(EventKind::Modify(ModifyKind::Any)).add_path("/data/june.xlsx".into());
        let created = Event::new(EventKind::Create(CreateKind::File)).add_path("/data/june.xlsx".into());
        let other = Event::new(EventKind::Modify(ModifyKind::Any)).add_path("/data/july.xlsx".into());
        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path("/data/june.xlsx".into());

        assert!(touches(&modified, input));
        assert!(touches(&created, input));
        assert!(!touches(&other, input));
        assert!(!touches(&removed, input));
    }

    #[tokio::test]
    async fn wait_for_change_ends_when_watcher_drops() {
        let (tx, mut rx) = unbounded_channel::<notify::Result<Event>>();
        tx.send(Ok(Event::new(EventKind::Modify(ModifyKind::Any)).add_path("/x/other.xlsx".into())))
            .unwrap();
        drop(tx);

        assert!(!wait_for_change(&mut rx, Path::new("/x/june.xlsx")).await);
    }

    #[tokio::test]
    async fn wait_for_change_sees_input_write() {
        let (tx, mut rx) = unbounded_channel::<notify::Result<Event>>();
        tx.send(Ok(Event::new(EventKind::Modify(ModifyKind::Any)).add_path("/x/june.xlsx".into())))
            .unwrap();

        assert!(wait_for_change(&mut rx, Path::new("/x/june.xlsx")).await);
    }

    #[test]
    fn failed_check_names_the_error_codes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "tool:\n  mode: development\n  interpreter: sh\n  script: missing.py\n",
        )
        .unwrap();

        let err = check(
            None,
            ToolArgs {
                config: path,
                mode: None,
            },
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Setup check failed (development mode): TOOL_SCRIPT_NOT_FOUND"
        );
    }

    #[test]
    fn explicit_file_wins_over_picker() {
        let cfg = Config::parse("tool: {}\n").unwrap();
        let mut selector = selector_for(Some(PathBuf::from("june.xlsx")), false, &cfg).unwrap();
        assert_eq!(
            selector.select_input_file().unwrap(),
            Some(PathBuf::from("june.xlsx"))
        );
    }
}
