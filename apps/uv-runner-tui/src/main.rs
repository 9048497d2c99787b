#![warn(clippy::pedantic)]

//! # uv-runner-tui
//!
//! Interactive terminal front-end of the uv runner. It prepares a verified
//! copy of uv in the background, lets the user edit the list of scripts,
//! runs them with `uv run` while streaming their output, and cleans up every
//! started process tree on exit.
//!
//! ## Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | ↑/↓ | select a script |
//! | `a` | add a script URL or path |
//! | `d`, Delete | remove the selected script |
//! | `r`, Enter | run all scripts (5 minute limit) |
//! | PgUp/PgDn, End | scroll the output, follow the tail again |
//! | `t` | cycle theme: auto, light, dark |
//! | `q`, Ctrl-C | stop processes, clean up and quit |
//!
//! Logs are written to a daily file under the user's local data directory,
//! never to the terminal.

mod app;
mod state;
mod tasks;
mod terminal;
mod theme;
mod ui;

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use uv_runner_core::RunnerConfig;
use uv_runner_core::config::default_scripts;

use app::App;
use terminal::TerminalGuard;

/// Disables the interactive UI when set (any value).
const NO_TUI_ENV: &str = "UV_RUNNER_NO_TUI";

/// Environment variable holding the log filter.
const LOG_ENV: &str = "UV_RUNNER_LOG";

/// Interactive runner for Python scripts using a verified copy of uv.
#[derive(Parser)]
#[command(
    name = "uv-runner-tui",
    version,
    about = "Interactive runner for Python scripts using a verified copy of uv",
    after_help = "\
ENVIRONMENT VARIABLES:
    UV_RUNNER_NO_TUI        Refuse to start the interactive UI
    UV_RUNNER_DIST_SERVER   Release server URL (default: https://github.com/astral-sh/uv/releases/download)
    UV_RUNNER_UV_VERSION    uv release to download (default: 0.8.19)
    UV_RUNNER_LOG           Log filter for the log file (default: info)"
)]
struct Cli {
    /// Initial script paths or URLs; the built-in scripts when omitted.
    #[arg(value_name = "SCRIPT", trailing_var_arg = true, allow_hyphen_values = true)]
    scripts: Vec<String>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if !should_use_tui() {
        bail!(
            "uv-runner-tui needs an interactive terminal; use `uv-runner` for non-interactive runs"
        );
    }

    let _log_guard = init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "uv-runner-tui starting");

    let scripts = if cli.scripts.is_empty() {
        default_scripts()
    } else {
        cli.scripts
    };

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let mut app = App::new(RunnerConfig::from_env(), runtime.handle().clone(), scripts);

    let result = {
        let mut guard = TerminalGuard::new().context("failed to initialize terminal")?;
        app::run_app(&mut guard, &mut app).context("TUI application error")
        // Guard is dropped here, restoring the terminal.
    };

    // Drop the app (and any leftover temporary directory) before the runtime.
    drop(app);
    drop(runtime);
    result
}

/// Returns `false` when `UV_RUNNER_NO_TUI` is set or stdout is not a terminal.
fn should_use_tui() -> bool {
    if std::env::var_os(NO_TUI_ENV).is_some() {
        return false;
    }
    std::io::stdout().is_terminal()
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("uv-runner").join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("uv-runner-logs"))
}

/// Sends logs to a daily rotating file. Logging is skipped if the directory
/// cannot be created.
fn init_logging() -> Option<WorkerGuard> {
    let dir = log_dir();
    std::fs::create_dir_all(&dir).ok()?;

    let file_appender = tracing_appender::rolling::daily(&dir, "uv-runner-tui.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(filter)
        .with_ansi(false)
        .try_init()
        .ok()?;
    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn no_tui_env_disables_tui() {
        let original = std::env::var_os(NO_TUI_ENV);

        // SAFETY: serialized with the other environment-mutating tests.
        unsafe {
            std::env::set_var(NO_TUI_ENV, "1");
        }
        assert!(!should_use_tui());

        // An empty value still counts as set.
        unsafe {
            std::env::set_var(NO_TUI_ENV, "");
        }
        assert!(!should_use_tui());

        unsafe {
            match original {
                Some(value) => std::env::set_var(NO_TUI_ENV, value),
                None => std::env::remove_var(NO_TUI_ENV),
            }
        }
    }

    #[test]
    fn log_dir_ends_in_logs() {
        assert!(log_dir().ends_with("logs") || log_dir().ends_with("uv-runner-logs"));
    }

    #[test]
    fn scripts_keep_order() {
        let cli = Cli::try_parse_from(["uv-runner-tui", "b.py", "a.py"]).expect("Should parse");
        assert_eq!(cli.scripts, vec!["b.py", "a.py"]);
    }
}
