#![warn(clippy::pedantic)]

//! # uv-runner
//!
//! Downloads the pinned uv release for the current platform, verifies it
//! against the published SHA-256 checksum, extracts it into a temporary
//! directory and runs `uv run <script>...`.
//!
//! ## Usage
//!
//! ```bash
//! uv-runner                                   # run the built-in scripts
//! uv-runner ./server.py                       # run a local script
//! uv-runner https://example.com/a.py ./b.py   # several, in order
//! ```
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0    | uv exited successfully |
//! | 1    | uv could not be started or exited unsuccessfully |
//! | 130  | interrupted with Ctrl-C |
//! | 101  | platform, download, checksum or archive failure |

mod progress;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use uv_runner_core::config::default_scripts;
use uv_runner_core::{EventCallback, RunnerConfig, RunnerError, prepare_tool, runner};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "UV_RUNNER_LOG";

/// Exit code for fatal bootstrap failures.
const EXIT_FATAL: i32 = 101;
/// Exit code when uv fails.
const EXIT_EXECUTION: i32 = 1;
/// Exit code after Ctrl-C.
const EXIT_INTERRUPTED: i32 = 130;

/// Run Python scripts with a verified, temporary copy of uv.
#[derive(Parser)]
#[command(
    name = "uv-runner",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("UV_RUNNER_GIT_COMMIT"), ")"),
    about = "Run Python scripts with a verified, temporary copy of uv",
    long_about = "Downloads the pinned uv release for this platform, checks it against the \
    published SHA-256 checksum, and runs 'uv run' with the given scripts. Nothing is \
    installed: the download lives in a temporary directory that is removed on exit.",
    after_help = "\
ENVIRONMENT VARIABLES:
    UV_RUNNER_DIST_SERVER   Release server URL (default: https://github.com/astral-sh/uv/releases/download)
    UV_RUNNER_UV_VERSION    uv release to download (default: 0.8.19)
    UV_RUNNER_LOG           Log filter written to stderr (default: warn)"
)]
struct Cli {
    /// Script paths or URLs passed to `uv run`, in order.
    ///
    /// When omitted, the built-in scripts are run.
    #[arg(value_name = "SCRIPT", trailing_var_arg = true, allow_hyphen_values = true)]
    scripts: Vec<String>,
}

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Prints the error and returns the process exit code for it.
fn handle_error(e: &anyhow::Error) -> i32 {
    let code = exit_code(e);
    if code == EXIT_INTERRUPTED {
        eprintln!("Interrupted");
    } else {
        eprintln!("Error: {e:?}");
    }
    code
}

fn exit_code(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<RunnerError>() {
        Some(RunnerError::Interrupted) => EXIT_INTERRUPTED,
        Some(err) if err.is_execution_error() => EXIT_EXECUTION,
        _ => EXIT_FATAL,
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = RunnerConfig::from_env();
    let scripts = if cli.scripts.is_empty() {
        default_scripts()
    } else {
        cli.scripts
    };

    let on_event: EventCallback = Arc::new(progress::report);
    let tool = tokio::select! {
        tool = prepare_tool(&config, &on_event) => tool.context("failed to prepare uv")?,
        Ok(()) = tokio::signal::ctrl_c() => return Err(RunnerError::Interrupted.into()),
    };

    println!("Running Python scripts...");
    let result = runner::run_inherited(tool.executable(), &scripts).await;

    if let Err(e) = tool.close() {
        warn!(error = %e, "failed to remove temporary directory");
    }
    result?;
    Ok(())
}
