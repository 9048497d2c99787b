//! Invocation of the extracted uv executable.
//!
//! uv is always started as `uv run <script>...`; the script order is passed
//! through unchanged. Two modes exist:
//!
//! - [`run_inherited`] hands the terminal to uv (CLI front-end).
//! - [`run_captured`] pipes stdout and stderr into a shared [`OutputSink`],
//!   registers the child with a [`ProcessRegistry`], and bounds the run with
//!   an optional timeout (interactive front-end).

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, RunnerError};
use crate::output::{OutputSink, spawn_stream_reader};
use crate::registry::ProcessRegistry;

/// uv subcommand used to execute scripts.
pub const RUN_SUBCOMMAND: &str = "run";

/// How long stream readers may keep draining after the child is gone.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Builds the argument list `["run", script...]`.
pub fn run_arguments<S: AsRef<str>>(scripts: &[S]) -> Vec<String> {
    std::iter::once(RUN_SUBCOMMAND.to_string())
        .chain(scripts.iter().map(|s| s.as_ref().to_string()))
        .collect()
}

/// Runs uv with the caller's stdin, stdout and stderr.
///
/// Ctrl-C kills uv and returns [`RunnerError::Interrupted`] so the caller can
/// still clean up its temporary directory.
///
/// # Errors
///
/// Returns [`RunnerError::Spawn`] if uv cannot be started and
/// [`RunnerError::ProcessFailed`] if it exits unsuccessfully.
pub async fn run_inherited(executable: &Path, scripts: &[String]) -> Result<()> {
    info!(executable = %executable.display(), count = scripts.len(), "Running Python scripts");

    let mut child = Command::new(executable)
        .args(run_arguments(scripts))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| RunnerError::Spawn {
            path: executable.to_path_buf(),
            source,
        })?;

    let status = tokio::select! {
        status = child.wait() => status.map_err(RunnerError::ProcessWait)?,
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!("interrupted, stopping uv");
            if let Err(e) = child.kill().await {
                debug!(error = %e, "uv already exited");
            }
            return Err(RunnerError::Interrupted);
        }
    };

    check_status(status)
}

/// Shared state handed to every supervised run.
#[derive(Clone)]
pub struct RunContext {
    /// Registry the child is tracked in while it runs.
    pub registry: Arc<ProcessRegistry>,
    /// Destination of the child's stdout and stderr.
    pub output: Arc<dyn OutputSink>,
    /// Upper bound on the run; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
    TimedOut,
}

/// Runs uv with piped output and lifecycle tracking.
///
/// The child is placed in its own process group (where supported),
/// registered in `ctx.registry` once started, and deregistered when it has
/// been reaped. A [`ProcessRegistry::terminate_all`] issued meanwhile makes
/// this function kill the child directly and return
/// [`RunnerError::Cancelled`].
///
/// # Errors
///
/// Returns an execution error when uv cannot be started, exits
/// unsuccessfully, is cancelled, or exceeds `ctx.timeout`.
pub async fn run_captured(executable: &Path, scripts: &[String], ctx: &RunContext) -> Result<()> {
    let mut command = Command::new(executable);
    command
        .args(run_arguments(scripts))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    ctx.registry.control().setup_process_group(&mut command);

    let mut child = command.spawn().map_err(|source| RunnerError::Spawn {
        path: executable.to_path_buf(),
        source,
    })?;
    let pid = child.id();
    let cancel = CancellationToken::new();
    let registration = pid.map(|pid| ctx.registry.register(pid, cancel.clone()));
    info!(?pid, count = scripts.len(), "Started uv");

    let readers = [
        child
            .stdout
            .take()
            .map(|stream| spawn_stream_reader(stream, "stdout", Arc::clone(&ctx.output))),
        child
            .stderr
            .take()
            .map(|stream| spawn_stream_reader(stream, "stderr", Arc::clone(&ctx.output))),
    ];

    let outcome = tokio::select! {
        status = child.wait() => Outcome::Exited(status),
        () = cancel.cancelled() => Outcome::Cancelled,
        () = sleep_or_pending(ctx.timeout) => Outcome::TimedOut,
    };

    if let Outcome::TimedOut = outcome
        && let Some(pid) = pid
    {
        warn!(pid, "run timed out, terminating process tree");
        if let Err(e) = ctx.registry.control().terminate_process_tree(pid).await {
            warn!(pid, error = %e, "failed to terminate process tree");
        }
    }
    if !matches!(outcome, Outcome::Exited(_))
        && let Err(e) = child.kill().await
    {
        debug!(error = %e, "direct kill failed, child already gone");
    }

    // A registration removed by someone else means terminate_all got to it.
    let terminated_externally = registration.is_some_and(|id| !ctx.registry.deregister(id));

    for mut reader in readers.into_iter().flatten() {
        if tokio::time::timeout(READER_DRAIN_TIMEOUT, &mut reader)
            .await
            .is_err()
        {
            reader.abort();
        }
    }

    match outcome {
        Outcome::Exited(Ok(status)) if status.success() => Ok(()),
        Outcome::Exited(_) | Outcome::Cancelled if terminated_externally => {
            Err(RunnerError::Cancelled)
        }
        Outcome::Exited(status) => check_status(status.map_err(RunnerError::ProcessWait)?),
        Outcome::Cancelled => Err(RunnerError::Cancelled),
        Outcome::TimedOut => Err(RunnerError::Timeout(ctx.timeout.unwrap_or_default())),
    }
}

fn check_status(status: ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    let status = status
        .code()
        .map_or_else(|| status.to_string(), |code| format!("exit code {code}"));
    Err(RunnerError::ProcessFailed { status })
}

async fn sleep_or_pending(limit: Option<Duration>) {
    match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
    }
}
