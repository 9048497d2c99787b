//! Platform capability for grouping and killing process trees.
//!
//! uv starts its own Python interpreters, so stopping only the direct child
//! would orphan them. Each platform provides one [`ProcessControl`]:
//!
//! - Unix ([`ProcessGroupControl`]): the child leads a new process group;
//!   termination sends SIGTERM to the group, waits a short grace period,
//!   then sends SIGKILL to the group.
//! - Windows ([`TaskkillControl`]): `taskkill /F /T /PID <pid>` kills the tree.

use std::io;
use std::sync::Arc;
#[cfg(unix)]
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
#[cfg(unix)]
use tracing::debug;

/// Grace period between SIGTERM and SIGKILL.
#[cfg(unix)]
pub const TERMINATION_GRACE: Duration = Duration::from_millis(100);

/// Spawn-time and kill-time hooks for a process tree.
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Prepares `command` so that its descendants can be reached later.
    fn setup_process_group(&self, command: &mut Command);

    /// Terminates the process tree rooted at `pid`.
    ///
    /// A tree that has already exited is not an error.
    async fn terminate_process_tree(&self, pid: u32) -> io::Result<()>;
}

/// Returns the capability for the running platform.
#[must_use]
pub fn platform_control() -> Arc<dyn ProcessControl> {
    #[cfg(unix)]
    {
        Arc::new(ProcessGroupControl::default())
    }

    #[cfg(not(unix))]
    {
        Arc::new(TaskkillControl)
    }
}

/// Process-group based termination for Unix hosts.
#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
pub struct ProcessGroupControl {
    grace: Duration,
}

#[cfg(unix)]
impl Default for ProcessGroupControl {
    fn default() -> Self {
        Self {
            grace: TERMINATION_GRACE,
        }
    }
}

#[cfg(unix)]
#[async_trait]
impl ProcessControl for ProcessGroupControl {
    fn setup_process_group(&self, command: &mut Command) {
        command.process_group(0);
    }

    async fn terminate_process_tree(&self, pid: u32) -> io::Result<()> {
        let pgid = i32::try_from(pid).map(Pid::from_raw).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("invalid pid {pid}"))
        })?;

        debug!(pid, "sending SIGTERM to process group");
        match signal::killpg(pgid, Signal::SIGTERM) {
            Ok(()) => {}
            Err(Errno::ESRCH) => return Ok(()),
            Err(e) => return Err(io::Error::other(e)),
        }

        tokio::time::sleep(self.grace).await;

        debug!(pid, "sending SIGKILL to process group");
        match signal::killpg(pgid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(io::Error::other(e)),
        }
    }
}

/// Tree termination through `taskkill` for Windows hosts.
#[cfg(not(unix))]
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskkillControl;

#[cfg(not(unix))]
#[async_trait]
impl ProcessControl for TaskkillControl {
    fn setup_process_group(&self, _command: &mut Command) {}

    async fn terminate_process_tree(&self, pid: u32) -> io::Result<()> {
        let status = Command::new("taskkill")
            .args(["/F", "/T", "/PID", &pid.to_string()])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await?;
        // taskkill exits 128 when the process is already gone.
        if status.success() || status.code() == Some(128) {
            Ok(())
        } else {
            Err(io::Error::other(format!("taskkill exited with {status}")))
        }
    }
}
