//! Background work for the TUI.
//!
//! Initialization and script runs execute on the app's tokio runtime and
//! report back through a `std::sync::mpsc` channel. The UI thread drains the
//! channel once per frame, so all state changes happen on that thread.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, info};
use uv_runner_core::runner::run_captured;
use uv_runner_core::{
    EventCallback, OutputBuffer, OutputSink, PipelineEvent, PreparedTool, ProcessRegistry,
    RunContext, RunnerConfig, prepare_tool,
};

/// Message from a background task to the UI thread.
#[derive(Debug)]
pub enum TaskMessage {
    /// A pipeline stage changed during initialization.
    Pipeline(PipelineEvent),
    /// Initialization ended; the error is already rendered as text.
    InitFinished(Result<PreparedTool, String>),
    /// Run number `run` ended.
    RunFinished { run: u64, result: Result<(), String> },
}

/// Prepares uv in the background.
pub fn spawn_init(runtime: &Handle, config: RunnerConfig, tx: Sender<TaskMessage>) {
    runtime.spawn(async move {
        let on_event: EventCallback = {
            let tx = tx.clone();
            Arc::new(move |event: PipelineEvent| {
                let _ = tx.send(TaskMessage::Pipeline(event));
            })
        };

        let result = prepare_tool(&config, &on_event)
            .await
            .map_err(|e| error_chain(&e));
        if tx.send(TaskMessage::InitFinished(result)).is_err() {
            debug!("UI gone before initialization finished");
        }
    });
}

/// A script run requested by the UI.
pub struct RunRequest {
    pub run: u64,
    pub executable: PathBuf,
    pub scripts: Vec<String>,
    pub output: OutputBuffer,
    pub registry: Arc<ProcessRegistry>,
    pub timeout: Duration,
}

/// Stops any running processes, then runs the scripts.
pub fn spawn_run(runtime: &Handle, request: RunRequest, tx: Sender<TaskMessage>) {
    runtime.spawn(async move {
        let RunRequest {
            run,
            executable,
            scripts,
            output,
            registry,
            timeout,
        } = request;

        if !registry.is_empty() {
            output.append("Stopping existing processes...\n");
            let stopped = registry.terminate_all().await;
            info!(stopped, "stopped previous run");
        }

        output.clear();
        output.append("Starting script execution...\n");
        let context = RunContext {
            registry,
            output: Arc::new(output),
            timeout: Some(timeout),
        };
        info!(run, count = scripts.len(), "starting run");

        let result = run_captured(&executable, &scripts, &context)
            .await
            .map_err(|e| error_chain(&e));
        let _ = tx.send(TaskMessage::RunFinished { run, result });
    });
}

/// Renders an error with its sources, separated by `: `.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use uv_runner_core::RunnerError;

    #[test]
    fn error_chain_joins_sources() {
        let err = RunnerError::Io {
            context: "failed to write downloaded archive".to_string(),
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(
            error_chain(&err),
            "I/O error: failed to write downloaded archive: disk full"
        );
        assert_eq!(error_chain(&RunnerError::Cancelled), "run was cancelled");
    }

    #[cfg(unix)]
    mod runs {
        use std::os::unix::fs::PermissionsExt;
        use std::sync::mpsc;
        use std::time::Instant;

        use tokio::runtime::Runtime;

        use super::*;

        fn sleeping_uv(dir: &std::path::Path) -> PathBuf {
            let path = dir.join("uv");
            std::fs::write(&path, "#!/bin/sh\nexec sleep 30\n").expect("Should write fake uv");
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("Should set permissions");
            path
        }

        fn wait_until(what: &str, done: impl Fn() -> bool) {
            let deadline = Instant::now() + Duration::from_secs(10);
            while !done() {
                assert!(Instant::now() < deadline, "timed out waiting for {what}");
                std::thread::sleep(Duration::from_millis(10));
            }
        }

        #[test]
        fn second_run_stops_the_first_before_starting() {
            let runtime = Runtime::new().expect("Should create runtime");
            let dir = tempfile::tempdir().expect("Should create temp dir");
            let executable = sleeping_uv(dir.path());
            let registry = Arc::new(ProcessRegistry::for_current_platform());
            let output = OutputBuffer::new();
            let (tx, rx) = mpsc::channel();

            let request = |run| RunRequest {
                run,
                executable: executable.clone(),
                scripts: vec![String::from("a.py")],
                output: output.clone(),
                registry: Arc::clone(&registry),
                timeout: Duration::from_secs(60),
            };

            spawn_run(runtime.handle(), request(1), tx.clone());
            wait_until("first run to register", || registry.len() == 1);
            let first_pid = registry.pids()[0];

            spawn_run(runtime.handle(), request(2), tx);
            let first = rx
                .recv_timeout(Duration::from_secs(10))
                .expect("first run should finish");
            assert!(
                matches!(
                    &first,
                    TaskMessage::RunFinished { run: 1, result: Err(error) }
                        if error == "run was cancelled"
                ),
                "unexpected message: {first:?}"
            );

            wait_until("second run to register", || {
                registry.pids().iter().any(|pid| *pid != first_pid)
            });
            assert_eq!(registry.len(), 1);
            assert_eq!(output.snapshot(), "Starting script execution...\n");

            let stopped = runtime.block_on(registry.terminate_all());
            assert_eq!(stopped, 1);
            assert!(registry.is_empty());

            let second = rx
                .recv_timeout(Duration::from_secs(10))
                .expect("second run should finish");
            assert!(
                matches!(second, TaskMessage::RunFinished { run: 2, result: Err(_) }),
                "unexpected message: {second:?}"
            );
        }
    }
}
