//! Main TUI application logic.
//!
//! [`App`] owns every piece of UI state and is only touched from the UI
//! thread. Background tasks (see [`crate::tasks`]) report through a channel
//! that [`App::poll_messages`] drains once per frame; captured script output
//! goes straight into the shared [`OutputBuffer`].
//!
//! ## Input Modes
//!
//! - **Normal**: single-key shortcuts (`a`, `d`, `r`, `t`, `q`, arrows, PgUp/PgDn)
//! - **AddScript**: editing the "Script URL/Path" line (Enter adds, Esc cancels)

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uv_runner_core::{
    OutputBuffer, OutputSink, PipelineEvent, PreparedTool, ProcessRegistry, RunnerConfig,
};

use crate::state::{OutputScroll, ScriptInput, ScriptList};
use crate::tasks::{self, RunRequest, TaskMessage};
use crate::terminal::TerminalGuard;
use crate::theme::{Theme, ThemeMode};
use crate::ui;

/// Event polling timeout in milliseconds.
const POLL_TIMEOUT_MS: u64 = 100;

const HELP_MESSAGE: &str =
    "a: add  d: remove  r/Enter: run  t: theme  PgUp/PgDn: scroll  q: quit";

/// Input mode for the TUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    AddScript,
}

/// Progress of the one-time uv preparation.
#[derive(Debug, Default)]
pub enum InitState {
    #[default]
    NotStarted,
    InProgress,
    Ready(PreparedTool),
    /// Preparation failed; running stays disabled for this session.
    Failed,
}

/// Severity of the status line message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Warning,
}

/// Main application state.
pub struct App {
    config: RunnerConfig,
    runtime: Handle,
    registry: Arc<ProcessRegistry>,
    output: OutputBuffer,
    tx: Sender<TaskMessage>,
    rx: Receiver<TaskMessage>,

    scripts: ScriptList,
    input_mode: InputMode,
    input: ScriptInput,
    scroll: OutputScroll,
    init: InitState,
    /// Number of the latest run; completions of older runs are ignored.
    current_run: u64,
    running: bool,

    status_message: String,
    status_kind: StatusKind,
    theme_mode: ThemeMode,
    theme: Theme,
    should_quit: bool,
}

impl App {
    pub fn new(config: RunnerConfig, runtime: Handle, scripts: Vec<String>) -> Self {
        let (tx, rx) = mpsc::channel();
        let theme_mode = ThemeMode::default();
        Self {
            config,
            runtime,
            registry: Arc::new(ProcessRegistry::for_current_platform()),
            output: OutputBuffer::new(),
            tx,
            rx,
            scripts: ScriptList::new(scripts),
            input_mode: InputMode::Normal,
            input: ScriptInput::default(),
            scroll: OutputScroll::default(),
            init: InitState::NotStarted,
            current_run: 0,
            running: false,
            status_message: String::from(HELP_MESSAGE),
            status_kind: StatusKind::Info,
            theme_mode,
            theme: theme_mode.resolve(),
            should_quit: false,
        }
    }

    #[must_use]
    pub fn scripts(&self) -> &ScriptList {
        &self.scripts
    }

    #[must_use]
    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    #[must_use]
    pub fn input(&self) -> &ScriptInput {
        &self.input
    }

    #[must_use]
    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }

    #[must_use]
    pub fn scroll(&self) -> OutputScroll {
        self.scroll
    }

    #[must_use]
    pub fn init_state(&self) -> &InitState {
        &self.init
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub fn status(&self) -> (&str, StatusKind) {
        (&self.status_message, self.status_kind)
    }

    #[must_use]
    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    #[must_use]
    pub fn theme_mode(&self) -> ThemeMode {
        self.theme_mode
    }

    #[must_use]
    pub fn uv_version(&self) -> &str {
        &self.config.uv_version
    }

    /// Starts preparing uv in the background.
    pub fn start_initialization(&mut self) {
        if !matches!(self.init, InitState::NotStarted) {
            return;
        }
        self.init = InitState::InProgress;
        self.output.append("Initializing uv...\n");
        tasks::spawn_init(&self.runtime, self.config.clone(), self.tx.clone());
    }

    /// Applies every pending background message.
    pub fn poll_messages(&mut self) {
        while let Ok(message) = self.rx.try_recv() {
            self.apply_message(message);
        }
    }

    fn apply_message(&mut self, message: TaskMessage) {
        match message {
            TaskMessage::Pipeline(event) => self.apply_pipeline_event(event),
            TaskMessage::InitFinished(Ok(tool)) => {
                info!(executable = %tool.executable().display(), "uv initialized");
                self.output.append("uv initialized successfully!\n");
                self.init = InitState::Ready(tool);
            }
            TaskMessage::InitFinished(Err(error)) => {
                warn!(%error, "uv initialization failed");
                self.output
                    .append(&format!("Error initializing uv: {error}\n"));
                self.init = InitState::Failed;
                self.set_warning("uv could not be initialized; running is disabled");
            }
            TaskMessage::RunFinished { run, result } => {
                if run != self.current_run {
                    debug!(run, current = self.current_run, "ignoring superseded run");
                    return;
                }
                self.running = false;
                match result {
                    Ok(()) => self.output.append("Scripts completed successfully!\n"),
                    Err(error) => self
                        .output
                        .append(&format!("Command finished with error: {error}\n")),
                }
            }
        }
    }

    fn apply_pipeline_event(&mut self, event: PipelineEvent) {
        let line = match event {
            PipelineEvent::PlatformDetected { target } => format!("Detected platform: {target}"),
            PipelineEvent::Downloading { url } => format!("Downloading uv from: {url}"),
            PipelineEvent::DownloadProgress(progress) => {
                self.set_info(format!(
                    "Downloading uv: {} KB of {} KB",
                    progress.downloaded / 1024,
                    progress.total / 1024
                ));
                return;
            }
            PipelineEvent::FetchingChecksum { url } => format!("Downloading checksum from: {url}"),
            PipelineEvent::ChecksumVerified { .. } => {
                self.set_info(HELP_MESSAGE);
                String::from("Checksum verification successful")
            }
            PipelineEvent::Extracting => String::from("Extracting uv..."),
            PipelineEvent::Ready { .. } => return,
        };
        self.output.append(&line);
        self.output.append("\n");
    }

    /// Handles a key press.
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match self.input_mode {
            InputMode::Normal => self.handle_normal_key(code),
            InputMode::AddScript => self.handle_input_key(code),
        }
    }

    fn handle_normal_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Up | KeyCode::Char('k') => self.scripts.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => self.scripts.select_next(),
            KeyCode::Char('a') => {
                self.input_mode = InputMode::AddScript;
                self.input = ScriptInput::default();
                self.set_info("Script URL/Path: Enter to add, Esc to cancel");
            }
            KeyCode::Char('d') | KeyCode::Delete => self.remove_selected_script(),
            KeyCode::Char('r') | KeyCode::Enter => self.run_scripts(),
            KeyCode::Char('t') => {
                self.theme_mode = self.theme_mode.next();
                self.theme = self.theme_mode.resolve();
                self.set_info(format!("Theme: {}", self.theme_mode));
            }
            KeyCode::PageUp => {
                let total = self.output.snapshot().lines().count();
                self.scroll.page_up(total);
            }
            KeyCode::PageDown => self.scroll.page_down(),
            KeyCode::End => self.scroll.follow(),
            _ => {}
        }
    }

    fn handle_input_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.set_info(HELP_MESSAGE);
            }
            KeyCode::Enter => {
                self.input_mode = InputMode::Normal;
                match self.input.submission() {
                    Some(reference) => {
                        self.set_info(format!("Added {reference}"));
                        self.scripts.add(reference);
                    }
                    None => self.set_info(HELP_MESSAGE),
                }
            }
            KeyCode::Backspace => self.input.backspace(),
            KeyCode::Left => self.input.move_left(),
            KeyCode::Right => self.input.move_right(),
            KeyCode::Char(c) => self.input.insert(c),
            _ => {}
        }
    }

    fn remove_selected_script(&mut self) {
        match self.scripts.remove_selected() {
            Some(removed) => self.set_info(format!("Removed {removed}")),
            None => self.set_warning("Please select a script to remove."),
        }
    }

    fn run_scripts(&mut self) {
        if self.running {
            self.set_warning("Scripts are already running.");
            return;
        }
        let InitState::Ready(tool) = &self.init else {
            self.set_warning("uv is not initialized yet");
            return;
        };
        if self.scripts.is_empty() {
            self.set_warning("Please add some scripts to run.");
            return;
        }

        self.current_run += 1;
        self.running = true;
        self.scroll.follow();
        let request = RunRequest {
            run: self.current_run,
            executable: tool.executable().to_path_buf(),
            scripts: self.scripts.scripts().to_vec(),
            output: self.output.clone(),
            registry: Arc::clone(&self.registry),
            timeout: self.config.run_timeout,
        };
        tasks::spawn_run(&self.runtime, request, self.tx.clone());
        self.set_info(HELP_MESSAGE);
    }

    /// Stops all running processes and removes the temporary directory.
    ///
    /// Blocks the calling thread until termination has finished.
    #[cfg(test)]
    pub fn shutdown(&mut self) {
        self.begin_shutdown();
        self.finish_shutdown();
    }

    fn begin_shutdown(&mut self) {
        self.output.append("Cleaning up processes...\n");
    }

    fn finish_shutdown(&mut self) {
        let stopped = self.runtime.block_on(self.registry.terminate_all());
        debug!(stopped, "terminated processes on exit");

        if let InitState::Ready(tool) = std::mem::take(&mut self.init)
            && let Err(e) = tool.close()
        {
            warn!(error = %e, "failed to remove temporary directory");
        }
        self.running = false;
        self.output.append("Cleanup completed.\n");
    }

    fn set_info(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.status_kind = StatusKind::Info;
    }

    fn set_warning(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.status_kind = StatusKind::Warning;
    }
}

/// Runs the event loop until the user quits, then cleans up.
///
/// # Errors
///
/// Returns an error if drawing or reading terminal events fails. Cleanup
/// runs in either case.
pub fn run_app(guard: &mut TerminalGuard, app: &mut App) -> Result<()> {
    app.start_initialization();
    let result = event_loop(guard, app);

    // Show the cleanup message before blocking on it.
    app.begin_shutdown();
    let _ = guard.terminal.draw(|frame| ui::render(app, frame));
    app.finish_shutdown();
    let _ = guard.terminal.draw(|frame| ui::render(app, frame));
    result
}

fn event_loop(guard: &mut TerminalGuard, app: &mut App) -> Result<()> {
    loop {
        app.poll_messages();

        guard
            .terminal
            .draw(|frame| ui::render(app, frame))
            .context("failed to draw frame")?;

        if event::poll(Duration::from_millis(POLL_TIMEOUT_MS)).context("event poll failed")?
            && let Event::Key(key) = event::read().context("failed to read event")?
            && key.kind == KeyEventKind::Press
        {
            app.handle_key(key.code, key.modifiers);
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::runtime::Runtime;

    use super::*;

    fn app_with(scripts: &[&str]) -> (App, Runtime) {
        let runtime = Runtime::new().expect("Should create runtime");
        let app = App::new(
            RunnerConfig::default(),
            runtime.handle().clone(),
            scripts.iter().map(ToString::to_string).collect(),
        );
        (app, runtime)
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(code, KeyModifiers::NONE);
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn q_and_ctrl_c_quit() {
        let (mut app, _rt) = app_with(&[]);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);

        let (mut app, _rt) = app_with(&[]);
        app.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(app.should_quit);
    }

    #[test]
    fn adding_a_script_through_the_input_line() {
        let (mut app, _rt) = app_with(&["https://example.com/a.py"]);

        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.input_mode(), InputMode::AddScript);
        // 'q' is text while typing, not quit.
        type_text(&mut app, "  ./q.py ");
        press(&mut app, KeyCode::Enter);

        assert!(!app.should_quit);
        assert_eq!(app.input_mode(), InputMode::Normal);
        assert_eq!(app.scripts().scripts(), ["https://example.com/a.py", "./q.py"]);
        assert_eq!(app.scripts().selected(), Some(1));
    }

    #[test]
    fn escape_and_blank_input_add_nothing() {
        let (mut app, _rt) = app_with(&[]);

        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "x.py");
        press(&mut app, KeyCode::Esc);
        assert!(app.scripts().is_empty());

        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "   ");
        press(&mut app, KeyCode::Enter);
        assert!(app.scripts().is_empty());
    }

    #[test]
    fn removing_without_selection_warns() {
        let (mut app, _rt) = app_with(&["a.py"]);

        press(&mut app, KeyCode::Char('d'));
        assert!(app.scripts().is_empty());

        press(&mut app, KeyCode::Delete);
        assert_eq!(
            app.status(),
            ("Please select a script to remove.", StatusKind::Warning)
        );
    }

    #[test]
    fn run_before_initialization_is_refused() {
        let (mut app, _rt) = app_with(&["a.py"]);
        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.status(), ("uv is not initialized yet", StatusKind::Warning));
        assert!(!app.is_running());
    }

    #[test]
    fn failed_initialization_disables_running() {
        let (mut app, _rt) = app_with(&["a.py"]);
        app.apply_message(TaskMessage::InitFinished(Err(String::from(
            "HTTP error 404: http://example.invalid/uv.tar.gz",
        ))));

        assert!(matches!(app.init_state(), InitState::Failed));
        assert!(
            app.output()
                .snapshot()
                .contains("Error initializing uv: HTTP error 404")
        );

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.status(), ("uv is not initialized yet", StatusKind::Warning));
    }

    #[test]
    fn pipeline_events_are_written_to_output() {
        let (mut app, _rt) = app_with(&[]);
        app.apply_message(TaskMessage::Pipeline(PipelineEvent::Downloading {
            url: String::from("https://example.com/uv.tar.gz"),
        }));
        app.apply_message(TaskMessage::Pipeline(PipelineEvent::Extracting));

        assert_eq!(
            app.output().snapshot(),
            "Downloading uv from: https://example.com/uv.tar.gz\nExtracting uv...\n"
        );
    }

    #[test]
    fn superseded_run_results_are_ignored() {
        let (mut app, _rt) = app_with(&[]);
        app.current_run = 2;
        app.running = true;

        app.apply_message(TaskMessage::RunFinished {
            run: 1,
            result: Err(String::from("run was cancelled")),
        });
        assert!(app.is_running());
        assert!(app.output().snapshot().is_empty());

        app.apply_message(TaskMessage::RunFinished {
            run: 2,
            result: Ok(()),
        });
        assert!(!app.is_running());
        assert_eq!(app.output().snapshot(), "Scripts completed successfully!\n");
    }

    #[test]
    fn run_while_running_is_refused() {
        let (mut app, _rt) = app_with(&["a.py"]);
        app.current_run = 1;
        app.running = true;

        press(&mut app, KeyCode::Char('r'));
        assert_eq!(
            app.status(),
            ("Scripts are already running.", StatusKind::Warning)
        );
        assert_eq!(app.current_run, 1);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.current_run, 1);
        assert!(app.is_running());
    }

    #[test]
    fn theme_key_cycles_modes() {
        let (mut app, _rt) = app_with(&[]);
        press(&mut app, KeyCode::Char('t'));
        assert_eq!(app.theme_mode(), ThemeMode::Light);
        assert_eq!(*app.theme(), Theme::light());
        press(&mut app, KeyCode::Char('t'));
        assert_eq!(*app.theme(), Theme::dark());
        press(&mut app, KeyCode::Char('t'));
        assert_eq!(app.theme_mode(), ThemeMode::Auto);
    }

    #[test]
    fn shutdown_without_tool_reports_cleanup() {
        let (mut app, _rt) = app_with(&[]);
        app.shutdown();
        assert_eq!(
            app.output().snapshot(),
            "Cleaning up processes...\nCleanup completed.\n"
        );
    }

    #[cfg(unix)]
    mod end_to_end {
        use std::io::Write;
        use std::time::Instant;

        use axum::Router;
        use axum::extract::Path;
        use axum::routing::get;
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use sha2::{Digest, Sha256};

        use super::*;

        const ECHO_ARGS: &[u8] = b"#!/bin/sh\nfor arg in \"$@\"; do echo \"$arg\"; done\n";

        fn archive_with_uv(script: &[u8]) -> Vec<u8> {
            let mut builder =
                tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
            let mut header = tar::Header::new_gnu();
            header.set_size(script.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, "uv-test/uv", script).unwrap();
            let mut encoder = builder.into_inner().unwrap();
            encoder.flush().unwrap();
            encoder.finish().unwrap()
        }

        /// Serves the archive for any asset path and its digest for `*.sha256`.
        fn serve(runtime: &Runtime, archive: Vec<u8>) -> String {
            let digest = hex::encode(Sha256::digest(&archive));
            let app = Router::new().route(
                "/*path",
                get(move |Path(path): Path<String>| {
                    let body = if path.ends_with(".sha256") {
                        digest.clone().into_bytes()
                    } else {
                        archive.clone()
                    };
                    async move { body }
                }),
            );
            let listener = runtime
                .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
                .unwrap();
            let addr = listener.local_addr().unwrap();
            runtime.spawn(async move {
                let _ = axum::serve(listener, app).await;
            });
            format!("http://{addr}")
        }

        fn wait_for(app: &mut App, what: &str, done: impl Fn(&App) -> bool) {
            let deadline = Instant::now() + Duration::from_secs(20);
            while Instant::now() < deadline {
                app.poll_messages();
                if done(app) {
                    return;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            panic!("timed out waiting for {what}: {}", app.output().snapshot());
        }

        #[test]
        fn initialize_then_run_scripts_in_order() {
            let runtime = Runtime::new().expect("Should create runtime");
            let temp_root = tempfile::tempdir().expect("Should create temp root");
            let config = RunnerConfig {
                dist_server: serve(&runtime, archive_with_uv(ECHO_ARGS)),
                temp_root: Some(temp_root.path().to_path_buf()),
                ..RunnerConfig::default()
            };
            let mut app = App::new(
                config,
                runtime.handle().clone(),
                vec![String::from("A"), String::from("B")],
            );

            app.start_initialization();
            wait_for(&mut app, "initialization", |app| {
                matches!(app.init_state(), InitState::Ready(_))
            });
            let log = app.output().snapshot();
            assert!(log.starts_with("Initializing uv...\nDetected platform: "));
            assert!(log.contains("Checksum verification successful\n"));
            assert!(log.ends_with("uv initialized successfully!\n"));

            press(&mut app, KeyCode::Char('r'));
            assert!(app.is_running());
            wait_for(&mut app, "run", |app| !app.is_running());

            assert_eq!(
                app.output().snapshot(),
                "Starting script execution...\nrun\nA\nB\nScripts completed successfully!\n"
            );

            app.shutdown();
            assert_eq!(std::fs::read_dir(temp_root.path()).unwrap().count(), 0);
        }
    }
}
