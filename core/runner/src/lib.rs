#![warn(clippy::pedantic)]
//! Core library of the uv runner.
//!
//! Downloads a pinned release of the [uv](https://github.com/astral-sh/uv)
//! Python package manager, verifies it against the published SHA-256
//! checksum, extracts the executable and runs `uv run <script>...`.
//!
//! ## Overview
//!
//! ```text
//! detect platform → release URLs → download + hash → checksum → extract → uv run
//! ```
//!
//! The first four stages live in [`pipeline::prepare_tool`], which returns a
//! [`PreparedTool`] owning the temporary directory. Execution is done either
//! with inherited stdio ([`runner::run_inherited`]) or supervised with
//! captured output, a timeout and process-tree termination
//! ([`runner::run_captured`] together with [`ProcessRegistry`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use uv_runner_core::{EventCallback, RunnerConfig, prepare_tool, runner};
//!
//! async fn bootstrap(scripts: &[String]) -> uv_runner_core::Result<()> {
//!     let config = RunnerConfig::from_env();
//!     let on_event: EventCallback = Arc::new(|_| {});
//!     let tool = prepare_tool(&config, &on_event).await?;
//!     runner::run_inherited(tool.executable(), scripts).await?;
//!     tool.close()
//! }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod process_control;
pub mod registry;
pub mod release;
pub mod runner;

#[cfg(test)]
mod test_support;

pub use config::RunnerConfig;
pub use error::{ErrorCategory, Result, RunnerError};
pub use fetch::DownloadProgress;
pub use output::{OutputBuffer, OutputSink};
pub use pipeline::{EventCallback, PipelineEvent, PreparedTool, prepare_tool};
pub use platform::Target;
pub use registry::ProcessRegistry;
pub use runner::RunContext;
