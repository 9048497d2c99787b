//! Error types for the uv runner pipeline.
//!
//! Every stage of the pipeline reports failures through [`RunnerError`].
//! Front-ends inspect [`RunnerError::category`] to decide whether a failure
//! aborts the program or is reported and control handed back to the user.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Broad failure classes of the pipeline.
///
/// Environment, network, integrity and archive failures stop the pipeline
/// immediately. Execution failures are reported and the caller stays alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Host operating system or architecture is not supported.
    Environment,
    /// Non-success HTTP status or transport failure.
    Network,
    /// Downloaded bytes do not match the published checksum.
    Integrity,
    /// Malformed archive or missing executable entry.
    Archive,
    /// The downloaded tool failed to start, exited non-zero, or was stopped.
    Execution,
}

/// Consolidated error type for the uv runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The host operating system has no matching release asset.
    #[error("unsupported operating system: {os}")]
    UnsupportedOs {
        /// The OS name as reported by the host.
        os: String,
    },

    /// The host CPU architecture has no matching release asset.
    #[error("unsupported architecture: {arch}")]
    UnsupportedArch {
        /// The architecture name as reported by the host.
        arch: String,
    },

    /// A download returned a non-success HTTP status.
    #[error("HTTP error {status}: {url}")]
    HttpStatus {
        /// The requested URL.
        url: String,
        /// The returned status code.
        status: u16,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client")]
    HttpClient(#[source] reqwest::Error),

    /// The HTTP request failed before a status was received, or mid-body.
    #[error("failed to fetch {url}")]
    Transport {
        /// The requested URL.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The checksum file did not contain a digest.
    #[error("checksum file is empty: {url}")]
    EmptyChecksum {
        /// The checksum URL.
        url: String,
    },

    /// The computed digest differs from the published one.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Digest published next to the artifact.
        expected: String,
        /// Digest computed over the downloaded bytes.
        actual: String,
    },

    /// The archive was fully scanned without finding `uv` or `uv.exe`.
    #[error("uv binary not found in archive")]
    BinaryNotFound,

    /// The zip archive could not be decoded.
    #[error("failed to read zip archive")]
    Zip(#[from] zip::result::ZipError),

    /// A filesystem or stream operation failed.
    #[error("I/O error: {context}")]
    Io {
        /// What was being done when the error occurred.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The executable could not be started.
    #[error("failed to start {}", path.display())]
    Spawn {
        /// Path of the executable.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting on a started process failed.
    #[error("failed to wait for uv")]
    ProcessWait(#[source] std::io::Error),

    /// The executable ran and reported failure.
    #[error("uv exited with {status}")]
    ProcessFailed {
        /// Human-readable exit status (code or signal).
        status: String,
    },

    /// The run exceeded its time limit and was killed.
    #[error("run timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    /// The run was stopped by a terminate-all request.
    #[error("run was cancelled")]
    Cancelled,

    /// The user interrupted the run with Ctrl-C.
    #[error("interrupted")]
    Interrupted,
}

impl RunnerError {
    /// Builds a closure that wraps an [`std::io::Error`] with context.
    ///
    /// Intended for `map_err`:
    ///
    /// ```ignore
    /// File::create(&path).map_err(RunnerError::io("failed to create output file"))?;
    /// ```
    pub fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| Self::Io { context, source }
    }

    /// Returns the failure class of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsupportedOs { .. } | Self::UnsupportedArch { .. } => {
                ErrorCategory::Environment
            }
            Self::HttpClient(_)
            | Self::HttpStatus { .. }
            | Self::Transport { .. }
            | Self::EmptyChecksum { .. } => ErrorCategory::Network,
            Self::ChecksumMismatch { .. } => ErrorCategory::Integrity,
            Self::BinaryNotFound | Self::Zip(_) | Self::Io { .. } => ErrorCategory::Archive,
            Self::Spawn { .. }
            | Self::ProcessWait(_)
            | Self::ProcessFailed { .. }
            | Self::Timeout(_)
            | Self::Cancelled
            | Self::Interrupted => ErrorCategory::Execution,
        }
    }

    /// Returns `true` for failures that are reported without aborting the host program.
    #[must_use]
    pub fn is_execution_error(&self) -> bool {
        self.category() == ErrorCategory::Execution
    }
}
