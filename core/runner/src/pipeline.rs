//! The bootstrap pipeline: resolve, fetch, verify, extract.
//!
//! Stages run strictly in order and the first failure stops the pipeline.
//! All files live in one temporary directory owned by the returned
//! [`PreparedTool`]; the directory is removed when the tool is dropped or
//! when any stage fails.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::info;

use crate::archive::extract_executable;
use crate::config::RunnerConfig;
use crate::error::{Result, RunnerError};
use crate::fetch::{DownloadProgress, Fetcher, ProgressCallback};
use crate::platform::Target;
use crate::release::ReleaseAsset;

/// Prefix of the per-run temporary directory.
pub const TEMP_DIR_PREFIX: &str = "uv-runner-";

/// Progress notifications emitted while preparing the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    PlatformDetected { target: Target },
    Downloading { url: String },
    DownloadProgress(DownloadProgress),
    FetchingChecksum { url: String },
    ChecksumVerified { digest: String },
    Extracting,
    Ready { executable: PathBuf },
}

/// Callback type for receiving pipeline events.
pub type EventCallback = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// An extracted uv executable and the temporary directory holding it.
#[derive(Debug)]
pub struct PreparedTool {
    executable: PathBuf,
    target: Target,
    workdir: TempDir,
}

impl PreparedTool {
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    /// Removes the temporary directory, reporting failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn close(self) -> Result<()> {
        let path = self.workdir.path().display().to_string();
        self.workdir
            .close()
            .map_err(RunnerError::io(format!("failed to remove {path}")))
    }
}

/// Prepares uv for the running host.
///
/// # Errors
///
/// Fails before any network access if the host is unsupported, and
/// otherwise with the first fetch, verification, or extraction error.
pub async fn prepare_tool(config: &RunnerConfig, on_event: &EventCallback) -> Result<PreparedTool> {
    let target = Target::detect()?;
    prepare_tool_for(config, target, on_event).await
}

/// Prepares uv for an explicit `target`.
///
/// # Errors
///
/// See [`prepare_tool`].
pub async fn prepare_tool_for(
    config: &RunnerConfig,
    target: Target,
    on_event: &EventCallback,
) -> Result<PreparedTool> {
    info!(%target, "Detected platform");
    on_event(PipelineEvent::PlatformDetected { target });

    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_DIR_PREFIX);
    let workdir = match &config.temp_root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
    .map_err(RunnerError::io("failed to create temporary directory"))?;

    let asset = ReleaseAsset::for_target(config, target);
    let fetcher = Fetcher::new(config.request_timeout)?;

    on_event(PipelineEvent::Downloading {
        url: asset.url.clone(),
    });
    let progress: ProgressCallback = {
        let on_event = Arc::clone(on_event);
        Arc::new(move |p: DownloadProgress| on_event(PipelineEvent::DownloadProgress(p)))
    };
    let download = fetcher.download(&asset, workdir.path(), &progress).await?;

    on_event(PipelineEvent::FetchingChecksum {
        url: asset.checksum_url.clone(),
    });
    let expected = fetcher.fetch_expected_digest(&asset.checksum_url).await?;
    let mut archive = download.verify(&expected)?;
    on_event(PipelineEvent::ChecksumVerified {
        digest: archive.digest().to_string(),
    });

    on_event(PipelineEvent::Extracting);
    let executable = extract_executable(asset.kind, archive.file_mut(), workdir.path())?;
    drop(archive);
    info!(executable = %executable.display(), "uv is ready");

    on_event(PipelineEvent::Ready {
        executable: executable.clone(),
    });
    Ok(PreparedTool {
        executable,
        target,
        workdir,
    })
}
