//! Verified download of a release archive.
//!
//! The archive is streamed to a temporary file while its SHA-256 digest is
//! computed over the same bytes, so the payload is never held in memory.
//! The detached `.sha256` file is fetched afterwards and its first
//! whitespace-delimited token is compared verbatim with the computed digest.
//!
//! There is no retry: any network failure or mismatch ends the run.

use std::io::{Seek, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{Result, RunnerError};
use crate::release::ReleaseAsset;

/// Minimum interval between progress callback invocations in milliseconds.
const PROGRESS_CALLBACK_INTERVAL_MS: u128 = 100;

/// Snapshot of an in-flight download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Bytes received so far.
    pub downloaded: u64,
    /// Size announced by `Content-Length`, or 0 when unknown.
    pub total: u64,
    /// Average speed in bytes per second.
    pub speed: u64,
}

/// Callback type for receiving progress updates during downloads.
pub type ProgressCallback = Arc<dyn Fn(DownloadProgress) + Send + Sync>;

/// A writer that hashes everything passing through it.
pub struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    /// Total bytes accepted by the inner writer.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Consumes the writer, returning the inner writer and the lowercase hex digest.
    pub fn finalize(self) -> (W, String) {
        (self.inner, hex::encode(self.hasher.finalize()))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Extracts the expected digest from a checksum file body.
///
/// The body has the form `<hex digest> <file name>`; only the first token is
/// used. Returns `None` for an empty or whitespace-only body.
#[must_use]
pub fn parse_checksum(body: &str) -> Option<&str> {
    body.split_whitespace().next()
}

/// A downloaded archive that has not been checked yet.
#[derive(Debug)]
pub struct Download {
    file: NamedTempFile,
    digest: String,
}

impl Download {
    /// Lowercase hex SHA-256 of the received bytes.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Compares the computed digest with `expected`, byte for byte.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::ChecksumMismatch`] carrying both digests; the
    /// downloaded file is deleted.
    pub fn verify(mut self, expected: &str) -> Result<VerifiedArchive> {
        if self.digest != expected {
            return Err(RunnerError::ChecksumMismatch {
                expected: expected.to_string(),
                actual: self.digest,
            });
        }
        info!(digest = %self.digest, "Checksum verification successful");

        self.file
            .as_file_mut()
            .rewind()
            .map_err(RunnerError::io("failed to rewind downloaded archive"))?;

        Ok(VerifiedArchive {
            file: self.file,
            digest: self.digest,
        })
    }
}

/// A downloaded archive whose digest matched the published checksum.
///
/// The backing temporary file is deleted when this value is dropped.
#[derive(Debug)]
pub struct VerifiedArchive {
    file: NamedTempFile,
    digest: String,
}

impl VerifiedArchive {
    /// Path of the downloaded file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Lowercase hex SHA-256 of the file.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Read handle positioned at the start of the archive.
    pub fn file_mut(&mut self) -> &mut std::fs::File {
        self.file.as_file_mut()
    }
}

/// HTTP client for release assets.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Creates a fetcher applying `timeout` to each request.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RunnerError::HttpClient)?;
        Ok(Self { client })
    }

    /// Downloads `asset` into `dir` and verifies it against its checksum file.
    ///
    /// # Errors
    ///
    /// Returns a network error for a failed request on either URL, and
    /// [`RunnerError::ChecksumMismatch`] when the digests differ. On error
    /// the partially written file is removed.
    pub async fn fetch_verified(
        &self,
        asset: &ReleaseAsset,
        dir: &Path,
        on_progress: &ProgressCallback,
    ) -> Result<VerifiedArchive> {
        let download = self.download(asset, dir, on_progress).await?;
        let expected = self.fetch_expected_digest(&asset.checksum_url).await?;
        download.verify(&expected)
    }

    /// Streams the archive of `asset` into a temporary file inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns a network or I/O error; the partial file is removed.
    pub async fn download(
        &self,
        asset: &ReleaseAsset,
        dir: &Path,
        on_progress: &ProgressCallback,
    ) -> Result<Download> {
        let mut file = tempfile::Builder::new()
            .prefix("uv-")
            .suffix(&format!(".{}", asset.kind.extension()))
            .tempfile_in(dir)
            .map_err(RunnerError::io("failed to create download file"))?;

        let digest = self
            .download_hashed(&asset.url, file.as_file_mut(), on_progress)
            .await?;
        Ok(Download { file, digest })
    }

    /// Fetches the checksum file at `url` and returns its digest token.
    ///
    /// # Errors
    ///
    /// Returns a network error or [`RunnerError::EmptyChecksum`].
    pub async fn fetch_expected_digest(&self, url: &str) -> Result<String> {
        info!(%url, "Downloading checksum");
        let body = self
            .get(url)
            .await?
            .text()
            .await
            .map_err(|source| RunnerError::Transport {
                url: url.to_string(),
                source,
            })?;

        parse_checksum(&body)
            .map(ToString::to_string)
            .ok_or_else(|| RunnerError::EmptyChecksum {
                url: url.to_string(),
            })
    }

    /// Streams `url` into `dest`, returning the digest of the received bytes.
    async fn download_hashed(
        &self,
        url: &str,
        dest: &mut std::fs::File,
        on_progress: &ProgressCallback,
    ) -> Result<String> {
        info!(%url, "Downloading uv");
        let response = self.get(url).await?;
        let total = response.content_length().unwrap_or(0);

        let mut writer = HashingWriter::new(dest);
        let mut stream = response.bytes_stream();
        let start_time = Instant::now();
        let mut last_callback_time = Instant::now();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| RunnerError::Transport {
                url: url.to_string(),
                source,
            })?;
            writer
                .write_all(&chunk)
                .map_err(RunnerError::io("failed to write downloaded archive"))?;

            let now = Instant::now();
            if now.duration_since(last_callback_time).as_millis() >= PROGRESS_CALLBACK_INTERVAL_MS
            {
                on_progress(progress(writer.bytes_written(), total, start_time));
                last_callback_time = now;
            }
        }

        writer
            .flush()
            .map_err(RunnerError::io("failed to flush downloaded archive"))?;
        on_progress(progress(writer.bytes_written(), total, start_time));

        let downloaded = writer.bytes_written();
        let (_, digest) = writer.finalize();
        debug!(%url, downloaded, %digest, "Download complete");
        Ok(digest)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|source| RunnerError::Transport {
                    url: url.to_string(),
                    source,
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RunnerError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

fn progress(downloaded: u64, total: u64, start_time: Instant) -> DownloadProgress {
    let elapsed_secs = start_time.elapsed().as_secs_f64();
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let speed = if elapsed_secs > 0.0 {
        (downloaded as f64 / elapsed_secs) as u64
    } else {
        0
    };
    DownloadProgress {
        downloaded,
        total,
        speed,
    }
}
