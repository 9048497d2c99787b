//! Extraction of the uv executable from a release archive.
//!
//! Release archives hold a handful of files (the `uv` binary, `uvx`,
//! licences) nested under a versioned folder. Only the first regular file
//! whose base name is `uv` or `uv.exe` is materialized; every other entry is
//! skipped.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::debug;

use crate::error::{Result, RunnerError};

/// Base names recognized as the uv executable.
pub const EXECUTABLE_NAMES: [&str; 2] = ["uv", "uv.exe"];

/// Archive container format of a release asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    /// gzip-compressed tar stream, used for macOS and Linux.
    TarGz,
    /// zip archive, used for Windows.
    Zip,
}

impl ArchiveKind {
    /// File extension without the leading dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }
}

/// Extracts the uv executable from `archive` into `out_dir`.
///
/// The archive handle must be positioned at its start.
///
/// # Errors
///
/// Returns [`RunnerError::BinaryNotFound`] if no entry matches, or a decoder
/// or I/O error if the archive is malformed or the output cannot be written.
pub fn extract_executable(
    kind: ArchiveKind,
    archive: &mut File,
    out_dir: &Path,
) -> Result<PathBuf> {
    match kind {
        ArchiveKind::TarGz => extract_from_tar_gz(archive, out_dir),
        ArchiveKind::Zip => extract_from_zip(archive, out_dir),
    }
}

/// Scans a gzip-compressed tar stream for the uv executable.
///
/// # Errors
///
/// See [`extract_executable`].
pub fn extract_from_tar_gz<R: Read>(reader: R, out_dir: &Path) -> Result<PathBuf> {
    let mut archive = Archive::new(GzDecoder::new(reader));
    let entries = archive
        .entries()
        .map_err(RunnerError::io("failed to read tar archive"))?;

    for entry in entries {
        let mut entry = entry.map_err(RunnerError::io("failed to read tar entry"))?;
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        debug!(entry = %name, "Found file in archive");

        if !entry.header().entry_type().is_file() {
            continue;
        }
        if let Some(base) = executable_base_name(&name) {
            return materialize(&mut entry, out_dir, base);
        }
    }

    Err(RunnerError::BinaryNotFound)
}

/// Scans a zip archive for the uv executable.
///
/// # Errors
///
/// See [`extract_executable`].
pub fn extract_from_zip<R: Read + Seek>(reader: R, out_dir: &Path) -> Result<PathBuf> {
    let mut archive = zip::ZipArchive::new(reader)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        debug!(entry = %name, "Found file in archive");

        if !entry.is_file() {
            continue;
        }
        if let Some(base) = executable_base_name(&name) {
            return materialize(&mut entry, out_dir, base);
        }
    }

    Err(RunnerError::BinaryNotFound)
}

/// Returns the entry's base name if it names the uv executable.
fn executable_base_name(entry_name: &str) -> Option<&'static str> {
    let base = entry_name.rsplit(['/', '\\']).next()?;
    EXECUTABLE_NAMES.into_iter().find(|name| *name == base)
}

fn materialize(entry: &mut impl Read, out_dir: &Path, base: &str) -> Result<PathBuf> {
    let path = out_dir.join(base);
    let mut out = File::create(&path).map_err(RunnerError::io(format!(
        "failed to create {}",
        path.display()
    )))?;
    std::io::copy(entry, &mut out)
        .map_err(RunnerError::io(format!("failed to extract {}", path.display())))?;
    drop(out);

    set_executable_permissions(&path)?;
    Ok(path)
}

/// Marks `path` as executable (`rwxr-xr-x`).
///
/// # Errors
///
/// Returns an error if the permissions cannot be changed.
#[cfg(unix)]
pub fn set_executable_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(
        RunnerError::io(format!("failed to set permissions on {}", path.display())),
    )
}

/// Sets executable permissions (no-op on Windows).
#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
pub fn set_executable_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
