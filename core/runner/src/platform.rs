//! Platform detection for uv release assets.
//!
//! Maps the host operating system and CPU architecture onto the target
//! triple that names uv's release archives, e.g. `x86_64-unknown-linux-gnu`.
//!
//! ## Supported Platforms
//!
//! | OS      | Triple suffix       | Archive  |
//! |---------|---------------------|----------|
//! | macOS   | `apple-darwin`      | `tar.gz` |
//! | Linux   | `unknown-linux-gnu` | `tar.gz` |
//! | Windows | `pc-windows-msvc`   | `zip`    |
//!
//! on `x86_64` and `aarch64`.

use std::fmt;

use crate::archive::ArchiveKind;
use crate::error::{Result, RunnerError};

/// Operating system family with a published uv build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    MacOs,
    Linux,
    Windows,
}

impl Os {
    /// Parses an OS name.
    ///
    /// Accepts the names reported by `std::env::consts::OS` as well as the
    /// `darwin` alias.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "macos" | "darwin" => Some(Self::MacOs),
            "linux" => Some(Self::Linux),
            "windows" => Some(Self::Windows),
            _ => None,
        }
    }

    /// The vendor/OS/ABI part of the target triple.
    #[must_use]
    pub fn triple_suffix(self) -> &'static str {
        match self {
            Self::MacOs => "apple-darwin",
            Self::Linux => "unknown-linux-gnu",
            Self::Windows => "pc-windows-msvc",
        }
    }
}

/// CPU architecture with a published uv build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    Aarch64,
}

impl Arch {
    /// Parses an architecture name, accepting `amd64` and `arm64` aliases.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x86_64" | "amd64" => Some(Self::X86_64),
            "aarch64" | "arm64" => Some(Self::Aarch64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
        }
    }
}

/// A resolved release target: architecture plus OS family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub arch: Arch,
    pub os: Os,
}

impl Target {
    /// Detects the target of the running host.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::UnsupportedOs`] or [`RunnerError::UnsupportedArch`]
    /// when no uv release exists for the host.
    pub fn detect() -> Result<Self> {
        Self::from_names(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Resolves a target from OS and architecture names.
    ///
    /// # Errors
    ///
    /// Returns an error naming the unsupported component.
    pub fn from_names(os: &str, arch: &str) -> Result<Self> {
        let os = Os::from_name(os).ok_or_else(|| RunnerError::UnsupportedOs {
            os: os.to_string(),
        })?;
        let arch = Arch::from_name(arch).ok_or_else(|| RunnerError::UnsupportedArch {
            arch: arch.to_string(),
        })?;
        Ok(Self { arch, os })
    }

    /// Returns the target triple, e.g. `aarch64-apple-darwin`.
    #[must_use]
    pub fn triple(self) -> String {
        format!("{}-{}", self.arch.as_str(), self.os.triple_suffix())
    }

    /// Archive format uv publishes for this target.
    #[must_use]
    pub fn archive_kind(self) -> ArchiveKind {
        match self.os {
            Os::Windows => ArchiveKind::Zip,
            Os::MacOs | Os::Linux => ArchiveKind::TarGz,
        }
    }

    /// File name of the uv executable on this target.
    #[must_use]
    pub fn executable_name(self) -> &'static str {
        match self.os {
            Os::Windows => "uv.exe",
            Os::MacOs | Os::Linux => "uv",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.arch.as_str(), self.os.triple_suffix())
    }
}
