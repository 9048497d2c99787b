//! Release asset naming.
//!
//! uv publishes one archive per target triple next to a detached
//! `.sha256` file:
//!
//! ```text
//! <server>/<version>/uv-<triple>.tar.gz
//! <server>/<version>/uv-<triple>.tar.gz.sha256
//! ```

use crate::archive::ArchiveKind;
use crate::config::RunnerConfig;
use crate::platform::Target;

/// Suffix appended to the artifact URL to locate its checksum.
pub const CHECKSUM_SUFFIX: &str = ".sha256";

/// Location and format of the archive to fetch for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub file_name: String,
    pub url: String,
    pub checksum_url: String,
    pub kind: ArchiveKind,
}

impl ReleaseAsset {
    #[must_use]
    pub fn for_target(config: &RunnerConfig, target: Target) -> Self {
        let kind = target.archive_kind();
        let file_name = format!("{}-{}.{}", config.tool_name, target, kind.extension());
        let url = format!("{}/{}/{file_name}", config.dist_server, config.uv_version);
        let checksum_url = format!("{url}{CHECKSUM_SUFFIX}");
        Self {
            file_name,
            url,
            checksum_url,
            kind,
        }
    }
}
