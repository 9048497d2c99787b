//! Runtime configuration for the uv runner.
//!
//! Defaults are compiled in. Two of them can be overridden from the
//! environment, which is mostly useful for pointing the fetcher at a mirror
//! or a local test server:
//!
//! - `UV_RUNNER_DIST_SERVER` - base URL releases are fetched from
//! - `UV_RUNNER_UV_VERSION` - uv release to download
//!
//! Empty or whitespace-only values are treated as unset.

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable to override the distribution server URL.
pub const DIST_SERVER_ENV: &str = "UV_RUNNER_DIST_SERVER";

/// Environment variable to override the pinned uv version.
pub const UV_VERSION_ENV: &str = "UV_RUNNER_UV_VERSION";

/// Pinned uv release.
pub const DEFAULT_UV_VERSION: &str = "0.8.19";

/// uv's GitHub release download prefix.
pub const DEFAULT_DIST_SERVER: &str = "https://github.com/astral-sh/uv/releases/download";

/// Scripts run when none are given.
pub const DEFAULT_SCRIPTS: [&str; 2] = [
    "https://raw.githubusercontent.com/tnldart/openapi-servers/refs/heads/main/servers/memory/oneshot.py",
    "https://raw.githubusercontent.com/tnldart/openapi-servers/refs/heads/main/servers/memory/main.py",
];

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Upper bound on a supervised (interactive) run.
const RUN_TIMEOUT_SECS: u64 = 5 * 60;

/// Settings shared by both front-ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// uv release tag, e.g. `0.8.19`.
    pub uv_version: String,
    /// Base URL without trailing slash; `<version>/<asset>` is appended.
    pub dist_server: String,
    /// Release asset prefix.
    pub tool_name: String,
    /// Timeout applied to each HTTP request.
    pub request_timeout: Duration,
    /// Limit for interactive runs.
    pub run_timeout: Duration,
    /// Parent of the per-run temporary directory; the system temp dir when `None`.
    pub temp_root: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            uv_version: DEFAULT_UV_VERSION.to_string(),
            dist_server: DEFAULT_DIST_SERVER.to_string(),
            tool_name: "uv".to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            run_timeout: Duration::from_secs(RUN_TIMEOUT_SECS),
            temp_root: None,
        }
    }
}

impl RunnerConfig {
    /// Builds the configuration from defaults and process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration using `lookup` to resolve environment keys.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(server) = non_empty(lookup(DIST_SERVER_ENV)) {
            config.dist_server = server.trim_end_matches('/').to_string();
        }
        if let Some(version) = non_empty(lookup(UV_VERSION_ENV)) {
            config.uv_version = version;
        }

        config
    }
}

/// Returns the built-in script list.
#[must_use]
pub fn default_scripts() -> Vec<String> {
    DEFAULT_SCRIPTS.iter().map(ToString::to_string).collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_pin_the_release() {
        let config = RunnerConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.uv_version, "0.8.19");
        assert_eq!(config.dist_server, DEFAULT_DIST_SERVER);
        assert_eq!(config.tool_name, "uv");
        assert_eq!(config.run_timeout, Duration::from_secs(300));
        assert!(config.temp_root.is_none());
    }

    #[test]
    fn dist_server_override_is_trimmed() {
        let config = RunnerConfig::from_lookup(lookup_from(&[(
            DIST_SERVER_ENV,
            "  http://localhost:8080/  ",
        )]));
        assert_eq!(config.dist_server, "http://localhost:8080");
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let config = RunnerConfig::from_lookup(lookup_from(&[
            (DIST_SERVER_ENV, "   "),
            (UV_VERSION_ENV, ""),
        ]));
        assert_eq!(config, RunnerConfig::default());
    }

    #[test]
    fn version_override_applies() {
        let config = RunnerConfig::from_lookup(lookup_from(&[(UV_VERSION_ENV, "0.9.0")]));
        assert_eq!(config.uv_version, "0.9.0");
    }

    #[test]
    fn default_scripts_are_the_memory_server() {
        let scripts = default_scripts();
        assert_eq!(scripts.len(), 2);
        assert!(scripts[0].ends_with("/servers/memory/oneshot.py"));
        assert!(scripts[1].ends_with("/servers/memory/main.py"));
    }
}
