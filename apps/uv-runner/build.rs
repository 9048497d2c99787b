//! Build script for the uv-runner CLI.
//!
//! Embeds the short git commit hash in the long version string.

use std::process::Command;

fn main() {
    let commit = git_commit().unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=UV_RUNNER_GIT_COMMIT={commit}");

    if let Some(root) = workspace_root() {
        println!("cargo:rerun-if-changed={root}/.git/HEAD");
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn workspace_root() -> Option<String> {
    git(&["rev-parse", "--show-toplevel"])
}

fn git_commit() -> Option<String> {
    git(&["rev-parse", "--short", "HEAD"])
}
