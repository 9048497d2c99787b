//! Fixtures shared by the unit tests.

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use tar::Builder;

/// Builds an in-memory tar.gz archive from `(path, contents)` pairs.
pub fn tar_gz_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);

    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, *contents)
            .expect("Should append file");
    }

    builder
        .into_inner()
        .expect("Should finish tar")
        .finish()
        .expect("Should finish gzip")
}

/// Builds an in-memory zip archive from `(path, contents)` pairs.
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();

    for (path, contents) in files {
        zip.start_file(*path, options).expect("Should start file");
        zip.write_all(contents).expect("Should write");
    }

    zip.finish().expect("Should finish").into_inner()
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// A shell script standing in for uv: prints each argument on its own line.
#[cfg(unix)]
pub const ECHO_ARGS_SCRIPT: &[u8] = b"#!/bin/sh\nfor arg in \"$@\"; do echo \"$arg\"; done\n";

/// A shell script standing in for uv: spawns a child and blocks.
#[cfg(unix)]
pub const SLEEPING_SCRIPT: &[u8] = b"#!/bin/sh\necho started\nsleep 30 &\nwait\n";

/// Writes `script` as an executable file named `uv` inside `dir`.
#[cfg(unix)]
pub fn write_fake_uv(dir: &std::path::Path, script: &[u8]) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("uv");
    std::fs::write(&path, script).expect("Should write fake uv");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Should set permissions");
    path
}

/// A local HTTP server serving fixed bodies, for exercising the fetcher.
///
/// Paths that were not registered answer `404 Not Found`.
pub struct FixtureServer {
    pub base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl FixtureServer {
    pub async fn start(routes: Vec<(String, Vec<u8>)>) -> Self {
        let mut router = axum::Router::new();
        for (path, body) in routes {
            router = router.route(
                &path,
                axum::routing::get(move || {
                    let body = body.clone();
                    async move { body }
                }),
            );
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Should bind fixture server");
        let addr = listener.local_addr().expect("Should have local addr");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            handle,
        }
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
