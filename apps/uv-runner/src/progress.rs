//! Console reporting of pipeline events.
//!
//! Stage messages are printed to stdout as complete lines. Download progress
//! overwrites a single line using a carriage return.

use std::io::Write;

use uv_runner_core::{DownloadProgress, PipelineEvent};

/// Prints one pipeline event.
pub fn report(event: PipelineEvent) {
    match event {
        PipelineEvent::PlatformDetected { target } => println!("Detected platform: {target}"),
        PipelineEvent::Downloading { url } => println!("Downloading uv from: {url}"),
        PipelineEvent::DownloadProgress(progress) => print_progress(progress),
        PipelineEvent::FetchingChecksum { url } => {
            // Terminates the progress line.
            println!();
            println!("Downloading checksum from: {url}");
        }
        PipelineEvent::ChecksumVerified { .. } => println!("Checksum verification successful"),
        PipelineEvent::Extracting => println!("Extracting uv..."),
        PipelineEvent::Ready { executable } => {
            tracing::debug!(executable = %executable.display(), "uv extracted");
        }
    }
}

fn print_progress(progress: DownloadProgress) {
    print!("\r{}     ", progress_line(progress));
    let _ = std::io::stdout().flush();
}

/// Renders `downloaded/total (percent%) speed`.
fn progress_line(progress: DownloadProgress) -> String {
    let downloaded = format_bytes(progress.downloaded);
    #[allow(clippy::cast_precision_loss)]
    let speed = format_speed(progress.speed as f64);

    if progress.total == 0 {
        return format!("{downloaded} {speed}");
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let percent = (progress.downloaded as f64 / progress.total as f64 * 100.0).min(100.0) as u8;
    format!(
        "{downloaded}/{} ({percent}%) {speed}",
        format_bytes(progress.total)
    )
}

/// Formats bytes into a human-readable string (KB, MB, GB).
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    #[allow(clippy::cast_precision_loss)]
    let bytes_f = bytes as f64;

    if bytes_f >= GB {
        format!("{:.2} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.2} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Formats speed (bytes/sec) into a human-readable string.
fn format_speed(speed: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    if speed >= MB {
        format!("{:.2} MB/s", speed / MB)
    } else if speed >= KB {
        format!("{:.2} KB/s", speed / KB)
    } else {
        format!("{speed:.0} B/s")
    }
}
