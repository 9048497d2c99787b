//! Shared output sink for captured child process output.
//!
//! Stream readers and pipeline status messages append to one
//! [`OutputBuffer`]; a front-end renders it by taking snapshots. The buffer is
//! guarded by a single mutex that is held only for the duration of a copy.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

/// Destination for text produced while running scripts.
pub trait OutputSink: Send + Sync {
    fn append(&self, text: &str);
}

#[derive(Debug, Default)]
struct OutputState {
    text: String,
    revision: u64,
}

/// Cloneable handle to a mutex-protected text buffer.
///
/// Every mutation bumps a revision counter so renderers can skip redraws
/// when nothing changed.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    inner: Arc<Mutex<OutputState>>,
}

impl OutputBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current contents.
    #[must_use]
    pub fn snapshot(&self) -> String {
        self.lock().text.clone()
    }

    /// Monotonic counter bumped on every append or clear.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.text.clear();
        state.revision += 1;
    }

    fn lock(&self) -> MutexGuard<'_, OutputState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OutputSink for OutputBuffer {
    fn append(&self, text: &str) {
        let mut state = self.lock();
        state.text.push_str(text);
        state.revision += 1;
    }
}

/// Spawns a task that copies `stream` into `sink` line by line.
///
/// Bytes are decoded as UTF-8 lossily so a stray invalid byte does not end
/// the reader. A read error is reported to the sink and stops the task.
pub fn spawn_stream_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    label: &'static str,
    sink: Arc<dyn OutputSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => sink.append(&String::from_utf8_lossy(&buf)),
                Err(e) => {
                    sink.append(&format!("{label} read error: {e}\n"));
                    break;
                }
            }
        }

        debug!(%label, "stream reader exiting");
    })
}
