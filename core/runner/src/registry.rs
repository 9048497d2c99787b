//! Registry of running uv processes.
//!
//! Every supervised run registers its child right after spawning it and
//! deregisters it once the child has been reaped. [`ProcessRegistry::terminate_all`]
//! is used before starting a new run and on shutdown: it empties the registry,
//! kills each process tree through the platform [`ProcessControl`], and
//! cancels each run so that its owner kills the direct child handle as well.
//!
//! The list lock is held only while the list is mutated, never across an
//! `.await`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::process_control::{ProcessControl, platform_control};

/// Identifies one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

#[derive(Debug)]
struct TrackedProcess {
    id: RegistrationId,
    pid: u32,
    cancel: CancellationToken,
}

/// Shared, lock-protected list of running processes.
pub struct ProcessRegistry {
    control: Arc<dyn ProcessControl>,
    next_id: AtomicU64,
    processes: Mutex<Vec<TrackedProcess>>,
}

impl ProcessRegistry {
    pub fn new(control: Arc<dyn ProcessControl>) -> Self {
        Self {
            control,
            next_id: AtomicU64::new(1),
            processes: Mutex::new(Vec::new()),
        }
    }

    /// Creates a registry using the running platform's process control.
    #[must_use]
    pub fn for_current_platform() -> Self {
        Self::new(platform_control())
    }

    /// The capability used to group and kill process trees.
    #[must_use]
    pub fn control(&self) -> &Arc<dyn ProcessControl> {
        &self.control
    }

    /// Records a started process. `cancel` is triggered by [`Self::terminate_all`].
    pub fn register(&self, pid: u32, cancel: CancellationToken) -> RegistrationId {
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(TrackedProcess { id, pid, cancel });
        debug!(pid, "registered process");
        id
    }

    /// Removes a registration. Returns `false` if it was already removed.
    pub fn deregister(&self, id: RegistrationId) -> bool {
        let mut processes = self.lock();
        let Some(index) = processes.iter().position(|p| p.id == id) else {
            return false;
        };
        let removed = processes.remove(index);
        debug!(pid = removed.pid, "deregistered process");
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// PIDs of the registered processes, in registration order.
    #[must_use]
    pub fn pids(&self) -> Vec<u32> {
        self.lock().iter().map(|p| p.pid).collect()
    }

    /// Terminates every registered process tree and empties the registry.
    ///
    /// Returns the number of processes that were registered.
    pub async fn terminate_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.lock());
        if drained.is_empty() {
            return 0;
        }

        info!(count = drained.len(), "terminating running processes");
        for process in &drained {
            if let Err(e) = self.control.terminate_process_tree(process.pid).await {
                warn!(pid = process.pid, error = %e, "failed to terminate process tree");
            }
            process.cancel.cancel();
        }
        drained.len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TrackedProcess>> {
        self.processes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRegistry")
            .field("processes", &*self.lock())
            .finish_non_exhaustive()
    }
}
