//! Process-wide one-time startup of the native subsystem.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::CollabError;
use crate::native::CollabPlatform;

/// Double-checked initialization flag.
///
/// The fast path is a single atomic load. The slow path re-checks under a
/// mutex and runs the initializer; a failed initializer leaves the flag
/// clear so the next caller retries.
#[derive(Debug)]
pub struct InitGuard {
    initialized: AtomicBool,
    lock: Mutex<()>,
}

impl InitGuard {
    /// Creates a guard in the uninitialized state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            lock: parking_lot::const_mutex(()),
        }
    }

    /// Returns `true` once an initializer has succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Runs `init` unless a previous call already succeeded.
    ///
    /// # Errors
    ///
    /// Returns the initializer's error.
    pub fn ensure<E>(&self, init: impl FnOnce() -> Result<(), E>) -> Result<(), E> {
        if self.is_initialized() {
            return Ok(());
        }
        let _guard = self.lock.lock();
        if self.is_initialized() {
            return Ok(());
        }
        init()?;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }
}

impl Default for InitGuard {
    fn default() -> Self {
        Self::new()
    }
}

static NATIVE_SUBSYSTEM: InitGuard = InitGuard::new();

/// Starts the native collaboration subsystem once per process.
///
/// # Errors
///
/// Returns [`CollabError::Platform`] if startup fails; a later call retries.
pub fn ensure_initialized(platform: &dyn CollabPlatform, version: u16) -> Result<(), CollabError> {
    NATIVE_SUBSYSTEM.ensure(|| {
        platform
            .startup(version)
            .map_err(|code| CollabError::platform("PeerCollabStartup", code))?;
        tracing::info!(version, "native collaboration subsystem started");
        Ok(())
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::native::{E_OUTOFMEMORY, LoopbackPlatform, NativeOp, PEER_COLLAB_VERSION};

    #[test]
    fn initializer_runs_once_under_concurrent_callers() {
        let guard = Arc::new(InitGuard::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let guard = Arc::clone(&guard);
                let runs = Arc::clone(&runs);
                std::thread::spawn(move || {
                    guard.ensure(|| {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok::<(), CollabError>(())
                    })
                })
            })
            .collect();
        for thread in threads {
            let Ok(result) = thread.join() else {
                panic!("thread panicked");
            };
            assert!(result.is_ok());
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(guard.is_initialized());
    }

    #[test]
    fn failed_startup_is_retried() {
        let guard = InitGuard::new();
        let platform = LoopbackPlatform::manual();
        platform.fail_next(NativeOp::Startup, E_OUTOFMEMORY);

        let start = || {
            platform
                .startup(PEER_COLLAB_VERSION)
                .map_err(|code| CollabError::platform("PeerCollabStartup", code))
        };
        let Err(err) = guard.ensure(start) else {
            panic!("first startup should fail");
        };
        assert_eq!(err.os_code(), Some(E_OUTOFMEMORY));
        assert!(!guard.is_initialized());

        assert!(guard.ensure(start).is_ok());
        assert!(guard.ensure(start).is_ok());
        assert_eq!(platform.stats().startup_calls, 2);
    }

    #[test]
    fn process_guard_accepts_repeated_calls() {
        let platform = LoopbackPlatform::manual();
        assert!(ensure_initialized(&platform, PEER_COLLAB_VERSION).is_ok());
        assert!(ensure_initialized(&platform, PEER_COLLAB_VERSION).is_ok());
        assert!(platform.stats().startup_calls <= 1);
    }
}
