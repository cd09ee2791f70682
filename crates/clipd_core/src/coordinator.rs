//! Single timed lock around all clipboard-touching state.

use crate::error::{ClipError, Result};
use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Owns shared state behind one mutex with bounded acquisition.
///
/// A caller that cannot take the lock in time gets
/// [`ClipError::LockTimeout`] and must drop its operation; nothing is queued
/// or retried.
#[derive(Debug, Default)]
pub struct Coordinator<T> {
    state: Mutex<T>,
}

impl<T> Coordinator<T> {
    pub fn new(state: T) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Takes the lock for `operation`, waiting at most `timeout`.
    pub fn acquire(&self, operation: &str, timeout: Duration) -> Result<MutexGuard<'_, T>> {
        match self.state.try_lock_for(timeout) {
            Some(guard) => {
                debug!(operation, "lock acquired");
                Ok(guard)
            }
            None => {
                warn!(operation, ?timeout, "lock not acquired, operation dropped");
                Err(ClipError::LockTimeout {
                    operation: operation.to_string(),
                })
            }
        }
    }

    /// Returns true if someone currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.state.is_locked()
    }

    pub fn into_inner(self) -> T {
        self.state.into_inner()
    }
}
