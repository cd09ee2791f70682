//! Single-instance guard for a cache directory.

use crate::error::{ClipError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the lock file inside the cache directory.
pub const LOCK_FILE_NAME: &str = "LOCK";

/// Attempts before giving up on a lock file that keeps reappearing.
const MAX_ATTEMPTS: u32 = 3;

/// Exclusive ownership of a cache directory by this process.
///
/// The lock file holds the owner's PID. A lock left behind by a dead
/// process is removed and taken over. Dropping the guard deletes the file.
#[derive(Debug)]
pub struct CacheLock {
    file: Option<File>,
    path: PathBuf,
}

impl CacheLock {
    /// Takes the lock on `cache_dir`, creating the directory if needed.
    pub fn acquire(cache_dir: &Path) -> Result<Self> {
        fs::create_dir_all(cache_dir)?;
        let path = cache_dir.join(LOCK_FILE_NAME);

        for _ in 0..MAX_ATTEMPTS {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    writeln!(file, "{}", std::process::id())?;
                    file.flush()?;
                    file.try_lock_exclusive()
                        .map_err(|_| ClipError::CacheLockUnavailable)?;
                    debug!(path = %path.display(), "cache directory locked");
                    return Ok(Self {
                        file: Some(file),
                        path,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => clear_if_stale(&path)?,
                Err(e) => return Err(e.into()),
            }
        }

        Err(ClipError::CacheLockUnavailable)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        // Closing the file releases the fs2 lock.
        drop(self.file.take());
        let _ = fs::remove_file(&self.path);
    }
}

/// Returns the PID recorded in `cache_dir`'s lock file if that process is
/// still running.
pub fn lock_holder(cache_dir: &Path) -> Option<u32> {
    let content = fs::read_to_string(cache_dir.join(LOCK_FILE_NAME)).ok()?;
    let pid = content.trim().parse::<u32>().ok()?;
    is_process_alive(pid).then_some(pid)
}

/// Removes the lock file at `path` unless a live process owns it.
fn clear_if_stale(path: &Path) -> Result<()> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        // Released between our open and read.
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(_) => return Err(ClipError::CacheLockUnavailable),
    };

    match content.trim().parse::<u32>() {
        Ok(pid) if is_process_alive(pid) => return Err(ClipError::CacheLocked { pid }),
        Ok(pid) => warn!(pid, "removing stale cache lock from dead process"),
        Err(_) => warn!("lock file has invalid content, removing it"),
    }

    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

#[cfg(target_os = "linux")]
fn is_process_alive(pid: u32) -> bool {
    // /proc/<pid>/stat is gone for reaped processes.
    Path::new(&format!("/proc/{}/stat", pid)).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(true)
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    true
}
