//! Error types for clipd_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for clipd_core operations.
#[derive(Error, Debug)]
pub enum ClipError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error while encoding a snapshot.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error while decoding a snapshot.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// The snapshot file exists but cannot be trusted.
    #[error("corrupted snapshot at {}: {}", path.display(), reason)]
    CorruptedSnapshot {
        /// Path to the snapshot file
        path: PathBuf,
        /// Description of the corruption
        reason: String,
    },

    /// An image entry references a side-file that is gone.
    #[error("missing side-resource: {}", path.display())]
    MissingResource {
        /// Path the entry expected to own
        path: PathBuf,
    },

    /// The coordinator lock could not be acquired in time.
    #[error("lock timeout: {operation} dropped")]
    LockTimeout {
        /// Name of the abandoned operation
        operation: String,
    },

    /// Another clipd process owns the cache directory.
    #[error("cache directory locked by another process (PID: {pid})")]
    CacheLocked {
        /// Process ID holding the lock
        pid: u32,
    },

    /// The cache directory lock could not be taken for an unknown holder.
    #[error("cache directory locked")]
    CacheLockUnavailable,

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// No entry with the given key is in the history.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// The entry title collides with a reserved presentation title.
    #[error("reserved title: {0:?}")]
    ReservedTitle(String),

    /// An external clipboard command failed.
    #[error("clipboard command failed: {0}")]
    Clipboard(String),

    /// Captured image bytes could not be decoded.
    #[error("image error: {0}")]
    Image(String),
}

impl ClipError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::CacheLocked { .. } => {
                Some("Another clipd is running against this cache directory. Stop it first.")
            }
            Self::CacheLockUnavailable => {
                Some("Remove the LOCK file in the cache directory if no clipd process is running.")
            }
            Self::CorruptedSnapshot { .. } | Self::MissingResource { .. } => {
                Some("The history snapshot was discarded. Run 'clipd clean' to drop stray files.")
            }
            Self::ConfigError(_) => Some("Check config.toml in the cache directory."),
            Self::Clipboard(_) => {
                Some("Check that the clipboard commands in config.toml are installed.")
            }
            Self::LockTimeout { .. } => Some("Retry the operation."),
            _ => None,
        }
    }
}

/// Convenience Result type for clipd_core operations.
pub type Result<T> = std::result::Result<T, ClipError>;
