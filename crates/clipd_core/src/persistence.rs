//! Snapshot persistence and side-file reconciliation.
//!
//! The snapshot is a single versioned file in the cache directory:
//!
//! ```text
//! MAGIC (5 bytes: "CLIPS") | format version (u8) | zstd(postcard(Snapshot))
//! ```
//!
//! Image side-files live next to it as `<id>.png`. Any other file in the
//! cache directory (config, log, lock) is left alone by reconciliation.

use crate::entry::{HistoryEntry, ImageId};
use crate::error::{ClipError, Result};
use crate::store::ItemStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Magic bytes opening every snapshot file.
pub const SNAPSHOT_MAGIC: &[u8; 5] = b"CLIPS";

/// Current snapshot format version.
pub const SNAPSHOT_FORMAT_VERSION: u8 = 1;

/// zstd compression level for snapshots.
const COMPRESSION_LEVEL: i32 = 3;

/// Extension used for in-flight atomic writes.
const PARTIAL_EXTENSION: &str = "tmp";

/// Name of the snapshot file for this build.
pub fn snapshot_file_name() -> String {
    format!("v{}.cache", env!("CARGO_PKG_VERSION"))
}

/// Persisted history: the id dispatcher value plus entries, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Last dispatched image id.
    pub id_dispatcher: u64,
    /// Entries, newest first.
    pub entries: Vec<HistoryEntry>,
}

impl Snapshot {
    /// Returns the first referenced side-file that no longer exists.
    pub fn first_missing_resource(&self) -> Option<&Path> {
        self.entries
            .iter()
            .filter_map(HistoryEntry::persistent_path)
            .find(|path| !path.is_file())
    }
}

/// Report from a stray-resource reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Candidate files found in the cache directory.
    pub files_scanned: usize,

    /// Candidates still owned by a known entry.
    pub files_referenced: usize,

    /// Stray files deleted.
    pub files_deleted: usize,

    /// Bytes freed by deletion.
    pub bytes_freed: u64,

    /// Errors encountered while deleting (non-fatal).
    pub errors: Vec<String>,
}

/// Reads and writes the history snapshot in a cache directory.
#[derive(Debug, Clone)]
pub struct PersistenceManager {
    cache_dir: PathBuf,
    snapshot_path: PathBuf,
}

impl PersistenceManager {
    /// Creates a manager for `cache_dir`. The directory is not touched.
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        let snapshot_path = cache_dir.join(snapshot_file_name());
        Self {
            cache_dir,
            snapshot_path,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Writes the store to the snapshot file, either whole or pinned-only.
    pub fn serialize(&self, store: &ItemStore, id_dispatcher: u64, only_pinned: bool) -> Result<()> {
        let entries: Vec<HistoryEntry> = if only_pinned {
            store.pinned().cloned().collect()
        } else {
            store.iter().cloned().collect()
        };
        let snapshot = Snapshot {
            id_dispatcher,
            entries,
        };

        let body =
            postcard::to_allocvec(&snapshot).map_err(|e| ClipError::Serialization(e.to_string()))?;
        let compressed = zstd::encode_all(body.as_slice(), COMPRESSION_LEVEL)
            .map_err(|e| ClipError::Compression(e.to_string()))?;

        let mut bytes = Vec::with_capacity(SNAPSHOT_MAGIC.len() + 1 + compressed.len());
        bytes.extend_from_slice(SNAPSHOT_MAGIC);
        bytes.push(SNAPSHOT_FORMAT_VERSION);
        bytes.extend_from_slice(&compressed);

        fs::create_dir_all(&self.cache_dir)?;
        write_atomic(&self.snapshot_path, &bytes)?;
        debug!(
            entries = snapshot.entries.len(),
            id_dispatcher, only_pinned, "snapshot written"
        );
        Ok(())
    }

    /// Loads the snapshot for startup.
    ///
    /// A missing file is an empty history. A file that fails to decode, or
    /// that references a side-file which no longer exists, is deleted and
    /// also yields an empty history; entries are never partially recovered.
    pub fn deserialize(&self) -> Result<Snapshot> {
        let snapshot = match self.read_snapshot() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!("no snapshot found, nothing to load");
                return Ok(Snapshot::default());
            }
            Err(e @ ClipError::Io(_)) => return Err(e),
            Err(e) => {
                warn!("discarding unreadable snapshot: {}", e);
                self.discard()?;
                return Ok(Snapshot::default());
            }
        };

        if let Some(missing) = snapshot.first_missing_resource() {
            warn!(
                path = %missing.display(),
                "snapshot references a missing side-file, discarding it"
            );
            self.discard()?;
            return Ok(Snapshot::default());
        }

        info!(
            entries = snapshot.entries.len(),
            id_dispatcher = snapshot.id_dispatcher,
            "snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Reads the snapshot without validating side-files or deleting
    /// anything. Returns `Ok(None)` if there is no snapshot.
    pub fn read_snapshot(&self) -> Result<Option<Snapshot>> {
        let bytes = match fs::read(&self.snapshot_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        self.decode(&bytes).map(Some)
    }

    /// Deletes the snapshot file. A missing file is not an error.
    pub fn discard(&self) -> Result<()> {
        match fs::remove_file(&self.snapshot_path) {
            Ok(()) => {
                info!(path = %self.snapshot_path.display(), "snapshot cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no snapshot found, nothing to clear");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes side-files and partial writes that no entry in `store`
    /// references.
    pub fn reconcile_stray_resources(&self, store: &ItemStore) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        let referenced: HashSet<&std::ffi::OsStr> = store
            .iter()
            .filter_map(HistoryEntry::persistent_path)
            .filter_map(Path::file_name)
            .collect();

        let dir = match fs::read_dir(&self.cache_dir) {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };

        for dir_entry in dir {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }
            let name = dir_entry.file_name();
            if !is_resource_candidate(&name.to_string_lossy()) {
                continue;
            }
            report.files_scanned += 1;

            if referenced.contains(name.as_os_str()) {
                report.files_referenced += 1;
                continue;
            }

            let path = dir_entry.path();
            let size = dir_entry.metadata().map(|m| m.len()).unwrap_or(0);
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "removed stray data");
                    report.files_deleted += 1;
                    report.bytes_freed += size;
                }
                Err(e) => report
                    .errors
                    .push(format!("failed to remove {}: {}", path.display(), e)),
            }
        }

        for error in &report.errors {
            warn!("{}", error);
        }
        Ok(report)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Snapshot> {
        let header_len = SNAPSHOT_MAGIC.len() + 1;
        if bytes.len() < header_len {
            return Err(self.corrupted("snapshot too small"));
        }
        if &bytes[..SNAPSHOT_MAGIC.len()] != SNAPSHOT_MAGIC {
            return Err(self.corrupted("invalid magic bytes"));
        }
        let version = bytes[SNAPSHOT_MAGIC.len()];
        if version != SNAPSHOT_FORMAT_VERSION {
            return Err(self.corrupted(&format!("unsupported format version: {}", version)));
        }

        let body = zstd::decode_all(&bytes[header_len..])
            .map_err(|e| ClipError::Compression(e.to_string()))?;
        postcard::from_bytes(&body).map_err(|e| ClipError::Deserialization(e.to_string()))
    }

    fn corrupted(&self, reason: &str) -> ClipError {
        ClipError::CorruptedSnapshot {
            path: self.snapshot_path.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Side-files and leftovers of interrupted atomic writes are the only files
/// reconciliation may delete.
/// Side-files, plus the partial writes [`write_atomic`] leaves behind for
/// side-files and the snapshot. Anything else in the directory is not ours.
fn is_resource_candidate(name: &str) -> bool {
    if ImageId::from_file_name(name).is_some() {
        return true;
    }
    let path = Path::new(name);
    if path.extension().map_or(true, |ext| ext != PARTIAL_EXTENSION) {
        return false;
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    (!stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit()))
        || Path::new(&snapshot_file_name()).with_extension(PARTIAL_EXTENSION) == path
}

/// Writes `bytes` to `path` atomically: temp file, fsync, rename, then fsync
/// of the parent directory.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension(PARTIAL_EXTENSION);

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path)?;

    #[cfg(unix)]
    {
        if let Some(dir) = path.parent() {
            if let Ok(dir_file) = File::open(dir) {
                let _ = dir_file.sync_all();
            }
        }
    }

    Ok(())
}
