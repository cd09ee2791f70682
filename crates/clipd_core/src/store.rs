//! Bounded, pin-aware clipboard history.
//!
//! The store is one recency-ordered sequence, newest first. Pinned and
//! unpinned entries are two views over that sequence; pinning exempts an
//! entry from the length cap but does not move it by itself.

use crate::entry::{EntryKey, HistoryEntry};
use crate::error::{ClipError, Result};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Ordered history with title-based deduplication and eviction.
#[derive(Debug)]
pub struct ItemStore {
    entries: VecDeque<HistoryEntry>,
    history_len: usize,
}

impl ItemStore {
    /// Creates an empty store capped at `history_len` entries.
    pub fn new(history_len: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            history_len,
        }
    }

    /// Configured cap on the total entry count.
    pub fn history_len(&self) -> usize {
        self.history_len
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries newest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Pinned entries, newest first.
    pub fn pinned(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().filter(|e| e.is_pinned())
    }

    /// Unpinned entries, newest first.
    pub fn unpinned(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().filter(|e| !e.is_pinned())
    }

    /// Looks up an entry by key.
    pub fn get(&self, key: &EntryKey) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.has_key(key))
    }

    pub fn contains(&self, key: &EntryKey) -> bool {
        self.get(key).is_some()
    }

    /// Puts `entry` at the top of the history.
    ///
    /// An existing entry with the same key is taken out first without
    /// releasing its side-resource, and its pin carries over to `entry`.
    /// Then the overage is evicted. Entries with a reserved title are
    /// rejected.
    pub fn add_to_top(&mut self, mut entry: HistoryEntry) -> Result<()> {
        if entry.has_reserved_title() {
            warn!("copied reserved title, not adding");
            return Err(ClipError::ReservedTitle(entry.display_title()));
        }

        let key = entry.key();
        if let Some(existing) = self.position(&key).and_then(|pos| self.entries.remove(pos)) {
            if existing.is_pinned() {
                entry.set_pinned(true);
            }
            debug!(key = %key, "replacing existing entry");
        }

        info!("adding item: {}", entry);
        self.entries.push_front(entry);
        self.evict();
        Ok(())
    }

    /// Removes the entry with `key`, releasing its side-resource unless
    /// `keep_persistent_data` is set.
    pub fn remove(&mut self, key: &EntryKey, keep_persistent_data: bool) -> Result<HistoryEntry> {
        let pos = self
            .position(key)
            .ok_or_else(|| ClipError::EntryNotFound(key.to_string()))?;
        let entry = self
            .entries
            .remove(pos)
            .ok_or_else(|| ClipError::EntryNotFound(key.to_string()))?;
        if !keep_persistent_data {
            entry.release_resource();
        }
        debug!("cleared item {}", entry);
        Ok(entry)
    }

    /// Removes every entry, or every unpinned one if `respect_pins`.
    ///
    /// Returns the number of entries removed.
    pub fn clear_all(&mut self, respect_pins: bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| {
            if respect_pins && entry.is_pinned() {
                return true;
            }
            entry.release_resource();
            false
        });
        let removed = before - self.entries.len();
        info!(removed, respect_pins, "cleared history");
        removed
    }

    /// Flips the pin flag of the entry with `key` and returns the new state.
    ///
    /// The entry keeps its position; call [`ItemStore::resurface`] to bring it
    /// to the top of its partition.
    pub fn toggle_pin(&mut self, key: &EntryKey) -> Result<bool> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.has_key(key))
            .ok_or_else(|| ClipError::EntryNotFound(key.to_string()))?;
        let pinned = !entry.is_pinned();
        entry.set_pinned(pinned);
        info!(key = %key, pinned, "toggled pin");
        Ok(pinned)
    }

    /// Moves the entry with `key` to the top, keeping its side-resource.
    pub fn resurface(&mut self, key: &EntryKey) -> Result<()> {
        let entry = self.remove(key, true)?;
        self.add_to_top(entry)
    }

    fn position(&self, key: &EntryKey) -> Option<usize> {
        self.entries.iter().position(|e| e.has_key(key))
    }

    /// Drops the oldest unpinned entries until the cap holds or only pinned
    /// entries remain.
    fn evict(&mut self) {
        let mut overage = self.entries.len().saturating_sub(self.history_len);
        while overage > 0 {
            let Some(pos) = self.entries.iter().rposition(|e| !e.is_pinned()) else {
                debug!(
                    len = self.entries.len(),
                    history_len = self.history_len,
                    "only pinned entries left over the cap"
                );
                break;
            };
            if let Some(evicted) = self.entries.remove(pos) {
                evicted.release_resource();
                debug!("evicted item {}", evicted);
            }
            overage -= 1;
        }
    }
}
