//! Clipboard change detection.

use crate::clipboard::Clipboard;
use tracing::debug;

/// Tracks the last acknowledged value of the clipboard change counter.
///
/// Capture is only attempted when the counter has moved. The counter also
/// advances on our own writes, so every write the engine performs must be
/// followed by [`ChangeDetector::acknowledge`] while still holding the
/// coordinator lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeDetector {
    acknowledged: u64,
}

impl ChangeDetector {
    /// Creates a detector that considers the current counter as seen.
    pub fn new(clipboard: &dyn Clipboard) -> Self {
        Self {
            acknowledged: clipboard.change_count(),
        }
    }

    /// Returns true if the counter moved since the last acknowledgment.
    pub fn has_changed(&self, clipboard: &dyn Clipboard) -> bool {
        let current = clipboard.change_count();
        if current == self.acknowledged {
            return false;
        }
        debug!(
            acknowledged = self.acknowledged,
            current, "clipboard change counter moved"
        );
        true
    }

    /// Marks the current counter value as seen.
    pub fn acknowledge(&mut self, clipboard: &dyn Clipboard) {
        self.acknowledged = clipboard.change_count();
    }

    /// Returns the last acknowledged counter value.
    pub fn acknowledged(&self) -> u64 {
        self.acknowledged
    }
}
