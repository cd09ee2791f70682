use clipd_core::{Clipboard, MemoryClipboard, Result, TextData};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// System clipboard stand-in with controllable read latency.
///
/// Clones share the buffer and the controls, so the runner keeps one handle
/// to act as "another application" while the engine owns another. A read
/// delay simulates a native capture call that stalls while holding the
/// engine lock.
#[derive(Clone, Default)]
pub struct ScenarioClipboard {
    inner: MemoryClipboard,
    read_delay_ms: Arc<AtomicU64>,
    reading: Arc<AtomicBool>,
}

impl ScenarioClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared buffer, for copying as another application would.
    pub fn system(&self) -> &MemoryClipboard {
        &self.inner
    }

    /// Makes every following text read stall for `delay`.
    pub fn set_read_delay(&self, delay: Duration) {
        self.read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Returns true while a delayed read is in progress.
    pub fn is_reading(&self) -> bool {
        self.reading.load(Ordering::SeqCst)
    }
}

impl Clipboard for ScenarioClipboard {
    fn change_count(&self) -> u64 {
        self.inner.change_count()
    }

    fn read_text(&self) -> Result<Option<TextData>> {
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            self.reading.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(delay));
            self.reading.store(false, Ordering::SeqCst);
        }
        self.inner.read_text()
    }

    fn write_text(&self, data: &TextData) -> Result<()> {
        self.inner.write_text(data)
    }

    fn read_image(&self) -> Result<Option<Vec<u8>>> {
        self.inner.read_image()
    }

    fn write_image(&self, bytes: &[u8]) -> Result<()> {
        self.inner.write_image(bytes)
    }

    fn clear(&self) -> Result<()> {
        self.inner.clear()
    }
}
