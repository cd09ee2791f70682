//! System clipboard capability.
//!
//! The engine never talks to the OS directly; it goes through [`Clipboard`].
//! [`MemoryClipboard`] is an in-process implementation used for embedding and
//! tests, [`crate::CommandClipboard`] shells out to platform tools.

use crate::entry::TextData;
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Access to a system clipboard.
///
/// Reads may be slow or unreliable; implementations backed by external
/// processes are expected to isolate them (see [`crate::ResilientCall`]) and
/// report an exhausted capture as `Ok(None)`.
pub trait Clipboard: Send {
    /// Monotonic counter that advances on every clipboard mutation, by any
    /// process, including our own writes.
    fn change_count(&self) -> u64;

    /// Reads every available text representation.
    fn read_text(&self) -> Result<Option<TextData>>;

    /// Replaces the clipboard with the given text representations.
    fn write_text(&self, data: &TextData) -> Result<()>;

    /// Reads image content as encoded bytes.
    fn read_image(&self) -> Result<Option<Vec<u8>>>;

    /// Replaces the clipboard with encoded image bytes.
    fn write_image(&self, bytes: &[u8]) -> Result<()>;

    /// Empties the clipboard.
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
enum MemoryContent {
    #[default]
    Empty,
    Text(TextData),
    Image(Vec<u8>),
}

#[derive(Debug, Default)]
struct MemoryInner {
    content: Mutex<MemoryContent>,
    counter: AtomicU64,
}

/// In-process clipboard.
///
/// Clones share the same buffer, so a test can keep a handle and play the
/// role of "another application" while the engine owns its own handle.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    inner: Arc<MemoryInner>,
}

impl MemoryClipboard {
    /// Creates an empty clipboard with a zero change counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates another application copying plain text.
    pub fn copy_text(&self, text: &str) {
        let mut data = TextData::new();
        data.insert(crate::entry::TEXT_REPRESENTATION.to_string(), text.to_string());
        self.set(MemoryContent::Text(data));
    }

    /// Simulates another application copying several representations.
    pub fn copy_representations(&self, data: TextData) {
        self.set(MemoryContent::Text(data));
    }

    /// Simulates another application copying an image.
    pub fn copy_image(&self, bytes: &[u8]) {
        self.set(MemoryContent::Image(bytes.to_vec()));
    }

    /// Returns the current text content, if any.
    pub fn current_text(&self) -> Option<TextData> {
        match &*self.inner.content.lock() {
            MemoryContent::Text(data) => Some(data.clone()),
            _ => None,
        }
    }

    /// Returns the current image content, if any.
    pub fn current_image(&self) -> Option<Vec<u8>> {
        match &*self.inner.content.lock() {
            MemoryContent::Image(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// Returns true if the clipboard holds nothing.
    pub fn is_empty(&self) -> bool {
        matches!(&*self.inner.content.lock(), MemoryContent::Empty)
    }

    fn set(&self, content: MemoryContent) {
        *self.inner.content.lock() = content;
        self.inner.counter.fetch_add(1, Ordering::SeqCst);
    }
}

impl Clipboard for MemoryClipboard {
    fn change_count(&self) -> u64 {
        self.inner.counter.load(Ordering::SeqCst)
    }

    fn read_text(&self) -> Result<Option<TextData>> {
        Ok(self.current_text())
    }

    fn write_text(&self, data: &TextData) -> Result<()> {
        self.set(MemoryContent::Text(data.clone()));
        Ok(())
    }

    fn read_image(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.current_image())
    }

    fn write_image(&self, bytes: &[u8]) -> Result<()> {
        self.set(MemoryContent::Image(bytes.to_vec()));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.set(MemoryContent::Empty);
        Ok(())
    }
}
