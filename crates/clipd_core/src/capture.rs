//! Turning raw clipboard content into history entries.

use crate::clipboard::Clipboard;
use crate::entry::{scaled_dimensions, ContentDigest, HistoryEntry, IdDispatcher, TextData};
use crate::error::{ClipError, Result};
use crate::persistence::write_atomic;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Produces new entries from the clipboard, skipping content that was
/// already captured on a previous tick.
#[derive(Debug)]
pub struct Capturer {
    cache_dir: PathBuf,
    last_text: Option<TextData>,
    last_image: Option<ContentDigest>,
}

impl Capturer {
    /// Creates a capturer writing image side-files into `cache_dir`.
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            last_text: None,
            last_image: None,
        }
    }

    /// Tries to build a new entry from the current clipboard content.
    ///
    /// Text is checked first, then images. Returns `Ok(None)` when the
    /// clipboard holds nothing new.
    pub fn capture(
        &mut self,
        clipboard: &dyn Clipboard,
        dispatcher: &mut IdDispatcher,
    ) -> Result<Option<HistoryEntry>> {
        if let Some(raw) = clipboard.read_text()? {
            let data: TextData = raw.into_iter().filter(|(_, v)| !v.is_empty()).collect();
            if !data.is_empty() && self.last_text.as_ref() != Some(&data) {
                if let Some(entry) = HistoryEntry::text(data.clone()) {
                    self.last_text = Some(data);
                    return Ok(Some(entry));
                }
            }
        }

        if let Some(bytes) = clipboard.read_image()? {
            let digest = ContentDigest::of(&bytes);
            if self.last_image != Some(digest) {
                let entry = self.save_image(&bytes, dispatcher)?;
                self.last_image = Some(digest);
                return Ok(Some(entry));
            }
        }

        debug!("no new item found");
        Ok(None)
    }

    /// Aligns the buffers with an entry the app itself just wrote back to
    /// the clipboard, so the next tick does not capture it again.
    ///
    /// The text buffer is read back from `clipboard`: a backend may hold only
    /// the representations it has writers for.
    pub fn reset_to(&mut self, clipboard: &dyn Clipboard, entry: &HistoryEntry) {
        match entry {
            HistoryEntry::Text(text) => {
                let written = match clipboard.read_text() {
                    Ok(raw) => raw
                        .map(|raw| raw.into_iter().filter(|(_, v)| !v.is_empty()).collect())
                        .filter(|data: &TextData| !data.is_empty()),
                    Err(e) => {
                        warn!("failed to read back re-copied text: {}", e);
                        None
                    }
                };
                self.last_text = Some(written.unwrap_or_else(|| text.raw_data.clone()));
            }
            HistoryEntry::Image(image) => match fs::read(&image.persistent_id) {
                Ok(bytes) => self.last_image = Some(ContentDigest::of(&bytes)),
                Err(e) => warn!(
                    path = %image.persistent_id.display(),
                    "failed to read side-file for buffer reset: {}", e
                ),
            },
        }
        debug!("capture buffers updated");
    }

    /// Forgets the last captures so identical content copied again is
    /// recorded again.
    pub fn forget(&mut self) {
        self.last_text = None;
        self.last_image = None;
    }

    fn save_image(&self, bytes: &[u8], dispatcher: &mut IdDispatcher) -> Result<HistoryEntry> {
        let (width, height) = image_dimensions(bytes)?;
        let id = dispatcher.dispatch();
        let path = self.cache_dir.join(id.file_name());
        write_atomic(&path, bytes)?;
        info!(id = id.value(), width, height, "saved image side-file");
        Ok(HistoryEntry::image(
            id,
            path,
            scaled_dimensions(width, height),
        ))
    }
}

/// Reads the pixel dimensions from encoded image bytes without decoding
/// the whole image.
pub fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| ClipError::Image(e.to_string()))
}
