//! History entry types and identifier dispatch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Representation name holding a file URL.
pub const FILE_URL_REPRESENTATION: &str = "file-url";

/// Representation name holding plain text.
pub const TEXT_REPRESENTATION: &str = "text";

/// Titles reserved by the presentation layer for its separators.
pub const RESERVED_TITLES: [&str; 2] = [
    "\u{6}pins_above_nonpins_below_separator\u{6}",
    "\u{6}bottom_bar_separator\u{6}",
];

/// Extension of image side-files in the cache directory.
pub const IMAGE_EXTENSION: &str = "png";

/// Pixel budget used when scaling image dimensions for display.
const DISPLAY_PIXEL_BUDGET: f64 = 20_000.0;

/// Clipboard text representations, keyed by representation name.
///
/// A `BTreeMap` keeps encoding and comparison independent of insertion order.
pub type TextData = BTreeMap<String, String>;

/// Opaque identifier of an image entry, dispatched by [`IdDispatcher`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImageId(u64);

impl ImageId {
    /// Wraps a raw dispatched value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw dispatched value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// File name of the side-file owned by this id.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, IMAGE_EXTENSION)
    }

    /// Parses a side-file name back into an id.
    ///
    /// Returns `None` for anything that is not `<digits>.png`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(IMAGE_EXTENSION)?.strip_suffix('.')?;
        if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        stem.parse().ok().map(Self)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "image#{}", self.0)
    }
}

/// Unique key of an entry within the history.
///
/// Text entries are keyed by their derived title, image entries by their
/// dispatched id, so the two variants can never collide.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKey {
    /// Title of a text entry.
    Text(String),
    /// Id of an image entry.
    Image(ImageId),
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::Text(title) => write!(f, "{}", abbreviate(title)),
            EntryKey::Image(id) => write!(f, "{}", id),
        }
    }
}

/// A text clipboard capture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntry {
    /// Title derived from the representations.
    pub title: String,
    /// Whether the entry is exempt from eviction.
    pub is_pinned: bool,
    /// Every non-empty representation, preserved verbatim for re-copy.
    pub raw_data: TextData,
}

/// An image clipboard capture backed by a side-file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    /// Dispatched identifier.
    pub id: ImageId,
    /// Whether the entry is exempt from eviction.
    pub is_pinned: bool,
    /// Side-file exclusively owned by this entry.
    pub persistent_id: PathBuf,
    /// Display dimensions (width, height), scaled.
    pub dimensions: (u32, u32),
}

/// One item of clipboard history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryEntry {
    /// Text capture.
    Text(TextEntry),
    /// Image capture.
    Image(ImageEntry),
}

impl HistoryEntry {
    /// Builds a text entry from captured representations.
    ///
    /// Empty representations are dropped. Returns `None` when no title can be
    /// derived.
    pub fn text(raw: TextData) -> Option<Self> {
        let raw_data: TextData = raw.into_iter().filter(|(_, v)| !v.is_empty()).collect();
        let title = displayable_title(&raw_data)?;
        Some(HistoryEntry::Text(TextEntry {
            title,
            is_pinned: false,
            raw_data,
        }))
    }

    /// Builds an image entry for an already written side-file.
    pub fn image(id: ImageId, persistent_id: PathBuf, dimensions: (u32, u32)) -> Self {
        HistoryEntry::Image(ImageEntry {
            id,
            is_pinned: false,
            persistent_id,
            dimensions,
        })
    }

    /// Returns the unique key of this entry.
    pub fn key(&self) -> EntryKey {
        match self {
            HistoryEntry::Text(t) => EntryKey::Text(t.title.clone()),
            HistoryEntry::Image(i) => EntryKey::Image(i.id),
        }
    }

    /// Returns true if this entry's key equals `key`.
    pub fn has_key(&self, key: &EntryKey) -> bool {
        match (self, key) {
            (HistoryEntry::Text(t), EntryKey::Text(title)) => &t.title == title,
            (HistoryEntry::Image(i), EntryKey::Image(id)) => i.id == *id,
            _ => false,
        }
    }

    /// Returns the pin flag.
    pub fn is_pinned(&self) -> bool {
        match self {
            HistoryEntry::Text(t) => t.is_pinned,
            HistoryEntry::Image(i) => i.is_pinned,
        }
    }

    /// Sets the pin flag.
    pub fn set_pinned(&mut self, pinned: bool) {
        match self {
            HistoryEntry::Text(t) => t.is_pinned = pinned,
            HistoryEntry::Image(i) => i.is_pinned = pinned,
        }
    }

    /// Returns the side-file owned by this entry, if any.
    pub fn persistent_path(&self) -> Option<&Path> {
        match self {
            HistoryEntry::Text(_) => None,
            HistoryEntry::Image(i) => Some(&i.persistent_id),
        }
    }

    /// Returns true if the title is reserved by the presentation layer.
    pub fn has_reserved_title(&self) -> bool {
        match self {
            HistoryEntry::Text(t) => RESERVED_TITLES.contains(&t.title.as_str()),
            HistoryEntry::Image(_) => false,
        }
    }

    /// Title suitable for display. Images get a synthesized label.
    pub fn display_title(&self) -> String {
        match self {
            HistoryEntry::Text(t) => t.title.clone(),
            HistoryEntry::Image(i) => {
                format!("[image {}x{}]", i.dimensions.0, i.dimensions.1)
            }
        }
    }

    /// Frees the side-resource owned by this entry.
    ///
    /// A side-file that is already gone is not an error. Other failures are
    /// logged and swallowed so a mutation never aborts halfway.
    pub fn release_resource(&self) {
        let Some(path) = self.persistent_path() else {
            return;
        };
        match fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "released side-resource"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "failed to release side-resource: {}", e),
        }
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryEntry::Text(t) => {
                let reps: Vec<&str> = t.raw_data.keys().map(String::as_str).collect();
                write!(
                    f,
                    "TextEntry(title={}, raw={:?}, pinned={})",
                    abbreviate(&t.title),
                    reps,
                    t.is_pinned
                )
            }
            HistoryEntry::Image(i) => write!(
                f,
                "ImageEntry(id={}, dims={:?}, pinned={})",
                i.id.value(),
                i.dimensions,
                i.is_pinned
            ),
        }
    }
}

/// Picks the title for a set of text representations.
///
/// A file URL wins over plain text.
pub fn displayable_title(data: &TextData) -> Option<String> {
    [FILE_URL_REPRESENTATION, TEXT_REPRESENTATION]
        .iter()
        .filter_map(|rep| data.get(*rep))
        .find(|value| !value.is_empty())
        .cloned()
}

/// Scales image dimensions to a fixed pixel budget, keeping aspect ratio.
pub fn scaled_dimensions(width: u32, height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    let scale = (DISPLAY_PIXEL_BUDGET / (width as f64 * height as f64)).sqrt();
    (
        (scale * width as f64) as u32,
        (scale * height as f64) as u32,
    )
}

/// Log-safe abbreviation of a possibly sensitive title.
fn abbreviate(title: &str) -> String {
    let chars: Vec<char> = title.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Monotonic dispatcher of image ids.
///
/// The value is the last id handed out; ids start at 1 and are never reused,
/// including across restarts once the persisted value is restored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IdDispatcher {
    last: u64,
}

impl IdDispatcher {
    /// Creates a dispatcher that has handed out nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next id and advances.
    pub fn dispatch(&mut self) -> ImageId {
        self.last += 1;
        ImageId(self.last)
    }

    /// Returns the last dispatched value (0 if none).
    pub fn value(&self) -> u64 {
        self.last
    }

    /// Raises the dispatcher to at least `value`. Never moves backwards.
    pub fn restore_at_least(&mut self, value: u64) {
        self.last = self.last.max(value);
    }
}

/// 32-byte BLAKE3 digest of captured content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Hashes raw bytes.
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Returns the digest as a lowercase hex string.
    pub fn as_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", &self.as_hex()[..12])
    }
}
