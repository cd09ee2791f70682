//! clipd Core Library
//!
//! A clipboard history engine, providing:
//! - Change detection on a monotonic clipboard counter
//! - Killable, retried capture through external helpers
//! - A bounded, pin-aware history with title deduplication
//! - Crash-safe snapshots with stray side-file cleanup
//!
//! # Quick Start
//!
//! ```
//! use clipd_core::{Config, Engine, MemoryClipboard, TickOutcome};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let clipboard = MemoryClipboard::new();
//! let engine = Engine::start(tmp.path(), &Config::default(), Box::new(clipboard.clone())).unwrap();
//!
//! // Another application copies something
//! clipboard.copy_text("hello world");
//!
//! // The next poll tick records it
//! assert!(matches!(engine.poll_tick().unwrap(), TickOutcome::Added(_)));
//! assert_eq!(engine.entries().unwrap()[0].display_title(), "hello world");
//! ```
//!
//! # Features
//!
//! ## Pins
//!
//! Pinned entries are exempt from the history length and are the only ones
//! that survive an ordinary quit:
//!
//! ```
//! use clipd_core::{Config, Engine, EntryKey, MemoryClipboard};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let clipboard = MemoryClipboard::new();
//! let engine = Engine::start(tmp.path(), &Config::default(), Box::new(clipboard.clone())).unwrap();
//!
//! clipboard.copy_text("keep");
//! engine.poll_tick().unwrap();
//! assert!(engine.toggle_pin(&EntryKey::Text("keep".into())).unwrap());
//!
//! engine.quit(false).unwrap();
//! ```
//!
//! ## Snapshots
//!
//! The history is written after every mutation to a versioned snapshot in
//! the cache directory. A snapshot that references a missing image side-file
//! is discarded as a whole on load.

mod capture;
mod change;
mod clipboard;
mod command_clipboard;
mod config;
mod coordinator;
mod engine;
mod entry;
mod error;
mod lock;
mod persistence;
mod resilient;
mod store;

pub use capture::{image_dimensions, Capturer};
pub use change::ChangeDetector;
pub use clipboard::{Clipboard, MemoryClipboard};
pub use command_clipboard::CommandClipboard;
pub use config::{
    CaptureConfig, ClipboardConfig, Config, HistoryConfig, ImageCommand, PollConfig,
    StartupConfig, TextCommand, CONFIG_FILE_NAME,
};
pub use coordinator::Coordinator;
pub use engine::{Engine, TickOutcome};
pub use entry::{
    displayable_title, scaled_dimensions, ContentDigest, EntryKey, HistoryEntry, IdDispatcher,
    ImageEntry, ImageId, TextData, TextEntry, FILE_URL_REPRESENTATION, IMAGE_EXTENSION,
    RESERVED_TITLES, TEXT_REPRESENTATION,
};
pub use error::{ClipError, Result};
pub use lock::{lock_holder, CacheLock, LOCK_FILE_NAME};
pub use persistence::{
    snapshot_file_name, PersistenceManager, ReconcileReport, Snapshot, SNAPSHOT_FORMAT_VERSION,
    SNAPSHOT_MAGIC,
};
pub use resilient::ResilientCall;
pub use store::ItemStore;
