//! Configuration types for the clipd engine.

use crate::error::{ClipError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Name of the configuration file inside the cache directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Comprehensive configuration for a clipd instance.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// History size configuration.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Poll loop and lock timing.
    #[serde(default)]
    pub poll: PollConfig,

    /// Isolated capture retry policy.
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Startup behaviour.
    #[serde(default)]
    pub startup: StartupConfig,

    /// External commands backing the system clipboard.
    #[serde(default)]
    pub clipboard: ClipboardConfig,
}

impl Config {
    /// Load configuration from `config.toml` in the given directory.
    pub fn load(cache_dir: &Path) -> Result<Self> {
        Self::load_file(&cache_dir.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from an explicit file path.
    ///
    /// A missing file yields the defaults.
    pub fn load_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| ClipError::ConfigError(format!("failed to read config: {}", e)))?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| ClipError::ConfigError(format!("failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to `config.toml` in the given directory.
    pub fn save(&self, cache_dir: &Path) -> Result<()> {
        let path = cache_dir.join(CONFIG_FILE_NAME);
        let content = toml::to_string_pretty(self)
            .map_err(|e| ClipError::ConfigError(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| ClipError::ConfigError(format!("failed to write config: {}", e)))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.history.history_len == 0 {
            return Err(ClipError::ConfigError(
                "history.history_len must be at least 1".into(),
            ));
        }
        if self.capture.num_tries == 0 {
            return Err(ClipError::ConfigError(
                "capture.num_tries must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// History size configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of unpinned-evictable entries (default: 25).
    /// Pinned entries are exempt from the cap.
    pub history_len: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { history_len: 25 }
    }
}

/// Poll loop and lock timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Interval between poll ticks in milliseconds (default: 1000).
    pub interval_ms: u64,

    /// Lock acquisition timeout for ticks and user operations (default: 1000).
    pub lock_timeout_ms: u64,

    /// Lock acquisition timeout for the quit path (default: 3000).
    pub quit_lock_timeout_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            lock_timeout_ms: 1000,
            quit_lock_timeout_ms: 3000,
        }
    }
}

impl PollConfig {
    /// Returns the poll interval as a Duration.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Returns the lock timeout as a Duration.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Returns the quit lock timeout as a Duration.
    pub fn quit_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.quit_lock_timeout_ms)
    }
}

/// Retry policy for isolated capture calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Attempts before giving up (default: 2).
    pub num_tries: u32,

    /// Budget for a single attempt in milliseconds (default: 1000).
    pub per_try_timeout_ms: u64,

    /// Pause after a killed attempt in milliseconds (default: 100).
    pub rest_between_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            num_tries: 2,
            per_try_timeout_ms: 1000,
            rest_between_ms: 100,
        }
    }
}

impl CaptureConfig {
    /// Returns the per-attempt budget as a Duration.
    pub fn per_try_timeout(&self) -> Duration {
        Duration::from_millis(self.per_try_timeout_ms)
    }

    /// Returns the rest between attempts as a Duration.
    pub fn rest_between(&self) -> Duration {
        Duration::from_millis(self.rest_between_ms)
    }
}

/// Startup behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StartupConfig {
    /// Clear the system clipboard once history is restored (default: false).
    pub clear_clipboard: bool,
}

/// External commands used by [`crate::CommandClipboard`].
///
/// Every command is an argv vector; the first element is the program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipboardConfig {
    /// Command printing the pasteboard change counter. When absent, every
    /// poll is treated as a potential change and capture buffers dedupe.
    #[serde(default)]
    pub change_count: Option<Vec<String>>,

    /// Command clearing the clipboard. When absent, the primary text
    /// representation is written with empty content.
    #[serde(default)]
    pub clear: Option<Vec<String>>,

    /// Text representations, in capture order.
    #[serde(default)]
    pub text: Vec<TextCommand>,

    /// Image capture and restore commands (PNG bytes on stdin/stdout).
    #[serde(default)]
    pub image: Option<ImageCommand>,
}

/// Read/write commands for one text representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextCommand {
    /// Representation name, e.g. `text` or `file-url`.
    pub name: String,
    /// Command printing the representation on stdout.
    pub read: Vec<String>,
    /// Command reading the representation from stdin.
    #[serde(default)]
    pub write: Option<Vec<String>>,
}

/// Read/write commands for image data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCommand {
    /// Command printing PNG bytes on stdout.
    pub read: Vec<String>,
    /// Command reading PNG bytes from stdin.
    pub write: Vec<String>,
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[cfg(target_os = "macos")]
impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            change_count: Some(argv(&[
                "osascript",
                "-l",
                "JavaScript",
                "-e",
                "ObjC.import('AppKit'); $.NSPasteboard.generalPasteboard.changeCount",
            ])),
            clear: None,
            text: vec![TextCommand {
                name: crate::entry::TEXT_REPRESENTATION.into(),
                read: argv(&["pbpaste"]),
                write: Some(argv(&["pbcopy"])),
            }],
            image: Some(ImageCommand {
                read: argv(&["pngpaste", "-"]),
                write: argv(&[
                    "osascript",
                    "-e",
                    "set the clipboard to (read (POSIX file \"/dev/stdin\") as «class PNGf»)",
                ]),
            }),
        }
    }
}

#[cfg(not(target_os = "macos"))]
impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            change_count: None,
            clear: Some(argv(&["wl-copy", "--clear"])),
            text: vec![
                TextCommand {
                    name: crate::entry::FILE_URL_REPRESENTATION.into(),
                    read: argv(&["wl-paste", "--no-newline", "--type", "text/uri-list"]),
                    write: None,
                },
                TextCommand {
                    name: crate::entry::TEXT_REPRESENTATION.into(),
                    read: argv(&["wl-paste", "--no-newline", "--type", "text/plain"]),
                    write: Some(argv(&["wl-copy", "--type", "text/plain"])),
                },
            ],
            image: Some(ImageCommand {
                read: argv(&["wl-paste", "--type", "image/png"]),
                write: argv(&["wl-copy", "--type", "image/png"]),
            }),
        }
    }
}
