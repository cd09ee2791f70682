//! Clipboard backed by external platform commands.

use crate::clipboard::Clipboard;
use crate::config::{ClipboardConfig, TextCommand};
use crate::entry::TextData;
use crate::error::{ClipError, Result};
use crate::resilient::ResilientCall;
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// [`Clipboard`] implementation that shells out to commands such as
/// `pbpaste`/`pbcopy` or `wl-paste`/`wl-copy`.
///
/// Every read runs through [`ResilientCall`], so a hanging helper is killed
/// and retried instead of stalling the caller.
pub struct CommandClipboard {
    config: ClipboardConfig,
    reads: ResilientCall,
    writes: ResilientCall,
    synthetic_count: AtomicU64,
    last_count: AtomicU64,
}

impl CommandClipboard {
    /// Creates a clipboard from command configuration and a read retry policy.
    pub fn new(config: ClipboardConfig, reads: ResilientCall) -> Self {
        // Writes are not retried: a half-applied write followed by a second
        // one would bump the change counter twice.
        let writes = ResilientCall::new(1, reads.per_try_timeout(), Duration::ZERO);
        Self {
            config,
            reads,
            writes,
            synthetic_count: AtomicU64::new(0),
            last_count: AtomicU64::new(0),
        }
    }

    fn read(&self, label: &str, argv: &[String]) -> Result<Option<Vec<u8>>> {
        let program = program(argv)?;
        let output = self.reads.run(label, || command(program, &argv[1..]));
        Ok(output
            .filter(|o| o.status.success() && !o.stdout.is_empty())
            .map(|o| o.stdout))
    }

    fn write(&self, label: &str, argv: &[String], input: &[u8]) -> Result<()> {
        let program = program(argv)?;
        let output = self
            .writes
            .run_with_input(label, || command(program, &argv[1..]), Some(input));
        check(label, output)
    }

    fn primary_writer(&self) -> Option<&TextCommand> {
        self.config.text.iter().find(|t| t.write.is_some())
    }
}

impl Clipboard for CommandClipboard {
    fn change_count(&self) -> u64 {
        let Some(argv) = self.config.change_count.as_deref() else {
            // Without a real counter every read reports a change and the
            // capture buffers filter out repeats.
            return self.synthetic_count.fetch_add(1, Ordering::SeqCst) + 1;
        };

        let read = self
            .read("change count", argv)
            .ok()
            .flatten()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .and_then(|s| s.trim().parse::<u64>().ok());

        match read {
            Some(count) => {
                self.last_count.store(count, Ordering::SeqCst);
                count
            }
            // A failed read reports no change.
            None => {
                warn!("change count command failed, keeping last value");
                self.last_count.load(Ordering::SeqCst)
            }
        }
    }

    fn read_text(&self) -> Result<Option<TextData>> {
        let mut data = TextData::new();
        for rep in &self.config.text {
            if let Some(bytes) = self.read(&format!("read {}", rep.name), &rep.read)? {
                match String::from_utf8(bytes) {
                    Ok(text) => {
                        data.insert(rep.name.clone(), text);
                    }
                    Err(_) => debug!(representation = %rep.name, "skipping non-UTF-8 representation"),
                }
            }
        }
        debug!(
            "text clipboard grabbed with keys {:?}",
            data.keys().collect::<Vec<_>>()
        );
        Ok(if data.is_empty() { None } else { Some(data) })
    }

    fn write_text(&self, data: &TextData) -> Result<()> {
        let mut wrote = false;
        for rep in &self.config.text {
            let (Some(argv), Some(value)) = (rep.write.as_deref(), data.get(&rep.name)) else {
                continue;
            };
            self.write(&format!("write {}", rep.name), argv, value.as_bytes())?;
            wrote = true;
        }
        if wrote {
            Ok(())
        } else {
            Err(ClipError::Clipboard(
                "no configured writer matches the entry's representations".into(),
            ))
        }
    }

    fn read_image(&self) -> Result<Option<Vec<u8>>> {
        match &self.config.image {
            Some(image) => self.read("read image", &image.read),
            None => Ok(None),
        }
    }

    fn write_image(&self, bytes: &[u8]) -> Result<()> {
        let image = self
            .config
            .image
            .as_ref()
            .ok_or_else(|| ClipError::Clipboard("no image writer configured".into()))?;
        self.write("write image", &image.write, bytes)
    }

    fn clear(&self) -> Result<()> {
        if let Some(argv) = &self.config.clear {
            return self.write("clear", argv, b"");
        }
        let writer = self
            .primary_writer()
            .and_then(|t| t.write.as_deref())
            .ok_or_else(|| ClipError::Clipboard("no clear command configured".into()))?;
        self.write("clear", writer, b"")
    }
}

fn program(argv: &[String]) -> Result<&str> {
    argv.first()
        .map(String::as_str)
        .ok_or_else(|| ClipError::ConfigError("empty clipboard command".into()))
}

fn command(program: &str, args: &[String]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd
}

fn check(label: &str, output: Option<Output>) -> Result<()> {
    match output {
        Some(o) if o.status.success() => Ok(()),
        Some(o) => Err(ClipError::Clipboard(format!("{} exited with {}", label, o.status))),
        None => Err(ClipError::Clipboard(format!("{} did not complete", label))),
    }
}
