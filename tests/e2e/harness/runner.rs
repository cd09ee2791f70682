use super::assertions::Assertion;
use super::clipboard::ScenarioClipboard;
use super::steps::ScenarioStep;
use super::workspace::{png, TestWorkspace};
use anyhow::{anyhow, bail, ensure, Context, Result};
use clipd_core::{
    snapshot_file_name, ClipError, Clipboard, Config, Engine, EntryKey, HistoryEntry, ImageId,
    TextData, TickOutcome, TEXT_REPRESENTATION,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const IMAGE_LABEL_PREFIX: &str = "img:";

/// Executes scenarios against a real engine
pub struct ScenarioRunner {
    workspace: TestWorkspace,
    config: Config,
    clipboard: ScenarioClipboard,
    engine: Option<Arc<Engine>>,
    /// Encoded bytes of every image copied so far, by name
    images: HashMap<String, Vec<u8>>,
    /// Ids the engine assigned to captured images, by name
    image_ids: HashMap<String, ImageId>,
    pending_image: Option<String>,
    last_tick: Option<TickOutcome>,
    last_dropped: bool,
    current_step: usize,
}

impl ScenarioRunner {
    /// Create a runner with a started engine on an empty cache directory
    pub fn new(history_len: usize) -> Result<Self> {
        let workspace = TestWorkspace::empty()?;

        let mut config = Config::default();
        config.history.history_len = history_len;
        config.poll.lock_timeout_ms = 100;
        config.poll.quit_lock_timeout_ms = 200;

        let clipboard = ScenarioClipboard::new();
        let engine = workspace.start_engine(&config, Box::new(clipboard.clone()))?;

        Ok(Self {
            workspace,
            config,
            clipboard,
            engine: Some(Arc::new(engine)),
            images: HashMap::new(),
            image_ids: HashMap::new(),
            pending_image: None,
            last_tick: None,
            last_dropped: false,
            current_step: 0,
        })
    }

    /// Get current step number
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Execute all steps in sequence
    pub fn execute(&mut self, steps: &[ScenarioStep]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.current_step = i;
            self.execute_step(step)
                .with_context(|| format!("Step {}: {:?}", i, step))?;
        }
        Ok(())
    }

    /// Execute a single step
    fn execute_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::OtherAppCopiesText { text } => {
                self.clipboard.system().copy_text(text);
                Ok(())
            }
            ScenarioStep::OtherAppCopiesRepresentations { representations } => {
                let data: TextData = representations.iter().cloned().collect();
                self.clipboard.system().copy_representations(data);
                Ok(())
            }
            ScenarioStep::OtherAppCopiesImage {
                name,
                width,
                height,
            } => self.handle_copy_image(name, *width, *height),
            ScenarioStep::OtherAppClears => {
                self.clipboard.system().clear()?;
                Ok(())
            }

            ScenarioStep::Tick => self.handle_tick(),

            ScenarioStep::UserRecopies { label } => {
                let key = self.key(label)?;
                let result = self.engine()?.recopy(&key);
                self.record_user_op(result)
            }
            ScenarioStep::UserTogglesPin { label } => {
                let key = self.key(label)?;
                let result = self.engine()?.toggle_pin(&key).map(|_| ());
                self.record_user_op(result)
            }
            ScenarioStep::UserRemoves { label } => {
                let key = self.key(label)?;
                let result = self.engine()?.remove(&key);
                self.record_user_op(result)
            }
            ScenarioStep::UserClears { respect_pins } => {
                let result = self.engine()?.clear_all(*respect_pins).map(|_| ());
                self.record_user_op(result)
            }
            ScenarioStep::UserQuits => self.handle_quit(false),

            ScenarioStep::UserRemovesDuringSlowTick {
                label,
                capture_delay,
            } => self.handle_remove_during_slow_tick(label, *capture_delay),

            ScenarioStep::SignalQuit => self.handle_quit(true),
            ScenarioStep::Crash => {
                // Dropping without quit leaves whatever the last mutation wrote.
                self.engine = None;
                Ok(())
            }
            ScenarioStep::Restart => self.handle_restart(),
            ScenarioStep::DeleteSideFile { name } => {
                let id = self.image_id(name)?;
                self.workspace.delete_file(&id.file_name())
            }
            ScenarioStep::PlantFile { name, content } => self.workspace.write_file(name, content),
            ScenarioStep::CorruptSnapshot => self
                .workspace
                .write_file(&snapshot_file_name(), b"CLIPS\x01 definitely not zstd"),

            ScenarioStep::Assert { assertion } => self.handle_assertion(assertion),
        }
    }

    fn engine(&self) -> Result<&Arc<Engine>> {
        self.engine
            .as_ref()
            .ok_or_else(|| anyhow!("Engine not running (quit or crashed?)"))
    }

    // ===== Labels =====

    fn image_id(&self, name: &str) -> Result<ImageId> {
        self.image_ids
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("Image '{}' was never captured", name))
    }

    fn key(&self, label: &str) -> Result<EntryKey> {
        match label.strip_prefix(IMAGE_LABEL_PREFIX) {
            Some(name) => Ok(EntryKey::Image(self.image_id(name)?)),
            None => Ok(EntryKey::Text(label.to_string())),
        }
    }

    fn label(&self, entry: &HistoryEntry) -> String {
        match entry {
            HistoryEntry::Text(text) => text.title.clone(),
            HistoryEntry::Image(image) => self
                .image_ids
                .iter()
                .find(|(_, id)| **id == image.id)
                .map(|(name, _)| format!("{}{}", IMAGE_LABEL_PREFIX, name))
                .unwrap_or_else(|| format!("{}#{}", IMAGE_LABEL_PREFIX, image.id.value())),
        }
    }

    fn find(&self, label: &str) -> Result<Option<HistoryEntry>> {
        let key = self.key(label)?;
        Ok(self
            .engine()?
            .entries()?
            .into_iter()
            .find(|e| e.has_key(&key)))
    }

    // ===== Action handlers =====

    fn handle_copy_image(&mut self, name: &str, width: u32, height: u32) -> Result<()> {
        // Same name, same pixels.
        let seed = name
            .bytes()
            .fold(7u8, |acc, b| acc.wrapping_mul(31).wrapping_add(b));
        let bytes = png(width, height, seed)?;
        self.clipboard.system().copy_image(&bytes);
        self.images.insert(name.to_string(), bytes);
        self.pending_image = Some(name.to_string());
        Ok(())
    }

    fn handle_tick(&mut self) -> Result<()> {
        let outcome = self.engine()?.poll_tick()?;
        self.note_tick(outcome);
        Ok(())
    }

    fn note_tick(&mut self, outcome: TickOutcome) {
        if let TickOutcome::Added(EntryKey::Image(id)) = &outcome {
            if let Some(name) = self.pending_image.take() {
                self.image_ids.insert(name, *id);
            }
        }
        self.last_tick = Some(outcome);
    }

    /// A user operation that loses the lock race is dropped, not failed.
    fn record_user_op(&mut self, result: clipd_core::Result<()>) -> Result<()> {
        match result {
            Ok(()) => {
                self.last_dropped = false;
                Ok(())
            }
            Err(ClipError::LockTimeout { .. }) => {
                self.last_dropped = true;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn handle_quit(&mut self, triggered_by_signal: bool) -> Result<()> {
        let engine = self
            .engine
            .take()
            .ok_or_else(|| anyhow!("Engine not running"))?;
        engine.quit(triggered_by_signal)?;
        Ok(())
    }

    fn handle_restart(&mut self) -> Result<()> {
        ensure!(self.engine.is_none(), "Engine still running; quit or crash first");
        let engine = self
            .workspace
            .start_engine(&self.config, Box::new(self.clipboard.clone()))?;
        self.engine = Some(Arc::new(engine));
        self.last_tick = None;
        self.last_dropped = false;
        Ok(())
    }

    fn handle_remove_during_slow_tick(&mut self, label: &str, delay: Duration) -> Result<()> {
        let key = self.key(label)?;
        let engine = Arc::clone(self.engine()?);

        self.clipboard.set_read_delay(delay);
        let ticker = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.poll_tick())
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while !self.clipboard.is_reading() {
            if Instant::now() > deadline || ticker.is_finished() {
                self.clipboard.set_read_delay(Duration::ZERO);
                bail!("Tick never reached the capture; did the clipboard change?");
            }
            thread::sleep(Duration::from_millis(2));
        }

        let result = engine.remove(&key);
        let tick = ticker
            .join()
            .map_err(|_| anyhow!("Poll tick panicked"))?;
        self.clipboard.set_read_delay(Duration::ZERO);

        self.record_user_op(result)?;
        self.note_tick(tick?);
        Ok(())
    }

    // ===== Assertion handlers =====

    fn handle_assertion(&self, assertion: &Assertion) -> Result<()> {
        match assertion {
            Assertion::History(expected) => {
                let actual: Vec<String> = self
                    .engine()?
                    .entries()?
                    .iter()
                    .map(|e| self.label(e))
                    .collect();
                ensure!(
                    &actual == expected,
                    "History mismatch: expected {:?}, got {:?}",
                    expected,
                    actual
                );
            }
            Assertion::HistoryLen(n) => {
                let len = self.engine()?.entries()?.len();
                ensure!(len == *n, "Expected {} entries, got {}", n, len);
            }
            Assertion::Contains(label) => {
                ensure!(self.find(label)?.is_some(), "'{}' not in history", label);
            }
            Assertion::NotContains(label) => {
                // Unknown image labels cannot be in the history either.
                if let Ok(found) = self.find(label) {
                    ensure!(found.is_none(), "'{}' unexpectedly in history", label);
                }
            }
            Assertion::Pinned(label) => {
                let entry = self
                    .find(label)?
                    .ok_or_else(|| anyhow!("'{}' not in history", label))?;
                ensure!(entry.is_pinned(), "'{}' is not pinned", label);
            }
            Assertion::NotPinned(label) => {
                let entry = self
                    .find(label)?
                    .ok_or_else(|| anyhow!("'{}' not in history", label))?;
                ensure!(!entry.is_pinned(), "'{}' is pinned", label);
            }

            Assertion::LastTickAdded(label) => {
                let key = self.key(label)?;
                ensure!(
                    self.last_tick == Some(TickOutcome::Added(key)),
                    "Expected last tick to add '{}', got {:?}",
                    label,
                    self.last_tick
                );
            }
            Assertion::LastTickAddedNothing => {
                ensure!(
                    matches!(
                        self.last_tick,
                        Some(TickOutcome::Unchanged) | Some(TickOutcome::NothingNew)
                    ),
                    "Expected last tick to add nothing, got {:?}",
                    self.last_tick
                );
            }

            Assertion::SideFileExists(name) => {
                let id = self.image_id(name)?;
                ensure!(
                    self.workspace.side_file_exists(id),
                    "Side-file of '{}' ({}) missing",
                    name,
                    id.file_name()
                );
            }
            Assertion::SideFileMissing(name) => {
                let id = self.image_id(name)?;
                ensure!(
                    !self.workspace.side_file_exists(id),
                    "Side-file of '{}' ({}) still present",
                    name,
                    id.file_name()
                );
            }
            Assertion::FileExists(name) => {
                ensure!(self.workspace.file_exists(name), "File missing: {}", name);
            }
            Assertion::FileMissing(name) => {
                ensure!(!self.workspace.file_exists(name), "File present: {}", name);
            }
            Assertion::ImageId { name, id } => {
                let actual = self.image_id(name)?.value();
                ensure!(actual == *id, "Image '{}' has id {}, expected {}", name, actual, id);
            }

            Assertion::ClipboardText(expected) => {
                let actual = self
                    .clipboard
                    .system()
                    .current_text()
                    .and_then(|data| data.get(TEXT_REPRESENTATION).cloned());
                ensure!(
                    actual.as_deref() == Some(expected.as_str()),
                    "Clipboard text: expected {:?}, got {:?}",
                    expected,
                    actual
                );
            }
            Assertion::ClipboardImage(name) => {
                let expected = self
                    .images
                    .get(name)
                    .ok_or_else(|| anyhow!("Image '{}' was never copied", name))?;
                let actual = self.clipboard.system().current_image();
                ensure!(
                    actual.as_ref() == Some(expected),
                    "Clipboard does not hold image '{}'",
                    name
                );
            }
            Assertion::ClipboardEmpty => {
                ensure!(self.clipboard.system().is_empty(), "Clipboard is not empty");
            }

            Assertion::LastOperationDropped => {
                ensure!(self.last_dropped, "Last user operation was not dropped");
            }

            Assertion::Custom(check) => check(self.engine()?.as_ref())?,
        }
        Ok(())
    }
}
