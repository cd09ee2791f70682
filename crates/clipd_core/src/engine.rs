//! The clipboard history engine.
//!
//! [`Engine`] owns the history, the clipboard handle and the snapshot, and is
//! shared between a background poller and whatever front-end issues user
//! operations. Everything that touches the clipboard or the history goes
//! through one [`Coordinator`] lock with a bounded wait.

use crate::capture::Capturer;
use crate::change::ChangeDetector;
use crate::clipboard::Clipboard;
use crate::config::{Config, PollConfig};
use crate::coordinator::Coordinator;
use crate::entry::{EntryKey, HistoryEntry, IdDispatcher};
use crate::error::{ClipError, Result};
use crate::lock::CacheLock;
use crate::persistence::{PersistenceManager, ReconcileReport};
use crate::store::ItemStore;
use crossbeam_channel::{select, tick, Receiver};
use std::any::Any;
use std::fs;
use std::io::ErrorKind;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// State guarded by the coordinator lock.
struct EngineState {
    clipboard: Box<dyn Clipboard>,
    detector: ChangeDetector,
    capturer: Capturer,
    store: ItemStore,
    dispatcher: IdDispatcher,
}

impl EngineState {
    /// Marks the clipboard's current counter as seen. Must follow every
    /// write the engine makes to the clipboard.
    fn acknowledge(&mut self) {
        self.detector.acknowledge(self.clipboard.as_ref());
    }
}

/// Result of one poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The change counter has not moved.
    Unchanged,
    /// The counter moved but there was nothing new to record.
    NothingNew,
    /// A new entry was added at the top.
    Added(EntryKey),
    /// The engine is shutting down.
    Stopped,
}

/// Clipboard history engine.
pub struct Engine {
    state: Coordinator<EngineState>,
    persistence: PersistenceManager,
    poll: PollConfig,
    quitting: AtomicBool,
    _cache_lock: CacheLock,
}

impl Engine {
    /// Opens the history in `cache_dir` and prepares it for polling.
    ///
    /// Takes the cache directory lock, restores the snapshot, rewrites it
    /// pinned-only, optionally clears the clipboard, removes stray side-files
    /// and finally acknowledges the current change counter.
    pub fn start(cache_dir: &Path, config: &Config, clipboard: Box<dyn Clipboard>) -> Result<Self> {
        let cache_lock = CacheLock::acquire(cache_dir)?;
        let persistence = PersistenceManager::new(cache_dir);

        let mut store = ItemStore::new(config.history.history_len);
        let mut dispatcher = IdDispatcher::new();

        let snapshot = persistence.deserialize()?;
        dispatcher.restore_at_least(snapshot.id_dispatcher);
        for entry in snapshot.entries.into_iter().rev() {
            if let Err(e) = store.add_to_top(entry) {
                warn!("skipping restored entry: {}", e);
            }
        }

        // A signal quit leaves unpinned entries in the snapshot.
        persistence.serialize(&store, dispatcher.value(), true)?;

        if config.startup.clear_clipboard {
            if let Err(e) = clipboard.clear() {
                warn!("failed to clear clipboard at startup: {}", e);
            }
        }

        let report = persistence.reconcile_stray_resources(&store)?;
        if report.files_deleted > 0 {
            info!(
                deleted = report.files_deleted,
                bytes = report.bytes_freed,
                "removed stray side-files"
            );
        }

        let detector = ChangeDetector::new(clipboard.as_ref());
        info!(
            entries = store.len(),
            id_dispatcher = dispatcher.value(),
            change_count = detector.acknowledged(),
            "engine started"
        );

        Ok(Self {
            state: Coordinator::new(EngineState {
                clipboard,
                detector,
                capturer: Capturer::new(cache_dir),
                store,
                dispatcher,
            }),
            persistence,
            poll: config.poll.clone(),
            quitting: AtomicBool::new(false),
            _cache_lock: cache_lock,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        self.persistence.cache_dir()
    }

    /// Returns a copy of the history, newest first.
    pub fn entries(&self) -> Result<Vec<HistoryEntry>> {
        let state = self.state.acquire("list", self.poll.lock_timeout())?;
        Ok(state.store.iter().cloned().collect())
    }

    /// Last dispatched image id.
    pub fn id_dispatcher_value(&self) -> Result<u64> {
        let state = self.state.acquire("read id dispatcher", self.poll.lock_timeout())?;
        Ok(state.dispatcher.value())
    }

    /// Returns true once [`Engine::quit`] has been called.
    pub fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::SeqCst)
    }

    /// Adds an entry at the top of the history.
    pub fn add(&self, entry: HistoryEntry) -> Result<()> {
        let mut state = self.state.acquire("add", self.poll.lock_timeout())?;
        state.store.add_to_top(entry)?;
        self.persist_logged(&state, true);
        Ok(())
    }

    /// Writes an entry back to the system clipboard.
    ///
    /// The engine's own write is acknowledged and the capture buffers are
    /// reset so the next tick does not record it again. Unpinned entries move
    /// to the top.
    pub fn recopy(&self, key: &EntryKey) -> Result<()> {
        let mut guard = self.state.acquire("recopy", self.poll.lock_timeout())?;
        let state = &mut *guard;

        let entry = state
            .store
            .get(key)
            .cloned()
            .ok_or_else(|| ClipError::EntryNotFound(key.to_string()))?;

        match &entry {
            HistoryEntry::Text(text) => state.clipboard.write_text(&text.raw_data)?,
            HistoryEntry::Image(image) => {
                let bytes = fs::read(&image.persistent_id).map_err(|e| {
                    if e.kind() == ErrorKind::NotFound {
                        ClipError::MissingResource {
                            path: image.persistent_id.clone(),
                        }
                    } else {
                        e.into()
                    }
                })?;
                state.clipboard.write_image(&bytes)?;
            }
        }
        state.acknowledge();
        state.capturer.reset_to(state.clipboard.as_ref(), &entry);

        if !entry.is_pinned() {
            state.store.resurface(key)?;
        }
        info!(key = %key, "re-copied item");
        self.persist_logged(state, true);
        Ok(())
    }

    /// Flips the pin flag of an entry, moves it to the top and persists the
    /// pinned entries. Returns the new pin state.
    pub fn toggle_pin(&self, key: &EntryKey) -> Result<bool> {
        let mut state = self.state.acquire("toggle pin", self.poll.lock_timeout())?;
        let pinned = state.store.toggle_pin(key)?;
        state.store.resurface(key)?;
        self.persist_logged(&state, true);
        Ok(pinned)
    }

    /// Removes an entry and its side-file.
    pub fn remove(&self, key: &EntryKey) -> Result<()> {
        let mut state = self.state.acquire("remove", self.poll.lock_timeout())?;
        state.store.remove(key, false)?;
        state.capturer.forget();
        info!(key = %key, "removed item");
        self.persist_logged(&state, true);
        Ok(())
    }

    /// Clears the system clipboard and the history, keeping pinned entries
    /// if `respect_pins`. Returns the number of entries removed.
    pub fn clear_all(&self, respect_pins: bool) -> Result<usize> {
        let mut state = self.state.acquire("clear all", self.poll.lock_timeout())?;
        if let Err(e) = state.clipboard.clear() {
            warn!("failed to clear system clipboard: {}", e);
        }
        state.acknowledge();
        state.capturer.forget();
        let removed = state.store.clear_all(respect_pins);
        self.persist_logged(&state, true);
        Ok(removed)
    }

    /// Deletes side-files that no entry references.
    pub fn reconcile_stray_resources(&self) -> Result<ReconcileReport> {
        let state = self.state.acquire("reconcile", self.poll.lock_timeout())?;
        self.persistence.reconcile_stray_resources(&state.store)
    }

    /// Shuts the engine down and writes the final snapshot.
    ///
    /// A signal-triggered quit persists the whole history so the session can
    /// be recovered. A user quit drops unpinned entries, without touching the
    /// system clipboard, and persists only the pinned ones.
    pub fn quit(&self, triggered_by_signal: bool) -> Result<()> {
        self.quitting.store(true, Ordering::SeqCst);
        info!(triggered_by_signal, "quitting");

        let mut state = self.state.acquire("quit", self.poll.quit_lock_timeout())?;
        let report = self.persistence.reconcile_stray_resources(&state.store)?;
        debug!(deleted = report.files_deleted, "reconciled before quit");

        if triggered_by_signal {
            self.persist(&state, false)?;
        } else {
            state.store.clear_all(true);
            self.persist(&state, true)?;
        }
        info!("data serialized");
        Ok(())
    }

    /// Runs one poll tick: capture new clipboard content if the change
    /// counter moved.
    pub fn poll_tick(&self) -> Result<TickOutcome> {
        if self.is_quitting() {
            return Ok(TickOutcome::Stopped);
        }

        let mut guard = self.state.acquire("poll", self.poll.lock_timeout())?;
        let state = &mut *guard;

        if !state.detector.has_changed(state.clipboard.as_ref()) {
            return Ok(TickOutcome::Unchanged);
        }
        state.acknowledge();

        let Some(entry) = state
            .capturer
            .capture(state.clipboard.as_ref(), &mut state.dispatcher)?
        else {
            return Ok(TickOutcome::NothingNew);
        };

        let key = entry.key();
        state.store.add_to_top(entry)?;
        self.persist_logged(state, true);
        Ok(TickOutcome::Added(key))
    }

    /// Polls on the configured interval until `shutdown` fires or
    /// disconnects.
    ///
    /// Failures and panics inside a tick are logged and the loop keeps going.
    pub fn run_poll_loop(&self, shutdown: &Receiver<()>) {
        let ticker = tick(self.poll.interval());
        info!(interval = ?self.poll.interval(), "poll loop started");

        loop {
            select! {
                recv(ticker) -> _ => {
                    if self.guarded_tick() == Some(TickOutcome::Stopped) {
                        break;
                    }
                }
                recv(shutdown) -> _ => break,
            }
        }
        info!("poll loop stopped");
    }

    fn guarded_tick(&self) -> Option<TickOutcome> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.poll_tick())) {
            Ok(Ok(outcome)) => {
                if let TickOutcome::Added(key) = &outcome {
                    debug!(key = %key, "captured new item");
                }
                Some(outcome)
            }
            Ok(Err(ClipError::LockTimeout { .. })) => {
                debug!("poll tick skipped");
                None
            }
            Ok(Err(e)) => {
                error!("unknown failure in adding clip: {}", e);
                None
            }
            Err(payload) => {
                error!("poll tick panicked: {}", panic_message(payload.as_ref()));
                None
            }
        }
    }

    fn persist(&self, state: &EngineState, only_pinned: bool) -> Result<()> {
        self.persistence
            .serialize(&state.store, state.dispatcher.value(), only_pinned)
    }

    fn persist_logged(&self, state: &EngineState, only_pinned: bool) {
        if let Err(e) = self.persist(state, only_pinned) {
            error!("failed to write snapshot: {}", e);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
