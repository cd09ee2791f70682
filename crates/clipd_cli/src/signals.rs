//! Routing termination signals to a quit request.

use crate::commands::run::QuitRequest;
use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use nix::sys::signal::{SigSet, Signal};
use std::thread;
use tracing::{info, warn};

const QUIT_SIGNALS: [Signal; 4] = [
    Signal::SIGINT,
    Signal::SIGTERM,
    Signal::SIGHUP,
    Signal::SIGQUIT,
];

/// Blocks the quit signals on the calling thread.
///
/// Must run before any other thread is spawned so every thread inherits the
/// mask and only [`spawn_listener`] ever receives them.
pub fn block() -> Result<SigSet> {
    let mut set = SigSet::empty();
    for signal in QUIT_SIGNALS {
        set.add(signal);
    }
    set.thread_block().context("Failed to block quit signals")?;
    Ok(set)
}

/// Waits for one of the blocked signals and sends a quit request.
pub fn spawn_listener(set: SigSet, quit: Sender<QuitRequest>) -> Result<()> {
    thread::Builder::new()
        .name("clipd-signals".into())
        .spawn(move || match set.wait() {
            Ok(signal) => {
                info!("received signal {}", signal.as_str());
                let _ = quit.send(QuitRequest::Signal(signal.as_str()));
            }
            Err(e) => warn!("signal wait failed: {}", e),
        })
        .context("Failed to spawn signal thread")?;
    Ok(())
}
