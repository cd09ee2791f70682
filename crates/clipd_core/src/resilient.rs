//! Isolated, killable execution of unreliable capture calls.
//!
//! Native clipboard reads can hang forever inside the OS layer. Running them
//! in-line would hang the poll loop with them, so each attempt runs in its own
//! child process that is killed once its budget is spent.

use crate::config::CaptureConfig;
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::io::{Read, Write};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Poll interval while waiting for a child that closed stdout to exit.
const EXIT_POLL: Duration = Duration::from_millis(5);

/// Retry policy around an isolated call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResilientCall {
    num_tries: u32,
    per_try_timeout: Duration,
    rest_between: Duration,
}

impl ResilientCall {
    /// Creates a policy. `num_tries` is clamped to at least 1.
    pub fn new(num_tries: u32, per_try_timeout: Duration, rest_between: Duration) -> Self {
        Self {
            num_tries: num_tries.max(1),
            per_try_timeout,
            rest_between,
        }
    }

    /// Creates a policy from the `[capture]` configuration section.
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(
            config.num_tries,
            config.per_try_timeout(),
            config.rest_between(),
        )
    }

    /// Number of attempts before giving up.
    pub fn num_tries(&self) -> u32 {
        self.num_tries
    }

    /// Budget for a single attempt.
    pub fn per_try_timeout(&self) -> Duration {
        self.per_try_timeout
    }

    /// Runs the command built by `build` until one attempt completes.
    ///
    /// Each attempt gets a fresh child. An attempt that does not finish within
    /// the per-try budget is killed, and after a rest the next one starts.
    /// Returns `None` once every attempt has failed; a completed attempt is
    /// returned as-is even if the child exited non-zero.
    pub fn run(&self, label: &str, build: impl Fn() -> Command) -> Option<Output> {
        self.run_with_input(label, build, None)
    }

    /// Like [`ResilientCall::run`], feeding `input` to the child's stdin.
    pub fn run_with_input(
        &self,
        label: &str,
        build: impl Fn() -> Command,
        input: Option<&[u8]>,
    ) -> Option<Output> {
        for attempt in 1..=self.num_tries {
            debug!("try {}/{} for {}", attempt, self.num_tries, label);
            let start = Instant::now();

            match self.attempt(build(), input) {
                Ok(Some(output)) => {
                    debug!(
                        "{} finished: took {:.4} seconds",
                        label,
                        start.elapsed().as_secs_f64()
                    );
                    return Some(output);
                }
                Ok(None) => warn!("{} timed out after {:?}, killed", label, self.per_try_timeout),
                Err(e) => warn!("{} failed to start: {}", label, e),
            }

            if attempt < self.num_tries {
                thread::sleep(self.rest_between);
            }
        }

        warn!("{} gave up after {} tries", label, self.num_tries);
        None
    }

    /// Runs one attempt. `Ok(None)` means the budget ran out and the child
    /// was killed.
    fn attempt(&self, mut command: Command, input: Option<&[u8]>) -> std::io::Result<Option<Output>> {
        command
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        #[cfg(unix)]
        reset_signal_mask(&mut command);

        let mut child = command.spawn()?;
        let deadline = Instant::now() + self.per_try_timeout;

        if let (Some(mut stdin), Some(bytes)) = (child.stdin.take(), input) {
            let bytes = bytes.to_vec();
            // A child that never reads stdin must not block us; the writer
            // thread dies with the pipe.
            thread::spawn(move || {
                let _ = stdin.write_all(&bytes);
            });
        }

        let (tx, rx) = bounded(1);
        if let Some(mut stdout) = child.stdout.take() {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let result = stdout.read_to_end(&mut buf).map(|_| buf);
                let _ = tx.send(result);
            });
        } else {
            drop(tx);
        }

        let stdout = match rx.recv_timeout(self.per_try_timeout) {
            Ok(result) => result?,
            Err(RecvTimeoutError::Disconnected) => Vec::new(),
            Err(RecvTimeoutError::Timeout) => {
                kill(&mut child);
                return Ok(None);
            }
        };

        // stdout closed; give the child the rest of the budget to exit.
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(Output {
                    status,
                    stdout,
                    stderr: Vec::new(),
                }));
            }
            if Instant::now() >= deadline {
                kill(&mut child);
                return Ok(None);
            }
            thread::sleep(EXIT_POLL);
        }
    }
}

impl Default for ResilientCall {
    fn default() -> Self {
        Self::from_config(&CaptureConfig::default())
    }
}

/// Helpers must not inherit the quit signals the front-end blocks for its
/// listener thread, or a long-lived helper would ignore SIGTERM.
#[cfg(unix)]
fn reset_signal_mask(command: &mut Command) {
    use nix::sys::signal::SigSet;
    use std::os::unix::process::CommandExt;

    // SAFETY: only pthread_sigmask runs between fork and exec, and it is
    // async-signal-safe.
    unsafe {
        command.pre_exec(|| SigSet::empty().thread_set_mask().map_err(std::io::Error::from));
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    // Reap so the killed attempt does not linger as a zombie.
    let _ = child.wait();
}
