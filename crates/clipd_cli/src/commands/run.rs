//! Run the engine: poller, signal handling and a line console.

use anyhow::{anyhow, Context, Result};
use clipd_core::{ClipError, CommandClipboard, Config, Engine, EntryKey, ResilientCall};
use console::style;
use crossbeam_channel::{bounded, Sender};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

/// Why the process is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitRequest {
    /// The user asked to quit.
    User,
    /// A termination signal arrived.
    Signal(&'static str),
}

/// Commands accepted on stdin while running.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleCommand {
    List,
    Copy(usize),
    Pin(usize),
    Remove(usize),
    Clear { respect_pins: bool },
    Quit,
    Help,
}

impl ConsoleCommand {
    fn parse(line: &str) -> Result<Self> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let index = |arg: Option<&&str>| -> Result<usize> {
            let raw = arg.ok_or_else(|| anyhow!("missing item number"))?;
            match raw.parse::<usize>() {
                Ok(n) if n >= 1 => Ok(n),
                _ => Err(anyhow!("invalid item number: {}", raw)),
            }
        };

        match words.as_slice() {
            [] | ["help"] | ["?"] => Ok(Self::Help),
            ["list"] | ["ls"] => Ok(Self::List),
            ["copy", rest @ ..] => index(rest.first()).map(Self::Copy),
            ["pin", rest @ ..] => index(rest.first()).map(Self::Pin),
            ["rm", rest @ ..] | ["remove", rest @ ..] => index(rest.first()).map(Self::Remove),
            ["clear"] => Ok(Self::Clear { respect_pins: true }),
            ["clear", "all"] => Ok(Self::Clear {
                respect_pins: false,
            }),
            ["quit"] | ["q"] => Ok(Self::Quit),
            _ => Err(anyhow!("unknown command: {}", line.trim())),
        }
    }
}

/// Runs until a quit command or a termination signal.
pub fn run(cache_dir: &Path, config: &Config) -> Result<()> {
    #[cfg(unix)]
    let signal_set = crate::signals::block()?;

    let clipboard = CommandClipboard::new(
        config.clipboard.clone(),
        ResilientCall::from_config(&config.capture),
    );
    let engine = Arc::new(
        Engine::start(cache_dir, config, Box::new(clipboard))
            .context("Failed to start clipboard engine")?,
    );

    let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
    let poller = {
        let engine = Arc::clone(&engine);
        thread::Builder::new()
            .name("clipd-poll".into())
            .spawn(move || engine.run_poll_loop(&shutdown_rx))
            .context("Failed to spawn poll thread")?
    };

    let (quit_tx, quit_rx) = bounded::<QuitRequest>(1);
    #[cfg(unix)]
    crate::signals::spawn_listener(signal_set, quit_tx.clone())?;
    spawn_console(Arc::clone(&engine), quit_tx)?;

    println!(
        "{} clipd watching the clipboard ({})",
        style("→").cyan(),
        cache_dir.display()
    );

    let request = quit_rx.recv().unwrap_or(QuitRequest::User);
    info!(?request, "shutdown requested");

    drop(shutdown_tx);
    if poller.join().is_err() {
        warn!("poll thread panicked");
    }

    engine
        .quit(matches!(request, QuitRequest::Signal(_)))
        .context("Failed to persist history on quit")?;
    println!("{} History saved.", style("✓").green());
    Ok(())
}

fn spawn_console(engine: Arc<Engine>, quit: Sender<QuitRequest>) -> Result<()> {
    thread::Builder::new()
        .name("clipd-console".into())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match ConsoleCommand::parse(&line) {
                    Ok(ConsoleCommand::Quit) => {
                        let _ = quit.send(QuitRequest::User);
                        return;
                    }
                    Ok(command) => {
                        if let Err(e) = execute(&engine, command) {
                            println!("{} {}", style("×").red(), e);
                        }
                    }
                    Err(e) => println!("{} {}", style("×").red(), e),
                }
                let _ = io::stdout().flush();
            }
            // stdin closed: keep running until a signal arrives.
            info!("console input closed");
        })
        .context("Failed to spawn console thread")?;
    Ok(())
}

fn execute(engine: &Engine, command: ConsoleCommand) -> Result<()> {
    match command {
        ConsoleCommand::List => print_history(engine)?,
        ConsoleCommand::Copy(n) => {
            let key = key_at(engine, n)?;
            engine.recopy(&key)?;
            println!("{} Copied {}", style("✓").green(), key);
        }
        ConsoleCommand::Pin(n) => {
            let key = key_at(engine, n)?;
            let pinned = engine.toggle_pin(&key)?;
            println!(
                "{} {} {}",
                style("✓").green(),
                if pinned { "Pinned" } else { "Unpinned" },
                key
            );
        }
        ConsoleCommand::Remove(n) => {
            let key = key_at(engine, n)?;
            engine.remove(&key)?;
            println!("{} Removed {}", style("✓").green(), key);
        }
        ConsoleCommand::Clear { respect_pins } => {
            let removed = engine.clear_all(respect_pins)?;
            println!("{} Cleared {} item(s)", style("✓").green(), removed);
        }
        ConsoleCommand::Help => {
            println!("Commands:");
            println!("  list            show history (pins first)");
            println!("  copy <n>        copy item <n> back to the clipboard");
            println!("  pin <n>         pin or unpin item <n>");
            println!("  rm <n>          remove item <n>");
            println!("  clear           remove unpinned items and clear the clipboard");
            println!("  clear all       remove every item and clear the clipboard");
            println!("  quit            save pinned items and exit");
        }
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

/// Keys in display order: pinned entries first, then unpinned, each newest
/// first.
fn display_order(engine: &Engine) -> Result<Vec<(EntryKey, bool, String)>> {
    let entries = engine.entries()?;
    let (pinned, unpinned): (Vec<_>, Vec<_>) = entries.iter().partition(|e| e.is_pinned());
    Ok(pinned
        .into_iter()
        .chain(unpinned)
        .map(|e| (e.key(), e.is_pinned(), e.display_title()))
        .collect())
}

fn key_at(engine: &Engine, n: usize) -> Result<EntryKey> {
    display_order(engine)?
        .into_iter()
        .nth(n - 1)
        .map(|(key, _, _)| key)
        .ok_or_else(|| ClipError::EntryNotFound(format!("item {}", n)).into())
}

fn print_history(engine: &Engine) -> Result<()> {
    let items = display_order(engine)?;
    if items.is_empty() {
        println!("{}", style("(history is empty)").dim());
        return Ok(());
    }
    for (i, (_, pinned, title)) in items.iter().enumerate() {
        let marker = if *pinned {
            style("📌").to_string()
        } else {
            "  ".to_string()
        };
        println!("{:>3} {} {}", i + 1, marker, single_line(title, 70));
    }
    Ok(())
}

/// First line of `title`, cut to `max` characters.
pub fn single_line(title: &str, max: usize) -> String {
    let line = title.lines().next().unwrap_or_default();
    if line.chars().count() > max || line.len() < title.len() {
        let cut: String = line.chars().take(max).collect();
        format!("{}…", cut)
    } else {
        line.to_string()
    }
}
