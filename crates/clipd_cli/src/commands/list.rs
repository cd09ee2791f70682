//! Print the persisted history without starting the engine.

use super::run::single_line;
use anyhow::{bail, Context, Result};
use clipd_core::{HistoryEntry, PersistenceManager};
use console::style;
use std::path::Path;

pub fn run(cache_dir: &Path, format: &str) -> Result<()> {
    let persistence = PersistenceManager::new(cache_dir);
    let snapshot = persistence
        .read_snapshot()
        .context("Failed to read history snapshot")?
        .unwrap_or_default();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        "text" => {
            if snapshot.entries.is_empty() {
                println!("{}", style("(no saved history)").dim());
                return Ok(());
            }
            println!(
                "{} {} item(s), last image id {}",
                style("Snapshot:").bold(),
                snapshot.entries.len(),
                snapshot.id_dispatcher
            );
            for (i, entry) in snapshot.entries.iter().enumerate() {
                println!("{:>3} {} {}", i + 1, pin_marker(entry), describe(entry));
            }
        }
        other => bail!("Unknown format '{}' (expected text or json)", other),
    }
    Ok(())
}

fn pin_marker(entry: &HistoryEntry) -> String {
    if entry.is_pinned() {
        style("📌").to_string()
    } else {
        "  ".to_string()
    }
}

fn describe(entry: &HistoryEntry) -> String {
    match entry {
        HistoryEntry::Text(_) => single_line(&entry.display_title(), 70),
        HistoryEntry::Image(image) => format!(
            "{} {}",
            entry.display_title(),
            style(image.persistent_id.display()).dim()
        ),
    }
}
