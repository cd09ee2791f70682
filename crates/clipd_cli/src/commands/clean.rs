//! Remove stray side-files from the cache directory.

use anyhow::{Context, Result};
use clipd_core::{CacheLock, ItemStore, PersistenceManager};
use console::style;
use std::path::Path;
use tracing::warn;

/// Runs reconciliation against the persisted history.
///
/// Refuses to run while a daemon owns the cache directory.
pub fn run(cache_dir: &Path) -> Result<()> {
    let _lock = CacheLock::acquire(cache_dir).context("Cannot clean a cache directory in use")?;
    let persistence = PersistenceManager::new(cache_dir);

    let snapshot = persistence
        .deserialize()
        .context("Failed to read history snapshot")?;
    let mut store = ItemStore::new(usize::MAX);
    for entry in snapshot.entries.into_iter().rev() {
        if let Err(e) = store.add_to_top(entry) {
            warn!("skipping entry: {}", e);
        }
    }

    let report = persistence
        .reconcile_stray_resources(&store)
        .context("Failed to reconcile side-files")?;

    println!("{}", style("Cleanup Report:").bold());
    println!("  Files scanned:    {}", style(report.files_scanned).cyan());
    println!("  Files referenced: {}", style(report.files_referenced).green());
    println!(
        "  Files deleted:    {}",
        if report.files_deleted > 0 {
            style(report.files_deleted).yellow()
        } else {
            style(report.files_deleted).green()
        }
    );
    println!(
        "  Bytes freed:      {} ({:.2} MB)",
        style(report.bytes_freed).cyan(),
        report.bytes_freed as f64 / 1_048_576.0
    );

    if !report.errors.is_empty() {
        println!();
        println!("{}", style("Errors encountered:").red().bold());
        for error in &report.errors {
            println!("  {} {}", style("×").red(), error);
        }
    }
    Ok(())
}
