//! clipd CLI - clipboard history daemon.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clipd_core::{ClipError, Config};
use console::style;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;

mod commands;
mod logging;
#[cfg(unix)]
mod signals;

#[derive(Parser)]
#[command(name = "clipd")]
#[command(about = "Clipboard history with pins", long_about = None)]
#[command(version)]
struct Cli {
    /// Log to standard output instead of the cache directory's log file
    #[arg(long, global = true)]
    stdout: bool,
    /// Cache directory holding history, images and config
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
    /// Config file to use instead of <cache-dir>/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the clipboard and record history (default)
    Run,
    /// Print the persisted history
    List {
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Remove side-files no history entry references
    Clean,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let cache_dir = match cli.cache_dir.clone().map_or_else(default_cache_dir, Ok) {
        Ok(dir) => dir,
        Err(e) => {
            report(&e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(cli.stdout, &cache_dir) {
        report(&e);
        return ExitCode::FAILURE;
    }

    match dispatch(&cli, &cache_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {:#}", e);
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: &Cli, cache_dir: &Path) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_file(path),
        None => Config::load(cache_dir),
    }
    .context("Failed to load configuration")?;

    match &cli.command {
        None | Some(Commands::Run) => commands::run::run(cache_dir, &config),
        Some(Commands::List { format }) => commands::list::run(cache_dir, format),
        Some(Commands::Clean) => commands::clean::run(cache_dir),
    }
}

fn default_cache_dir() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join("clipd"))
        .context("No cache directory for this platform; pass --cache-dir")
}

fn report(e: &anyhow::Error) {
    eprintln!("{} {:#}", style("error:").red().bold(), e);
    let hint = e
        .chain()
        .find_map(|cause| cause.downcast_ref::<ClipError>())
        .and_then(ClipError::recovery_suggestion);
    if let Some(hint) = hint {
        eprintln!("  {} {}", style("hint:").cyan(), hint);
    }
}
