//! filestatus: inspect and refresh dataset file status databases.
//!
//! ## Subcommands
//!
//! - `get`: print the recorded status of paths (JSON lines)
//! - `scan`: full refresh pass over the store, prints a change report
//! - `forget`: drop paths from the persisted database

mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use filestatus_core::{Backend, StoreKind};

use commands::DbOptions;

#[derive(Parser)]
#[command(name = "filestatus")]
#[command(about = "Track file changes across crawl passes of a dataset")]
#[command(version)]
struct Cli {
    /// Dataset root (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Database variant: json (persisted) or physical (always live)
    #[arg(long, global = true, value_parser = parse_backend)]
    backend: Option<Backend>,

    /// Content store: worktree or annex
    #[arg(long, global = true, value_parser = parse_store)]
    store: Option<StoreKind>,

    /// Database name, selects `.dataset/crawl-status-<NAME>.json`
    #[arg(long, global = true)]
    name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the status of each path
    Get {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },

    /// Recompute every file and report what changed
    Scan {
        /// Drop entries whose files are gone
        #[arg(long)]
        prune: bool,

        /// Report without saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove paths from the status database
    Forget {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },
}

fn parse_backend(value: &str) -> Result<Backend, String> {
    Backend::parse(value).ok_or_else(|| format!("unknown backend '{value}' (json, physical)"))
}

fn parse_store(value: &str) -> Result<StoreKind, String> {
    StoreKind::parse(value).ok_or_else(|| format!("unknown store '{value}' (worktree, annex)"))
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    let options = DbOptions {
        root: cli.root,
        backend: cli.backend,
        store: cli.store,
        name: cli.name,
    };
    let mut stdout = std::io::stdout().lock();

    let result = match cli.command {
        Commands::Get { paths } => commands::get(&options, &paths, &mut stdout),
        Commands::Scan { prune, dry_run } => {
            commands::scan(&options, prune, dry_run, &mut stdout)
        }
        Commands::Forget { paths } => commands::forget(&options, &paths, &mut stdout),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "filestatus failed");
        eprintln!("filestatus: {e}");
        std::process::exit(1);
    }
}
