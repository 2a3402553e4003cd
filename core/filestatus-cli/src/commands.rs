//! Subcommand implementations.
//!
//! Each command resolves a root and a [`StatusConfig`] (file, then env, then
//! flags) and writes JSON to the given writer so output can be captured.

use std::io::Write;
use std::path::{Path, PathBuf};

use filestatus_core::{
    validate_db_name, Backend, ContentStore, FileStatus, FileStatusesDb, JsonFileStatusesDb,
    StatusConfig, StatusError, StoreKind, TrackedRoot,
};
use serde::Serialize;
use thiserror::Error;

use crate::logging::expand_home;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("`{command}` needs the json backend (configured backend is physical)")]
    NeedsJsonBackend { command: &'static str },
}

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct DbOptions {
    pub root: Option<PathBuf>,
    pub backend: Option<Backend>,
    pub store: Option<StoreKind>,
    pub name: Option<String>,
}

impl DbOptions {
    fn resolve(&self) -> Result<(TrackedRoot, StatusConfig), CliError> {
        let root = match &self.root {
            Some(root) => expand_home(root.clone()),
            None => std::env::current_dir()?,
        };
        let root = TrackedRoot::new(root)?;

        let mut config = StatusConfig::load(root.path())?;
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(store) = self.store {
            config.store = store;
        }
        if let Some(name) = &self.name {
            validate_db_name(name)?;
            config.db_name = name.clone();
        }
        tracing::debug!(root = %root.path().display(), ?config, "Resolved options");
        Ok((root, config))
    }

    fn open_json(
        &self,
        command: &'static str,
    ) -> Result<JsonFileStatusesDb<Box<dyn ContentStore>>, CliError> {
        let (root, config) = self.resolve()?;
        if config.backend == Backend::Physical {
            return Err(CliError::NeedsJsonBackend { command });
        }
        let db_file = config.db_file(root.path());
        let store = config.store.open(root)?;
        Ok(JsonFileStatusesDb::load(store, db_file, config.track_queried)?)
    }
}

#[derive(Serialize)]
struct GetLine<'a> {
    path: PathBuf,
    #[serde(flatten)]
    status: &'a FileStatus,
}

/// Prints one JSON line per path. Cache misses are saved on the json backend.
pub fn get(options: &DbOptions, paths: &[PathBuf], out: &mut impl Write) -> Result<(), CliError> {
    let (root, config) = options.resolve()?;
    let mut db = config.open(root)?;

    for path in paths {
        let status = db.get(path)?;
        let line = GetLine {
            path: db.root().absolute(&db.root().relativize(path)?),
            status: &status,
        };
        serde_json::to_writer(&mut *out, &line)?;
        writeln!(out)?;
    }

    db.save()?;
    Ok(())
}

/// Full refresh pass over the store, saved unless `dry_run`.
pub fn scan(
    options: &DbOptions,
    prune: bool,
    dry_run: bool,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let mut db = options.open_json("scan")?;
    let report = db.refresh(prune)?;

    if dry_run {
        tracing::info!("Dry run, status database not saved");
    } else {
        db.save()?;
    }

    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

/// Drops entries from the json database and saves it.
pub fn forget(options: &DbOptions, paths: &[PathBuf], out: &mut impl Write) -> Result<(), CliError> {
    let mut db = options.open_json("forget")?;

    let mut forgotten = Vec::new();
    for path in paths {
        if db.contains(path)? {
            db.remove(path)?;
            forgotten.push(display_rel(db.root(), path)?);
        } else {
            tracing::warn!(path = %path.display(), "Not in status database");
        }
    }

    db.save()?;
    serde_json::to_writer(&mut *out, &serde_json::json!({ "forgotten": forgotten }))?;
    writeln!(out)?;
    Ok(())
}

fn display_rel(root: &TrackedRoot, path: &Path) -> Result<String, CliError> {
    Ok(root.relativize(path)?.to_string())
}
