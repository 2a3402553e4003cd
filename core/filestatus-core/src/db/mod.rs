//! File status databases.
//!
//! # Variants
//!
//! - [`PhysicalFileStatusesDb`]: always recomputes from the content store.
//!   Its "known" set is the store's live inventory; nothing is persisted.
//! - [`JsonFileStatusesDb`]: caches records in a JSON file under the
//!   dataset's metadata directory and recomputes only on a cache miss.
//!
//! # Sessions
//!
//! Each instance owns a [`QueryTracker`]. Every successful `get`/`set` marks
//! its path as seen; `get_obsolete` returns known paths that were never seen.
//! A crawler walks the live files, calls `get` on each, and what is left over
//! was deleted since the last full pass.
//!
//! ```text
//! open ──► seen = ∅ ──get/set──► seen ∪ {path} ──get_obsolete──► known − seen
//!                                      │
//!                                      └──save──► known persisted (json only)
//! ```

mod json;
mod physical;
mod tracker;


pub use json::{JsonFileStatusesDb, ScanReport, DB_VERSION};
pub(crate) use json::db_file_name;
pub use physical::PhysicalFileStatusesDb;
pub use tracker::QueryTracker;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::paths::TrackedRoot;
use crate::status::FileStatus;

/// Common contract of both database variants.
///
/// Paths may be absolute, root-relative, or `./`-relative; all resolve to
/// the same key through [`TrackedRoot::relativize`].
pub trait FileStatusesDb {
    fn root(&self) -> &TrackedRoot;

    /// Status of `path`, marking it seen for this session.
    fn get(&mut self, path: &Path) -> Result<FileStatus>;

    /// True if the current status of `path` differs from `status`.
    ///
    /// Does not mark the path seen. When `status` carries a filename and the
    /// current record does not, the path's base name stands in for it.
    fn is_different(&self, path: &Path, status: &FileStatus) -> Result<bool>;

    /// Full paths of known entries not queried in this session.
    fn get_obsolete(&self) -> Result<Vec<PathBuf>>;

    /// Stores `status` for `path` and marks it seen.
    fn set(&mut self, path: &Path, status: FileStatus) -> Result<()>;

    /// Forgets `path`.
    fn remove(&mut self, path: &Path) -> Result<()>;

    /// Whether `path` is in the known set.
    fn contains(&self, path: &Path) -> Result<bool>;

    /// Flushes the known set to durable storage.
    fn save(&mut self) -> Result<()>;
}

/// Which database variant to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Physical,
    #[default]
    Json,
}

impl Backend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "physical" | "live" => Some(Backend::Physical),
            "json" | "persisted" => Some(Backend::Json),
            _ => None,
        }
    }
}

/// Compares `current` against `candidate` with the filename fallback.
pub(crate) fn differs(path_name: &str, mut current: FileStatus, candidate: &FileStatus) -> bool {
    if candidate.filename.is_some() && current.filename.is_none() {
        current.filename = Some(path_name.to_string());
    }
    !current.matches(candidate)
}
