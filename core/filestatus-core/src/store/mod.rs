//! Backing content stores: the query surface status databases read from.
//! Add new stores here so the CLI can select them by [`StoreKind`].

mod annex;
mod worktree;

pub use annex::AnnexStore;
pub use worktree::WorkTreeStore;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::paths::{RelPath, TrackedRoot};
use crate::status::FileStatus;

/// Directory (relative to the root) holding dataset metadata, including the
/// persisted status databases. Never part of a store's inventory.
pub const META_DIR: &str = ".dataset";

/// Trait for the external content store a database reconciles against.
///
/// Implementors should:
/// - Return [`crate::StatusError::NotFound`] for paths that do not exist
/// - Never inspect the store's on-disk formats outside this surface
pub trait ContentStore {
    /// Root the store answers for.
    fn root(&self) -> &TrackedRoot;

    /// Size, mtime and content key for a path.
    fn status(&self, path: &RelPath) -> Result<FileStatus>;

    /// Every file the store currently knows about.
    fn inventory(&self) -> Result<Vec<RelPath>>;
}

impl<S: ContentStore + ?Sized> ContentStore for Box<S> {
    fn root(&self) -> &TrackedRoot {
        (**self).root()
    }

    fn status(&self, path: &RelPath) -> Result<FileStatus> {
        (**self).status(path)
    }

    fn inventory(&self) -> Result<Vec<RelPath>> {
        (**self).inventory()
    }
}

/// Which backing store to open for a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Worktree,
    Annex,
}

impl StoreKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "worktree" | "fs" => Some(StoreKind::Worktree),
            "annex" | "git-annex" => Some(StoreKind::Annex),
            _ => None,
        }
    }

    /// Opens the selected store at `root`.
    pub fn open(self, root: TrackedRoot) -> Result<Box<dyn ContentStore>> {
        Ok(match self {
            StoreKind::Worktree => Box::new(WorkTreeStore::new(root)),
            StoreKind::Annex => Box::new(AnnexStore::new(root)?),
        })
    }
}
