//! Live status database: every query goes to the content store.

use std::path::{Path, PathBuf};

use super::{differs, FileStatusesDb, QueryTracker};
use crate::error::Result;
use crate::paths::TrackedRoot;
use crate::status::FileStatus;
use crate::store::ContentStore;

/// Database with no cache. The store's inventory is the known set.
pub struct PhysicalFileStatusesDb<S> {
    store: S,
    tracker: QueryTracker,
}

impl<S: ContentStore> PhysicalFileStatusesDb<S> {
    pub fn new(store: S) -> Self {
        Self::with_tracking(store, true)
    }

    pub fn with_tracking(store: S, track_queried: bool) -> Self {
        PhysicalFileStatusesDb {
            store,
            tracker: QueryTracker::new(track_queried),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn tracker(&self) -> &QueryTracker {
        &self.tracker
    }
}

impl<S: ContentStore> FileStatusesDb for PhysicalFileStatusesDb<S> {
    fn root(&self) -> &TrackedRoot {
        self.store.root()
    }

    fn get(&mut self, path: &Path) -> Result<FileStatus> {
        let rel = self.store.root().relativize(path)?;
        let status = self.store.status(&rel)?;
        self.tracker.mark(&rel);
        Ok(status)
    }

    fn is_different(&self, path: &Path, status: &FileStatus) -> Result<bool> {
        let rel = self.store.root().relativize(path)?;
        let current = self.store.status(&rel)?;
        Ok(differs(rel.file_name(), current, status))
    }

    fn get_obsolete(&self) -> Result<Vec<PathBuf>> {
        let inventory = self.store.inventory()?;
        let root = self.store.root();
        Ok(self
            .tracker
            .unseen(&inventory)?
            .iter()
            .map(|rel| root.absolute(rel))
            .collect())
    }

    /// Records are always recomputed, so only the seen mark is kept.
    fn set(&mut self, path: &Path, _status: FileStatus) -> Result<()> {
        let rel = self.store.root().relativize(path)?;
        self.tracker.mark(&rel);
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        self.store.root().relativize(path)?;
        Ok(())
    }

    fn contains(&self, path: &Path) -> Result<bool> {
        let rel = self.store.root().relativize(path)?;
        Ok(self.store.inventory()?.contains(&rel))
    }

    fn save(&mut self) -> Result<()> {
        Ok(())
    }
}
