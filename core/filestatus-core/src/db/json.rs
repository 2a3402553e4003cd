//! JSON-backed status database.
//!
//! Records live in `<root>/.dataset/crawl-status-<name>.json` and are read
//! once at construction and written in full by [`FileStatusesDb::save`].
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "saved_at": "2026-10-18T09:12:44Z",
//!   "files": {
//!     "d/file2.txt": { "size": 5, "mtime": { "secs": 1760778764, "nanos": 120 } }
//!   }
//! }
//! ```
//!
//! # Loading
//!
//! - Missing or empty file: empty database
//! - Corrupt JSON or another version: error (the crawler must not silently
//!   forget everything it knew)
//!
//! # Atomic Writes
//!
//! Uses temp file + rename so a crash mid-save never leaves a torn file.
//! Concurrent savers are last-writer-wins.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs_err as fs;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{differs, FileStatusesDb, QueryTracker};
use crate::error::{Result, StatusError};
use crate::paths::{RelPath, TrackedRoot};
use crate::status::FileStatus;
use crate::store::{ContentStore, META_DIR};

/// Schema version of the on-disk file. Only this version is loaded.
pub const DB_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct DbFile {
    version: u32,
    #[serde(default)]
    files: IndexMap<RelPath, FileStatus>,
}

#[derive(Serialize)]
struct DbFileRef<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    files: &'a IndexMap<RelPath, FileStatus>,
}

/// Outcome of a full [`JsonFileStatusesDb::refresh`] pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanReport {
    pub added: Vec<RelPath>,
    pub modified: Vec<RelPath>,
    pub unchanged: usize,
    pub removed: Vec<RelPath>,
    pub pruned: bool,
}

impl ScanReport {
    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty())
    }
}

/// Status database with a persisted cache.
pub struct JsonFileStatusesDb<S> {
    store: S,
    db_path: PathBuf,
    files: IndexMap<RelPath, FileStatus>,
    tracker: QueryTracker,
    dirty: bool,
}

impl<S: ContentStore> JsonFileStatusesDb<S> {
    /// Default database location for `name` under the root's metadata dir.
    pub fn default_path(root: &TrackedRoot, name: &str) -> PathBuf {
        root.path().join(META_DIR).join(db_file_name(name))
    }

    /// Opens the database called `name` at its default location.
    pub fn open(store: S, name: &str) -> Result<Self> {
        let db_path = Self::default_path(store.root(), name);
        Self::load(store, db_path, true)
    }

    /// Opens the database stored at `db_path`.
    pub fn load(store: S, db_path: impl Into<PathBuf>, track_queried: bool) -> Result<Self> {
        let db_path = db_path.into();
        let files = read_files(&db_path)?;
        tracing::debug!(
            path = %db_path.display(),
            entries = files.len(),
            "Loaded status database"
        );
        Ok(JsonFileStatusesDb {
            store,
            db_path,
            files,
            tracker: QueryTracker::new(track_queried),
            dirty: false,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn tracker(&self) -> &QueryTracker {
        &self.tracker
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Cached records in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&RelPath, &FileStatus)> {
        self.files.iter()
    }

    /// Status computed from the store, bypassing the cache.
    pub fn fresh_status(&self, path: &Path) -> Result<FileStatus> {
        let rel = self.store.root().relativize(path)?;
        self.store.status(&rel)
    }

    /// Full crawl pass: recompute every live file and diff against the cache.
    ///
    /// Live files are classified as added, modified or unchanged and stored.
    /// Cached entries with no live file are reported as removed and, with
    /// `prune`, dropped. Filenames set by callers survive the refresh.
    ///
    /// Nothing is applied unless the whole pass succeeds.
    pub fn refresh(&mut self, prune: bool) -> Result<ScanReport> {
        let mut report = ScanReport {
            pruned: prune,
            ..Default::default()
        };
        let mut files = self.files.clone();
        let mut live = Vec::new();

        for rel in self.store.inventory()? {
            let mut fresh = match self.store.status(&rel) {
                Ok(status) => status,
                Err(StatusError::NotFound(path)) => {
                    tracing::warn!(path = %path.display(), "File vanished during scan");
                    continue;
                }
                Err(e) => return Err(e),
            };

            match files.get(&rel) {
                None => {
                    report.added.push(rel.clone());
                    files.insert(rel.clone(), fresh);
                }
                Some(previous) if differs(rel.file_name(), previous.clone(), &fresh) => {
                    if fresh.filename.is_none() {
                        fresh.filename = previous.filename.clone();
                    }
                    report.modified.push(rel.clone());
                    files.insert(rel.clone(), fresh);
                }
                Some(_) => report.unchanged += 1,
            }
            live.push(rel);
        }

        let live_set: HashSet<&RelPath> = live.iter().collect();
        report.removed = files
            .keys()
            .filter(|rel| !live_set.contains(*rel))
            .cloned()
            .collect();

        let mutated = !(report.added.is_empty() && report.modified.is_empty())
            || (prune && !report.removed.is_empty());
        if prune {
            for rel in &report.removed {
                files.shift_remove(rel);
            }
        }

        self.files = files;
        for rel in &live {
            self.tracker.mark(rel);
        }
        if mutated {
            self.dirty = true;
        }

        tracing::info!(
            added = report.added.len(),
            modified = report.modified.len(),
            unchanged = report.unchanged,
            removed = report.removed.len(),
            "Status scan complete"
        );
        Ok(report)
    }
}

/// File name of the database called `name`.
pub(crate) fn db_file_name(name: &str) -> String {
    format!("crawl-status-{name}.json")
}

fn read_files(db_path: &Path) -> Result<IndexMap<RelPath, FileStatus>> {
    let content = match fs::read_to_string(db_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(IndexMap::new()),
        Err(source) => {
            return Err(StatusError::PersistRead {
                path: db_path.to_path_buf(),
                source,
            })
        }
    };

    if content.trim().is_empty() {
        tracing::warn!(path = %db_path.display(), "Empty status database, starting fresh");
        return Ok(IndexMap::new());
    }

    let file: DbFile =
        serde_json::from_str(&content).map_err(|source| StatusError::PersistCorrupt {
            path: db_path.to_path_buf(),
            source,
        })?;

    if file.version != DB_VERSION {
        return Err(StatusError::UnsupportedVersion {
            path: db_path.to_path_buf(),
            found: file.version,
            expected: DB_VERSION,
        });
    }

    Ok(file.files)
}

impl<S: ContentStore> FileStatusesDb for JsonFileStatusesDb<S> {
    fn root(&self) -> &TrackedRoot {
        self.store.root()
    }

    fn get(&mut self, path: &Path) -> Result<FileStatus> {
        let rel = self.store.root().relativize(path)?;
        let status = match self.files.get(&rel) {
            Some(cached) => cached.clone(),
            None => {
                let fresh = self.store.status(&rel)?;
                tracing::debug!(path = %rel, "Status cache miss");
                self.files.insert(rel.clone(), fresh.clone());
                self.dirty = true;
                fresh
            }
        };
        self.tracker.mark(&rel);
        Ok(status)
    }

    fn is_different(&self, path: &Path, status: &FileStatus) -> Result<bool> {
        let rel = self.store.root().relativize(path)?;
        let current = match self.files.get(&rel) {
            Some(cached) => cached.clone(),
            None => self.store.status(&rel)?,
        };
        Ok(differs(rel.file_name(), current, status))
    }

    fn get_obsolete(&self) -> Result<Vec<PathBuf>> {
        let root = self.store.root();
        Ok(self
            .tracker
            .unseen(self.files.keys())?
            .iter()
            .map(|rel| root.absolute(rel))
            .collect())
    }

    fn set(&mut self, path: &Path, status: FileStatus) -> Result<()> {
        let rel = self.store.root().relativize(path)?;
        self.files.insert(rel.clone(), status);
        self.tracker.mark(&rel);
        self.dirty = true;
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        let rel = self.store.root().relativize(path)?;
        if self.files.shift_remove(&rel).is_some() {
            self.dirty = true;
        }
        Ok(())
    }

    fn contains(&self, path: &Path) -> Result<bool> {
        let rel = self.store.root().relativize(path)?;
        Ok(self.files.contains_key(&rel))
    }

    fn save(&mut self) -> Result<()> {
        if !self.dirty && self.db_path.exists() {
            tracing::debug!(path = %self.db_path.display(), "Status database unchanged, skipping save");
            return Ok(());
        }

        let write_err = |source: std::io::Error| StatusError::PersistWrite {
            path: self.db_path.clone(),
            source,
        };

        let parent_dir = self.db_path.parent().ok_or_else(|| {
            write_err(std::io::Error::other("database path has no parent directory"))
        })?;
        fs::create_dir_all(parent_dir).map_err(write_err)?;

        let file = DbFileRef {
            version: DB_VERSION,
            saved_at: Utc::now(),
            files: &self.files,
        };
        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| write_err(std::io::Error::other(e)))?;

        let mut temp_file = NamedTempFile::new_in(parent_dir).map_err(write_err)?;
        temp_file.write_all(content.as_bytes()).map_err(write_err)?;
        temp_file.flush().map_err(write_err)?;
        temp_file.persist(&self.db_path).map_err(|e| write_err(e.error))?;

        tracing::debug!(
            path = %self.db_path.display(),
            entries = self.files.len(),
            "Saved status database"
        );
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WorkTreeStore;
    use tempfile::tempdir;

    fn open_db(root: &Path) -> JsonFileStatusesDb<WorkTreeStore> {
        let store = WorkTreeStore::new(TrackedRoot::new(root).unwrap());
        JsonFileStatusesDb::open(store, "default").unwrap()
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_default_path_lives_in_metadata_dir() {
        let temp = tempdir().unwrap();
        let db = open_db(temp.path());
        assert_eq!(
            db.db_path(),
            temp.path().join(META_DIR).join("crawl-status-default.json")
        );
    }

    #[test]
    fn test_persistence_round_trip_is_field_exact() {
        let temp = tempdir().unwrap();
        write(temp.path(), "a.txt", "aaa");
        {
            let mut db = open_db(temp.path());
            db.get(Path::new("a.txt")).unwrap();
            db.set(
                Path::new("b.bin"),
                FileStatus::new(7)
                    .with_key("SHA256E-s7--beef.bin")
                    .with_filename("orig.bin"),
            )
            .unwrap();
            db.save().unwrap();
        }

        let first = open_db(temp.path());
        let reloaded = open_db(temp.path());
        let a: Vec<_> = first
            .entries()
            .map(|(k, v)| (k.clone(), serde_json::to_value(v).unwrap()))
            .collect();
        let b: Vec<_> = reloaded
            .entries()
            .map(|(k, v)| (k.clone(), serde_json::to_value(v).unwrap()))
            .collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);

        let (_, bin) = reloaded
            .entries()
            .find(|(k, _)| k.as_str() == "b.bin")
            .unwrap();
        assert_eq!(bin.size, 7);
        assert_eq!(bin.key.as_deref(), Some("SHA256E-s7--beef.bin"));
        assert_eq!(bin.filename.as_deref(), Some("orig.bin"));
    }

    #[test]
    fn test_file_format_uses_relative_keys() {
        let temp = tempdir().unwrap();
        write(temp.path(), "d/file2.txt", "load2");
        let mut db = open_db(temp.path());
        db.get(&temp.path().join("d").join("file2.txt")).unwrap();
        db.save().unwrap();

        let raw = std::fs::read_to_string(db.db_path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["files"]["d/file2.txt"]["size"], 5);
        assert!(json["saved_at"].is_string());
    }

    #[test]
    fn test_cache_hit_survives_file_changes() {
        let temp = tempdir().unwrap();
        write(temp.path(), "a.txt", "aaa");
        let mut db = open_db(temp.path());
        assert_eq!(db.get(Path::new("a.txt")).unwrap().size, 3);

        write(temp.path(), "a.txt", "aaaaaa");
        assert_eq!(db.get(Path::new("a.txt")).unwrap().size, 3);
        assert_eq!(db.fresh_status(Path::new("a.txt")).unwrap().size, 6);
    }

    #[test]
    fn test_miss_on_missing_file_is_not_found_and_leaves_state() {
        let temp = tempdir().unwrap();
        let mut db = open_db(temp.path());
        let result = db.get(Path::new("ghost.txt"));
        assert!(matches!(result, Err(StatusError::NotFound(_))));
        assert!(db.is_empty());
        assert!(db.tracker().is_empty());
        assert!(!db.is_dirty());
    }

    #[test]
    fn test_missing_and_empty_files_load_empty() {
        let temp = tempdir().unwrap();
        assert!(open_db(temp.path()).is_empty());

        write(temp.path(), ".dataset/crawl-status-default.json", "  \n");
        assert!(open_db(temp.path()).is_empty());
    }

    #[test]
    fn test_corrupt_file_is_persistence_error() {
        let temp = tempdir().unwrap();
        write(temp.path(), ".dataset/crawl-status-default.json", "{invalid json}");
        let store = WorkTreeStore::new(TrackedRoot::new(temp.path()).unwrap());
        let err = JsonFileStatusesDb::open(store, "default").err().unwrap();
        assert!(matches!(err, StatusError::PersistCorrupt { .. }));
        assert!(err.is_persistence());
    }

    #[test]
    fn test_foreign_version_is_rejected() {
        let temp = tempdir().unwrap();
        write(
            temp.path(),
            ".dataset/crawl-status-default.json",
            r#"{"version":2,"files":{}}"#,
        );
        let store = WorkTreeStore::new(TrackedRoot::new(temp.path()).unwrap());
        let err = JsonFileStatusesDb::open(store, "default").err().unwrap();
        assert!(matches!(
            err,
            StatusError::UnsupportedVersion {
                found: 2,
                expected: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_unreadable_database_is_read_error() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("db-as-dir.json")).unwrap();
        let store = WorkTreeStore::new(TrackedRoot::new(temp.path()).unwrap());
        let err = JsonFileStatusesDb::load(store, temp.path().join("db-as-dir.json"), true)
            .err()
            .unwrap();
        assert!(matches!(err, StatusError::PersistRead { .. }));
    }

    #[test]
    fn test_remove_is_persisted() {
        let temp = tempdir().unwrap();
        write(temp.path(), "a.txt", "a");
        write(temp.path(), "b.txt", "b");
        let mut db = open_db(temp.path());
        db.get(Path::new("a.txt")).unwrap();
        db.get(Path::new("b.txt")).unwrap();
        db.save().unwrap();

        let mut db = open_db(temp.path());
        db.remove(Path::new("a.txt")).unwrap();
        db.save().unwrap();

        let db = open_db(temp.path());
        assert!(!db.contains(Path::new("a.txt")).unwrap());
        assert!(db.contains(Path::new("b.txt")).unwrap());
    }

    #[test]
    fn test_clean_save_does_not_rewrite() {
        let temp = tempdir().unwrap();
        write(temp.path(), "a.txt", "a");
        let mut db = open_db(temp.path());
        db.get(Path::new("a.txt")).unwrap();
        db.save().unwrap();
        let first = std::fs::read_to_string(db.db_path()).unwrap();

        let mut db = open_db(temp.path());
        db.get(Path::new("a.txt")).unwrap();
        assert!(!db.is_dirty());
        db.save().unwrap();
        assert_eq!(std::fs::read_to_string(db.db_path()).unwrap(), first);
    }

    /// Working tree that refuses to stat one path.
    struct BrokenStore {
        inner: WorkTreeStore,
        broken: &'static str,
    }

    impl ContentStore for BrokenStore {
        fn root(&self) -> &TrackedRoot {
            self.inner.root()
        }

        fn status(&self, path: &RelPath) -> Result<FileStatus> {
            if path.as_str() == self.broken {
                return Err(StatusError::Io {
                    context: format!("reading {path}"),
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                });
            }
            self.inner.status(path)
        }

        fn inventory(&self) -> Result<Vec<RelPath>> {
            self.inner.inventory()
        }
    }

    #[test]
    fn test_failed_refresh_leaves_state_untouched() {
        let temp = tempdir().unwrap();
        write(temp.path(), "a.txt", "a");
        write(temp.path(), "b.txt", "b");
        let store = BrokenStore {
            inner: WorkTreeStore::new(TrackedRoot::new(temp.path()).unwrap()),
            broken: "b.txt",
        };
        let mut db = JsonFileStatusesDb::open(store, "default").unwrap();

        let err = db.refresh(true).err().unwrap();
        assert!(matches!(err, StatusError::Io { .. }));
        assert!(db.is_empty());
        assert!(db.tracker().is_empty());
        assert!(!db.is_dirty());
    }

    #[test]
    fn test_refresh_without_changes_stays_clean() {
        let temp = tempdir().unwrap();
        write(temp.path(), "a.txt", "a");
        let mut db = open_db(temp.path());
        assert!(db.refresh(false).unwrap().has_changes());
        db.save().unwrap();

        let mut db = open_db(temp.path());
        let report = db.refresh(true).unwrap();
        assert!(!report.has_changes());
        assert_eq!(report.unchanged, 1);
        assert!(!db.is_dirty());
        assert!(db.tracker().is_seen(&RelPath::new("a.txt").unwrap()));
    }

    #[test]
    fn test_refresh_classifies_and_prunes() {
        let temp = tempdir().unwrap();
        write(temp.path(), "keep.txt", "same");
        write(temp.path(), "grow.txt", "1");
        write(temp.path(), "gone.txt", "bye");
        let mut db = open_db(temp.path());
        db.refresh(false).unwrap();
        db.set(
            Path::new("keep.txt"),
            db.fresh_status(Path::new("keep.txt"))
                .unwrap()
                .with_filename("keep-original.txt"),
        )
        .unwrap();
        db.save().unwrap();

        write(temp.path(), "grow.txt", "12");
        write(temp.path(), "new.txt", "n");
        std::fs::remove_file(temp.path().join("gone.txt")).unwrap();

        let mut db = open_db(temp.path());
        let report = db.refresh(true).unwrap();
        let names = |paths: &[RelPath]| paths.iter().map(|p| p.to_string()).collect::<Vec<_>>();
        assert_eq!(names(&report.added), vec!["new.txt"]);
        assert_eq!(names(&report.modified), vec!["grow.txt"]);
        assert_eq!(names(&report.removed), vec!["gone.txt"]);
        assert_eq!(report.unchanged, 1);
        assert!(report.has_changes());

        assert!(!db.contains(Path::new("gone.txt")).unwrap());
        assert!(db.get_obsolete().unwrap().is_empty());
        let kept = db.get(Path::new("keep.txt")).unwrap();
        assert_eq!(kept.filename.as_deref(), Some("keep-original.txt"));
    }
}
