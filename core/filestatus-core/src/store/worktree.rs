//! Plain working-tree store: attributes from filesystem metadata.

use std::path::Path;

use fs_err as fs;
use walkdir::{DirEntry, WalkDir};

use super::{ContentStore, META_DIR};
use crate::error::{Result, StatusError};
use crate::paths::{RelPath, TrackedRoot};
use crate::status::FileStatus;

/// Store over an ordinary directory tree. Never knows content keys.
#[derive(Debug, Clone)]
pub struct WorkTreeStore {
    root: TrackedRoot,
}

impl WorkTreeStore {
    pub fn new(root: TrackedRoot) -> Self {
        WorkTreeStore { root }
    }
}

impl ContentStore for WorkTreeStore {
    fn root(&self) -> &TrackedRoot {
        &self.root
    }

    fn status(&self, path: &RelPath) -> Result<FileStatus> {
        working_tree_status(&self.root, path)
    }

    fn inventory(&self) -> Result<Vec<RelPath>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(self.root.path())
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_skipped(entry));

        for entry in walker {
            let entry = entry.map_err(|err| StatusError::Io {
                context: format!("walking {}", self.root.path().display()),
                source: err.into(),
            })?;
            if entry.file_type().is_dir() || is_dir_symlink(&entry) {
                continue;
            }
            match rel_from_walk(self.root.path(), entry.path()) {
                Some(rel) => files.push(rel),
                None => tracing::warn!(
                    path = %entry.path().display(),
                    "Skipping file with non-UTF-8 or unexpected path"
                ),
            }
        }

        Ok(files)
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    let name = entry.file_name();
    (entry.depth() > 0 && name == ".git") || (entry.depth() == 1 && name == META_DIR)
}

/// Links are not followed by the walk, so a link to a directory shows up
/// as a non-dir entry.
fn is_dir_symlink(entry: &DirEntry) -> bool {
    entry.path_is_symlink()
        && fs::metadata(entry.path()).is_ok_and(|metadata| metadata.is_dir())
}

fn rel_from_walk(root: &Path, path: &Path) -> Option<RelPath> {
    let rest = path.strip_prefix(root).ok()?;
    let segments: Option<Vec<&str>> = rest.iter().map(|segment| segment.to_str()).collect();
    RelPath::new(segments?.join("/")).ok()
}

/// Size and mtime of a file in the working tree.
///
/// Symlinks are followed to their content; a dangling link reports its own
/// attributes.
pub(crate) fn working_tree_status(root: &TrackedRoot, rel: &RelPath) -> Result<FileStatus> {
    let full = root.absolute(rel);
    let link_metadata = fs::symlink_metadata(&full).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            StatusError::NotFound(full.clone())
        } else {
            StatusError::Io {
                context: format!("reading metadata of {}", full.display()),
                source,
            }
        }
    })?;

    let metadata = if link_metadata.file_type().is_symlink() {
        fs::metadata(&full).unwrap_or(link_metadata)
    } else {
        link_metadata
    };

    if metadata.is_dir() {
        return Err(StatusError::InvalidPath {
            path: rel.to_string(),
            reason: "is a directory".to_string(),
        });
    }

    Ok(FileStatus::from_metadata(&metadata))
}
