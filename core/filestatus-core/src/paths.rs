//! Canonical path keys for a tracked root.
//!
//! Every database operation accepts paths in three forms:
//!
//! 1. **Absolute**: `/data/ds/d/file2.txt`
//! 2. **Root-relative**: `d/file2.txt`
//! 3. **Current-directory relative**: `./file2.txt` (from `/data/ds/d`)
//!
//! All of them must land on the same map entry, so [`TrackedRoot`] is the only
//! producer of [`RelPath`] keys and the rest of the crate never touches raw
//! path strings.
//!
//! # Symlinked Roots
//!
//! Temporary directories are often reached through a symlink (macOS
//! `/var -> /private/var`). The root keeps both the path as given and its
//! canonical form, and absolute inputs are matched against either.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatusError};

/// A validated, `/`-separated path relative to a tracked root.
///
/// Never empty, never absolute, and free of `.`, `..` and empty segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelPath(String);

impl RelPath {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        validate_rel(&raw)?;
        Ok(RelPath(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last segment of the path.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// True if this path is `dir` or lies underneath it.
    pub fn is_within(&self, dir: &str) -> bool {
        self.0 == dir
            || self
                .0
                .strip_prefix(dir)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Platform path built from the segments.
    pub fn to_path_buf(&self) -> PathBuf {
        self.0.split('/').collect()
    }
}

fn validate_rel(raw: &str) -> Result<()> {
    let invalid = |reason: &str| StatusError::InvalidPath {
        path: raw.to_string(),
        reason: reason.to_string(),
    };

    if raw.is_empty() {
        return Err(invalid("empty path"));
    }
    if raw.starts_with('/') {
        return Err(invalid("must be relative to the tracked root"));
    }
    for segment in raw.split('/') {
        match segment {
            "" => return Err(invalid("empty path segment")),
            "." | ".." => return Err(invalid("dot segments are not allowed")),
            _ => {}
        }
    }
    Ok(())
}

impl TryFrom<String> for RelPath {
    type Error = StatusError;

    fn try_from(value: String) -> Result<Self> {
        RelPath::new(value)
    }
}

impl From<RelPath> for String {
    fn from(path: RelPath) -> String {
        path.0
    }
}

impl AsRef<str> for RelPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The directory a status database is scoped to.
#[derive(Debug, Clone)]
pub struct TrackedRoot {
    /// Absolute path as supplied by the caller (lexically normalized).
    path: PathBuf,
    /// Symlink-free form of `path`.
    canonical: PathBuf,
}

impl TrackedRoot {
    /// Opens a tracked root. The directory must exist.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let given = path.as_ref();
        let absolute = std::path::absolute(given).map_err(|source| StatusError::Io {
            context: format!("resolving {}", given.display()),
            source,
        })?;
        let path = lexical_normalize(&absolute);

        let canonical = fs::canonicalize(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StatusError::NotFound(path.clone())
            } else {
                StatusError::Io {
                    context: format!("canonicalizing {}", path.display()),
                    source,
                }
            }
        })?;

        if !canonical.is_dir() {
            return Err(StatusError::InvalidPath {
                path: path.display().to_string(),
                reason: "tracked root is not a directory".to_string(),
            });
        }

        Ok(TrackedRoot { path, canonical })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn canonical(&self) -> &Path {
        &self.canonical
    }

    /// Full path of `rel` under the root as it was given.
    pub fn absolute(&self, rel: &RelPath) -> PathBuf {
        self.path.join(rel.to_path_buf())
    }

    /// Canonicalizes `input`, resolving `./` prefixes against the process cwd.
    pub fn relativize(&self, input: impl AsRef<Path>) -> Result<RelPath> {
        let input = input.as_ref();
        let cwd = if starts_with_cur_dir(input) {
            Some(
                std::env::current_dir().map_err(|source| StatusError::Io {
                    context: "reading current directory".to_string(),
                    source,
                })?,
            )
        } else {
            None
        };
        self.resolve(input, cwd.as_deref())
    }

    /// Like [`TrackedRoot::relativize`] with an explicit working directory.
    pub fn relativize_from(&self, input: impl AsRef<Path>, cwd: &Path) -> Result<RelPath> {
        self.resolve(input.as_ref(), Some(cwd))
    }

    fn resolve(&self, input: &Path, cwd: Option<&Path>) -> Result<RelPath> {
        if input.as_os_str().is_empty() {
            return Err(StatusError::InvalidPath {
                path: String::new(),
                reason: "empty path".to_string(),
            });
        }

        if input.is_absolute() {
            return self.resolve_absolute(input);
        }

        if starts_with_cur_dir(input) {
            if let Some(cwd) = cwd.filter(|cwd| self.contains_dir(cwd)) {
                return self.resolve_absolute(&cwd.join(input));
            }
            // cwd outside the root: `./x` can only mean the root's `x`
            tracing::debug!(
                path = %input.display(),
                root = %self.path.display(),
                "Resolving ./ path against tracked root"
            );
        }

        self.resolve_components(input, input)
    }

    fn resolve_absolute(&self, input: &Path) -> Result<RelPath> {
        if let Some(rest) = self.strip_root(input) {
            return self.resolve_components(&rest, input);
        }

        // Symlinked prefix: canonicalize the parent and retry.
        let normalized = lexical_normalize(input);
        if let (Some(parent), Some(name)) = (normalized.parent(), normalized.file_name()) {
            if let Ok(parent) = fs::canonicalize(parent) {
                let resolved = parent.join(name);
                if let Ok(rest) = resolved.strip_prefix(&self.canonical) {
                    return self.resolve_components(rest, input);
                }
            }
        }

        Err(self.outside(input))
    }

    fn resolve_components(&self, rest: &Path, original: &Path) -> Result<RelPath> {
        let mut segments: Vec<&str> = Vec::new();
        for component in rest.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if segments.pop().is_none() {
                        return Err(self.outside(original));
                    }
                }
                Component::Normal(segment) => {
                    let segment = segment.to_str().ok_or_else(|| StatusError::InvalidPath {
                        path: original.display().to_string(),
                        reason: "path is not valid UTF-8".to_string(),
                    })?;
                    segments.push(segment);
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(self.outside(original));
                }
            }
        }

        if segments.is_empty() {
            return Err(StatusError::InvalidPath {
                path: original.display().to_string(),
                reason: "path names the tracked root itself".to_string(),
            });
        }

        RelPath::new(segments.join("/"))
    }

    fn strip_root(&self, input: &Path) -> Option<PathBuf> {
        let normalized = lexical_normalize(input);
        normalized
            .strip_prefix(&self.path)
            .or_else(|_| normalized.strip_prefix(&self.canonical))
            .ok()
            .map(Path::to_path_buf)
    }

    fn contains_dir(&self, dir: &Path) -> bool {
        if self.strip_root(dir).is_some() {
            return true;
        }
        fs::canonicalize(dir)
            .ok()
            .is_some_and(|dir| dir.starts_with(&self.canonical))
    }

    fn outside(&self, input: &Path) -> StatusError {
        StatusError::OutsideRoot {
            path: input.to_path_buf(),
            root: self.path.clone(),
        }
    }
}

fn starts_with_cur_dir(path: &Path) -> bool {
    matches!(path.components().next(), Some(Component::CurDir))
}

/// Removes `.` and resolves `..` without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
