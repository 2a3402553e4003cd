//! git-annex backed store.
//!
//! Talks to git through `git -C <root> ...` and never reads `.git` directly.
//!
//! ## Attribute Sources
//!
//! ```text
//! annexed file   → key from `git annex lookupkey`; size and mtime from the
//!                  content when present, else the key's -s field and the link
//!                  (or pointer file)
//! git/untracked  → working-tree size and mtime, key = None
//! missing        → NotFound
//! ```

use std::fs::Metadata;
use std::path::Path;
use std::process::{Command, Output};

use fs_err as fs;

use super::worktree::working_tree_status;
use super::{ContentStore, META_DIR};
use crate::error::{Result, StatusError};
use crate::paths::{RelPath, TrackedRoot};
use crate::patterns::annex_key_size;
use crate::status::{FileStatus, Mtime};

/// Store backed by a git repository with the git-annex extension.
#[derive(Debug, Clone)]
pub struct AnnexStore {
    root: TrackedRoot,
    git: String,
}

impl AnnexStore {
    /// Opens the repository at `root`. Fails if `root` has no `.git`.
    pub fn new(root: TrackedRoot) -> Result<Self> {
        if !root.path().join(".git").exists() {
            return Err(StatusError::InvalidPath {
                path: root.path().display().to_string(),
                reason: "not a git repository".to_string(),
            });
        }
        Ok(AnnexStore {
            root,
            git: "git".to_string(),
        })
    }

    /// Uses a different git executable (tests, non-PATH installs).
    pub fn with_git_binary(mut self, git: impl Into<String>) -> Self {
        self.git = git.into();
        self
    }

    /// The annex key for `path`, or `None` if the file is not annexed.
    pub fn lookup_key(&self, path: &RelPath) -> Result<Option<String>> {
        let output = self.run(&["annex", "lookupkey", "--", path.as_str()])?;
        if output.status.success() {
            let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Ok(Some(key).filter(|key| !key.is_empty()));
        }

        // Not annexed: exit 1 and nothing on stderr
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if output.status.code() == Some(1) && stderr.is_empty() {
            return Ok(None);
        }

        let details = if stderr.contains("is not a git command") {
            "git-annex is not installed".to_string()
        } else if stderr.is_empty() {
            format!("exited with {}", output.status)
        } else {
            stderr
        };
        Err(StatusError::CommandFailed {
            command: "git annex lookupkey".to_string(),
            details,
        })
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new(&self.git)
            .arg("-C")
            .arg(self.root.path())
            .args(args)
            .output()
            .map_err(|e| StatusError::CommandFailed {
                command: format!("{} {}", self.git, args.join(" ")),
                details: e.to_string(),
            })
    }

    fn run_checked(&self, args: &[&str]) -> Result<Vec<u8>> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(StatusError::CommandFailed {
                command: format!("{} {}", self.git, args.join(" ")),
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

impl ContentStore for AnnexStore {
    fn root(&self) -> &TrackedRoot {
        &self.root
    }

    fn status(&self, path: &RelPath) -> Result<FileStatus> {
        let full = self.root.absolute(path);
        let link_metadata = match fs::symlink_metadata(&full) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StatusError::NotFound(full));
            }
            Err(source) => {
                return Err(StatusError::Io {
                    context: format!("reading metadata of {}", full.display()),
                    source,
                });
            }
        };

        let Some(key) = self.lookup_key(path)? else {
            tracing::debug!(path = %path, "Not annexed, using working tree attributes");
            return working_tree_status(&self.root, path);
        };

        let content = present_content(&full, &link_metadata);
        let size = content
            .as_ref()
            .map(|m| m.len())
            .or_else(|| annex_key_size(&key))
            .unwrap_or_else(|| link_metadata.len());
        let mtime = Mtime::from_metadata(content.as_ref().unwrap_or(&link_metadata));

        Ok(FileStatus {
            size,
            mtime,
            key: Some(key),
            filename: None,
        })
    }

    fn inventory(&self) -> Result<Vec<RelPath>> {
        let stdout = self.run_checked(&["ls-files", "-z"])?;
        let mut files = Vec::new();
        for raw in stdout.split(|b| *b == 0).filter(|raw| !raw.is_empty()) {
            let Ok(name) = std::str::from_utf8(raw) else {
                tracing::warn!("Skipping non-UTF-8 path from git ls-files");
                continue;
            };
            match RelPath::new(name) {
                Ok(rel) if rel.is_within(META_DIR) => {}
                Ok(rel) => files.push(rel),
                Err(e) => tracing::warn!(path = %name, error = %e, "Skipping unexpected path"),
            }
        }
        Ok(files)
    }
}

const POINTER_PREFIX: &[u8] = b"/annex/objects/";
const POINTER_MAX_LEN: u64 = 32 * 1024;

/// Metadata of the file's content if it is in the working tree.
///
/// A locked file is a symlink that dangles while the content is absent; an
/// unlocked file without content is a small pointer file.
fn present_content(full: &Path, link_metadata: &Metadata) -> Option<Metadata> {
    if link_metadata.file_type().is_symlink() {
        return fs::metadata(full).ok();
    }
    if link_metadata.len() <= POINTER_MAX_LEN {
        let head = fs::read(full).ok()?;
        if head.starts_with(POINTER_PREFIX) {
            return None;
        }
    }
    Some(link_metadata.clone())
}
