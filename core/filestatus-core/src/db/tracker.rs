//! Per-session bookkeeping of queried paths.

use indexmap::IndexSet;

use crate::error::{Result, StatusError};
use crate::paths::RelPath;

/// Paths queried in the current session. Grows monotonically.
#[derive(Debug, Clone)]
pub struct QueryTracker {
    enabled: bool,
    seen: IndexSet<RelPath>,
}

impl QueryTracker {
    pub fn new(enabled: bool) -> Self {
        QueryTracker {
            enabled,
            seen: IndexSet::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records a query. Repeated marks are no-ops.
    pub fn mark(&mut self, path: &RelPath) {
        if self.enabled && !self.seen.contains(path) {
            self.seen.insert(path.clone());
        }
    }

    pub fn is_seen(&self, path: &RelPath) -> bool {
        self.seen.contains(path)
    }

    pub fn seen(&self) -> impl Iterator<Item = &RelPath> {
        self.seen.iter()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Known paths never queried, in the order `known` yields them.
    pub fn unseen<'a>(&self, known: impl IntoIterator<Item = &'a RelPath>) -> Result<Vec<RelPath>> {
        if !self.enabled {
            return Err(StatusError::QueryTrackingDisabled);
        }
        Ok(known
            .into_iter()
            .filter(|path| !self.seen.contains(*path))
            .cloned()
            .collect())
    }
}
