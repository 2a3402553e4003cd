//! Error types for filestatus-core operations.

use std::path::PathBuf;

/// All errors that can occur while tracking file statuses.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    // ─────────────────────────────────────────────────────────────────────
    // Path Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("File not found in tracked root: {0}")]
    NotFound(PathBuf),

    #[error("Path {path} resolves outside tracked root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Invalid path: {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    // ─────────────────────────────────────────────────────────────────────
    // Persistence Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Failed to read status database {path}: {source}")]
    PersistRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write status database {path}: {source}")]
    PersistWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Status database is corrupt: {path}: {source}")]
    PersistCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported status database version {found} in {path} (expected {expected})")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Backing Store Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution failed: {command}: {details}")]
    CommandFailed { command: String, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Configuration / Session Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Query tracking is disabled for this database instance")]
    QueryTrackingDisabled,
}

impl StatusError {
    /// True for failures of the persisted store (read, write, parse, version).
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            StatusError::PersistRead { .. }
                | StatusError::PersistWrite { .. }
                | StatusError::PersistCorrupt { .. }
                | StatusError::UnsupportedVersion { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StatusError::NotFound(_))
    }
}

/// Convenience type alias for Results using StatusError.
pub type Result<T> = std::result::Result<T, StatusError>;

impl From<StatusError> for String {
    fn from(err: StatusError) -> String {
        err.to_string()
    }
}
