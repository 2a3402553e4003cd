//! # filestatus-core
//!
//! Change detection for files in a dataset: a crawler asks whether a file
//! differs from what it recorded last time, and after a pass asks which
//! known files it never touched.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. Each query is one blocking store call.
//! - **Not thread-safe**: Mutating operations take `&mut self`; callers that
//!   share a database wrap it themselves.
//! - **One key per file**: Absolute, root-relative and `./` paths all resolve
//!   to a single [`RelPath`] through [`TrackedRoot`].
//! - **Errors propagate**: A corrupt database is an error, never a silent
//!   reset, and a failed call leaves state unchanged.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use filestatus_core::{FileStatusesDb, JsonFileStatusesDb, TrackedRoot, WorkTreeStore};
//!
//! let store = WorkTreeStore::new(TrackedRoot::new("/data/ds")?);
//! let mut db = JsonFileStatusesDb::open(store, "default")?;
//! let status = db.get("d/file2.txt".as_ref())?;
//! let deleted = db.get_obsolete()?;
//! db.save()?;
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod paths;
pub mod patterns;
pub mod status;
pub mod store;

pub use config::{validate_db_name, StatusConfig};
pub use db::{
    Backend, FileStatusesDb, JsonFileStatusesDb, PhysicalFileStatusesDb, QueryTracker,
    ScanReport, DB_VERSION,
};
pub use error::{Result, StatusError};
pub use paths::{RelPath, TrackedRoot};
pub use status::{FileStatus, Mtime};
pub use store::{AnnexStore, ContentStore, StoreKind, WorkTreeStore, META_DIR};
