//! File status records used for change detection.
//!
//! A [`FileStatus`] is a fingerprint of everything that identifies a file's
//! content without reading it: size, modification time, and (for annexed
//! files) the content key.
//!
//! # Comparison Rule
//!
//! Records are compared leniently: `size` must always match, but an optional
//! field only participates when it is populated on **both** sides. A record
//! computed by a store that cannot supply a key still compares equal to one
//! that carries it, as long as everything both sides know agrees.

use std::fs::Metadata;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Modification time of a file.
///
/// `nanos == None` marks a whole-second source (some filesystems and older
/// databases only keep seconds).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Mtime {
    pub secs: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nanos: Option<u32>,
}

impl Mtime {
    pub fn from_secs(secs: i64) -> Self {
        Mtime { secs, nanos: None }
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        let datetime: DateTime<Utc> = time.into();
        Mtime {
            secs: datetime.timestamp(),
            nanos: Some(datetime.timestamp_subsec_nanos()),
        }
    }

    /// Reads the modification time from metadata, if the platform has one.
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        metadata.modified().ok().map(Mtime::from_system_time)
    }

    /// Seconds must agree; sub-second parts only when both sides have them.
    pub fn matches(&self, other: &Mtime) -> bool {
        if self.secs != other.secs {
            return false;
        }
        match (self.nanos, other.nanos) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.secs, self.nanos.unwrap_or(0))
    }
}

impl PartialEq for Mtime {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

/// Identity-relevant attributes of a tracked file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileStatus {
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<Mtime>,
    /// Content-identity token (a git-annex key), when the store knows one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Secondary discriminator, e.g. the name a download was stored under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl FileStatus {
    pub fn new(size: u64) -> Self {
        FileStatus {
            size,
            ..Default::default()
        }
    }

    pub fn with_mtime(mut self, mtime: Mtime) -> Self {
        self.mtime = Some(mtime);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Size and mtime straight from filesystem metadata.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        FileStatus {
            size: metadata.len(),
            mtime: Mtime::from_metadata(metadata),
            key: None,
            filename: None,
        }
    }

    /// Lenient comparison: fields unset on either side are skipped.
    pub fn matches(&self, other: &FileStatus) -> bool {
        self.size == other.size
            && both_match(&self.mtime, &other.mtime, Mtime::matches)
            && both_match(&self.key, &other.key, |a, b| a == b)
            && both_match(&self.filename, &other.filename, |a, b| a == b)
    }
}

fn both_match<T>(a: &Option<T>, b: &Option<T>, eq: impl Fn(&T, &T) -> bool) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => eq(a, b),
        _ => true,
    }
}

impl PartialEq for FileStatus {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}
