//! Per-dataset configuration.
//!
//! Read from `<root>/.dataset/filestatus.toml` when present:
//!
//! ```toml
//! db_name = "default"
//! backend = "json"       # or "physical"
//! store = "worktree"     # or "annex"
//! track_queried = true
//! ```
//!
//! `FILESTATUS_DB_NAME`, `FILESTATUS_BACKEND` and `FILESTATUS_STORE` override
//! the file. Command-line flags are applied by the caller on top of both.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::{
    db_file_name, Backend, FileStatusesDb, JsonFileStatusesDb, PhysicalFileStatusesDb,
};
use crate::error::{Result, StatusError};
use crate::paths::TrackedRoot;
use crate::store::{StoreKind, META_DIR};

pub const CONFIG_FILE_NAME: &str = "filestatus.toml";
pub const DEFAULT_DB_NAME: &str = "default";

pub const ENV_DB_NAME: &str = "FILESTATUS_DB_NAME";
pub const ENV_BACKEND: &str = "FILESTATUS_BACKEND";
pub const ENV_STORE: &str = "FILESTATUS_STORE";

/// A database name must stay a single file name inside the metadata dir.
pub fn validate_db_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        "database name is empty"
    } else if name.contains(['/', '\\', '\0']) || name == "." || name == ".." {
        "database name must not contain path separators"
    } else {
        return Ok(());
    };
    Err(StatusError::InvalidPath {
        path: name.to_string(),
        reason: reason.to_string(),
    })
}

fn default_db_name() -> String {
    DEFAULT_DB_NAME.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusConfig {
    #[serde(default = "default_db_name")]
    pub db_name: String,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub store: StoreKind,
    #[serde(default = "default_true")]
    pub track_queried: bool,
}

impl Default for StatusConfig {
    fn default() -> Self {
        StatusConfig {
            db_name: default_db_name(),
            backend: Backend::default(),
            store: StoreKind::default(),
            track_queried: true,
        }
    }
}

impl StatusConfig {
    pub fn config_path(root: &Path) -> PathBuf {
        root.join(META_DIR).join(CONFIG_FILE_NAME)
    }

    /// File config for `root` with environment overrides applied.
    pub fn load(root: &Path) -> Result<Self> {
        let mut config = Self::load_file(&Self::config_path(root))?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parses `path`, returning defaults if it does not exist.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs_err::read_to_string(path).map_err(|source| StatusError::Io {
            context: format!("reading {}", path.display()),
            source,
        })?;
        let config: StatusConfig =
            toml::from_str(&content).map_err(|err| StatusError::ConfigMalformed {
                path: path.to_path_buf(),
                details: err.to_string(),
            })?;

        validate_db_name(&config.db_name).map_err(|err| StatusError::ConfigMalformed {
            path: path.to_path_buf(),
            details: err.to_string(),
        })?;
        Ok(config)
    }

    /// Applies overrides from `lookup`. Unparseable values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup(ENV_DB_NAME) {
            let name = name.trim();
            match validate_db_name(name) {
                Ok(()) => self.db_name = name.to_string(),
                Err(e) => tracing::warn!(error = %e, "Ignoring {}", ENV_DB_NAME),
            }
        }
        if let Some(raw) = lookup(ENV_BACKEND) {
            match Backend::parse(&raw) {
                Some(backend) => self.backend = backend,
                None => tracing::warn!(value = %raw, "Ignoring unknown {}", ENV_BACKEND),
            }
        }
        if let Some(raw) = lookup(ENV_STORE) {
            match StoreKind::parse(&raw) {
                Some(store) => self.store = store,
                None => tracing::warn!(value = %raw, "Ignoring unknown {}", ENV_STORE),
            }
        }
    }

    /// Location of the JSON database this config selects.
    pub fn db_file(&self, root: &Path) -> PathBuf {
        root.join(META_DIR).join(db_file_name(&self.db_name))
    }

    /// Opens the configured store and database variant at `root`.
    pub fn open(&self, root: TrackedRoot) -> Result<Box<dyn FileStatusesDb>> {
        validate_db_name(&self.db_name)?;
        let db_file = self.db_file(root.path());
        let store = self.store.open(root)?;
        tracing::debug!(
            backend = ?self.backend,
            store = ?self.store,
            db_name = %self.db_name,
            "Opening status database"
        );
        Ok(match self.backend {
            Backend::Physical => Box::new(PhysicalFileStatusesDb::with_tracking(
                store,
                self.track_queried,
            )),
            Backend::Json => Box::new(JsonFileStatusesDb::load(
                store,
                db_file,
                self.track_queried,
            )?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn write_config(root: &Path, content: &str) {
        let path = StatusConfig::config_path(root);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = tempdir().unwrap();
        let config = StatusConfig::load_file(&StatusConfig::config_path(temp.path())).unwrap();
        assert_eq!(config, StatusConfig::default());
        assert_eq!(config.db_name, "default");
        assert_eq!(config.backend, Backend::Json);
        assert_eq!(config.store, StoreKind::Worktree);
        assert!(config.track_queried);
    }

    #[test]
    fn test_parses_all_fields() {
        let temp = tempdir().unwrap();
        write_config(
            temp.path(),
            r#"
db_name = "nightly"
backend = "physical"
store = "annex"
track_queried = false
"#,
        );
        let config = StatusConfig::load_file(&StatusConfig::config_path(temp.path())).unwrap();
        assert_eq!(config.db_name, "nightly");
        assert_eq!(config.backend, Backend::Physical);
        assert_eq!(config.store, StoreKind::Annex);
        assert!(!config.track_queried);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = tempdir().unwrap();
        write_config(temp.path(), "db_name = \"weekly\"\n");
        let config = StatusConfig::load_file(&StatusConfig::config_path(temp.path())).unwrap();
        assert_eq!(config.db_name, "weekly");
        assert_eq!(config.backend, Backend::Json);
        assert!(config.track_queried);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp = tempdir().unwrap();
        write_config(temp.path(), "backend = \"sqlite\"\n");
        let err = StatusConfig::load_file(&StatusConfig::config_path(temp.path()))
            .err()
            .unwrap();
        assert!(matches!(err, StatusError::ConfigMalformed { .. }));

        write_config(temp.path(), "db_name = \"../escape\"\n");
        let err = StatusConfig::load_file(&StatusConfig::config_path(temp.path()))
            .err()
            .unwrap();
        assert!(matches!(err, StatusError::ConfigMalformed { .. }));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            (ENV_DB_NAME, "from-env"),
            (ENV_BACKEND, "physical"),
            (ENV_STORE, "bogus"),
        ]
        .into_iter()
        .collect();

        let mut config = StatusConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.db_name, "from-env");
        assert_eq!(config.backend, Backend::Physical);
        assert_eq!(config.store, StoreKind::Worktree);
    }

    #[test]
    fn test_env_db_name_cannot_escape_metadata_dir() {
        let mut config = StatusConfig::default();
        config.apply_env(|key| (key == ENV_DB_NAME).then(|| "../../../tmp/evil".to_string()));
        assert_eq!(config.db_name, DEFAULT_DB_NAME);
        assert_eq!(
            config.db_file(Path::new("/data/ds")),
            Path::new("/data/ds/.dataset/crawl-status-default.json")
        );

        config.apply_env(|key| (key == ENV_DB_NAME).then(|| "  ".to_string()));
        assert_eq!(config.db_name, DEFAULT_DB_NAME);
    }

    #[test]
    fn test_validate_db_name() {
        assert!(validate_db_name("nightly-2").is_ok());
        assert!(validate_db_name("").is_err());
        assert!(validate_db_name("a/b").is_err());
        assert!(validate_db_name("a\\b").is_err());
        assert!(validate_db_name("..").is_err());
    }

    #[test]
    fn test_open_rejects_escaping_name() {
        let temp = tempdir().unwrap();
        let config = StatusConfig {
            db_name: "../outside".to_string(),
            ..Default::default()
        };
        let err = config
            .open(TrackedRoot::new(temp.path()).unwrap())
            .err()
            .unwrap();
        assert!(matches!(err, StatusError::InvalidPath { .. }));
    }

    #[test]
    fn test_db_file_follows_name() {
        let config = StatusConfig {
            db_name: "nightly".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.db_file(Path::new("/data/ds")),
            Path::new("/data/ds/.dataset/crawl-status-nightly.json")
        );
    }

    #[test]
    fn test_open_json_backend_uses_db_file() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), "aaa").unwrap();
        let config = StatusConfig::default();

        let mut db = config.open(TrackedRoot::new(temp.path()).unwrap()).unwrap();
        db.get(Path::new("a.txt")).unwrap();
        db.save().unwrap();
        assert!(config.db_file(temp.path()).exists());
    }

    #[test]
    fn test_open_respects_track_queried() {
        let temp = tempdir().unwrap();
        let config = StatusConfig {
            backend: Backend::Physical,
            track_queried: false,
            ..Default::default()
        };
        let db = config.open(TrackedRoot::new(temp.path()).unwrap()).unwrap();
        assert!(matches!(
            db.get_obsolete(),
            Err(StatusError::QueryTrackingDisabled)
        ));
    }
}
