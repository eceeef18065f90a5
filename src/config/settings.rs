//! Application settings loaded from `<data_dir>/notme.toml`.
//!
//! Every field has a default, so the file is optional:
//!
//! ```toml
//! store_file = "notifications.db"
//! key_alias = "notme_db_encryption_key"
//! key_backend = "software"   # or "keyring"
//! log_level = "info"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, StoreError};

/// Which secure key facility holds the master key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyBackend {
    /// Key file under `<data_dir>/keys/`.
    Software,
    /// OS credential store (needs the `keyring-store` feature).
    Keyring,
}

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// File name of the notification store inside the data directory.
    #[serde(default = "default_store_file")]
    pub store_file: String,

    /// Alias of the master key inside the key facility.
    #[serde(default = "default_key_alias")]
    pub key_alias: String,

    /// Key facility backend.
    #[serde(default = "default_key_backend")]
    pub key_backend: KeyBackend,

    /// Default log level when `NOTME_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Defaults ─────────────────────────────────────────────────────────

fn default_store_file() -> String {
    "notifications.db".to_string()
}

fn default_key_alias() -> String {
    "notme_db_encryption_key".to_string()
}

fn default_key_backend() -> KeyBackend {
    KeyBackend::Software
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_file: default_store_file(),
            key_alias: default_key_alias(),
            key_backend: default_key_backend(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the data directory.
    pub const FILE_NAME: &'static str = "notme.toml";

    /// Load settings from `<data_dir>/notme.toml`.
    ///
    /// If the file does not exist, defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            StoreError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject store file names that would escape the data directory.
    fn validate(&self) -> Result<()> {
        let name = &self.store_file;
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
            return Err(StoreError::ConfigError(format!(
                "store_file '{name}' must be a plain file name"
            )));
        }
        Ok(())
    }

    /// Full path of the live store file.
    pub fn store_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.store_file)
    }

    /// Directory holding the preference namespaces.
    pub fn prefs_dir(data_dir: &Path) -> PathBuf {
        data_dir.join("prefs")
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.store_file, "notifications.db");
        assert_eq!(s.key_alias, "notme_db_encryption_key");
        assert_eq!(s.key_backend, KeyBackend::Software);
        assert_eq!(s.log_level, "info");
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.store_file, "notifications.db");
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
store_file = "log.db"
key_alias = "custom_alias"
key_backend = "keyring"
log_level = "debug"
"#;
        fs::write(tmp.path().join("notme.toml"), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.store_file, "log.db");
        assert_eq!(settings.key_alias, "custom_alias");
        assert_eq!(settings.key_backend, KeyBackend::Keyring);
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notme.toml"), "log_level = \"warn\"\n").unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.store_file, "notifications.db");
        assert_eq!(settings.key_backend, KeyBackend::Software);
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notme.toml"), "not valid {{toml").unwrap();
        assert!(Settings::load(tmp.path()).is_err());
    }

    #[test]
    fn load_rejects_store_file_with_path() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notme.toml"), "store_file = \"../x.db\"\n").unwrap();
        assert!(Settings::load(tmp.path()).is_err());
    }

    #[test]
    fn store_path_joins_data_dir() {
        let s = Settings::default();
        assert_eq!(
            s.store_path(Path::new("/data")),
            PathBuf::from("/data/notifications.db")
        );
    }
}
