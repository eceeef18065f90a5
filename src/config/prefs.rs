//! Namespaced key-value preferences.
//!
//! Small persistent string maps that hold the wrapped passphrase
//! (`db_encryption_prefs`) and the migration marker (`db_migration`).
//! `FilePrefs` keeps one JSON object per namespace at
//! `<dir>/<namespace>.json`; every write replaces the file atomically
//! via temp-file + rename.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::errors::{Result, StoreError};

/// Minimal persistent key-value store, partitioned by namespace.
pub trait ConfigStore: Send + Sync {
    /// Read a value, `None` if the key was never set.
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    /// Write a single value, replacing any previous one.
    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()>;

    /// Write several values of one namespace together.
    ///
    /// Backends that can commit all entries in one step override this.
    fn set_all(&self, namespace: &str, entries: &[(&str, &str)]) -> Result<()> {
        for (key, value) in entries {
            self.set(namespace, key, value)?;
        }
        Ok(())
    }

    /// Read a boolean flag; anything other than `"true"` counts as false.
    fn get_bool(&self, namespace: &str, key: &str) -> Result<bool> {
        Ok(self.get(namespace, key)?.as_deref() == Some("true"))
    }

    /// Write a boolean flag.
    fn set_bool(&self, namespace: &str, key: &str, value: bool) -> Result<()> {
        self.set(namespace, key, if value { "true" } else { "false" })
    }
}

// ---------------------------------------------------------------------------
// FilePrefs
// ---------------------------------------------------------------------------

/// File-backed `ConfigStore`.
pub struct FilePrefs {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FilePrefs {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the JSON file backing `namespace`.
    pub fn namespace_path(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{namespace}.json"))
    }

    fn read_namespace(&self, namespace: &str) -> Result<BTreeMap<String, String>> {
        validate_namespace(namespace)?;
        let path = self.namespace_path(namespace);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let contents = fs::read_to_string(&path)?;
        serde_json::from_str(&contents).map_err(|e| {
            StoreError::ConfigError(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    fn write_namespace(&self, namespace: &str, map: &BTreeMap<String, String>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(map)
            .map_err(|e| StoreError::SerializationError(format!("prefs: {e}")))?;
        write_private_file(&self.namespace_path(namespace), &bytes)
    }

    fn update(&self, namespace: &str, entries: &[(&str, &str)]) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| StoreError::ConfigError("preferences lock poisoned".into()))?;

        validate_namespace(namespace)?;
        let mut map = match self.read_namespace(namespace) {
            Ok(map) => map,
            // Unparseable contents are replaced rather than blocking every write.
            Err(StoreError::ConfigError(reason)) => {
                warn!(namespace, reason = %reason, "overwriting corrupt preferences file");
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        for (key, value) in entries {
            map.insert((*key).to_string(), (*value).to_string());
        }
        self.write_namespace(namespace, &map)
    }
}

impl ConfigStore for FilePrefs {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        Ok(self.read_namespace(namespace)?.remove(key))
    }

    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.update(namespace, &[(key, value)])
    }

    fn set_all(&self, namespace: &str, entries: &[(&str, &str)]) -> Result<()> {
        self.update(namespace, entries)
    }
}

// ---------------------------------------------------------------------------
// MemoryPrefs
// ---------------------------------------------------------------------------

/// In-memory `ConfigStore`, for embedding and tests.
#[derive(Default)]
pub struct MemoryPrefs {
    values: Mutex<HashMap<(String, String), String>>,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryPrefs {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| StoreError::ConfigError("preferences lock poisoned".into()))?;
        Ok(values
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| StoreError::ConfigError("preferences lock poisoned".into()))?;
        values.insert(
            (namespace.to_string(), key.to_string()),
            value.to_string(),
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Write `bytes` to `path` **atomically** with owner-only permissions.
///
/// 1. Write to a hidden temp file in the same directory.
/// 2. Restrict permissions (Unix) and fsync.
/// 3. Rename temp file over the target path.
///
/// Parent directories are created as needed.
pub fn write_private_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    if !parent.as_os_str().is_empty() && !parent.exists() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    {
        use std::io::Write;
        let mut file = fs::File::create(&tmp_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
        }

        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Namespaces become file names, so keep them to a safe alphabet.
fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty()
        || !namespace
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(StoreError::ConfigError(format!(
            "invalid preferences namespace '{namespace}'"
        )));
    }
    Ok(())
}
