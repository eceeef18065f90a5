//! Store bootstrap: passphrase, migration, open, once per process.
//!
//! ```text
//! get_store ─► KeyManager::get_or_create_passphrase
//!           ─► MigrationEngine::migrate_if_needed
//!           ─► NotificationStore::open
//!           ─► cached StoreHandle
//! ```
//!
//! The first caller does the work on its own thread while later callers
//! block on the init lock; once a handle is cached every call returns a
//! clone of it without locking.

use std::fs;
use std::ops::Deref;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::{info, warn};

use crate::config::{ConfigStore, FilePrefs, Settings};
use crate::crypto::KeyManager;
use crate::db::NotificationStore;
use crate::errors::{MigrationError, Result, StoreError};
use crate::keystore;
use crate::migration::{MigrationEngine, MigrationOutcome, StoreLayout};

/// Shared, ready-to-use store plus the result of this run's migration.
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<NotificationStore>,
    migration: std::result::Result<MigrationOutcome, Arc<MigrationError>>,
}

impl StoreHandle {
    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }

    /// What migration did, if it succeeded.
    pub fn migration_outcome(&self) -> Option<MigrationOutcome> {
        self.migration.as_ref().ok().copied()
    }

    /// The migration error bootstrap continued past, if any.
    ///
    /// When this is set the live store may still be the legacy one.
    pub fn migration_error(&self) -> Option<&MigrationError> {
        self.migration.as_ref().err().map(|e| &**e)
    }
}

impl Deref for StoreHandle {
    type Target = NotificationStore;

    fn deref(&self) -> &NotificationStore {
        &self.store
    }
}

/// Lazily initialized store handle.
pub struct StoreBootstrap {
    key_manager: KeyManager,
    migration: MigrationEngine,
    handle: OnceLock<StoreHandle>,
    init: Mutex<()>,
}

static GLOBAL: OnceLock<StoreBootstrap> = OnceLock::new();

impl StoreBootstrap {
    pub fn new(key_manager: KeyManager, migration: MigrationEngine) -> Self {
        Self {
            key_manager,
            migration,
            handle: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// Wire up the default collaborators for `data_dir`.
    pub fn from_settings(data_dir: &Path, settings: &Settings) -> Result<Self> {
        let prefs: Arc<dyn ConfigStore> = Arc::new(FilePrefs::new(Settings::prefs_dir(data_dir)));
        let facility = keystore::from_settings(settings, data_dir)?;
        let key_manager = KeyManager::new(facility, Arc::clone(&prefs), settings.key_alias.clone());
        let migration = MigrationEngine::new(StoreLayout::new(settings.store_path(data_dir)), prefs);
        Ok(Self::new(key_manager, migration))
    }

    /// The process-wide instance, built from `data_dir` on first use.
    ///
    /// Later calls return the same instance whatever arguments they pass;
    /// a call naming a different store path is logged and otherwise ignored.
    pub fn global(data_dir: &Path, settings: &Settings) -> Result<&'static StoreBootstrap> {
        if let Some(bootstrap) = GLOBAL.get() {
            let requested = settings.store_path(data_dir);
            if bootstrap.migration.layout().live() != requested.as_path() {
                warn!(
                    active = %bootstrap.migration.layout().live().display(),
                    requested = %requested.display(),
                    "store bootstrap already initialized for another path, ignoring request"
                );
            }
            return Ok(bootstrap);
        }
        // A racing caller may win `set`; its instance is equivalent.
        let _ = GLOBAL.set(Self::from_settings(data_dir, settings)?);
        GLOBAL
            .get()
            .ok_or_else(|| StoreError::StoreOpen("store bootstrap unavailable".into()))
    }

    pub fn key_manager(&self) -> &KeyManager {
        &self.key_manager
    }

    pub fn migration(&self) -> &MigrationEngine {
        &self.migration
    }

    /// Return the store, bootstrapping it on the first call.
    ///
    /// A migration failure does not fail bootstrap: the store on disk is
    /// opened anyway and the error is kept on the handle.  A store that
    /// will not open under the passphrase, or a legacy store still parked
    /// at `.backup`, fails with `StoreOpen` and nothing is cached, so a
    /// later call starts over.
    pub fn get_store(&self) -> Result<StoreHandle> {
        if let Some(handle) = self.handle.get() {
            return Ok(handle.clone());
        }

        let _guard = self
            .init
            .lock()
            .map_err(|_| StoreError::StoreOpen("bootstrap lock poisoned".into()))?;
        if let Some(handle) = self.handle.get() {
            return Ok(handle.clone());
        }

        let handle = self.initialize()?;
        let _ = self.handle.set(handle.clone());
        Ok(handle)
    }

    fn initialize(&self) -> Result<StoreHandle> {
        let passphrase = self.key_manager.get_or_create_passphrase()?;

        let migration = match self.migration.migrate_if_needed(&passphrase) {
            Ok(outcome) => {
                info!(%outcome, "store migration check finished");
                Ok(outcome)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "store migration failed, continuing with the store currently on disk"
                );
                Err(Arc::new(e))
            }
        };

        let layout = self.migration.layout();
        let live = layout.live();
        let backup = layout.backup();
        if !live.exists() && backup.exists() {
            // Creating a store here would make the parked legacy store look
            // like a stale backup of it on the next run.
            return Err(StoreError::StoreOpen(format!(
                "store is parked at {} after an interrupted migration",
                backup.display()
            )));
        }
        if let Some(parent) = live.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let store = NotificationStore::open(live, &passphrase)?;
        info!(path = %store.path().display(), "notification store ready");

        Ok(StoreHandle {
            store: Arc::new(store),
            migration,
        })
    }
}
