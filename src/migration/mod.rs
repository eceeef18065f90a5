//! One-time migration of a legacy plaintext store into an encrypted one.
//!
//! States, in order of detection:
//!
//! ```text
//! NOT_CHECKED ─┬─ marker set ─────────────► COMPLETE (no-op)
//!              ├─ no file ─────────────────► COMPLETE (fresh install)
//!              ├─ opens under passphrase ──► COMPLETE (already encrypted)
//!              └─ legacy plaintext ── MIGRATING ─┬─► COMPLETE
//!                                                └─► FAILED (retried next bootstrap)
//! ```
//!
//! Migration copies the legacy table into `<live>.temp` under the
//! passphrase, then promotes it with two renames (see [`swap`]).  The
//! marker is only written once the encrypted file is live.

pub mod copy;
pub mod swap;

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ConfigStore;
use crate::crypto::Passphrase;
use crate::db::cipher;
use crate::errors::MigrationError;
use swap::Renamer;

/// Preference namespace of the migration marker.
pub const MARKER_NAMESPACE: &str = "db_migration";

/// Boolean key recording that the live store is encrypted.
pub const MARKER_KEY: &str = "db_encrypted";

/// Journal side-car suffixes that belong to a store file.
pub const SIDECAR_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

/// The live store path and the siblings derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    live: PathBuf,
}

impl StoreLayout {
    pub fn new(live: impl Into<PathBuf>) -> Self {
        Self { live: live.into() }
    }

    /// Canonical store path.
    pub fn live(&self) -> &Path {
        &self.live
    }

    /// Where the encrypted copy is built.
    pub fn temp(&self) -> PathBuf {
        with_suffix(&self.live, ".temp")
    }

    /// Where the legacy file waits during promotion.
    pub fn backup(&self) -> PathBuf {
        with_suffix(&self.live, ".backup")
    }

    /// Side-car paths of `path` (`-wal`, `-shm`, `-journal`).
    pub fn sidecars(path: &Path) -> impl Iterator<Item = PathBuf> + '_ {
        SIDECAR_SUFFIXES.iter().map(move |s| with_suffix(path, s))
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// What [`MigrationEngine::migrate_if_needed`] found and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The marker was already set; nothing was inspected.
    AlreadyComplete,
    /// No store existed yet.
    FreshInstall,
    /// The live store already opens under the passphrase.
    AlreadyEncrypted,
    /// A legacy store was copied and promoted.
    Migrated { rows: u64 },
}

impl fmt::Display for MigrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyComplete => write!(f, "already complete"),
            Self::FreshInstall => write!(f, "fresh install"),
            Self::AlreadyEncrypted => write!(f, "store already encrypted"),
            Self::Migrated { rows } => write!(f, "migrated {rows} legacy row(s)"),
        }
    }
}

/// Detects the on-disk store state and migrates it when needed.
pub struct MigrationEngine {
    layout: StoreLayout,
    prefs: Arc<dyn ConfigStore>,
    rename: Arc<Renamer>,
}

impl MigrationEngine {
    pub fn new(layout: StoreLayout, prefs: Arc<dyn ConfigStore>) -> Self {
        Self::with_renamer(layout, prefs, Arc::new(swap::fs_rename))
    }

    /// Use `rename` for every file move instead of `std::fs::rename`.
    pub fn with_renamer(
        layout: StoreLayout,
        prefs: Arc<dyn ConfigStore>,
        rename: Arc<Renamer>,
    ) -> Self {
        Self {
            layout,
            prefs,
            rename,
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// `true` once the marker is persisted.
    pub fn is_complete(&self) -> Result<bool, MigrationError> {
        self.prefs
            .get_bool(MARKER_NAMESPACE, MARKER_KEY)
            .map_err(|e| MigrationError::Marker(e.to_string()))
    }

    /// Bring the live store in line with `passphrase`.
    ///
    /// Safe to call on every start: once the marker is set this returns
    /// without touching the store.  On error the legacy file is live and
    /// the marker unset, so the next call retries.
    pub fn migrate_if_needed(
        &self,
        passphrase: &Passphrase,
    ) -> Result<MigrationOutcome, MigrationError> {
        let live = self.layout.live();

        if swap::recover_interrupted(&self.layout, self.rename.as_ref())? {
            warn!(path = %live.display(), "restored store left behind by an interrupted migration");
        }

        if self.is_complete()? {
            if live.exists() {
                self.discard_superseded_backup(passphrase);
            }
            debug!("store migration already complete");
            return Ok(MigrationOutcome::AlreadyComplete);
        }

        if !live.exists() {
            info!(path = %live.display(), "no existing store, fresh install");
            self.set_marker()?;
            return Ok(MigrationOutcome::FreshInstall);
        }

        if cipher::is_encrypted_with(live, passphrase) {
            info!(path = %live.display(), "store already encrypted");
            self.discard_superseded_backup(passphrase);
            self.set_marker()?;
            return Ok(MigrationOutcome::AlreadyEncrypted);
        }

        info!(path = %live.display(), "legacy plaintext store found, migrating");
        let rows = self.migrate(passphrase)?;
        info!(rows, "store migration complete");
        Ok(MigrationOutcome::Migrated { rows })
    }

    fn migrate(&self, passphrase: &Passphrase) -> Result<u64, MigrationError> {
        let temp = self.layout.temp();
        swap::remove_store_files(&temp);

        let rows = match copy::copy_to_encrypted(self.layout.live(), &temp, passphrase) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "store migration failed before promotion, legacy store untouched");
                swap::remove_store_files(&temp);
                return Err(e);
            }
        };
        debug!(rows, temp = %temp.display(), "encrypted copy ready");

        if let Err(e) = swap::promote(&self.layout, self.rename.as_ref()) {
            swap::remove_store_files(&temp);
            return Err(e);
        }

        swap::discard_backup(&self.layout);
        self.set_marker()?;
        Ok(rows)
    }

    /// Delete a leftover backup once every row in it is in the live store.
    ///
    /// A backup that cannot be read, or that holds more rows than the
    /// encrypted store, is kept and reported instead.
    fn discard_superseded_backup(&self, passphrase: &Passphrase) {
        let backup = self.layout.backup();
        if !backup.exists() {
            return;
        }

        let backup_rows = cipher::open_plaintext_read_only(&backup)
            .and_then(|conn| copy::row_count(&conn));
        let live_rows = cipher::open_encrypted_read_only(self.layout.live(), passphrase)
            .and_then(|conn| copy::row_count(&conn));

        match (backup_rows, live_rows) {
            (Ok(backup_rows), Ok(live_rows)) if backup_rows <= live_rows => {
                debug!(backup_rows, live_rows, "leftover backup is superseded");
                swap::discard_backup(&self.layout);
            }
            (backup_rows, live_rows) => {
                warn!(
                    path = %backup.display(),
                    backup_rows = ?backup_rows.ok(),
                    live_rows = ?live_rows.ok(),
                    "keeping leftover store backup that may hold rows missing from the live store"
                );
            }
        }
    }

    fn set_marker(&self) -> Result<(), MigrationError> {
        self.prefs
            .set_bool(MARKER_NAMESPACE, MARKER_KEY, true)
            .map_err(|e| MigrationError::Marker(e.to_string()))
    }
}
