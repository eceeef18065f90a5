//! The encrypted notification store and its DAO surface.
//!
//! `NotificationStore` owns one SQLCipher connection behind a mutex, so
//! a single handle can be shared across threads (`Arc<NotificationStore>`).
//! Readers that want a live view call [`NotificationStore::watch_all`] and
//! receive a fresh snapshot after every write.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

use super::cipher;
use super::record::{NewNotification, NotificationRecord, SELECT_COLUMNS, TABLE_NAME};
use crate::crypto::Passphrase;
use crate::errors::{Result, StoreError};

/// Columns added after the first schema version, with their definitions.
const ADDED_COLUMNS: &[(&str, &str)] = &[
    ("isOngoing", "INTEGER NOT NULL DEFAULT 0"),
    ("category", "TEXT"),
    ("actionCount", "INTEGER NOT NULL DEFAULT 0"),
];

/// Handle to the open, encrypted store.
pub struct NotificationStore {
    path: PathBuf,
    conn: Mutex<Connection>,
    watchers: Mutex<Vec<Sender<Vec<NotificationRecord>>>>,
}

impl NotificationStore {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Open (or create) the encrypted store at `path`.
    ///
    /// A wrong passphrase or a corrupted / plaintext file yields
    /// `StoreError::StoreOpen`; no recovery is attempted.
    pub fn open(path: &Path, passphrase: &Passphrase) -> Result<Self> {
        let conn = cipher::open_encrypted(path, passphrase).map_err(|e| {
            StoreError::StoreOpen(format!(
                "cannot open {} (wrong passphrase or corrupted file): {e}",
                path.display()
            ))
        })?;

        ensure_schema(&conn)?;
        debug!(path = %path.display(), "notification store open");

        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
            watchers: Mutex::new(Vec::new()),
        })
    }

    // ------------------------------------------------------------------
    // DAO
    // ------------------------------------------------------------------

    /// Insert one notification and return its new id.
    pub fn insert(&self, record: &NewNotification) -> Result<i64> {
        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO notifications
                    (packageName, title, text, timestamp, isOngoing, category, actionCount)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.package_name,
                    record.title,
                    record.text,
                    record.timestamp,
                    record.is_ongoing,
                    record.category,
                    record.action_count,
                ],
            )?;
            conn.last_insert_rowid()
        };

        debug!(id, package = %record.package_name, "notification stored");
        self.notify_watchers();
        Ok(id)
    }

    /// Snapshot of every notification, newest first.
    pub fn get_all(&self) -> Result<Vec<NotificationRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM {TABLE_NAME} ORDER BY id DESC"
        ))?;
        let rows = stmt.query_map([], NotificationRecord::from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Live view of [`get_all`](Self::get_all).
    ///
    /// The receiver gets the current snapshot immediately and a new one
    /// after every `insert` / `delete_all`.  Dropping it unsubscribes.
    pub fn watch_all(&self) -> Result<Receiver<Vec<NotificationRecord>>> {
        let (tx, rx) = mpsc::channel();
        // Initial snapshot; the receiver is alive so this cannot fail.
        let _ = tx.send(self.get_all()?);
        self.watchers()?.push(tx);
        Ok(rx)
    }

    /// Delete every notification. Returns the number of rows removed.
    pub fn delete_all(&self) -> Result<usize> {
        let removed = self.conn()?.execute("DELETE FROM notifications", [])?;
        info!(removed, "cleared notification store");
        self.notify_watchers();
        Ok(removed)
    }

    /// Number of stored notifications.
    pub fn count(&self) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM notifications", [], |row| row.get(0))?)
    }

    /// Path of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::StoreOpen("store connection lock poisoned".into()))
    }

    fn watchers(&self) -> Result<MutexGuard<'_, Vec<Sender<Vec<NotificationRecord>>>>> {
        self.watchers
            .lock()
            .map_err(|_| StoreError::StoreOpen("store watcher lock poisoned".into()))
    }

    fn notify_watchers(&self) {
        let Ok(mut watchers) = self.watchers() else {
            return;
        };
        if watchers.is_empty() {
            return;
        }

        match self.get_all() {
            Ok(snapshot) => watchers.retain(|tx| tx.send(snapshot.clone()).is_ok()),
            Err(e) => warn!(error = %e, "failed to refresh store watchers"),
        }
    }
}

/// Create the table if absent and add columns missing from older layouts.
fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS notifications (
            id          INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            packageName TEXT,
            title       TEXT,
            text        TEXT,
            timestamp   TEXT,
            isOngoing   INTEGER NOT NULL DEFAULT 0,
            category    TEXT,
            actionCount INTEGER NOT NULL DEFAULT 0
        );",
    )?;

    let existing: Vec<String> = {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('notifications')")?;
        let names = stmt.query_map([], |row| row.get(0))?;
        names.collect::<rusqlite::Result<_>>()?
    };

    for (column, definition) in ADDED_COLUMNS {
        if !existing.iter().any(|c| c.eq_ignore_ascii_case(column)) {
            conn.execute_batch(&format!(
                "ALTER TABLE notifications ADD COLUMN {column} {definition};"
            ))?;
            info!(column, "added missing column to notifications table");
        }
    }

    Ok(())
}
