//! Integration tests for the once-only store bootstrap.

use std::io;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

use rusqlite::{params, Connection};
use tempfile::TempDir;

use notme::bootstrap::StoreBootstrap;
use notme::config::{ConfigStore, FilePrefs, MemoryPrefs, Settings};
use notme::crypto::KeyManager;
use notme::db::{cipher, NewNotification, NotificationStore};
use notme::errors::{MigrationError, Result, StoreError};
use notme::keystore::SoftwareKeystore;
use notme::migration::swap::Renamer;
use notme::migration::{MigrationEngine, MigrationOutcome, StoreLayout, MARKER_KEY, MARKER_NAMESPACE};

type Row = (
    i64,
    &'static str,
    Option<&'static str>,
    &'static str,
    &'static str,
    bool,
    Option<&'static str>,
    i64,
);

const LEGACY_ROWS: [Row; 3] = [
    (1, "pkg.a", Some("T1"), "X1", "2024-01-01 10:00:00", false, Some("Social"), 0),
    (2, "pkg.b", None, "X2", "2024-01-01 11:00:00", true, Some("Service"), 2),
    (3, "pkg.a", Some("T3"), "X3", "2024-01-02 09:00:00", false, None, 0),
];

fn write_legacy(path: &Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            packageName TEXT, title TEXT, text TEXT, timestamp TEXT,
            isOngoing INTEGER NOT NULL, category TEXT, actionCount INTEGER NOT NULL)",
    )
    .unwrap();
    for (id, pkg, title, text, ts, ongoing, category, actions) in LEGACY_ROWS {
        conn.execute(
            "INSERT INTO notifications VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![id, pkg, title, text, ts, ongoing, category, actions],
        )
        .unwrap();
    }
}

fn store_path(dir: &TempDir) -> std::path::PathBuf {
    Settings::default().store_path(dir.path())
}

fn bootstrap(dir: &TempDir) -> StoreBootstrap {
    StoreBootstrap::from_settings(dir.path(), &Settings::default()).unwrap()
}

#[test]
fn legacy_store_scenario() {
    let dir = TempDir::new().unwrap();
    write_legacy(&store_path(&dir));

    let handle = bootstrap(&dir).get_store().unwrap();
    assert_eq!(
        handle.migration_outcome(),
        Some(MigrationOutcome::Migrated { rows: 3 })
    );

    let mut rows = handle.get_all().unwrap();
    rows.reverse();
    assert_eq!(rows.len(), 3);
    for (record, expected) in rows.iter().zip(LEGACY_ROWS) {
        let (id, pkg, title, text, ts, ongoing, category, actions) = expected;
        assert_eq!(record.id, id);
        assert_eq!(record.package_name.as_deref(), Some(pkg));
        assert_eq!(record.title.as_deref(), title);
        assert_eq!(record.text.as_deref(), Some(text));
        assert_eq!(record.timestamp.as_deref(), Some(ts));
        assert_eq!(record.is_ongoing, ongoing);
        assert_eq!(record.category.as_deref(), category);
        assert_eq!(record.action_count, actions);
    }
    drop(handle);

    // The plaintext file is gone from the live path.
    assert!(cipher::open_plaintext_read_only(&store_path(&dir)).is_err());

    // The marker is set, and the persisted passphrase opens the store.
    let prefs = FilePrefs::new(Settings::prefs_dir(dir.path()));
    assert!(prefs.get_bool(MARKER_NAMESPACE, MARKER_KEY).unwrap());

    let passphrase = KeyManager::new(
        Arc::new(SoftwareKeystore::new(dir.path().join("keys"))),
        Arc::new(prefs),
        Settings::default().key_alias,
    )
    .get_or_create_passphrase()
    .unwrap();
    let reopened = NotificationStore::open(&store_path(&dir), &passphrase).unwrap();
    assert_eq!(reopened.count().unwrap(), 3);
}

#[test]
fn restarts_reuse_passphrase_and_never_remigrate() {
    let dir = TempDir::new().unwrap();
    write_legacy(&store_path(&dir));

    let first = bootstrap(&dir).get_store().unwrap();
    assert_eq!(
        first.migration_outcome(),
        Some(MigrationOutcome::Migrated { rows: 3 })
    );
    first
        .insert(&NewNotification {
            package_name: "pkg.c".into(),
            timestamp: "2024-01-03 08:00:00".into(),
            ..Default::default()
        })
        .unwrap();
    drop(first);

    for _ in 0..3 {
        let handle = bootstrap(&dir).get_store().unwrap();
        assert_eq!(
            handle.migration_outcome(),
            Some(MigrationOutcome::AlreadyComplete)
        );
        assert_eq!(handle.count().unwrap(), 4);
    }
}

#[test]
fn concurrent_callers_share_one_initialization() {
    let dir = TempDir::new().unwrap();
    write_legacy(&store_path(&dir));
    let bootstrap = Arc::new(bootstrap(&dir));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let bootstrap = Arc::clone(&bootstrap);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                bootstrap.get_store().unwrap()
            })
        })
        .collect();

    let stores: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for handle in &stores {
        assert!(Arc::ptr_eq(handle.store(), stores[0].store()));
        assert_eq!(
            handle.migration_outcome(),
            Some(MigrationOutcome::Migrated { rows: 3 })
        );
    }
    assert_eq!(stores[0].count().unwrap(), 3);
}

/// Preferences whose migration namespace refuses writes.
struct ReadOnlyMarker(MemoryPrefs);

impl ConfigStore for ReadOnlyMarker {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        self.0.get(namespace, key)
    }

    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        if namespace == MARKER_NAMESPACE {
            return Err(StoreError::ConfigError("read-only namespace".into()));
        }
        self.0.set(namespace, key, value)
    }
}

#[test]
fn migration_error_does_not_block_the_store() {
    let dir = TempDir::new().unwrap();
    let prefs: Arc<dyn ConfigStore> = Arc::new(ReadOnlyMarker(MemoryPrefs::new()));
    let key_manager = KeyManager::new(
        Arc::new(SoftwareKeystore::new(dir.path().join("keys"))),
        Arc::clone(&prefs),
        "test_key",
    );
    let migration = MigrationEngine::new(StoreLayout::new(store_path(&dir)), prefs);
    let bootstrap = StoreBootstrap::new(key_manager, migration);

    let handle = bootstrap.get_store().unwrap();
    assert!(matches!(
        handle.migration_error(),
        Some(MigrationError::Marker(_))
    ));
    assert_eq!(handle.migration_outcome(), None);
    assert_eq!(handle.count().unwrap(), 0);
}

#[test]
fn unmigratable_legacy_store_surfaces_store_open() {
    let dir = TempDir::new().unwrap();
    Connection::open(store_path(&dir))
        .unwrap()
        .execute_batch("CREATE TABLE unrelated (x INTEGER); INSERT INTO unrelated VALUES (1);")
        .unwrap();

    let err = bootstrap(&dir).get_store().err().unwrap();
    assert!(matches!(err, StoreError::StoreOpen(_)));
    assert!(err.to_string().starts_with("Local data unavailable"));

    // The legacy file was not touched.
    let conn = cipher::open_plaintext_read_only(&store_path(&dir)).unwrap();
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM unrelated", [], |row| row.get(0))
        .unwrap();
    assert_eq!(n, 1);
}

#[test]
fn failed_restore_never_buries_the_legacy_store() {
    let dir = TempDir::new().unwrap();
    let live = store_path(&dir);
    write_legacy(&live);
    let layout = StoreLayout::new(&live);

    // Promotion fails and so does moving the backup back.
    let temp = layout.temp();
    let backup = layout.backup();
    let failing: Arc<Renamer> = Arc::new(move |from: &Path, to: &Path| {
        if from == temp.as_path() || from == backup.as_path() {
            return Err(io::Error::new(io::ErrorKind::Other, "injected failure"));
        }
        std::fs::rename(from, to)
    });
    let prefs: Arc<dyn ConfigStore> = Arc::new(FilePrefs::new(Settings::prefs_dir(dir.path())));
    let key_manager = KeyManager::new(
        Arc::new(SoftwareKeystore::new(dir.path().join("keys"))),
        Arc::clone(&prefs),
        Settings::default().key_alias,
    );
    let stuck = StoreBootstrap::new(
        key_manager,
        MigrationEngine::with_renamer(layout.clone(), prefs, failing),
    );

    let err = stuck.get_store().err().unwrap();
    assert!(matches!(err, StoreError::StoreOpen(_)), "got {err:?}");
    assert!(!live.exists(), "no empty store may be created over the gap");
    assert!(layout.backup().exists());

    // The next start restores the backup and migrates it.
    let handle = bootstrap(&dir).get_store().unwrap();
    assert_eq!(
        handle.migration_outcome(),
        Some(MigrationOutcome::Migrated { rows: 3 })
    );
    assert_eq!(handle.count().unwrap(), 3);
    assert!(!layout.backup().exists());
}

#[test]
fn corrupt_key_prefs_do_not_block_bootstrap() {
    let dir = TempDir::new().unwrap();
    let prefs_dir = Settings::prefs_dir(dir.path());
    std::fs::create_dir_all(&prefs_dir).unwrap();
    std::fs::write(prefs_dir.join("db_encryption_prefs.json"), "{not json").unwrap();

    let handle = bootstrap(&dir).get_store().unwrap();
    assert_eq!(handle.migration_outcome(), Some(MigrationOutcome::FreshInstall));
    handle
        .insert(&NewNotification {
            package_name: "pkg.a".into(),
            timestamp: "2024-01-01 10:00:00".into(),
            ..Default::default()
        })
        .unwrap();
    drop(handle);

    // The replacement passphrase was stored, so a restart reads the row.
    let reopened = bootstrap(&dir).get_store().unwrap();
    assert_eq!(reopened.count().unwrap(), 1);
}
