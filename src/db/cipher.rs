//! SQLCipher connection helpers.
//!
//! Keyed connections receive the passphrase as a raw key
//! (`PRAGMA key = "x'…'"`) before any other statement runs.  SQLCipher
//! only reads the file on the first real query, so every keyed open is
//! followed by [`probe_schema`] to surface a wrong key or a plaintext
//! file immediately.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::Passphrase;

/// Apply the store key to a freshly opened connection.
pub fn apply_key(conn: &Connection, passphrase: &Passphrase) -> rusqlite::Result<()> {
    let key = passphrase.sqlcipher_key();
    let pragma = Zeroizing::new(format!("PRAGMA key = \"{}\";", key.as_str()));
    conn.execute_batch(&pragma)
}

/// Trivial schema read: fails on a wrong key or a non-database file.
pub fn probe_schema(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get(0))
}

/// Open (creating if needed) an encrypted store for reading and writing.
pub fn open_encrypted(path: &Path, passphrase: &Passphrase) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    apply_key(&conn, passphrase)?;
    probe_schema(&conn)?;
    Ok(conn)
}

/// Open an existing encrypted store read-only.
pub fn open_encrypted_read_only(
    path: &Path,
    passphrase: &Passphrase,
) -> rusqlite::Result<Connection> {
    let conn = Connection::open_with_flags(path, read_only_flags())?;
    apply_key(&conn, passphrase)?;
    probe_schema(&conn)?;
    Ok(conn)
}

/// Open an existing unencrypted store read-only.
pub fn open_plaintext_read_only(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open_with_flags(path, read_only_flags())?;
    probe_schema(&conn)?;
    Ok(conn)
}

/// `true` if `path` opens and reads under `passphrase`.
///
/// The connection is closed before returning.
pub fn is_encrypted_with(path: &Path, passphrase: &Passphrase) -> bool {
    match open_encrypted_read_only(path, passphrase) {
        Ok(_conn) => true,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "store does not open under passphrase");
            false
        }
    }
}

fn read_only_flags() -> OpenFlags {
    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI
}
