//! Bulk copy of the legacy table into a fresh encrypted store.
//!
//! The table definition is read from the legacy `sqlite_master` and
//! replayed verbatim, so the copy carries whatever columns the legacy
//! file has.  Rows move as `rusqlite::types::Value`, which keeps each
//! cell's storage class (INTEGER as i64, REAL as f64, TEXT byte for
//! byte, BLOB raw, NULL as NULL) and binds it as a parameter.

use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::crypto::Passphrase;
use crate::db::cipher;
use crate::db::TABLE_NAME;
use crate::errors::MigrationError;

/// Copy the legacy `notifications` table at `legacy` into a new store at
/// `target`, encrypted under `passphrase`.  Returns the number of rows.
///
/// `legacy` is only opened read-only.  Both connections are closed
/// before this returns, on every path.
pub fn copy_to_encrypted(
    legacy: &Path,
    target: &Path,
    passphrase: &Passphrase,
) -> Result<u64, MigrationError> {
    let source = cipher::open_plaintext_read_only(legacy)
        .map_err(|e| copy_failed("cannot open legacy store", e))?;
    let table_sql = table_ddl(&source)?;
    let index_sql = index_ddl(&source).map_err(|e| copy_failed("reading legacy indexes", e))?;

    let mut dest = cipher::open_encrypted(target, passphrase)
        .map_err(|e| copy_failed("cannot create encrypted store", e))?;
    dest.execute_batch(&table_sql)
        .map_err(|e| copy_failed("replaying table definition", e))?;

    let copied = copy_rows(&source, &mut dest).map_err(|e| copy_failed("copying rows", e))?;

    for sql in &index_sql {
        dest.execute_batch(sql)
            .map_err(|e| copy_failed("replaying index definition", e))?;
    }

    let expected = row_count(&source).map_err(|e| copy_failed("counting legacy rows", e))?;
    let actual = row_count(&dest).map_err(|e| copy_failed("counting copied rows", e))?;
    if expected != actual {
        return Err(MigrationError::CopyFailed(format!(
            "row count mismatch after copy: legacy has {expected}, encrypted copy has {actual}"
        )));
    }

    info!(rows = copied, "copied legacy rows into encrypted store");
    Ok(copied)
}

/// The `CREATE TABLE` statement of the legacy table.
fn table_ddl(conn: &Connection) -> Result<String, MigrationError> {
    let sql: Option<Option<String>> = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [TABLE_NAME],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| copy_failed("reading legacy schema", e))?;

    match sql.flatten() {
        Some(sql) if !sql.trim().is_empty() => {
            debug!(ddl = %sql, "legacy table definition");
            Ok(sql)
        }
        _ => Err(MigrationError::SchemaNotFound),
    }
}

/// Explicit indexes on the legacy table (auto-indexes have no SQL).
fn index_ddl(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT sql FROM sqlite_master
         WHERE type = 'index' AND tbl_name = ?1 AND sql IS NOT NULL",
    )?;
    let rows = stmt.query_map([TABLE_NAME], |row| row.get(0))?;
    rows.collect()
}

/// Stream every legacy row into `dest` inside one transaction.
///
/// Any failing row drops the transaction uncommitted, so `dest` keeps
/// an empty table.
fn copy_rows(source: &Connection, dest: &mut Connection) -> rusqlite::Result<u64> {
    let mut select = source.prepare(&format!("SELECT * FROM {}", quote_ident(TABLE_NAME)))?;
    let columns: Vec<String> = select
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let insert_sql = format!(
        "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
        quote_ident(TABLE_NAME)
    );

    let tx = dest.transaction()?;
    let mut copied = 0u64;
    {
        let mut insert = tx.prepare(&insert_sql)?;
        let mut rows = select.query([])?;
        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            insert.execute(params_from_iter(values.iter()))?;
            copied += 1;
        }
    }
    tx.commit()?;
    Ok(copied)
}

pub(crate) fn row_count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_ident(TABLE_NAME)),
        [],
        |row| row.get(0),
    )
}

/// Double-quote an identifier, doubling embedded quotes.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn copy_failed(context: &str, err: rusqlite::Error) -> MigrationError {
    MigrationError::CopyFailed(format!("{context}: {err}"))
}
