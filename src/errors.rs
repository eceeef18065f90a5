use thiserror::Error;

/// Failures of the one-time plaintext → encrypted store migration.
///
/// None of these set the migration marker, so the next bootstrap
/// retries.  Apart from `Marker`, the legacy store is left live.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("legacy store has no `notifications` table")]
    SchemaNotFound,

    #[error("copying legacy rows failed: {0}")]
    CopyFailed(String),

    #[error("promoting the encrypted store failed: {0}")]
    SwapFailed(String),

    #[error("migration marker could not be persisted: {0}")]
    Marker(String),
}

/// All errors that can occur in the notification store.
#[derive(Debug, Error)]
pub enum StoreError {
    // --- Key management ---
    #[error("Key manager error: {0}")]
    KeyManager(String),

    #[error("Keyring error: {0}")]
    KeyringError(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: wrong master key or corrupted data")]
    DecryptionFailed,

    // --- Store ---
    #[error("Migration failed: {0}")]
    Migration(#[from] MigrationError),

    #[error("Local data unavailable: {0}")]
    StoreOpen(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    // --- Config errors ---
    #[error("Config error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
