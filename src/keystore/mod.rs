//! Secure key facility: holds the master key that wraps the store passphrase.
//!
//! The master key is created once per alias and never leaves the facility:
//! callers hand in plaintext to `wrap` and ciphertext to `unwrap` and only
//! ever see the results.
//!
//! Backends:
//! - `SoftwareKeystore`: key file under the data directory (0600). Used in
//!   tests and on hosts without a credential service.
//! - `OsKeystore`: the operating system credential store (macOS Keychain,
//!   Windows Credential Manager, Secret Service on Linux).  Requires the
//!   `keyring-store` feature.

pub mod software;

#[cfg(feature = "keyring-store")]
pub mod os;

use std::path::Path;
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::config::settings::{KeyBackend, Settings};
use crate::crypto::encryption::NONCE_LEN;
use crate::errors::{Result, StoreError};

pub use software::SoftwareKeystore;

#[cfg(feature = "keyring-store")]
pub use os::OsKeystore;

/// Length of a master key in bytes (AES-256).
pub const MASTER_KEY_LEN: usize = 32;

/// Capability interface over a platform secure key facility.
pub trait KeyFacility: Send + Sync {
    /// Short backend name for status output and logs.
    fn name(&self) -> &'static str;

    /// Create the master key for `alias` if it does not exist yet.
    ///
    /// Returns `true` when a new key was created.
    fn ensure_key(&self, alias: &str) -> Result<bool>;

    /// AEAD-encrypt `plaintext` under the master key with a fresh nonce.
    fn wrap(&self, alias: &str, plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_LEN])>;

    /// Decrypt and authenticate `ciphertext` under the master key.
    fn unwrap(&self, alias: &str, ciphertext: &[u8], nonce: &[u8])
        -> Result<Zeroizing<Vec<u8>>>;
}

/// Build the key facility selected in settings.
pub fn from_settings(settings: &Settings, data_dir: &Path) -> Result<Arc<dyn KeyFacility>> {
    match settings.key_backend {
        KeyBackend::Software => Ok(Arc::new(SoftwareKeystore::new(data_dir.join("keys")))),
        KeyBackend::Keyring => keyring_backend(),
    }
}

#[cfg(feature = "keyring-store")]
fn keyring_backend() -> Result<Arc<dyn KeyFacility>> {
    Ok(Arc::new(OsKeystore::new()))
}

#[cfg(not(feature = "keyring-store"))]
fn keyring_backend() -> Result<Arc<dyn KeyFacility>> {
    Err(StoreError::KeyringError(
        "keyring support not compiled; rebuild with `cargo build --features keyring-store`"
            .into(),
    ))
}

/// Validate that a key alias is safe to use as a file name / keyring user.
///
/// Allowed: ASCII letters, digits, underscores, hyphens, periods.
pub(crate) fn validate_alias(alias: &str) -> Result<()> {
    if alias.is_empty() || alias.len() > 128 {
        return Err(StoreError::ConfigError(
            "key alias must be 1-128 characters".into(),
        ));
    }
    if alias.starts_with('.')
        || !alias
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
    {
        return Err(StoreError::ConfigError(format!(
            "key alias '{alias}' is invalid: only ASCII letters, digits, underscores, hyphens, and periods are allowed"
        )));
    }
    Ok(())
}
