//! OS keyring–backed key facility.
//!
//! Stores the master key in the operating system's secure credential store:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring / KDE Wallet)
//!
//! The key is kept base64-encoded under service `notme`, user `<alias>`.
//! AEAD work happens in-process with the key held in a zeroizing buffer.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::TryRngCore;
use tracing::info;
use zeroize::Zeroizing;

use super::{validate_alias, KeyFacility, MASTER_KEY_LEN};
use crate::crypto::encryption::{self, NONCE_LEN};
use crate::errors::{Result, StoreError};

/// Service name used in the OS keyring.
const SERVICE_NAME: &str = "notme";

/// `KeyFacility` backed by the OS credential store.
#[derive(Debug, Default)]
pub struct OsKeystore;

impl OsKeystore {
    pub fn new() -> Self {
        Self
    }

    fn entry(alias: &str) -> Result<keyring::Entry> {
        validate_alias(alias)?;
        keyring::Entry::new(SERVICE_NAME, alias)
            .map_err(|e| StoreError::KeyringError(format!("failed to create keyring entry: {e}")))
    }

    fn read(alias: &str) -> Result<Option<Zeroizing<[u8; MASTER_KEY_LEN]>>> {
        let encoded = match Self::entry(alias)?.get_password() {
            Ok(value) => Zeroizing::new(value),
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => {
                return Err(StoreError::KeyringError(format!(
                    "failed to read from keyring: {e}"
                )))
            }
        };

        let raw = Zeroizing::new(
            BASE64
                .decode(encoded.as_bytes())
                .map_err(|_| StoreError::KeyringError("stored master key is not base64".into()))?,
        );
        if raw.len() != MASTER_KEY_LEN {
            return Err(StoreError::KeyringError(format!(
                "stored master key must be {MASTER_KEY_LEN} bytes, got {}",
                raw.len()
            )));
        }

        let mut key = Zeroizing::new([0u8; MASTER_KEY_LEN]);
        key.copy_from_slice(&raw);
        Ok(Some(key))
    }

    fn load(alias: &str) -> Result<Zeroizing<[u8; MASTER_KEY_LEN]>> {
        Self::read(alias)?.ok_or_else(|| {
            StoreError::KeyManager(format!("master key '{alias}' does not exist in keyring"))
        })
    }
}

impl KeyFacility for OsKeystore {
    fn name(&self) -> &'static str {
        "keyring"
    }

    fn ensure_key(&self, alias: &str) -> Result<bool> {
        if Self::read(alias)?.is_some() {
            return Ok(false);
        }

        let mut key = Zeroizing::new([0u8; MASTER_KEY_LEN]);
        OsRng
            .try_fill_bytes(&mut key[..])
            .map_err(|e| StoreError::KeyManager(format!("OS random source failed: {e}")))?;
        let encoded = Zeroizing::new(BASE64.encode(&key[..]));

        Self::entry(alias)?.set_password(&encoded).map_err(|e| {
            StoreError::KeyringError(format!("failed to store master key in keyring: {e}"))
        })?;

        info!(alias, "created keyring master key");
        Ok(true)
    }

    fn wrap(&self, alias: &str, plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_LEN])> {
        let key = Self::load(alias)?;
        encryption::seal(&key[..], plaintext)
    }

    fn unwrap(
        &self,
        alias: &str,
        ciphertext: &[u8],
        nonce: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        let key = Self::load(alias)?;
        encryption::open(&key[..], nonce, ciphertext).map(Zeroizing::new)
    }
}
