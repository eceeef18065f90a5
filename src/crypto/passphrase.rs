//! The store passphrase.
//!
//! 32 random bytes that key the SQLCipher store.  The bytes only ever
//! live in process memory; they are wiped when the `Passphrase` drops
//! and never appear in `Debug` output.

use std::fmt;

use rand::rngs::OsRng;
use rand::TryRngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{Result, StoreError};

/// Length of the store passphrase in bytes (256 bits).
pub const PASSPHRASE_LEN: usize = 32;

/// Symmetric secret used to encrypt the notification store.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Passphrase {
    bytes: [u8; PASSPHRASE_LEN],
}

impl Passphrase {
    /// Wrap raw bytes as a passphrase.
    pub fn from_bytes(bytes: [u8; PASSPHRASE_LEN]) -> Self {
        Self { bytes }
    }

    /// Build a passphrase from an unwrapped slice, rejecting wrong lengths.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; PASSPHRASE_LEN] = slice.try_into().map_err(|_| {
            StoreError::KeyManager(format!(
                "passphrase must be exactly {PASSPHRASE_LEN} bytes, got {}",
                slice.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    /// Generate a fresh passphrase from the OS CSPRNG.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; PASSPHRASE_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| StoreError::KeyManager(format!("OS random source failed: {e}")))?;
        let passphrase = Self { bytes };
        bytes.zeroize();
        Ok(passphrase)
    }

    /// Access the raw bytes.
    pub fn as_bytes(&self) -> &[u8; PASSPHRASE_LEN] {
        &self.bytes
    }

    /// Render the passphrase as a SQLCipher raw key literal: `x'<64 hex>'`.
    ///
    /// Raw keys bypass SQLCipher's PBKDF2 step; the bytes are already
    /// full-entropy.
    pub fn sqlcipher_key(&self) -> Zeroizing<String> {
        let mut hex = hex::encode(self.bytes);
        let literal = Zeroizing::new(format!("x'{hex}'"));
        hex.zeroize();
        literal
    }
}

impl PartialEq for Passphrase {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Passphrase {}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}
