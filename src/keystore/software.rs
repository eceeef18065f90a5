//! File-backed key facility.
//!
//! Each master key is a 32-byte random file at `<dir>/<alias>.key`,
//! written with owner-only permissions.  The key is read into a
//! zeroizing buffer for each wrap/unwrap and dropped straight after.

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::OsRng;
use rand::TryRngCore;
use tracing::info;
use zeroize::Zeroizing;

use super::{validate_alias, KeyFacility, MASTER_KEY_LEN};
use crate::config::prefs::write_private_file;
use crate::crypto::encryption::{self, NONCE_LEN};
use crate::errors::{Result, StoreError};

/// Software-backed `KeyFacility`.
pub struct SoftwareKeystore {
    dir: PathBuf,
}

impl SoftwareKeystore {
    /// Keys are stored inside `dir` (created on first use).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the key file for `alias`.
    pub fn key_path(&self, alias: &str) -> PathBuf {
        self.dir.join(format!("{alias}.key"))
    }

    fn load(&self, alias: &str) -> Result<Zeroizing<[u8; MASTER_KEY_LEN]>> {
        validate_alias(alias)?;
        let path = self.key_path(alias);
        if !path.exists() {
            return Err(StoreError::KeyManager(format!(
                "master key '{alias}' does not exist"
            )));
        }
        read_key_file(&path)
    }
}

impl KeyFacility for SoftwareKeystore {
    fn name(&self) -> &'static str {
        "software"
    }

    fn ensure_key(&self, alias: &str) -> Result<bool> {
        validate_alias(alias)?;
        let path = self.key_path(alias);

        if path.exists() {
            // Validate length so a truncated file surfaces here, not at unwrap.
            read_key_file(&path)?;
            return Ok(false);
        }

        let mut key = Zeroizing::new([0u8; MASTER_KEY_LEN]);
        OsRng
            .try_fill_bytes(&mut key[..])
            .map_err(|e| StoreError::KeyManager(format!("OS random source failed: {e}")))?;

        write_private_file(&path, &key[..])?;
        info!(alias, path = %path.display(), "created software master key");
        Ok(true)
    }

    fn wrap(&self, alias: &str, plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_LEN])> {
        let key = self.load(alias)?;
        encryption::seal(&key[..], plaintext)
    }

    fn unwrap(
        &self,
        alias: &str,
        ciphertext: &[u8],
        nonce: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        let key = self.load(alias)?;
        encryption::open(&key[..], nonce, ciphertext).map(Zeroizing::new)
    }
}

fn read_key_file(path: &Path) -> Result<Zeroizing<[u8; MASTER_KEY_LEN]>> {
    let data = Zeroizing::new(fs::read(path)?);
    if data.len() != MASTER_KEY_LEN {
        return Err(StoreError::KeyManager(format!(
            "master key file {} must be exactly {MASTER_KEY_LEN} bytes, got {}",
            path.display(),
            data.len()
        )));
    }
    let mut key = Zeroizing::new([0u8; MASTER_KEY_LEN]);
    key.copy_from_slice(&data);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ensure_key_creates_once() {
        let dir = TempDir::new().unwrap();
        let ks = SoftwareKeystore::new(dir.path().join("keys"));

        assert!(ks.ensure_key("master").unwrap());
        let first = fs::read(ks.key_path("master")).unwrap();
        assert_eq!(first.len(), MASTER_KEY_LEN);

        assert!(!ks.ensure_key("master").unwrap());
        let second = fs::read(ks.key_path("master")).unwrap();
        assert_eq!(first, second, "existing key must not be replaced");
    }

    #[test]
    fn wrap_unwrap_roundtrip() {
        let dir = TempDir::new().unwrap();
        let ks = SoftwareKeystore::new(dir.path());
        ks.ensure_key("k").unwrap();

        let (ct, nonce) = ks.wrap("k", b"thirty-two bytes of passphrase!!").unwrap();
        let pt = ks.unwrap("k", &ct, &nonce).unwrap();
        assert_eq!(pt.as_slice(), b"thirty-two bytes of passphrase!!");
    }

    #[test]
    fn wrap_without_key_fails() {
        let dir = TempDir::new().unwrap();
        let ks = SoftwareKeystore::new(dir.path());
        assert!(ks.wrap("absent", b"x").is_err());
    }

    #[test]
    fn unwrap_under_replaced_key_fails() {
        let dir = TempDir::new().unwrap();
        let ks = SoftwareKeystore::new(dir.path());
        ks.ensure_key("k").unwrap();
        let (ct, nonce) = ks.wrap("k", b"secret").unwrap();

        fs::remove_file(ks.key_path("k")).unwrap();
        ks.ensure_key("k").unwrap();

        assert!(matches!(
            ks.unwrap("k", &ct, &nonce),
            Err(StoreError::DecryptionFailed)
        ));
    }

    #[test]
    fn truncated_key_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let ks = SoftwareKeystore::new(dir.path());
        fs::write(ks.key_path("k"), [0u8; 5]).unwrap();
        assert!(ks.ensure_key("k").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let ks = SoftwareKeystore::new(dir.path());
        ks.ensure_key("k").unwrap();
        let mode = fs::metadata(ks.key_path("k")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
