//! Creation, wrapping and retrieval of the store passphrase.
//!
//! The passphrase is persisted only in wrapped form, as two base64
//! values in the `db_encryption_prefs` namespace:
//!
//! - `encrypted_passphrase`: AES-256-GCM ciphertext + 16-byte tag
//! - `encryption_iv`: the 12-byte nonce
//!
//! If the wrapped value cannot be recovered (master key reset or
//! invalidated, tampered prefs) a new passphrase replaces it.  Anything
//! encrypted under the old one is then unreadable; that path is logged
//! at `warn` as potential data loss.  If the new passphrase cannot be
//! wrapped or stored it is still returned for this run, logged at
//! `error` since the next run will not recover it.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, error, info, warn};

use crate::config::prefs::ConfigStore;
use crate::crypto::passphrase::Passphrase;
use crate::errors::{Result, StoreError};
use crate::keystore::KeyFacility;

/// Preferences namespace holding the wrapped passphrase.
pub const PREFS_NAMESPACE: &str = "db_encryption_prefs";

/// Key of the base64 ciphertext.
pub const KEY_ENCRYPTED_PASSPHRASE: &str = "encrypted_passphrase";

/// Key of the base64 nonce.
pub const KEY_IV: &str = "encryption_iv";

/// Owns the store passphrase lifecycle.
pub struct KeyManager {
    facility: Arc<dyn KeyFacility>,
    prefs: Arc<dyn ConfigStore>,
    alias: String,
}

impl KeyManager {
    pub fn new(
        facility: Arc<dyn KeyFacility>,
        prefs: Arc<dyn ConfigStore>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            facility,
            prefs,
            alias: alias.into(),
        }
    }

    /// Return the installation's passphrase, creating it on first use.
    ///
    /// Key facility and preference failures are absorbed: a passphrase
    /// that cannot be unwrapped is replaced, and one that cannot be
    /// persisted is still handed out.  The only error left is the OS
    /// random source failing.
    pub fn get_or_create_passphrase(&self) -> Result<Passphrase> {
        match self.load_wrapped() {
            Ok(Some((ciphertext, nonce))) => match self.recover(&ciphertext, &nonce) {
                Ok(passphrase) => {
                    debug!(alias = %self.alias, "recovered wrapped passphrase");
                    return Ok(passphrase);
                }
                Err(e) => {
                    warn!(
                        alias = %self.alias,
                        error = %e,
                        "failed to unwrap stored passphrase; generating a new one \
                         (data encrypted under the previous passphrase will be unreadable)"
                    );
                }
            },
            Ok(None) => {
                debug!("no wrapped passphrase stored yet");
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "stored passphrase is unreadable; generating a new one \
                     (data encrypted under the previous passphrase will be unreadable)"
                );
            }
        }

        self.create()
    }

    /// `true` if a wrapped passphrase is present in preferences.
    pub fn has_wrapped_passphrase(&self) -> Result<bool> {
        Ok(self.prefs.get(PREFS_NAMESPACE, KEY_ENCRYPTED_PASSPHRASE)?.is_some()
            && self.prefs.get(PREFS_NAMESPACE, KEY_IV)?.is_some())
    }

    /// Name of the backing key facility.
    pub fn backend_name(&self) -> &'static str {
        self.facility.name()
    }

    /// Read and decode the persisted `(ciphertext, nonce)` pair.
    fn load_wrapped(&self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let ciphertext = self.prefs.get(PREFS_NAMESPACE, KEY_ENCRYPTED_PASSPHRASE)?;
        let nonce = self.prefs.get(PREFS_NAMESPACE, KEY_IV)?;

        let (Some(ciphertext), Some(nonce)) = (ciphertext, nonce) else {
            return Ok(None);
        };

        let decode = |name: &str, value: &str| {
            BASE64
                .decode(value.trim())
                .map_err(|e| StoreError::KeyManager(format!("{name} is not valid base64: {e}")))
        };

        Ok(Some((
            decode(KEY_ENCRYPTED_PASSPHRASE, &ciphertext)?,
            decode(KEY_IV, &nonce)?,
        )))
    }

    fn recover(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<Passphrase> {
        self.facility.ensure_key(&self.alias)?;
        let plaintext = self.facility.unwrap(&self.alias, ciphertext, nonce)?;
        Passphrase::from_slice(&plaintext)
    }

    /// Generate a brand-new passphrase and try to persist it wrapped.
    fn create(&self) -> Result<Passphrase> {
        let passphrase = Passphrase::generate()?;

        match self.persist(&passphrase) {
            Ok(()) => info!(alias = %self.alias, "generated and stored new store passphrase"),
            Err(e) => error!(
                alias = %self.alias,
                error = %e,
                "new store passphrase could not be stored; data written this run \
                 will be unreadable after restart"
            ),
        }
        Ok(passphrase)
    }

    fn persist(&self, passphrase: &Passphrase) -> Result<()> {
        if self.facility.ensure_key(&self.alias)? {
            info!(alias = %self.alias, backend = self.facility.name(), "generated new master key");
        }

        let (ciphertext, nonce) = self.facility.wrap(&self.alias, passphrase.as_bytes())?;
        let ciphertext_b64 = BASE64.encode(&ciphertext);
        let nonce_b64 = BASE64.encode(nonce);

        self.prefs.set_all(
            PREFS_NAMESPACE,
            &[
                (KEY_ENCRYPTED_PASSPHRASE, ciphertext_b64.as_str()),
                (KEY_IV, nonce_b64.as_str()),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prefs::MemoryPrefs;
    use crate::keystore::SoftwareKeystore;
    use tempfile::TempDir;

    fn manager(dir: &TempDir, prefs: Arc<dyn ConfigStore>) -> KeyManager {
        let facility = Arc::new(SoftwareKeystore::new(dir.path().join("keys")));
        KeyManager::new(facility, prefs, "test_alias")
    }

    #[test]
    fn first_call_creates_and_persists_wrapped_value() {
        let dir = TempDir::new().unwrap();
        let prefs: Arc<dyn ConfigStore> = Arc::new(MemoryPrefs::new());
        let km = manager(&dir, prefs.clone());

        assert!(!km.has_wrapped_passphrase().unwrap());
        let p = km.get_or_create_passphrase().unwrap();
        assert!(km.has_wrapped_passphrase().unwrap());

        // The stored ciphertext is not the passphrase in any encoding.
        let stored = prefs
            .get(PREFS_NAMESPACE, KEY_ENCRYPTED_PASSPHRASE)
            .unwrap()
            .unwrap();
        assert_ne!(stored, BASE64.encode(p.as_bytes()));
        assert!(!stored.contains(&hex::encode(p.as_bytes())));

        let iv = BASE64
            .decode(prefs.get(PREFS_NAMESPACE, KEY_IV).unwrap().unwrap())
            .unwrap();
        assert_eq!(iv.len(), 12);
    }

    #[test]
    fn subsequent_calls_return_identical_bytes() {
        let dir = TempDir::new().unwrap();
        let prefs: Arc<dyn ConfigStore> = Arc::new(MemoryPrefs::new());
        let km = manager(&dir, prefs.clone());

        let first = km.get_or_create_passphrase().unwrap();
        let second = km.get_or_create_passphrase().unwrap();
        assert_eq!(first, second);

        // A new manager over the same state behaves like a process restart.
        let km2 = manager(&dir, prefs);
        assert_eq!(km2.get_or_create_passphrase().unwrap(), first);
    }

    #[test]
    fn lost_master_key_regenerates_passphrase() {
        let dir = TempDir::new().unwrap();
        let prefs: Arc<dyn ConfigStore> = Arc::new(MemoryPrefs::new());
        let km = manager(&dir, prefs.clone());
        let original = km.get_or_create_passphrase().unwrap();
        let old_ct = prefs.get(PREFS_NAMESPACE, KEY_ENCRYPTED_PASSPHRASE).unwrap();

        std::fs::remove_dir_all(dir.path().join("keys")).unwrap();

        let replacement = km.get_or_create_passphrase().unwrap();
        assert_ne!(original, replacement);
        assert_ne!(
            prefs.get(PREFS_NAMESPACE, KEY_ENCRYPTED_PASSPHRASE).unwrap(),
            old_ct,
            "wrapped value must be overwritten"
        );
        // And the replacement is stable from then on.
        assert_eq!(km.get_or_create_passphrase().unwrap(), replacement);
    }

    #[test]
    fn tampered_ciphertext_regenerates_passphrase() {
        let dir = TempDir::new().unwrap();
        let prefs: Arc<dyn ConfigStore> = Arc::new(MemoryPrefs::new());
        let km = manager(&dir, prefs.clone());
        let original = km.get_or_create_passphrase().unwrap();

        let mut ct = BASE64
            .decode(prefs.get(PREFS_NAMESPACE, KEY_ENCRYPTED_PASSPHRASE).unwrap().unwrap())
            .unwrap();
        ct[3] ^= 0xFF;
        prefs
            .set(PREFS_NAMESPACE, KEY_ENCRYPTED_PASSPHRASE, &BASE64.encode(&ct))
            .unwrap();

        assert_ne!(km.get_or_create_passphrase().unwrap(), original);
    }

    /// Preferences that accept nothing.
    struct RejectingPrefs;

    impl ConfigStore for RejectingPrefs {
        fn get(&self, _: &str, _: &str) -> Result<Option<String>> {
            Err(StoreError::ConfigError("unreadable".into()))
        }

        fn set(&self, _: &str, _: &str, _: &str) -> Result<()> {
            Err(StoreError::ConfigError("read-only".into()))
        }
    }

    #[test]
    fn unpersistable_passphrase_is_still_returned() {
        let dir = TempDir::new().unwrap();
        let km = manager(&dir, Arc::new(RejectingPrefs));

        let p = km.get_or_create_passphrase().unwrap();
        assert_eq!(p.as_bytes().len(), 32);
        // Nothing was stored, so every call hands out a fresh one.
        assert_ne!(km.get_or_create_passphrase().unwrap(), p);
    }

    #[test]
    fn garbage_base64_regenerates_passphrase() {
        let dir = TempDir::new().unwrap();
        let prefs: Arc<dyn ConfigStore> = Arc::new(MemoryPrefs::new());
        prefs.set(PREFS_NAMESPACE, KEY_ENCRYPTED_PASSPHRASE, "%%%").unwrap();
        prefs.set(PREFS_NAMESPACE, KEY_IV, "%%%").unwrap();

        let km = manager(&dir, prefs);
        let p = km.get_or_create_passphrase().unwrap();
        assert_eq!(km.get_or_create_passphrase().unwrap(), p);
    }
}
