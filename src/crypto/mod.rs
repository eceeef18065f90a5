//! Cryptographic pieces of the store bootstrap.
//!
//! This module provides:
//! - The in-memory store `Passphrase` (`passphrase`)
//! - AES-256-GCM seal/open with a detached nonce (`encryption`)
//! - `KeyManager`, which wraps the passphrase under a master key (`key_manager`)

pub mod encryption;
pub mod key_manager;
pub mod passphrase;

pub use encryption::{open, seal};
pub use key_manager::KeyManager;
pub use passphrase::{Passphrase, PASSPHRASE_LEN};
