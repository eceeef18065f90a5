//! Configuration: TOML settings and namespaced key-value preferences.

pub mod prefs;
pub mod settings;

pub use prefs::{ConfigStore, FilePrefs, MemoryPrefs};
pub use settings::{KeyBackend, Settings};
