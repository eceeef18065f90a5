//! Encrypted notification store.
//!
//! This module provides:
//! - Row types `NotificationRecord` / `NewNotification` (`record`)
//! - SQLCipher open and probe helpers (`cipher`)
//! - The `NotificationStore` DAO (`store`) and its reporting queries (`queries`)

pub mod cipher;
pub mod queries;
pub mod record;
pub mod store;

pub use queries::{CompactReport, Count, SearchFilter, SortOrder, StoreStats};
pub use record::{NewNotification, NotificationRecord, TABLE_NAME};
pub use store::NotificationStore;
