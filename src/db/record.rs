//! Notification row types.

use serde::{Deserialize, Serialize};

/// Name of the single table the store holds.
pub const TABLE_NAME: &str = "notifications";

/// Columns as persisted, in table order.
pub(crate) const SELECT_COLUMNS: &str =
    "id, packageName, title, text, timestamp, isOngoing, category, actionCount";

/// One captured notification, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: i64,
    pub package_name: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    /// Capture time, `YYYY-MM-DD HH:MM:SS` local time.
    pub timestamp: Option<String>,
    pub is_ongoing: bool,
    pub category: Option<String>,
    pub action_count: i64,
}

impl NotificationRecord {
    /// Map a row selected with [`SELECT_COLUMNS`].
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            package_name: row.get(1)?,
            title: row.get(2)?,
            text: row.get(3)?,
            timestamp: row.get(4)?,
            is_ongoing: row.get::<_, Option<bool>>(5)?.unwrap_or(false),
            category: row.get(6)?,
            action_count: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
        })
    }

    /// Short app name: the last dotted segment of the package name.
    ///
    /// `com.whatsapp` → `whatsapp`; missing or empty → `unknown`.
    pub fn app_name(&self) -> &str {
        app_name(self.package_name.as_deref())
    }
}

/// A notification as delivered by the capture listener, before it has an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub package_name: String,
    pub title: Option<String>,
    pub text: Option<String>,
    pub timestamp: String,
    pub is_ongoing: bool,
    pub category: Option<String>,
    pub action_count: i64,
}

pub(crate) fn app_name(package_name: Option<&str>) -> &str {
    match package_name {
        None | Some("") => "unknown",
        Some(pkg) => pkg.rsplit('.').next().filter(|s| !s.is_empty()).unwrap_or(pkg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_name_takes_last_segment() {
        assert_eq!(app_name(Some("com.whatsapp")), "whatsapp");
        assert_eq!(app_name(Some("org.telegram.messenger")), "messenger");
        assert_eq!(app_name(Some("plain")), "plain");
    }

    #[test]
    fn app_name_handles_missing_values() {
        assert_eq!(app_name(None), "unknown");
        assert_eq!(app_name(Some("")), "unknown");
        assert_eq!(app_name(Some("trailing.")), "trailing.");
    }
}
