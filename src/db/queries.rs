//! Read-only reporting queries over the open store.
//!
//! Aggregates (by app, category, hour, day), filtered search, summary
//! statistics, and `VACUUM`-based compaction.

use std::collections::HashMap;
use std::fs;

use serde::Serialize;
use tracing::info;

use super::record::{app_name, NotificationRecord, SELECT_COLUMNS, TABLE_NAME};
use super::store::NotificationStore;
use crate::errors::{Result, StoreError};

/// A grouping key with its notification count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Count {
    pub key: String,
    pub count: i64,
}

/// Sort order for [`NotificationStore::search`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Package,
}

impl std::str::FromStr for SortOrder {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "package" | "app" => Ok(Self::Package),
            other => Err(StoreError::CommandFailed(format!(
                "unknown sort order '{other}' (expected newest, oldest or package)"
            ))),
        }
    }
}

/// Search criteria. Empty fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Case-insensitive substring over package name, title and text.
    pub query: Option<String>,
    /// Exact package name.
    pub package: Option<String>,
    /// Exact category.
    pub category: Option<String>,
    pub sort: SortOrder,
    pub limit: Option<usize>,
}

/// Summary returned by [`NotificationStore::stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub total: i64,
    pub oldest: Option<String>,
    pub newest: Option<String>,
    pub size_bytes: u64,
}

/// File sizes around a [`NotificationStore::compact`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactReport {
    pub before_bytes: u64,
    pub after_bytes: u64,
}

impl CompactReport {
    pub fn saved_bytes(&self) -> i64 {
        self.before_bytes as i64 - self.after_bytes as i64
    }
}

impl NotificationStore {
    /// Counts per app name (last package segment), largest first.
    pub fn counts_by_package(&self) -> Result<Vec<Count>> {
        let per_package = self.grouped(
            "SELECT packageName, COUNT(*) FROM notifications GROUP BY packageName",
        )?;

        let mut per_app: HashMap<String, i64> = HashMap::new();
        for (package, count) in per_package {
            *per_app
                .entry(app_name(package.as_deref()).to_string())
                .or_default() += count;
        }

        let mut counts: Vec<Count> = per_app
            .into_iter()
            .map(|(key, count)| Count { key, count })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        Ok(counts)
    }

    /// Counts per category, largest first; NULL counts as `uncategorized`.
    pub fn counts_by_category(&self) -> Result<Vec<Count>> {
        self.counts(
            "SELECT COALESCE(category, 'uncategorized') AS k, COUNT(*) AS n
             FROM notifications GROUP BY k ORDER BY n DESC, k",
        )
    }

    /// Counts per hour of day (`00`–`23`), in hour order.
    pub fn counts_by_hour(&self) -> Result<Vec<Count>> {
        self.counts(
            "SELECT substr(timestamp, 12, 2) AS k, COUNT(*)
             FROM notifications WHERE length(timestamp) >= 13
             GROUP BY k ORDER BY k",
        )
    }

    /// Counts per calendar day (`YYYY-MM-DD`), in date order.
    pub fn counts_by_day(&self) -> Result<Vec<Count>> {
        self.counts(
            "SELECT substr(timestamp, 1, 10) AS k, COUNT(*)
             FROM notifications WHERE length(timestamp) >= 10
             GROUP BY k ORDER BY k",
        )
    }

    /// Filtered, sorted search.
    pub fn search(&self, filter: &SearchFilter) -> Result<Vec<NotificationRecord>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(q) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", escape_like(q));
            clauses.push(
                "(packageName LIKE ? ESCAPE '\\' OR title LIKE ? ESCAPE '\\' OR text LIKE ? ESCAPE '\\')",
            );
            for _ in 0..3 {
                params.push(Box::new(pattern.clone()));
            }
        }
        if let Some(pkg) = filter.package.as_deref() {
            clauses.push("packageName = ?");
            params.push(Box::new(pkg.to_string()));
        }
        if let Some(cat) = filter.category.as_deref() {
            clauses.push("category = ?");
            params.push(Box::new(cat.to_string()));
        }

        let mut sql = format!("SELECT {SELECT_COLUMNS} FROM {TABLE_NAME}");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(match filter.sort {
            SortOrder::Newest => " ORDER BY timestamp DESC, id DESC",
            SortOrder::Oldest => " ORDER BY timestamp ASC, id ASC",
            SortOrder::Package => " ORDER BY packageName ASC, id DESC",
        });
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| &**p).collect();
        let rows = stmt.query_map(params_refs.as_slice(), NotificationRecord::from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Row count, timestamp range, and file size.
    pub fn stats(&self) -> Result<StoreStats> {
        let (total, oldest, newest) = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT COUNT(*), MIN(timestamp), MAX(timestamp) FROM notifications",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?
        };

        Ok(StoreStats {
            total,
            oldest,
            newest,
            size_bytes: self.file_size(),
        })
    }

    /// Rebuild the store file with `VACUUM`, reclaiming free pages.
    pub fn compact(&self) -> Result<CompactReport> {
        let before_bytes = self.file_size();
        self.conn()?.execute_batch("VACUUM;")?;
        let after_bytes = self.file_size();

        info!(before_bytes, after_bytes, "compacted notification store");
        Ok(CompactReport {
            before_bytes,
            after_bytes,
        })
    }

    fn file_size(&self) -> u64 {
        fs::metadata(self.path()).map(|m| m.len()).unwrap_or(0)
    }

    fn grouped(&self, sql: &str) -> Result<Vec<(Option<String>, i64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn counts(&self, sql: &str) -> Result<Vec<Count>> {
        Ok(self
            .grouped(sql)?
            .into_iter()
            .map(|(key, count)| Count {
                key: key.unwrap_or_default(),
                count,
            })
            .collect())
    }
}

/// Escape `LIKE` wildcards so the query matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Passphrase;
    use crate::db::record::NewNotification;
    use tempfile::TempDir;

    fn seeded() -> (TempDir, NotificationStore) {
        let dir = TempDir::new().unwrap();
        let store = NotificationStore::open(
            &dir.path().join("q.db"),
            &Passphrase::from_bytes([4u8; 32]),
        )
        .unwrap();

        let rows = [
            ("com.whatsapp", "Alice", "hi there", "2024-01-01 10:00:00", Some("msg")),
            ("com.whatsapp", "Bob", "50% off", "2024-01-01 10:30:00", Some("msg")),
            ("org.mail.gmail", "Invoice", "due", "2024-01-02 09:00:00", Some("email")),
            ("org.system", "Sync", "running", "2024-01-02 23:15:00", None),
        ];
        for (pkg, title, text, ts, cat) in rows {
            store
                .insert(&NewNotification {
                    package_name: pkg.into(),
                    title: Some(title.into()),
                    text: Some(text.into()),
                    timestamp: ts.into(),
                    is_ongoing: false,
                    category: cat.map(String::from),
                    action_count: 0,
                })
                .unwrap();
        }
        (dir, store)
    }

    #[test]
    fn counts_by_package_groups_on_app_name() {
        let (_dir, store) = seeded();
        let counts = store.counts_by_package().unwrap();
        assert_eq!(
            counts[0],
            Count {
                key: "whatsapp".into(),
                count: 2
            }
        );
        assert_eq!(counts.len(), 3);
    }

    #[test]
    fn counts_by_category_labels_null() {
        let (_dir, store) = seeded();
        let counts = store.counts_by_category().unwrap();
        assert_eq!(counts[0].key, "msg");
        assert!(counts.iter().any(|c| c.key == "uncategorized" && c.count == 1));
    }

    #[test]
    fn counts_by_hour_and_day() {
        let (_dir, store) = seeded();
        let hours = store.counts_by_hour().unwrap();
        assert_eq!(hours[0], Count { key: "09".into(), count: 1 });
        assert!(hours.iter().any(|c| c.key == "10" && c.count == 2));

        let days = store.counts_by_day().unwrap();
        assert_eq!(
            days,
            vec![
                Count { key: "2024-01-01".into(), count: 2 },
                Count { key: "2024-01-02".into(), count: 2 },
            ]
        );
    }

    #[test]
    fn search_is_case_insensitive_and_literal() {
        let (_dir, store) = seeded();
        let hits = store
            .search(&SearchFilter {
                query: Some("ALICE".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 1);

        // `%` in the query is a literal, not a wildcard.
        let hits = store
            .search(&SearchFilter {
                query: Some("50%".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title.as_deref(), Some("Bob"));
    }

    #[test]
    fn search_filters_and_sorts() {
        let (_dir, store) = seeded();
        let hits = store
            .search(&SearchFilter {
                package: Some("com.whatsapp".into()),
                sort: SortOrder::Oldest,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title.as_deref(), Some("Alice"));

        let hits = store
            .search(&SearchFilter {
                category: Some("email".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 1);

        let hits = store
            .search(&SearchFilter {
                limit: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hits[0].timestamp.as_deref(), Some("2024-01-02 23:15:00"));
    }

    #[test]
    fn stats_reports_range() {
        let (_dir, store) = seeded();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.oldest.as_deref(), Some("2024-01-01 10:00:00"));
        assert_eq!(stats.newest.as_deref(), Some("2024-01-02 23:15:00"));
        assert!(stats.size_bytes > 0);
    }

    #[test]
    fn compact_keeps_rows() {
        let (_dir, store) = seeded();
        store.delete_all().unwrap();
        let report = store.compact().unwrap();
        assert!(report.after_bytes <= report.before_bytes);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn sort_order_parses() {
        assert_eq!("newest".parse::<SortOrder>().unwrap(), SortOrder::Newest);
        assert_eq!("Package".parse::<SortOrder>().unwrap(), SortOrder::Package);
        assert!("sideways".parse::<SortOrder>().is_err());
    }
}
