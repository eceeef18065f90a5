//! `notme add`: record one notification, as the capture listener would.

use chrono::{Local, NaiveDateTime};

use crate::cli::output;
use crate::cli::{open_store, Cli};
use crate::db::NewNotification;
use crate::errors::{Result, StoreError};

/// Timestamp layout used throughout the store.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Arguments of `notme add`.
pub struct AddArgs<'a> {
    pub package: &'a str,
    pub title: Option<&'a str>,
    pub text: Option<&'a str>,
    pub category: Option<&'a str>,
    pub ongoing: bool,
    pub actions: i64,
    pub timestamp: Option<&'a str>,
}

/// Execute the `add` command.
pub fn execute(cli: &Cli, args: AddArgs<'_>) -> Result<()> {
    let record = build_record(&args)?;
    let store = open_store(cli)?;
    let id = store.insert(&record)?;

    output::success(&format!(
        "Stored notification #{id} from {}",
        record.package_name
    ));
    Ok(())
}

fn build_record(args: &AddArgs<'_>) -> Result<NewNotification> {
    if args.package.trim().is_empty() {
        return Err(StoreError::CommandFailed("package name cannot be empty".into()));
    }
    if args.actions < 0 {
        return Err(StoreError::CommandFailed(
            "action count cannot be negative".into(),
        ));
    }

    let timestamp = match args.timestamp {
        Some(ts) => {
            NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).map_err(|e| {
                StoreError::CommandFailed(format!(
                    "invalid timestamp '{ts}' (expected YYYY-MM-DD HH:MM:SS): {e}"
                ))
            })?;
            ts.to_string()
        }
        None => Local::now().format(TIMESTAMP_FORMAT).to_string(),
    };

    Ok(NewNotification {
        package_name: args.package.to_string(),
        title: args.title.map(String::from),
        text: args.text.map(String::from),
        timestamp,
        is_ongoing: args.ongoing,
        category: args.category.map(String::from),
        action_count: args.actions,
    })
}
