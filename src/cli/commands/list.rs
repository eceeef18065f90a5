//! `notme list`: display stored notifications, newest first.

use crate::cli::output;
use crate::cli::{open_store, Cli};
use crate::errors::{Result, StoreError};

/// Execute the `list` command.
pub fn execute(cli: &Cli, limit: Option<usize>, json: bool) -> Result<()> {
    let store = open_store(cli)?;
    let mut records = store.get_all()?;
    let total = records.len();
    if let Some(limit) = limit {
        records.truncate(limit);
    }

    if json {
        let rendered = serde_json::to_string_pretty(&records)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        println!("{rendered}");
        return Ok(());
    }

    output::info(&format!(
        "Showing {} of {total} notification(s)",
        records.len()
    ));
    output::print_records_table(&records);

    Ok(())
}
