//! `notme compact`: rebuild the store file to reclaim free pages.

use crate::cli::output;
use crate::cli::{open_store, Cli};
use crate::errors::Result;

/// Execute the `compact` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let store = open_store(cli)?;
    let report = store.compact()?;

    output::success(&format!(
        "Compacted store: {} -> {}",
        output::format_bytes(report.before_bytes),
        output::format_bytes(report.after_bytes)
    ));
    if report.saved_bytes() > 0 {
        output::info(&format!(
            "Reclaimed {}",
            output::format_bytes(report.saved_bytes().unsigned_abs())
        ));
    }

    Ok(())
}
