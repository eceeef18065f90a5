//! `notme clear`: delete every stored notification.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{open_store, Cli};
use crate::errors::{Result, StoreError};

/// Execute the `clear` command.
pub fn execute(cli: &Cli, force: bool) -> Result<()> {
    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt("Delete ALL stored notifications?")
            .default(false)
            .interact()
            .map_err(|e| StoreError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    let store = open_store(cli)?;
    let removed = store.delete_all()?;
    output::success(&format!("Deleted {removed} notification(s)"));
    output::tip("Run `notme compact` to reclaim the freed space.");

    Ok(())
}
