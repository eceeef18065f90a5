//! `notme init`: bootstrap the store and report what happened.

use crate::cli::output;
use crate::cli::{bootstrap, Cli};
use crate::errors::Result;
use crate::migration::MigrationOutcome;

/// Execute the `init` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let handle = bootstrap(cli)?.get_store()?;

    match handle.migration_outcome() {
        Some(MigrationOutcome::FreshInstall) => {
            output::success("Created a new encrypted store.");
        }
        Some(MigrationOutcome::Migrated { rows }) => {
            output::success(&format!(
                "Migrated {rows} notification(s) from the legacy store into an encrypted store."
            ));
        }
        Some(MigrationOutcome::AlreadyEncrypted | MigrationOutcome::AlreadyComplete) => {
            output::info("Store is already encrypted.");
        }
        None => {}
    }

    if let Some(e) = handle.migration_error() {
        output::warning(&format!("Legacy store migration failed: {e}"));
        output::tip("The store on disk was opened as-is; migration is retried on the next run.");
    }

    output::info(&format!(
        "{} notification(s) at {}",
        handle.count()?,
        handle.path().display()
    ));
    output::tip("Run `notme add <PACKAGE>` to record a notification.");
    output::tip("Run `notme list` to see stored notifications.");

    Ok(())
}
