//! `notme status`: show where things live and what state they are in.

use comfy_table::{ContentArrangement, Table};

use crate::cli::{bootstrap, data_dir, Cli};
use crate::errors::Result;

/// Execute the `status` command.
///
/// Only opens the store once migration is complete, so checking status
/// never triggers a migration.
pub fn execute(cli: &Cli) -> Result<()> {
    let dir = data_dir(cli)?;
    let bootstrap = bootstrap(cli)?;
    let layout = bootstrap.migration().layout();
    let key_manager = bootstrap.key_manager();

    let migrated = bootstrap.migration().is_complete()?;
    let store_exists = layout.live().exists();

    let rows = if migrated && store_exists {
        bootstrap.get_store()?.count()?.to_string()
    } else {
        "-".to_string()
    };

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Item", "Value"]);
    table.add_row(vec!["Data directory".to_string(), dir.display().to_string()]);
    table.add_row(vec![
        "Store file".to_string(),
        format!(
            "{} ({})",
            layout.live().display(),
            if store_exists { "present" } else { "missing" }
        ),
    ]);
    table.add_row(vec![
        "Key backend".to_string(),
        key_manager.backend_name().to_string(),
    ]);
    table.add_row(vec![
        "Wrapped passphrase".to_string(),
        yes_no(key_manager.has_wrapped_passphrase()?).to_string(),
    ]);
    table.add_row(vec!["Migration complete".to_string(), yes_no(migrated).to_string()]);
    table.add_row(vec![
        "Pending backup".to_string(),
        yes_no(layout.backup().exists()).to_string(),
    ]);
    table.add_row(vec!["Notifications".to_string(), rows]);

    println!("{table}");
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
