//! `notme search`: filtered, sorted search over stored notifications.

use crate::cli::output;
use crate::cli::{open_store, Cli};
use crate::db::{SearchFilter, SortOrder};
use crate::errors::Result;

/// Execute the `search` command.
pub fn execute(
    cli: &Cli,
    query: &str,
    package: Option<&str>,
    category: Option<&str>,
    sort: &str,
    limit: Option<usize>,
) -> Result<()> {
    let filter = SearchFilter {
        query: Some(query.to_string()),
        package: package.map(String::from),
        category: category.map(String::from),
        sort: sort.parse::<SortOrder>()?,
        limit,
    };

    let store = open_store(cli)?;
    let hits = store.search(&filter)?;

    output::info(&format!("{} match(es) for '{query}'", hits.len()));
    output::print_records_table(&hits);

    Ok(())
}
