//! `notme stats`: summary statistics and per-key breakdowns.

use crate::cli::output;
use crate::cli::{open_store, Cli};
use crate::errors::{Result, StoreError};

/// Execute the `stats` command.
pub fn execute(cli: &Cli, by: Option<&str>) -> Result<()> {
    let breakdown = by.map(Breakdown::parse).transpose()?;
    let store = open_store(cli)?;

    let Some(breakdown) = breakdown else {
        let stats = store.stats()?;
        output::info(&format!("{} notification(s)", stats.total));
        if let (Some(oldest), Some(newest)) = (&stats.oldest, &stats.newest) {
            output::info(&format!("From {oldest} to {newest}"));
        }
        output::info(&format!(
            "Store size: {}",
            output::format_bytes(stats.size_bytes)
        ));

        let mut top = store.counts_by_package()?;
        top.truncate(5);
        output::print_counts_table("Top apps", &top);
        return Ok(());
    };

    let counts = match breakdown {
        Breakdown::Package => store.counts_by_package()?,
        Breakdown::Category => store.counts_by_category()?,
        Breakdown::Hour => store.counts_by_hour()?,
        Breakdown::Day => store.counts_by_day()?,
    };
    output::print_counts_table(breakdown.label(), &counts);

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Breakdown {
    Package,
    Category,
    Hour,
    Day,
}

impl Breakdown {
    fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "package" | "app" => Ok(Self::Package),
            "category" => Ok(Self::Category),
            "hour" => Ok(Self::Hour),
            "day" | "date" => Ok(Self::Day),
            other => Err(StoreError::CommandFailed(format!(
                "unknown breakdown '{other}' (supported: package, category, hour, day)"
            ))),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Package => "App",
            Self::Category => "Category",
            Self::Hour => "Hour",
            Self::Day => "Day",
        }
    }
}
