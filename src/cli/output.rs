//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::db::{Count, NotificationRecord};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print notifications as a table (Id, Time, App, Title, Text, Category).
pub fn print_records_table(records: &[NotificationRecord]) {
    if records.is_empty() {
        info("No notifications stored yet.");
        tip("Run `notme add <PACKAGE> --title ... --text ...` to record one.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Id", "Time", "App", "Title", "Text", "Category"]);

    for r in records {
        let mut title = r.title.clone().unwrap_or_default();
        if r.is_ongoing {
            title.push_str(" (ongoing)");
        }
        table.add_row(vec![
            r.id.to_string(),
            r.timestamp.clone().unwrap_or_default(),
            r.app_name().to_string(),
            title,
            r.text.clone().unwrap_or_default(),
            r.category.clone().unwrap_or_default(),
        ]);
    }

    println!("{table}");
}

/// Print grouped counts as a two-column table.
pub fn print_counts_table(label: &str, counts: &[Count]) {
    if counts.is_empty() {
        info("Nothing to count yet.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![label, "Count"]);
    for c in counts {
        table.add_row(vec![c.key.clone(), c.count.to_string()]);
    }

    println!("{table}");
}

/// Human-readable byte size (`1.5 KiB`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_scales() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }
}
