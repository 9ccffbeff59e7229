//! Log command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::query_log::{LogSummary, QueryLog};
use anyhow::Result;
use console::style;

/// Run the log command.
pub fn run_log(tail: Option<usize>, settings: Settings) -> Result<()> {
    let log = QueryLog::new(settings.query_log_path());
    let entries = log.read_entries()?;

    if entries.is_empty() {
        Output::info(&format!("No queries logged yet ({})", log.path().display()));
        return Ok(());
    }

    Output::header("Query log");
    Output::kv("File", &log.path().display().to_string());
    print_summary(&LogSummary::from_entries(&entries));

    if let Some(n) = tail {
        let start = entries.len().saturating_sub(n);
        for entry in &entries[start..] {
            let top = entry
                .top_similarity
                .map(|s| format!("{:.3}", s))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {} {} {} (top {}) {}",
                style(entry.timestamp.format("%Y-%m-%d %H:%M:%S")).dim(),
                style(entry.outcome).bold(),
                style("|").dim(),
                top,
                entry.query
            );
        }
    }

    Ok(())
}

/// Print outcome totals.
pub(super) fn print_summary(summary: &LogSummary) {
    Output::info(&format!(
        "Query log: {} total queries ({} answered, {} rejected, {} aborted)",
        summary.total,
        summary.answered,
        summary.rejected(),
        summary.aborted
    ));
}
