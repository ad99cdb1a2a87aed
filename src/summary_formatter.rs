use crate::replace_task::TaskSummary;
use anyhow::{Context, Result};
use colored::*;
use std::io::IsTerminal;

pub struct SummaryFormatter;

impl SummaryFormatter {
    /// Auto-detect if we should use colors
    pub fn should_use_color() -> bool {
        // Check NO_COLOR env var (https://no-color.org/)
        if std::env::var("NO_COLOR").is_ok() {
            return false;
        }

        std::io::stdout().is_terminal()
    }

    /// One line per file with matches, then a totals line.
    pub fn format_summary(summary: &TaskSummary, use_color: bool) -> String {
        let mut output = String::new();

        for file in summary.files.iter().filter(|f| f.match_count > 0) {
            let path = file.path.display().to_string();
            let status = if file.mutated { "rewritten" } else { "would rewrite" };
            if use_color {
                output.push_str(&format!(
                    "{} {} ({} {})\n",
                    "~".yellow().bold(),
                    path.bold().cyan(),
                    file.match_count.to_string().bold(),
                    status.dimmed()
                ));
            } else {
                output.push_str(&format!("~ {} ({} {})\n", path, file.match_count, status));
            }
        }

        let total = summary.total_matches();
        let mut totals = format!(
            "Total: {} replacement{} in {} of {} file{}",
            total,
            if total == 1 { "" } else { "s" },
            summary.files_matched(),
            summary.files_searched(),
            if summary.files_searched() == 1 { "" } else { "s" },
        );
        if summary.dry_run {
            totals.push_str(" (dry run, nothing written)");
        }

        if use_color {
            output.push_str(&format!("\n{}\n", totals.bold().white()));
        } else {
            output.push_str(&format!("\n{}\n", totals));
        }

        if !summary.skipped.is_empty() {
            let line = format!("{} error(s) skipped:", summary.skipped.len());
            if use_color {
                output.push_str(&format!("{}\n", line.red().bold()));
            } else {
                output.push_str(&format!("{}\n", line));
            }
            for error in &summary.skipped {
                output.push_str(&format!("  {}\n", error));
            }
        }

        output
    }

    pub fn format_json(summary: &TaskSummary) -> Result<String> {
        serde_json::to_string_pretty(summary).context("Failed to serialize summary")
    }
}
