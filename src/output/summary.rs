use std::fmt::Write;

use crate::collector::CollectionReport;
use crate::records::RunRecord;
use crate::usage::{DailyUsage, OsUsage, UsageTotals};

use super::styling::{bright, bright_green, bright_red, bright_yellow, dim};
use super::tables::{color_coded_minutes_cell, conclusion_cell, create_table, header};
use comfy_table::Cell;

/// Persisted artifacts rendered by `actionboard report`.
pub struct StoredUsage<'a> {
    pub runs: &'a [RunRecord],
    pub failed: &'a [RunRecord],
    pub daily: &'a DailyUsage,
    pub os_usage: &'a OsUsage,
}

/// Prints the outcome of a collection pass to stdout.
pub fn print_collection_summary(report: &CollectionReport) {
    println!("{}", render_collection_summary(report));
}

/// Prints the persisted usage data to stdout.
///
/// Shows the most recent days of the trend, the most expensive runs, the
/// latest failures and per-repository totals.
pub fn print_report(usage: &StoredUsage<'_>, top: usize) {
    println!("{}", render_report(usage, top));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn format_timestamp(value: Option<chrono::DateTime<chrono::Utc>>) -> String {
    value.map_or_else(
        || "none".to_string(),
        |t| t.format("%Y-%m-%d %H:%M UTC").to_string(),
    )
}

fn render_collection_summary(report: &CollectionReport) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Collection");

    let failures = if report.new_failures == 0 {
        bright_green(report.new_failures)
    } else {
        bright_red(report.new_failures)
    };
    let remaining = report
        .remaining_api_calls
        .map_or_else(|| "unknown".to_string(), |n| n.to_string());

    let _ = write!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n\n",
        dim("Organization:"),
        bright(&report.organization),
        dim("Repositories scanned:"),
        bright_yellow(report.repositories),
        dim("New runs:"),
        bright_yellow(report.new_runs),
        dim("Already processed:"),
        dim(report.skipped_runs),
        dim("New failures:"),
        failures,
        dim("Collected after:"),
        dim(format_timestamp(report.threshold)),
        dim("Watermark:"),
        dim(format_timestamp(report.watermark)),
        dim("Remaining API calls:"),
        bright_yellow(remaining),
    );

    if report.minutes_by_day.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow("No new workflow runs found."));
        return output;
    }

    add_section_header(&mut output, "📅", "Minutes by Day");
    let mut table = create_table();
    table.set_header(header(&["Date", "Total"]));
    for (date, minutes) in &report.minutes_by_day {
        table.add_row(vec![Cell::new(date), color_coded_minutes_cell(*minutes)]);
    }
    let _ = writeln!(output, "{table}");

    output
}

#[allow(clippy::cast_precision_loss)]
fn render_report(usage: &StoredUsage<'_>, top: usize) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Overview");
    let total_minutes: f64 = usage.daily.values().sum();
    let _ = write!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n\n",
        dim("Runs recorded:"),
        bright_yellow(usage.runs.len()),
        dim("Failed runs:"),
        bright_red(usage.failed.len()),
        dim("Days tracked:"),
        bright_yellow(usage.daily.len()),
        dim("Total minutes:"),
        bright_yellow(format!("{total_minutes:.2}")),
    );

    if usage.runs.is_empty() && usage.daily.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow("No usage data found."));
        return output;
    }

    add_section_header(&mut output, "📅", &format!("Last {top} Days"));
    let mut trend = create_table();
    trend.set_header(header(&["Date", "Total", "By OS"]));
    for (date, minutes) in usage.daily.iter().rev().take(top) {
        let by_os = usage.os_usage.get(date).map_or_else(String::new, |labels| {
            labels
                .iter()
                .map(|(label, ms)| format!("{label}: {:.2}min", *ms as f64 / 60_000.0))
                .collect::<Vec<_>>()
                .join("\n")
        });
        trend.add_row(vec![
            Cell::new(date),
            color_coded_minutes_cell(*minutes),
            Cell::new(by_os),
        ]);
    }
    let _ = writeln!(output, "{trend}\n");

    add_section_header(&mut output, "🐌", &format!("Top {top} Most Expensive Runs"));
    let mut expensive: Vec<&RunRecord> = usage.runs.iter().collect();
    expensive.sort_by(|a, b| b.total_time_minutes.total_cmp(&a.total_time_minutes));
    let mut runs_table = create_table();
    runs_table.set_header(header(&["#", "Repository", "Workflow", "Status", "Minutes", "Run"]));
    for (idx, run) in expensive.iter().take(top).enumerate() {
        runs_table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(&run.repo),
            Cell::new(&run.workflow_name),
            conclusion_cell(run.status),
            color_coded_minutes_cell(run.total_time_minutes),
            Cell::new(&run.html_url),
        ]);
    }
    let _ = writeln!(output, "{runs_table}\n");

    add_section_header(&mut output, "📦", "Minutes by Repository");
    let mut per_repo: UsageTotals<&str, f64> = UsageTotals::default();
    for run in usage.runs {
        per_repo.add(run.repo.as_str(), run.total_time_minutes);
    }
    let mut repos: Vec<_> = per_repo.iter().collect();
    repos.sort_by(|a, b| b.1.total_cmp(a.1));
    let mut repo_table = create_table();
    repo_table.set_header(header(&["Repository", "Total"]));
    for (repo, minutes) in repos.into_iter().take(top) {
        repo_table.add_row(vec![Cell::new(repo), color_coded_minutes_cell(*minutes)]);
    }
    let _ = writeln!(output, "{repo_table}\n");

    add_section_header(&mut output, "❌", "Recent Failures");
    if usage.failed.is_empty() {
        let _ = writeln!(output, "  {}", bright_green("No failed runs recorded."));
    } else {
        let mut failed: Vec<&RunRecord> = usage.failed.iter().collect();
        failed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut failed_table = create_table();
        failed_table.set_header(header(&["Created", "Repository", "Workflow", "Run"]));
        for run in failed.into_iter().take(top) {
            failed_table.add_row(vec![
                Cell::new(run.created_at.format("%Y-%m-%d %H:%M")),
                Cell::new(&run.repo),
                Cell::new(&run.workflow_name),
                Cell::new(&run.html_url),
            ]);
        }
        let _ = writeln!(output, "{failed_table}");
    }

    output
}
