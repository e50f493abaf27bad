//! Report renderers.
//!
//! Every renderer takes a finished [`Report`] and returns a string; none of
//! them mutate the report.

pub mod json;
pub mod markdown;
pub mod table;
pub mod yaml;

use crate::report::{CheckResult, Report};
use clap::ValueEnum;
use std::cmp::Reverse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
    Markdown,
}

/// Render a report in the given format.
pub fn format_report_to_string(report: &Report, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => table::format(report),
        OutputFormat::Json => json::format(report),
        OutputFormat::Yaml => yaml::format(report),
        OutputFormat::Markdown => markdown::format(report),
    }
}

/// Render and print a report.
pub fn print_report(report: &Report, format: OutputFormat) {
    print!("{}", format_report_to_string(report, format));
}

/// Checks ordered for display: most severe first, then most failures, then
/// most passes, then by ID.
pub fn sorted_checks(report: &Report) -> Vec<&CheckResult> {
    let mut checks: Vec<&CheckResult> = report.checks.iter().collect();
    checks.sort_by_key(|c| {
        (
            Reverse(c.severity),
            Reverse(c.total_failed),
            Reverse(c.total_passed),
            c.id.clone(),
        )
    });
    checks
}
