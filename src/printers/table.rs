//! Terminal table renderer.

use crate::checks::types::Severity;
use crate::printers::sorted_checks;
use crate::report::{CheckStatus, Report};
use colored::{ColoredString, Colorize};
use prettytable::{Cell, Row, Table, format};

fn severity_cell(severity: Severity) -> ColoredString {
    let text = severity.as_str();
    match severity {
        Severity::Critical => text.red().bold(),
        Severity::High => text.red(),
        Severity::Medium => text.yellow(),
        Severity::Low => text.blue(),
        Severity::Unknown => text.normal(),
    }
}

fn status_cell(status: CheckStatus) -> ColoredString {
    let text = status.as_str();
    match status {
        CheckStatus::Passed => text.green(),
        CheckStatus::Skipped => text.yellow(),
        CheckStatus::Failed => text.red(),
        CheckStatus::Error => text.red().bold(),
        CheckStatus::Unknown => text.normal(),
    }
}

/// Format a report as a table with one row per check, followed by any
/// check errors.
pub fn format(report: &Report) -> String {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.set_titles(Row::new(
        ["SEVERITY", "ID", "CHECK", "STATUS", "FAILED", "PASSED", "SKIPPED"]
            .iter()
            .map(|title| Cell::new(title))
            .collect(),
    ));

    let checks = sorted_checks(report);
    for check in &checks {
        table.add_row(Row::new(vec![
            Cell::new(&severity_cell(check.severity).to_string()),
            Cell::new(&check.id),
            Cell::new(&check.message),
            Cell::new(&status_cell(check.status).to_string()),
            Cell::new(&check.total_failed.to_string()),
            Cell::new(&check.total_passed.to_string()),
            Cell::new(&check.total_skipped.to_string()),
        ]));
    }

    let mut output = String::new();
    if let Some(version) = &report.kube_version {
        output.push_str(&format!("Kubernetes {}\n\n", version.git_version));
    }
    output.push_str(&table.to_string());

    let errors: Vec<(&str, &String)> = checks
        .iter()
        .flat_map(|c| c.errors.iter().map(move |e| (c.id.as_str(), e)))
        .collect();
    if !errors.is_empty() {
        output.push_str(&format!("\n{}\n", "Errors:".red().bold()));
        for (id, error) in errors {
            output.push_str(&format!("  {}: {}\n", id, error));
        }
    }

    let failed = checks.iter().filter(|c| c.status == CheckStatus::Failed).count();
    output.push_str(&format!(
        "\n{} checks, {} failed, {} with errors\n",
        checks.len(),
        failed,
        checks.iter().filter(|c| c.status == CheckStatus::Error).count(),
    ));

    output
}
