//! Markdown renderer.

use crate::printers::sorted_checks;
use crate::report::{Buckets, Report};

fn escape(text: &str) -> String {
    text.replace('|', "\\|")
}

fn push_buckets(output: &mut String, title: &str, buckets: &Buckets) {
    if buckets.is_empty() {
        return;
    }
    output.push_str(&format!("\n**{}**\n\n", title));
    for (resource, names) in buckets {
        for name in names {
            output.push_str(&format!("- `{}` {}\n", resource, name));
        }
    }
}

/// Format a report as a Markdown summary table plus one section per check
/// that failed or errored.
pub fn format(report: &Report) -> String {
    let checks = sorted_checks(report);
    let mut output = String::from("# Compliance report\n\n");

    if let Some(version) = &report.kube_version {
        output.push_str(&format!("Kubernetes version: `{}`\n\n", version.git_version));
    }

    output.push_str("| Severity | ID | Check | Status | Failed | Passed | Skipped |\n");
    output.push_str("|---|---|---|---|---:|---:|---:|\n");
    for check in &checks {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            check.severity,
            escape(&check.id),
            escape(&check.message),
            check.status,
            check.total_failed,
            check.total_passed,
            check.total_skipped,
        ));
    }

    for check in checks.iter().filter(|c| c.total_failed > 0 || c.has_error()) {
        output.push_str(&format!("\n## {} {}\n", check.id, check.message));
        push_buckets(&mut output, "Failed", &check.failed);
        if !check.errors.is_empty() {
            output.push_str("\n**Errors**\n\n");
            for error in &check.errors {
                output.push_str(&format!("- {}\n", error));
            }
        }
    }

    output
}
