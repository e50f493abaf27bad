//! JSON renderer.

use crate::report::Report;

/// Format a report as pretty-printed JSON.
pub fn format(report: &Report) -> String {
    let mut output = serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
    output.push('\n');
    output
}
