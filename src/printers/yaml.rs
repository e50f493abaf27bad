//! YAML renderer.

use crate::report::Report;

/// Format a report as YAML.
pub fn format(report: &Report) -> String {
    serde_yaml::to_string(report).unwrap_or_else(|e| format!("# failed to render report: {}\n", e))
}
