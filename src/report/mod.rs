//! Scan results.
//!
//! A [`Report`] holds one [`CheckResult`] per check plus the index of every
//! resource type observed during the scan. Results are append-only; the
//! status of a check is recomputed each time a bucket changes.

pub mod status;

use crate::checks::types::{Check, KubeVersion, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use status::CheckStatus;

/// Objects grouped by `"apiVersion/Kind"`.
pub type Buckets = BTreeMap<String, Vec<String>>;

/// Outcome of one check across all matched objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub id: String,
    pub message: String,
    pub severity: Severity,
    pub builtin: bool,
    pub path: String,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failed: Buckets,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub passed: Buckets,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub skipped: Buckets,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub total_failed: usize,
    pub total_passed: usize,
    pub total_skipped: usize,
}

impl CheckResult {
    pub fn new(check: &Check) -> Self {
        let mut result = Self {
            id: check.id.clone(),
            message: check.message.clone(),
            severity: check.severity,
            builtin: check.builtin,
            path: check.path.clone(),
            ..Default::default()
        };
        result.update_status();
        result
    }

    pub fn add_failed(&mut self, resource: &str, name: &str) {
        push(&mut self.failed, resource, name);
        self.total_failed += 1;
        self.update_status();
    }

    pub fn add_passed(&mut self, resource: &str, name: &str) {
        push(&mut self.passed, resource, name);
        self.total_passed += 1;
        self.update_status();
    }

    pub fn add_skipped(&mut self, resource: &str, name: &str) {
        push(&mut self.skipped, resource, name);
        self.total_skipped += 1;
        self.update_status();
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.update_status();
    }

    pub fn update_status(&mut self) {
        self.status = CheckStatus::derive(
            self.errors.len(),
            self.total_failed,
            self.total_passed,
            self.total_skipped,
        );
    }

    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }
}

fn push(buckets: &mut Buckets, resource: &str, name: &str) {
    buckets
        .entry(resource.to_string())
        .or_default()
        .push(name.to_string());
}

/// The result of one scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_version: Option<KubeVersion>,
    pub checks: Vec<CheckResult>,
    /// `"apiVersion/Kind"` to `"group/version/resource"` of every object
    /// seen during the scan.
    #[serde(default)]
    pub gvrs: BTreeMap<String, String>,
}

impl Report {
    pub fn new(kube_version: Option<KubeVersion>) -> Self {
        Self {
            kube_version,
            ..Default::default()
        }
    }

    pub fn add_check(&mut self, result: CheckResult) {
        self.checks.push(result);
    }

    /// Record a resource type. The first mapping seen for a key is kept.
    pub fn add_gvr(&mut self, resource: &str, gvr: &str) {
        self.gvrs
            .entry(resource.to_string())
            .or_insert_with(|| gvr.to_string());
    }

    pub fn has_error(&self) -> bool {
        self.checks.iter().any(CheckResult::has_error)
    }

    pub fn has_failure(&self) -> bool {
        self.checks.iter().any(|c| c.total_failed > 0)
    }
}

/// `"apiVersion/Kind"` of an object.
pub fn resource_key(object: &serde_json::Value) -> String {
    let field = |name: &str| {
        object
            .get(name)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
    };
    format!("{}/{}", field("apiVersion"), field("kind"))
}

/// `"namespace/name"`, or the bare name for cluster-scoped objects.
pub fn object_name(object: &serde_json::Value) -> String {
    let metadata = object.get("metadata");
    let field = |name: &str| {
        metadata
            .and_then(|m| m.get(name))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
    };
    match field("namespace") {
        "" => field("name").to_string(),
        namespace => format!("{}/{}", namespace, field("name")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result() -> CheckResult {
        CheckResult::new(
            &Check::new("KS-1")
                .with_message("msg")
                .with_severity(Severity::High)
                .with_path("a.yaml"),
        )
    }

    #[test]
    fn test_new_result_carries_check_metadata() {
        let result = result();
        assert_eq!(result.id, "KS-1");
        assert_eq!(result.severity, Severity::High);
        assert_eq!(result.path, "a.yaml");
        assert_eq!(result.status, CheckStatus::Passed);
    }

    #[test]
    fn test_buckets_preserve_order_and_duplicates() {
        let mut result = result();
        result.add_passed("v1/Pod", "default/b");
        result.add_passed("v1/Pod", "default/a");
        result.add_passed("v1/Pod", "default/b");
        assert_eq!(
            result.passed.get("v1/Pod").unwrap(),
            &vec!["default/b", "default/a", "default/b"]
        );
        assert_eq!(result.total_passed, 3);
    }

    #[test]
    fn test_status_transitions() {
        let mut result = result();
        result.add_skipped("v1/Pod", "default/a");
        assert_eq!(result.status, CheckStatus::Skipped);
        result.add_passed("v1/Pod", "default/b");
        assert_eq!(result.status, CheckStatus::Passed);
        result.add_failed("v1/Pod", "default/c");
        assert_eq!(result.status, CheckStatus::Failed);
        result.add_error("a.yaml validate error: boom");
        assert_eq!(result.status, CheckStatus::Error);
        result.update_status();
        assert_eq!(result.status, CheckStatus::Error);
    }

    #[test]
    fn test_gvr_index_first_write_wins() {
        let mut report = Report::new(None);
        report.add_gvr("apps/v1/Deployment", "apps/v1/deployments");
        report.add_gvr("apps/v1/Deployment", "apps/v1/other");
        assert_eq!(report.gvrs["apps/v1/Deployment"], "apps/v1/deployments");
    }

    #[test]
    fn test_has_error() {
        let mut report = Report::new(None);
        report.add_check(result());
        assert!(!report.has_error());
        let mut failing = result();
        failing.add_error("x");
        report.add_check(failing);
        assert!(report.has_error());
    }

    #[test]
    fn test_object_keys() {
        let pod = json!({"apiVersion": "v1", "kind": "Pod",
            "metadata": {"name": "web", "namespace": "prod"}});
        assert_eq!(resource_key(&pod), "v1/Pod");
        assert_eq!(object_name(&pod), "prod/web");

        let node = json!({"apiVersion": "v1", "kind": "Node", "metadata": {"name": "n1"}});
        assert_eq!(object_name(&node), "n1");
    }

    #[test]
    fn test_serialized_field_names() {
        let mut result = result();
        result.add_failed("v1/Pod", "default/a");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "Failed");
        assert_eq!(json["totalFailed"], 1);
        assert_eq!(json["severity"], "High");
        assert_eq!(json["failed"]["v1/Pod"][0], "default/a");
        assert!(json.get("passed").is_none());
    }
}
