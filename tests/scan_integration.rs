use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde_json::{Value as Json, json};

use kubescan::checks::{BuiltinRegistry, Check, CheckSet, Gvr, KubeVersion, Severity};
use kubescan::config::ScanConfig;
use kubescan::report::CheckStatus;
use kubescan::scan::{CancelFlag, ClusterSource, ScanError, Scanner, SourceError};

/// In-memory cluster used by the scan tests.
#[derive(Default)]
struct FakeCluster {
    objects: HashMap<Gvr, Vec<Json>>,
    failing: Vec<Gvr>,
    stalled: Vec<Gvr>,
    list_calls: Mutex<HashMap<Gvr, usize>>,
    namespaces: Mutex<Vec<Option<String>>>,
    version_calls: AtomicUsize,
    version: Option<KubeVersion>,
}

impl FakeCluster {
    fn new() -> Self {
        Self {
            version: Some(KubeVersion {
                major: "1".to_string(),
                minor: "29".to_string(),
                git_version: "v1.29.4".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn with_objects(mut self, gvr: Gvr, objects: Vec<Json>) -> Self {
        self.objects.insert(gvr, objects);
        self
    }

    fn with_failing(mut self, gvr: Gvr) -> Self {
        self.failing.push(gvr);
        self
    }

    /// Listing `gvr` never completes.
    fn with_stalled(mut self, gvr: Gvr) -> Self {
        self.stalled.push(gvr);
        self
    }

    fn without_version(mut self) -> Self {
        self.version = None;
        self
    }

    fn list_count(&self, gvr: &Gvr) -> usize {
        self.list_calls.lock().unwrap().get(gvr).copied().unwrap_or(0)
    }
}

impl ClusterSource for FakeCluster {
    async fn list(&self, gvr: &Gvr, namespace: Option<&str>) -> Result<Vec<Json>, SourceError> {
        *self.list_calls.lock().unwrap().entry(gvr.clone()).or_default() += 1;
        self.namespaces
            .lock()
            .unwrap()
            .push(namespace.map(str::to_string));

        if self.failing.contains(gvr) {
            return Err(SourceError::ApiError("connection refused".to_string()));
        }
        if self.stalled.contains(gvr) {
            std::future::pending::<()>().await;
        }
        let objects = self
            .objects
            .get(gvr)
            .ok_or_else(|| SourceError::ResourceNotFound(gvr.to_string()))?;
        Ok(objects
            .iter()
            .filter(|object| match namespace {
                Some(ns) => object["metadata"]["namespace"].as_str().is_none_or(|o| o == ns),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn server_version(&self) -> Result<KubeVersion, SourceError> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        self.version
            .clone()
            .ok_or_else(|| SourceError::ApiError("version endpoint unavailable".to_string()))
    }

    async fn api_versions(&self) -> Result<Vec<String>, SourceError> {
        Ok(vec!["v1".to_string(), "apps/v1".to_string()])
    }
}

fn pods() -> Gvr {
    Gvr::new("", "v1", "pods")
}

fn deployments() -> Gvr {
    Gvr::new("apps", "v1", "deployments")
}

fn pod(namespace: &str, name: &str, privileged: bool) -> Json {
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": { "name": name, "namespace": namespace },
        "spec": {
            "containers": [{
                "name": "app",
                "image": "nginx:1.27",
                "securityContext": { "privileged": privileged }
            }]
        }
    })
}

fn deployment(name: &str, replicas: i64) -> Json {
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": { "name": name, "namespace": "default" },
        "spec": {
            "replicas": replicas,
            "template": {
                "metadata": { "labels": { "app": name } },
                "spec": { "containers": [{ "name": "app", "image": "nginx:1.27" }] }
            }
        }
    })
}

fn replicas_check() -> Check {
    Check::new("CUSTOM-1")
        .with_message("Deployments need two replicas")
        .with_severity(Severity::Low)
        .with_rule("apps", "v1", "deployments")
        .with_validation("object.spec.replicas >= 2", "")
        .with_path("checks/replicas.yaml")
}

fn no_privileged_check() -> Check {
    Check::new("CUSTOM-2")
        .with_message("Privileged container")
        .with_severity(Severity::High)
        .with_rule("", "v1", "pods")
        .with_validation(
            "allContainers.all(c, !c.?securityContext.?privileged.orValue(false))",
            "",
        )
        .with_path("checks/privileged.yaml")
}

fn named_pod_check() -> Check {
    Check::new("CUSTOM-3")
        .with_rule("", "v1", "pods")
        .with_validation("object.metadata.name != ''", "")
        .with_path("checks/named.yaml")
}

#[tokio::test]
async fn test_scan_records_outcomes_per_object() {
    let cluster = FakeCluster::new()
        .with_objects(deployments(), vec![deployment("web", 3), deployment("worker", 1)])
        .with_objects(pods(), vec![pod("default", "web-1", false), pod("default", "debug", true)]);
    let checks: CheckSet = vec![replicas_check(), no_privileged_check()].into_iter().collect();

    let report = Scanner::new(&cluster, ScanConfig::default())
        .scan(&checks)
        .await
        .unwrap();

    assert_eq!(report.kube_version.as_ref().unwrap().git_version, "v1.29.4");
    assert_eq!(report.checks.len(), 2);

    let replicas = report.checks.iter().find(|c| c.id == "CUSTOM-1").unwrap();
    assert_eq!(replicas.status, CheckStatus::Failed);
    assert_eq!(replicas.failed["apps/v1/Deployment"], vec!["default/worker".to_string()]);
    assert_eq!(replicas.passed["apps/v1/Deployment"], vec!["default/web".to_string()]);

    let privileged = report.checks.iter().find(|c| c.id == "CUSTOM-2").unwrap();
    assert_eq!(privileged.total_failed, 1);
    assert_eq!(privileged.total_passed, 1);
    assert_eq!(privileged.failed["v1/Pod"], vec!["default/debug".to_string()]);

    assert_eq!(report.gvrs["v1/Pod"], "v1/pods");
    assert_eq!(report.gvrs["apps/v1/Deployment"], "apps/v1/deployments");
    assert!(report.has_failure());
    assert!(!report.has_error());
}

#[tokio::test]
async fn test_each_resource_type_is_listed_once() {
    let cluster = FakeCluster::new().with_objects(deployments(), vec![deployment("web", 2)]);
    let labelled = Check::new("CUSTOM-4")
        .with_rule("apps", "v1", "deployments")
        .with_validation("has(podMeta.labels)", "")
        .with_path("checks/labelled.yaml");
    let checks: CheckSet = vec![replicas_check(), labelled].into_iter().collect();

    let report = Scanner::new(&cluster, ScanConfig::default())
        .scan(&checks)
        .await
        .unwrap();

    assert_eq!(cluster.list_count(&deployments()), 1);
    assert_eq!(cluster.version_calls.load(Ordering::SeqCst), 1);
    assert!(report.checks.iter().all(|c| c.status == CheckStatus::Passed));
}

#[tokio::test]
async fn test_duplicate_rules_do_not_double_count() {
    let cluster = FakeCluster::new().with_objects(pods(), vec![pod("default", "web", false)]);
    let check = named_pod_check().with_rule("", "v1", "pods");
    let checks: CheckSet = vec![check].into_iter().collect();

    let report = Scanner::new(&cluster, ScanConfig::default())
        .scan(&checks)
        .await
        .unwrap();

    assert_eq!(report.checks[0].total_passed, 1);
    assert_eq!(cluster.list_count(&pods()), 1);
}

#[tokio::test]
async fn test_skip_annotation() {
    let mut skipped = pod("default", "legacy", true);
    skipped["metadata"]["annotations"] = json!({ "kubescan.io/skip": "CUSTOM-9, CUSTOM-2" });
    let cluster = FakeCluster::new().with_objects(pods(), vec![skipped]);
    let checks: CheckSet = vec![no_privileged_check()].into_iter().collect();

    let report = Scanner::new(&cluster, ScanConfig::default())
        .scan(&checks)
        .await
        .unwrap();
    let result = &report.checks[0];
    assert_eq!(result.status, CheckStatus::Skipped);
    assert_eq!(result.skipped["v1/Pod"], vec!["default/legacy".to_string()]);

    let report = Scanner::new(&cluster, ScanConfig::default().without_annotation_skip())
        .scan(&checks)
        .await
        .unwrap();
    assert_eq!(report.checks[0].status, CheckStatus::Failed);

    let report = Scanner::new(
        &cluster,
        ScanConfig::default().with_skip_annotation("example.com/skip"),
    )
    .scan(&checks)
    .await
    .unwrap();
    assert_eq!(report.checks[0].status, CheckStatus::Failed);
}

#[tokio::test]
async fn test_compile_error_is_isolated() {
    let cluster = FakeCluster::new().with_objects(pods(), vec![pod("default", "web", false)]);
    let broken = Check::new("BROKEN")
        .with_rule("", "v1", "pods")
        .with_validation("object.metadata.name", "")
        .with_path("checks/broken.yaml");
    let checks: CheckSet = vec![broken, named_pod_check()].into_iter().collect();

    let report = Scanner::new(&cluster, ScanConfig::default())
        .scan(&checks)
        .await
        .unwrap();

    let broken = report.checks.iter().find(|c| c.id == "BROKEN").unwrap();
    assert_eq!(broken.status, CheckStatus::Error);
    assert_eq!(broken.errors.len(), 1);
    assert!(broken.errors[0].starts_with("checks/broken.yaml compile error:"));
    assert_eq!(broken.total_passed + broken.total_failed, 0);

    let named = report.checks.iter().find(|c| c.id == "CUSTOM-3").unwrap();
    assert_eq!(named.status, CheckStatus::Passed);
    assert!(report.has_error());
}

#[tokio::test]
async fn test_list_error_keeps_other_resources() {
    let cluster = FakeCluster::new()
        .with_objects(pods(), vec![pod("default", "web", false)])
        .with_failing(deployments());
    let check = named_pod_check().with_rule("apps", "v1", "deployments");
    let checks: CheckSet = vec![check].into_iter().collect();

    let report = Scanner::new(&cluster, ScanConfig::default())
        .scan(&checks)
        .await
        .unwrap();

    let result = &report.checks[0];
    assert_eq!(result.status, CheckStatus::Error);
    assert_eq!(result.total_passed, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("list apps/v1/deployments error:"));
}

#[tokio::test]
async fn test_evaluation_error_is_reported() {
    let cluster = FakeCluster::new().with_objects(pods(), vec![pod("default", "web", false)]);
    let check = Check::new("MISSING")
        .with_rule("", "v1", "pods")
        .with_validation("object.spec.nodeName == 'a'", "")
        .with_path("checks/missing.yaml");
    let checks: CheckSet = vec![check].into_iter().collect();

    let report = Scanner::new(&cluster, ScanConfig::default())
        .scan(&checks)
        .await
        .unwrap();

    let result = &report.checks[0];
    assert_eq!(result.status, CheckStatus::Error);
    assert!(result.errors[0].starts_with("checks/missing.yaml validate error:"));
    assert!(result.errors[0].contains("nodeName"));
}

#[tokio::test]
async fn test_namespace_filter() {
    let cluster = FakeCluster::new().with_objects(
        pods(),
        vec![pod("default", "web", false), pod("prod", "api", false)],
    );
    let checks: CheckSet = vec![named_pod_check()].into_iter().collect();

    let report = Scanner::new(&cluster, ScanConfig::default().with_namespace("prod"))
        .scan(&checks)
        .await
        .unwrap();

    assert_eq!(report.checks[0].passed["v1/Pod"], vec!["prod/api".to_string()]);
    assert_eq!(
        cluster.namespaces.lock().unwrap().as_slice(),
        &[Some("prod".to_string())]
    );
}

#[tokio::test]
async fn test_missing_server_version_is_not_fatal() {
    let cluster = FakeCluster::new()
        .without_version()
        .with_objects(pods(), vec![pod("default", "web", false)]);
    let checks: CheckSet = vec![named_pod_check()].into_iter().collect();

    let report = Scanner::new(&cluster, ScanConfig::default())
        .scan(&checks)
        .await
        .unwrap();

    assert!(report.kube_version.is_none());
    assert_eq!(report.checks[0].status, CheckStatus::Passed);
}

#[tokio::test]
async fn test_cancelled_scan() {
    let cluster = FakeCluster::new().with_objects(pods(), vec![pod("default", "web", false)]);
    let checks: CheckSet = vec![named_pod_check()].into_iter().collect();

    let cancel = CancelFlag::new();
    cancel.cancel();
    let result = Scanner::new(&cluster, ScanConfig::default())
        .with_cancel_flag(cancel)
        .scan(&checks)
        .await;

    assert!(matches!(result, Err(ScanError::Cancelled)));
    assert_eq!(cluster.list_count(&pods()), 0);
}

#[tokio::test]
async fn test_cancel_interrupts_listing_in_flight() {
    let cluster = FakeCluster::new().with_stalled(pods());
    let checks: CheckSet = vec![named_pod_check()].into_iter().collect();
    let config = ScanConfig::default().with_timeout(Duration::from_secs(600));

    let cancel = CancelFlag::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = Scanner::new(&cluster, config)
        .with_cancel_flag(cancel)
        .scan(&checks)
        .await;

    assert!(matches!(result, Err(ScanError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(cluster.list_count(&pods()), 1);
}

#[tokio::test]
async fn test_builtin_checks_against_cluster() {
    let registry = BuiltinRegistry::load().unwrap();
    let mut cluster = FakeCluster::new();
    for check in registry.checks() {
        for rule in check.rules() {
            cluster.objects.entry(rule.gvr()).or_default();
        }
    }
    cluster.objects.insert(pods(), vec![pod("default", "debug", true)]);

    let report = Scanner::new(&cluster, ScanConfig::default())
        .scan(&registry.check_set())
        .await
        .unwrap();

    assert_eq!(report.checks.len(), registry.len());
    assert!(!report.has_error(), "unexpected errors: {:?}", report.checks);

    let privileged = report.checks.iter().find(|c| c.id == "KS-101").unwrap();
    assert!(privileged.builtin);
    assert_eq!(privileged.status, CheckStatus::Failed);
    assert_eq!(privileged.failed["v1/Pod"], vec!["default/debug".to_string()]);
}
