//! Pod template extraction.
//!
//! Nine workload kinds embed (or are) a pod template. They are normalized
//! into one `(ObjectMeta, PodSpec)` pair so checks can be written once
//! against `podMeta`, `podSpec` and `allContainers`.

use crate::checks::types::ResourceRule;
use crate::validator::ValidatorError;
use k8s_openapi::api::core::v1::{Container, EphemeralContainer, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value as Json;

/// A resource kind carrying a pod template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Pod,
    PodTemplate,
    ReplicationController,
    ReplicaSet,
    Deployment,
    DaemonSet,
    StatefulSet,
    Job,
    CronJob,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 9] = [
        WorkloadKind::Pod,
        WorkloadKind::PodTemplate,
        WorkloadKind::ReplicationController,
        WorkloadKind::ReplicaSet,
        WorkloadKind::Deployment,
        WorkloadKind::DaemonSet,
        WorkloadKind::StatefulSet,
        WorkloadKind::Job,
        WorkloadKind::CronJob,
    ];

    pub fn group(&self) -> &'static str {
        match self {
            Self::Pod | Self::PodTemplate | Self::ReplicationController => "",
            Self::ReplicaSet | Self::Deployment | Self::DaemonSet | Self::StatefulSet => "apps",
            Self::Job | Self::CronJob => "batch",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pod => "Pod",
            Self::PodTemplate => "PodTemplate",
            Self::ReplicationController => "ReplicationController",
            Self::ReplicaSet => "ReplicaSet",
            Self::Deployment => "Deployment",
            Self::DaemonSet => "DaemonSet",
            Self::StatefulSet => "StatefulSet",
            Self::Job => "Job",
            Self::CronJob => "CronJob",
        }
    }

    pub fn resource(&self) -> &'static str {
        match self {
            Self::Pod => "pods",
            Self::PodTemplate => "podtemplates",
            Self::ReplicationController => "replicationcontrollers",
            Self::ReplicaSet => "replicasets",
            Self::Deployment => "deployments",
            Self::DaemonSet => "daemonsets",
            Self::StatefulSet => "statefulsets",
            Self::Job => "jobs",
            Self::CronJob => "cronjobs",
        }
    }

    /// Path from the object root to the pod template holding `metadata` and
    /// `spec`.
    pub fn template_path(&self) -> &'static [&'static str] {
        match self {
            Self::Pod => &[],
            Self::PodTemplate => &["template"],
            Self::ReplicationController
            | Self::ReplicaSet
            | Self::Deployment
            | Self::DaemonSet
            | Self::StatefulSet
            | Self::Job => &["spec", "template"],
            Self::CronJob => &["spec", "jobTemplate", "spec", "template"],
        }
    }

    pub fn from_group_kind(group: &str, kind: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.group() == group && k.kind() == kind)
    }

    pub fn from_group_resource(group: &str, resource: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.group() == group && k.resource() == resource)
    }

    /// Workload kind of a live object, from its `apiVersion` and `kind`.
    pub fn of(object: &Json) -> Option<Self> {
        let (group, kind) = group_kind(object);
        Self::from_group_kind(group, kind)
    }
}

fn group_kind(object: &Json) -> (&str, &str) {
    let api_version = object.get("apiVersion").and_then(Json::as_str).unwrap_or_default();
    let group = api_version.rsplit_once('/').map(|(group, _)| group).unwrap_or("");
    let kind = object.get("kind").and_then(Json::as_str).unwrap_or_default();
    (group, kind)
}

/// Whether the object is one of the known workload kinds.
pub fn has_template(object: &Json) -> bool {
    WorkloadKind::of(object).is_some()
}

/// Whether any rule selects a workload resource.
pub fn matches_template_resource(rules: &[ResourceRule]) -> bool {
    rules
        .iter()
        .any(|rule| WorkloadKind::from_group_resource(&rule.group, &rule.resource).is_some())
}

/// Extract the pod template of a workload object. Missing nested fields
/// yield empty metadata and spec.
pub fn extract_template(object: &Json) -> Result<(ObjectMeta, PodSpec), ValidatorError> {
    let Some(kind) = WorkloadKind::of(object) else {
        let (_, kind) = group_kind(object);
        return Err(ValidatorError::UnsupportedKind(kind.to_string()));
    };

    let template = kind
        .template_path()
        .iter()
        .try_fold(object, |current, segment| current.get(*segment));

    let Some(template) = template else {
        return Ok((ObjectMeta::default(), PodSpec::default()));
    };

    let metadata = match template.get("metadata") {
        Some(metadata) if !metadata.is_null() => serde_json::from_value(metadata.clone())
            .map_err(|e| ValidatorError::Template(format!("metadata: {}", e)))?,
        _ => ObjectMeta::default(),
    };

    let spec = match template.get("spec") {
        Some(Json::Object(fields)) => {
            let mut fields = fields.clone();
            fields
                .entry("containers")
                .or_insert_with(|| Json::Array(Vec::new()));
            serde_json::from_value(Json::Object(fields))
                .map_err(|e| ValidatorError::Template(format!("spec: {}", e)))?
        }
        _ => PodSpec::default(),
    };

    Ok((metadata, spec))
}

/// Every container of a pod: regular containers, then init containers, then
/// ephemeral containers in the regular container shape.
pub fn all_containers(spec: &PodSpec) -> Vec<Container> {
    let mut containers = spec.containers.clone();
    if let Some(init) = &spec.init_containers {
        containers.extend(init.iter().cloned());
    }
    if let Some(ephemeral) = &spec.ephemeral_containers {
        containers.extend(ephemeral.iter().map(ephemeral_to_container));
    }
    containers
}

fn ephemeral_to_container(ephemeral: &EphemeralContainer) -> Container {
    let ephemeral = ephemeral.clone();
    Container {
        args: ephemeral.args,
        command: ephemeral.command,
        env: ephemeral.env,
        env_from: ephemeral.env_from,
        image: ephemeral.image,
        image_pull_policy: ephemeral.image_pull_policy,
        lifecycle: ephemeral.lifecycle,
        liveness_probe: ephemeral.liveness_probe,
        name: ephemeral.name,
        ports: ephemeral.ports,
        readiness_probe: ephemeral.readiness_probe,
        resize_policy: ephemeral.resize_policy,
        resources: ephemeral.resources,
        restart_policy: ephemeral.restart_policy,
        security_context: ephemeral.security_context,
        startup_probe: ephemeral.startup_probe,
        stdin: ephemeral.stdin,
        stdin_once: ephemeral.stdin_once,
        termination_message_path: ephemeral.termination_message_path,
        termination_message_policy: ephemeral.termination_message_policy,
        tty: ephemeral.tty,
        volume_devices: ephemeral.volume_devices,
        volume_mounts: ephemeral.volume_mounts,
        working_dir: ephemeral.working_dir,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> Json {
        json!({
            "metadata": {"name": "foo", "labels": {"app": "foo"}},
            "spec": {"containers": [{"name": "foo-container"}]}
        })
    }

    fn wrap(path: &[&str], inner: Json) -> Json {
        path.iter().rev().fold(inner, |acc, segment| {
            let mut fields = serde_json::Map::new();
            fields.insert(segment.to_string(), acc);
            Json::Object(fields)
        })
    }

    fn object_of(kind: WorkloadKind) -> Json {
        let api_version = if kind.group().is_empty() {
            "v1".to_string()
        } else {
            format!("{}/v1", kind.group())
        };
        let mut object = wrap(kind.template_path(), template());
        let fields = object.as_object_mut().unwrap();
        fields.insert("apiVersion".into(), json!(api_version));
        fields.insert("kind".into(), json!(kind.kind()));
        if kind != WorkloadKind::Pod {
            fields
                .entry("metadata")
                .or_insert(json!({"name": "owner"}));
        }
        object
    }

    #[test]
    fn test_extract_from_every_workload_kind() {
        for kind in WorkloadKind::ALL {
            let object = object_of(kind);
            assert!(has_template(&object), "{:?}", kind);

            let (meta, spec) = extract_template(&object).unwrap();
            assert_eq!(meta.name.as_deref(), Some("foo"), "{:?}", kind);
            assert_eq!(
                meta.labels.as_ref().and_then(|l| l.get("app")).map(String::as_str),
                Some("foo")
            );
            let names: Vec<&str> = spec.containers.iter().map(|c| c.name.as_str()).collect();
            assert_eq!(names, vec!["foo-container"], "{:?}", kind);
        }
    }

    #[test]
    fn test_service_is_unsupported() {
        let service = json!({"apiVersion": "v1", "kind": "Service", "metadata": {"name": "web"}});
        assert!(!has_template(&service));
        assert_eq!(
            extract_template(&service).unwrap_err(),
            ValidatorError::UnsupportedKind("Service".to_string())
        );
    }

    #[test]
    fn test_group_must_match_kind() {
        let object = json!({"apiVersion": "example.com/v1", "kind": "Deployment"});
        assert!(!has_template(&object));
    }

    #[test]
    fn test_missing_template_yields_empty() {
        let object = json!({"apiVersion": "apps/v1", "kind": "Deployment", "spec": {}});
        let (meta, spec) = extract_template(&object).unwrap();
        assert_eq!(meta, ObjectMeta::default());
        assert!(spec.containers.is_empty());

        let object = json!({"apiVersion": "apps/v1", "kind": "Deployment",
            "spec": {"template": {"spec": {"hostNetwork": true}}}});
        let (_, spec) = extract_template(&object).unwrap();
        assert_eq!(spec.host_network, Some(true));
        assert!(spec.containers.is_empty());
    }

    #[test]
    fn test_all_containers_order() {
        let spec: PodSpec = serde_json::from_value(json!({
            "containers": [{"name": "a"}, {"name": "b"}],
            "initContainers": [{"name": "i"}],
            "ephemeralContainers": [{
                "name": "e",
                "image": "busybox",
                "targetContainerName": "a",
                "securityContext": {"privileged": true}
            }]
        }))
        .unwrap();

        let containers = all_containers(&spec);
        let names: Vec<&str> = containers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "i", "e"]);

        let ephemeral = &containers[3];
        assert_eq!(ephemeral.image.as_deref(), Some("busybox"));
        assert_eq!(
            ephemeral.security_context.as_ref().and_then(|s| s.privileged),
            Some(true)
        );
    }

    #[test]
    fn test_matches_template_resource() {
        assert!(matches_template_resource(&[ResourceRule::new("", "v1", "pods")]));
        assert!(matches_template_resource(&[
            ResourceRule::new("", "v1", "services"),
            ResourceRule::new("batch", "v1", "cronjobs"),
        ]));
        assert!(!matches_template_resource(&[ResourceRule::new("", "v1", "services")]));
        assert!(!matches_template_resource(&[ResourceRule::new("", "v1", "deployments")]));
    }
}
