//! Cluster access.
//!
//! [`ClusterSource`] is the seam between the scanner and the API server.
//! [`KubeSource`] implements it with the `kube` client; tests provide their
//! own in-memory sources.
//!
//! # Example
//!
//! ```rust,ignore
//! use kubescan::scan::{ClusterSource, KubeSource};
//! use kubescan::checks::Gvr;
//!
//! let source = KubeSource::new(None).await?;
//! let pods = source.list(&Gvr::new("", "v1", "pods"), Some("default")).await?;
//! ```

use crate::checks::types::{Gvr, KubeVersion};
use kube::{
    Client, Config,
    api::{Api, DynamicObject, ListParams},
    core::GroupVersion,
    discovery::{self, Scope},
};
use serde_json::Value as Json;
use std::time::Duration;

/// Error type for cluster access.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to create Kubernetes client: {0}")]
    ClientCreation(#[from] kube::Error),

    #[error("Failed to infer Kubernetes config: {0}")]
    ConfigError(#[from] kube::config::InferConfigError),

    #[error("Failed to read kubeconfig: {0}")]
    KubeconfigError(#[from] kube::config::KubeconfigError),

    #[error("the server does not serve {0}")]
    ResourceNotFound(String),

    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Read access to a cluster.
#[allow(async_fn_in_trait)]
pub trait ClusterSource {
    /// Every object of one resource type, in all namespaces when
    /// `namespace` is `None`. Objects carry `apiVersion` and `kind`.
    async fn list(&self, gvr: &Gvr, namespace: Option<&str>) -> Result<Vec<Json>, SourceError>;

    async fn server_version(&self) -> Result<KubeVersion, SourceError>;

    /// Served group versions, `"v1"` for the core group.
    async fn api_versions(&self) -> Result<Vec<String>, SourceError>;
}

/// Cluster source backed by a kubeconfig.
pub struct KubeSource {
    client: Client,
}

impl KubeSource {
    /// Connect with the default kubeconfig context, or `context` when given.
    pub async fn new(context: Option<&str>) -> Result<Self, SourceError> {
        let config = match context {
            Some(context) => {
                let kubeconfig = kube::config::Kubeconfig::read()?;
                Config::from_custom_kubeconfig(
                    kubeconfig,
                    &kube::config::KubeConfigOptions {
                        context: Some(context.to_string()),
                        ..Default::default()
                    },
                )
                .await?
            }
            None => Config::infer().await?,
        };
        let client = Client::try_from(config)?;
        Ok(Self { client })
    }
}

impl ClusterSource for KubeSource {
    async fn list(&self, gvr: &Gvr, namespace: Option<&str>) -> Result<Vec<Json>, SourceError> {
        let group = discovery::oneshot::pinned_group(
            &self.client,
            &GroupVersion::gv(&gvr.group, &gvr.version),
        )
        .await
        .map_err(|e| SourceError::ApiError(format!("discovery of {} failed: {}", gvr.group_version(), e)))?;

        let (resource, capabilities) = group
            .versioned_resources(&gvr.version)
            .into_iter()
            .find(|(resource, _)| resource.plural == gvr.resource)
            .ok_or_else(|| SourceError::ResourceNotFound(gvr.to_string()))?;

        let api: Api<DynamicObject> = match (namespace, &capabilities.scope) {
            (Some(ns), Scope::Namespaced) => Api::namespaced_with(self.client.clone(), ns, &resource),
            _ => Api::all_with(self.client.clone(), &resource),
        };

        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| SourceError::ApiError(format!("Failed to list {}: {}", gvr, e)))?;

        let mut objects = Vec::with_capacity(list.items.len());
        for item in list.items {
            let mut object =
                serde_json::to_value(&item).map_err(|e| SourceError::ApiError(e.to_string()))?;
            if let Json::Object(fields) = &mut object {
                fields
                    .entry("apiVersion")
                    .or_insert_with(|| Json::String(resource.api_version.clone()));
                fields
                    .entry("kind")
                    .or_insert_with(|| Json::String(resource.kind.clone()));
            }
            objects.push(object);
        }
        log::debug!("Listed {} objects of {}", objects.len(), gvr);
        Ok(objects)
    }

    async fn server_version(&self) -> Result<KubeVersion, SourceError> {
        let info = self
            .client
            .apiserver_version()
            .await
            .map_err(|e| SourceError::ApiError(format!("Failed to get server version: {}", e)))?;
        Ok(KubeVersion::from(info))
    }

    async fn api_versions(&self) -> Result<Vec<String>, SourceError> {
        let core = self
            .client
            .list_core_api_versions()
            .await
            .map_err(|e| SourceError::ApiError(format!("Failed to list core API versions: {}", e)))?;
        let groups = self
            .client
            .list_api_groups()
            .await
            .map_err(|e| SourceError::ApiError(format!("Failed to list API groups: {}", e)))?;

        let mut versions = core.versions;
        for group in groups.groups {
            versions.extend(group.versions.into_iter().map(|v| v.group_version));
        }
        Ok(versions)
    }
}
