//! Scan orchestration.
//!
//! Drives every check of a [`CheckSet`] over the objects its rules select:
//!
//! 1. compile the check (a failure becomes the check's only error),
//! 2. list each distinct resource type once per scan through the
//!    [`ResourceCache`],
//! 3. skip objects that opt out through the skip annotation,
//! 4. evaluate the rest in parallel and record outcomes in list order.
//!
//! Errors are isolated per check; a scan always yields a [`Report`] unless
//! it is cancelled.

pub mod cache;
pub mod pragma;
pub mod source;

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rayon::prelude::*;
use serde_json::Value as Json;
use tokio::sync::Notify;

use crate::checks::CheckSet;
use crate::checks::types::Gvr;
use crate::config::ScanConfig;
use crate::report::{CheckResult, Report, object_name, resource_key};
use crate::validator::{CompiledCheck, compile};

pub use cache::ResourceCache;
pub use source::{ClusterSource, KubeSource, SourceError};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("scan cancelled")]
    Cancelled,
}

/// Shared flag to stop a running scan. Raising it also wakes every
/// request in flight.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<CancelState>);

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the flag is raised.
    pub async fn cancelled(&self) {
        let notified = self.0.notify.notified();
        tokio::pin!(notified);
        // Register before checking so a concurrent cancel is not missed.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Evaluation outcome of one object, recorded after the parallel pass.
enum Evaluated {
    Passed,
    Failed,
    Skipped,
    Error(String),
}

pub struct Scanner<'s, S: ClusterSource> {
    source: &'s S,
    config: ScanConfig,
    cancel: CancelFlag,
}

impl<'s, S: ClusterSource> Scanner<'s, S> {
    pub fn new(source: &'s S, config: ScanConfig) -> Self {
        Self {
            source,
            config,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run `request` under the configured timeout. Cancellation abandons
    /// the request immediately.
    async fn timed<T>(
        &self,
        request: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<Result<T, SourceError>, ScanError> {
        let limit: Duration = self.config.timeout();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ScanError::Cancelled),
            result = tokio::time::timeout(limit, request) => {
                Ok(result.unwrap_or_else(|_| Err(SourceError::Timeout(limit))))
            }
        }
    }

    fn ensure_running(&self) -> Result<(), ScanError> {
        if self.cancel.is_cancelled() {
            Err(ScanError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run every check in `checks` against the cluster.
    pub async fn scan(&self, checks: &CheckSet) -> Result<Report, ScanError> {
        self.ensure_running()?;

        let kube_version = match self.timed(self.source.server_version()).await? {
            Ok(version) => Some(version),
            Err(e) => {
                log::warn!("Could not determine the server version: {}", e);
                None
            }
        };
        let api_versions = match self.timed(self.source.api_versions()).await? {
            Ok(versions) => versions,
            Err(e) => {
                log::warn!("Could not discover served API versions: {}", e);
                Vec::new()
            }
        };

        let cache = ResourceCache::new();
        let mut report = Report::new(kube_version.clone());

        for check in checks.iter() {
            self.ensure_running()?;
            log::debug!("Running check {} from {}", check.id, check.path);

            let mut result = CheckResult::new(check);
            let compiled = match compile(
                check,
                &api_versions,
                kube_version.as_ref(),
                self.config.cost_limit,
            ) {
                Ok(compiled) => compiled,
                Err(e) => {
                    log::warn!("{} compile error: {}", check.path, e);
                    result.add_error(format!("{} compile error: {}", check.path, e));
                    report.add_check(result);
                    continue;
                }
            };

            let mut seen = HashSet::new();
            for rule in check.rules() {
                let gvr = rule.gvr();
                if !seen.insert(gvr.clone()) {
                    continue;
                }
                self.ensure_running()?;

                let objects = match self.objects(&cache, &gvr).await? {
                    Ok(objects) => objects,
                    Err(e) => {
                        log::warn!("list {} error: {}", gvr, e);
                        result.add_error(format!("list {} error: {}", gvr, e));
                        continue;
                    }
                };

                for object in objects.iter() {
                    cache.record_gvr(&resource_key(object), &gvr);
                }
                self.evaluate(&compiled, &objects, &mut result);
            }

            log::debug!("Check {} finished with status {}", check.id, result.status);
            report.add_check(result);
        }

        for (resource, gvr) in cache.gvrs() {
            report.add_gvr(&resource, &gvr);
        }
        Ok(report)
    }

    async fn objects(
        &self,
        cache: &ResourceCache,
        gvr: &Gvr,
    ) -> Result<Result<Arc<Vec<Json>>, SourceError>, ScanError> {
        if let Some(objects) = cache.get(gvr) {
            log::trace!("Using cached list of {}", gvr);
            return Ok(Ok(objects));
        }
        let namespace = self.config.namespace.as_deref();
        let listed = self.timed(self.source.list(gvr, namespace)).await?;
        Ok(listed.map(|objects| cache.insert(gvr, objects)))
    }

    fn evaluate(&self, compiled: &CompiledCheck, objects: &[Json], result: &mut CheckResult) {
        let annotation = self.config.skip_annotation.as_str();
        let skipping = !self.config.disable_annotation_skip;
        let check_id = compiled.check().id.as_str();
        let path = compiled.check().path.as_str();

        let outcomes: Vec<Evaluated> = objects
            .par_iter()
            .map(|object| {
                if skipping && pragma::is_skipped(object, annotation, check_id) {
                    return Evaluated::Skipped;
                }
                match compiled.validate(object, None) {
                    Ok(outcome) if outcome.passed => Evaluated::Passed,
                    Ok(_) => Evaluated::Failed,
                    Err(e) => Evaluated::Error(format!("{} validate error: {}", path, e)),
                }
            })
            .collect();

        for (object, outcome) in objects.iter().zip(outcomes) {
            let resource = resource_key(object);
            let name = object_name(object);
            match outcome {
                Evaluated::Passed => result.add_passed(&resource, &name),
                Evaluated::Failed => result.add_failed(&resource, &name),
                Evaluated::Skipped => {
                    log::trace!("{} skipped for {}", check_id, name);
                    result.add_skipped(&resource, &name)
                }
                Evaluated::Error(message) => {
                    log::warn!("{}", message);
                    result.add_error(message)
                }
            }
        }
    }
}
