//! Scan configuration.
//!
//! Values come from an optional YAML file (`--config`) and are then
//! overridden by command-line flags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Annotation listing check IDs an object opts out of.
pub const DEFAULT_SKIP_ANNOTATION: &str = "kubescan.io/skip";

/// Default evaluation cost ceiling per expression.
pub const DEFAULT_COST_LIMIT: u64 = 1_000_000;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfig {
    /// Extra check documents to load.
    pub checks: Vec<PathBuf>,

    /// Run only the checks from `checks`.
    pub disable_builtin: bool,

    pub skip_annotation: String,

    /// Evaluate every object even when it carries the skip annotation.
    pub disable_annotation_skip: bool,

    /// `0` disables the ceiling.
    pub cost_limit: u64,

    /// Limit listing to one namespace. Cluster-scoped resources are always
    /// listed in full.
    pub namespace: Option<String>,

    /// Kubeconfig context to use instead of the current one.
    pub context: Option<String>,

    /// Timeout for each API request, in seconds.
    pub timeout_seconds: u64,

    /// Exit successfully even when checks report errors.
    pub no_fail: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            checks: Vec::new(),
            disable_builtin: false,
            skip_annotation: DEFAULT_SKIP_ANNOTATION.to_string(),
            disable_annotation_skip: false,
            cost_limit: DEFAULT_COST_LIMIT,
            namespace: None,
            context: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            no_fail: false,
        }
    }
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.checks.push(path.into());
        self
    }

    pub fn without_builtin(mut self) -> Self {
        self.disable_builtin = true;
        self
    }

    pub fn with_skip_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.skip_annotation = annotation.into();
        self
    }

    pub fn without_annotation_skip(mut self) -> Self {
        self.disable_annotation_skip = true;
        self
    }

    pub fn with_cost_limit(mut self, cost_limit: u64) -> Self {
        self.cost_limit = cost_limit;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = timeout.as_secs().max(1);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Load configuration from a YAML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::load_from_str(&content)
    }

    /// Load configuration from a YAML string.
    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}
