//! Core types for compliance checks.
//!
//! - `Severity` - How serious a failed check is
//! - `Check` - A declarative rule: resource selectors, validations, metadata
//! - `ResourceRule` / `Gvr` - Group/version/resource coordinates
//! - `CheckTest` - A fixture exercising one check against one object
//! - `KubeVersion` - Server version information

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Severity of a check.
///
/// Ordered from least to most severe:
/// `Unknown < Low < Medium < High < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Severity {
    /// Missing or unrecognized severity
    #[default]
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse a severity (case-insensitive). Unrecognized text maps to
    /// `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Unknown,
        }
    }

    /// Get the string representation. `Unknown` is the empty string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// A group/version/resource coordinate used to list objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Gvr {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl Gvr {
    pub fn new(group: impl Into<String>, version: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// `"apps/v1"`, or `"v1"` for the core group.
    pub fn group_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for Gvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group_version(), self.resource)
    }
}

/// One resource selector of a check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRule {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub resource: String,
}

impl ResourceRule {
    pub fn new(group: impl Into<String>, version: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    pub fn gvr(&self) -> Gvr {
        Gvr::new(&self.group, &self.version, &self.resource)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    #[serde(default)]
    pub resources: Vec<ResourceRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub expression: String,
    /// Reported when this validation fails.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub expression: String,
}

/// A compliance check as written in a check document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub id: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "match", default)]
    pub matches: Match,
    #[serde(default)]
    pub validations: Vec<Validation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,
    /// Default parameters, overridable per evaluation.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Set by the loader for checks embedded in the binary.
    #[serde(skip)]
    pub builtin: bool,
    /// Set by the loader to the document the check came from.
    #[serde(skip)]
    pub path: String,
}

impl Check {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_rule(mut self, group: &str, version: &str, resource: &str) -> Self {
        self.matches.resources.push(ResourceRule::new(group, version, resource));
        self
    }

    pub fn with_validation(mut self, expression: impl Into<String>, message: impl Into<String>) -> Self {
        self.validations.push(Validation {
            expression: expression.into(),
            message: message.into(),
        });
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.variables.push(Variable {
            name: name.into(),
            expression: expression.into(),
        });
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn rules(&self) -> &[ResourceRule] {
        &self.matches.resources
    }

    /// Whether the default parameters carry any value.
    pub fn has_params(&self) -> bool {
        match &self.params {
            serde_json::Value::Null => false,
            serde_json::Value::Object(fields) => !fields.is_empty(),
            serde_json::Value::Array(items) => !items.is_empty(),
            serde_json::Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Key identifying where the check was loaded from. Built-in checks are
    /// prefixed so they never collide with files on disk.
    pub fn source_key(&self) -> String {
        if self.builtin {
            format!("builtin:{}", self.path)
        } else {
            self.path.clone()
        }
    }
}

/// Server version information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KubeVersion {
    pub major: String,
    pub minor: String,
    pub git_version: String,
    pub git_commit: String,
    pub git_tree_state: String,
    pub build_date: String,
    pub go_version: String,
    pub compiler: String,
    pub platform: String,
}

impl From<k8s_openapi::apimachinery::pkg::version::Info> for KubeVersion {
    fn from(info: k8s_openapi::apimachinery::pkg::version::Info) -> Self {
        Self {
            major: info.major,
            minor: info.minor,
            git_version: info.git_version,
            git_commit: info.git_commit,
            git_tree_state: info.git_tree_state,
            build_date: info.build_date,
            go_version: info.go_version,
            compiler: info.compiler,
            platform: info.platform,
        }
    }
}

/// A fixture: one input object and the expected outcome of one check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckTest {
    pub name: String,
    /// The object under test, as a YAML or JSON document.
    pub input: String,
    /// Overrides the check's default parameters when set.
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub api_versions: Vec<String>,
    #[serde(default)]
    pub kube_version: Option<KubeVersion>,
    #[serde(default)]
    pub pass: bool,
    #[serde(default)]
    pub message: String,
}
