//! Check status and its derivation rules.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Overall status of a check across every object it evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CheckStatus {
    #[default]
    Unknown,
    Passed,
    Skipped,
    Failed,
    Error,
}

impl CheckStatus {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "passed" => Self::Passed,
            "skipped" => Self::Skipped,
            "failed" => Self::Failed,
            "error" => Self::Error,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::Passed => "Passed",
            Self::Skipped => "Skipped",
            Self::Failed => "Failed",
            Self::Error => "Error",
        }
    }

    /// Status for the given bucket counts.
    ///
    /// Errors win over failures, failures over skips. A check is only
    /// `Skipped` when nothing passed.
    pub fn derive(errors: usize, failed: usize, passed: usize, skipped: usize) -> Self {
        if errors > 0 {
            Self::Error
        } else if failed > 0 {
            Self::Failed
        } else if skipped > 0 && passed == 0 {
            Self::Skipped
        } else {
            Self::Passed
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for CheckStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CheckStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}
