//! Build version information.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: String,
    pub major: String,
    pub minor: String,
    pub git_commit: String,
    pub build_date: String,
}

impl VersionInfo {
    /// Version of the running binary. Commit and date come from the
    /// `KUBESCAN_GIT_COMMIT` and `KUBESCAN_BUILD_DATE` build environment.
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            major: env!("CARGO_PKG_VERSION_MAJOR").to_string(),
            minor: env!("CARGO_PKG_VERSION_MINOR").to_string(),
            git_commit: option_env!("KUBESCAN_GIT_COMMIT").unwrap_or("unknown").to_string(),
            build_date: option_env!("KUBESCAN_BUILD_DATE").unwrap_or("unknown").to_string(),
        }
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "kubescan {} (commit {}, built {})",
            self.version, self.git_commit, self.build_date
        )
    }
}
