//! Check definitions, loading and the built-in check set.

pub mod builtin;
pub mod loader;
pub mod types;

use std::collections::BTreeMap;
use std::path::PathBuf;

pub use builtin::BuiltinRegistry;
pub use loader::{LoadError, load_check_file};
pub use types::{Check, CheckTest, Gvr, KubeVersion, ResourceRule, Severity, Validation, Variable};

/// Checks keyed by where they were loaded from, iterated in key order.
#[derive(Debug, Clone, Default)]
pub struct CheckSet {
    checks: BTreeMap<String, Check>,
}

impl CheckSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a check, replacing any check from the same source.
    pub fn insert(&mut self, check: Check) -> Option<Check> {
        self.checks.insert(check.source_key(), check)
    }

    pub fn extend(&mut self, other: CheckSet) {
        self.checks.extend(other.checks);
    }

    pub fn get(&self, key: &str) -> Option<&Check> {
        self.checks.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Check> {
        self.checks.values()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Load the given check files on top of the built-in set.
    pub fn from_sources(builtins: &BuiltinRegistry, files: &[PathBuf]) -> Result<Self, LoadError> {
        let mut set = builtins.check_set();
        for path in files {
            set.insert(load_check_file(path)?);
        }
        Ok(set)
    }
}

impl FromIterator<Check> for CheckSet {
    fn from_iter<I: IntoIterator<Item = Check>>(iter: I) -> Self {
        let mut set = Self::new();
        for check in iter {
            set.insert(check);
        }
        set
    }
}
