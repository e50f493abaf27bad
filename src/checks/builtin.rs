//! Built-in checks embedded in the binary.
//!
//! Each check ships with a fixture document exercised by the test suite, so
//! the registry keeps both.

use crate::checks::loader::{DocumentFormat, LoadError, parse_check, parse_tests};
use crate::checks::types::{Check, CheckTest};
use crate::checks::CheckSet;
use std::collections::BTreeMap;

struct Embedded {
    path: &'static str,
    check: &'static str,
    tests: &'static str,
}

macro_rules! embed {
    ($name:literal) => {
        Embedded {
            path: concat!("builtins/", $name, ".yaml"),
            check: include_str!(concat!("builtins/", $name, ".yaml")),
            tests: include_str!(concat!("builtins/", $name, "_test.yaml")),
        }
    };
}

const EMBEDDED: &[Embedded] = &[
    embed!("privileged"),
    embed!("host_namespaces"),
    embed!("host_path"),
    embed!("privilege_escalation"),
    embed!("run_as_non_root"),
    embed!("resource_limits"),
    embed!("image_tag"),
    embed!("deprecated_api"),
];

/// Immutable set of parsed built-in checks and their fixtures.
#[derive(Debug, Clone, Default)]
pub struct BuiltinRegistry {
    checks: Vec<Check>,
    tests: BTreeMap<String, Vec<CheckTest>>,
}

impl BuiltinRegistry {
    /// Parse every embedded document.
    pub fn load() -> Result<Self, LoadError> {
        let mut registry = Self::default();
        for embedded in EMBEDDED {
            let mut check = parse_check(embedded.check, DocumentFormat::Yaml, embedded.path)?;
            check.builtin = true;
            let tests = parse_tests(embedded.tests, DocumentFormat::Yaml, embedded.path)?;
            registry.tests.insert(embedded.path.to_string(), tests);
            registry.checks.push(check);
        }
        log::debug!("Loaded {} built-in checks", registry.checks.len());
        Ok(registry)
    }

    /// A registry with no checks, for `--disable-builtin`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Fixtures for the built-in check loaded from `path`.
    pub fn tests_for(&self, path: &str) -> &[CheckTest] {
        self.tests.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn check_set(&self) -> CheckSet {
        let mut set = CheckSet::new();
        for check in &self.checks {
            set.insert(check.clone());
        }
        set
    }
}
