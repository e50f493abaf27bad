//! Runs a check's fixture documents.

use crate::checks::loader::parse_object;
use crate::checks::types::{Check, CheckTest};
use crate::validator::compile;

/// A fixture whose observed outcome differs from the expected one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureFailure {
    pub check: String,
    pub test: String,
    pub reason: String,
}

impl std::fmt::Display for FixtureFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}: {}", self.check, self.test, self.reason)
    }
}

/// Compile `check` once, then evaluate every test with its own API versions
/// and cluster version. A test without a message expects none.
pub fn run_fixtures(check: &Check, tests: &[CheckTest], cost_limit: u64) -> Vec<FixtureFailure> {
    let failure = |test: &str, reason: String| FixtureFailure {
        check: check.id.clone(),
        test: test.to_string(),
        reason,
    };

    let compiled = match compile(check, &[], None, cost_limit) {
        Ok(compiled) => compiled,
        Err(e) => return vec![failure("<compile>", e.to_string())],
    };

    let mut failures = Vec::new();
    for test in tests {
        let mut compiled = compiled.clone();
        compiled.set_api_versions(test.api_versions.clone());
        compiled.set_kube_version(test.kube_version.clone());

        let object = match parse_object(&test.input) {
            Ok(object) => object,
            Err(e) => {
                failures.push(failure(&test.name, e.to_string()));
                continue;
            }
        };

        match compiled.validate(&object, test.params.as_ref()) {
            Ok(outcome) if outcome.passed != test.pass => failures.push(failure(
                &test.name,
                format!("expected pass={}, got pass={}", test.pass, outcome.passed),
            )),
            Ok(outcome) if outcome.message != test.message => {
                failures.push(failure(
                    &test.name,
                    format!("expected message {:?}, got {:?}", test.message, outcome.message),
                ))
            }
            Ok(_) => {}
            Err(e) => failures.push(failure(&test.name, format!("validate error: {}", e))),
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check() -> Check {
        Check::new("KS-test")
            .with_rule("", "v1", "pods")
            .with_validation("allContainers.size() > 0", "no containers")
    }

    fn fixture(name: &str, containers: &str, pass: bool, message: &str) -> CheckTest {
        CheckTest {
            name: name.to_string(),
            input: format!(
                "apiVersion: v1\nkind: Pod\nmetadata:\n  name: p\nspec:\n  containers: {}\n",
                containers
            ),
            pass,
            message: message.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_matching_fixtures_report_nothing() {
        let tests = vec![
            fixture("one", "[{name: a}]", true, ""),
            fixture("none", "[]", false, "no containers"),
        ];
        assert!(run_fixtures(&check(), &tests, 0).is_empty());
    }

    #[test]
    fn test_mismatches_are_reported() {
        let tests = vec![
            fixture("wrong pass", "[]", true, ""),
            fixture("wrong message", "[]", false, "something else"),
            fixture("bad input", "[", true, ""),
        ];
        let failures = run_fixtures(&check(), &tests, 0);
        let names: Vec<&str> = failures.iter().map(|f| f.test.as_str()).collect();
        assert_eq!(names, vec!["wrong pass", "wrong message", "bad input"]);
        assert_eq!(failures[0].reason, "expected pass=true, got pass=false");
    }

    #[test]
    fn test_missing_expected_message_is_a_mismatch() {
        let failures = run_fixtures(&check(), &[fixture("silent", "[]", false, "")], 0);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].reason, "expected message \"\", got \"no containers\"");
    }

    #[test]
    fn test_compile_failure_reported_once() {
        let broken = Check::new("KS-broken").with_rule("", "v1", "pods");
        let failures = run_fixtures(&broken, &[fixture("a", "[]", true, "")], 0);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].test, "<compile>");
    }
}
