use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn kubescan() -> Command {
    Command::cargo_bin("kubescan").unwrap()
}

#[test]
fn test_version_json() {
    kubescan()
        .args(["version", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "\"version\": \"{}\"",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_version_plain() {
    kubescan()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("kubescan "));
}

#[test]
fn test_disable_builtin_without_checks_is_rejected() {
    kubescan()
        .args(["scan", "--disable-builtin"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--checks"));
}

#[test]
fn test_invalid_check_file_fails_before_connecting() {
    let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
    writeln!(file, "id: [unterminated").unwrap();

    kubescan()
        .args(["scan", "--disable-builtin", "-f"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_unsupported_check_format() {
    let file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();

    kubescan()
        .args(["scan", "-f"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_builtin_fixtures_command() {
    kubescan()
        .args(["test", "--builtin"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fixtures passed"));
}

#[test]
fn test_user_check_fixture_mismatch_fails() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("nodes.yaml"),
        "id: KS-901\nmatch:\n  resources:\n    - version: v1\n      resource: nodes\nvalidations:\n  - expression: \"false\"\n    message: always fails\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("nodes_test.yaml"),
        "- name: any node\n  pass: false\n  input: |\n    apiVersion: v1\n    kind: Node\n    metadata:\n      name: n1\n",
    )
    .unwrap();

    kubescan()
        .arg("test")
        .arg(dir.path().join("nodes.yaml"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("expected message \"\", got \"always fails\""));
}
