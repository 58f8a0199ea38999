//! End-to-end tests for the shipctl binary.
//!
//! None of these reach a container engine: they cover argument handling,
//! validation that happens before connecting, and context management.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn shipctl(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("shipctl").unwrap();
    cmd.env("SHIPCTL_CONFIG_DIR", config_dir.path())
        .env_remove("SHIPCTL_CONTEXT")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

fn create_aci_context(config_dir: &TempDir, name: &str) {
    shipctl(config_dir)
        .args([
            "context",
            "create",
            name,
            "--backend",
            "aci",
            "--subscription-id",
            "sub-123",
            "--resource-group",
            "apps",
            "--location",
            "westeurope",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Created context {}", name)));
}

#[test]
fn test_run_help_lists_flags_without_domainname_on_docker() {
    let dir = TempDir::new().unwrap();
    shipctl(&dir)
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--publish"))
        .stdout(predicate::str::contains("--envFile"))
        .stdout(predicate::str::contains("--restart"))
        .stdout(predicate::str::contains("--domainname").not());
}

#[test]
fn test_domainname_rejected_on_docker_context() {
    let dir = TempDir::new().unwrap();
    shipctl(&dir)
        .args(["run", "--domainname", "corp.example", "nginx"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--domainname"));
}

#[test]
fn test_bad_publish_fails_validation_before_connecting() {
    let dir = TempDir::new().unwrap();
    shipctl(&dir)
        .args(["run", "-p", "notaport", "nginx"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("invalid publish"));
}

#[test]
fn test_bad_memory_fails_validation() {
    let dir = TempDir::new().unwrap();
    shipctl(&dir)
        .args(["run", "--memory", "0", "nginx"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid memory"));
}

#[test]
fn test_unknown_restart_policy_fails_validation() {
    let dir = TempDir::new().unwrap();
    shipctl(&dir)
        .args(["run", "--restart", "sometimes", "nginx"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown restart policy 'sometimes'"));
}

#[test]
fn test_missing_env_file_fails_validation() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.env");
    shipctl(&dir)
        .args(["run", "--envFile"])
        .arg(&missing)
        .arg("nginx")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid envFile"));
}

#[test]
fn test_default_context_is_listed_and_current() {
    let dir = TempDir::new().unwrap();
    shipctl(&dir)
        .args(["context", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default"))
        .stdout(predicate::str::contains("docker"));

    shipctl(&dir)
        .args(["context", "show"])
        .assert()
        .success()
        .stdout("default\n");
}

#[test]
fn test_aci_context_enables_domainname() {
    let dir = TempDir::new().unwrap();
    create_aci_context(&dir, "cloud");

    shipctl(&dir)
        .env("SHIPCTL_CONTEXT", "cloud")
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--domainname"));

    // Stored current context is untouched by the override
    shipctl(&dir)
        .args(["context", "show"])
        .assert()
        .success()
        .stdout("default\n");
}

#[test]
fn test_use_and_remove_context() {
    let dir = TempDir::new().unwrap();
    create_aci_context(&dir, "cloud");

    shipctl(&dir).args(["context", "use", "cloud"]).assert().success();
    shipctl(&dir)
        .args(["context", "show"])
        .assert()
        .success()
        .stdout("cloud\n");
    shipctl(&dir)
        .args(["context", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sub-123/apps (westeurope)"));

    // Connecting to the cloud backend is reported after validation passes
    shipctl(&dir)
        .args(["run", "--domainname", "corp.example", "nginx"])
        .assert()
        .code(125)
        .stderr(predicate::str::contains("not available in this build"));

    shipctl(&dir).args(["context", "rm", "cloud"]).assert().success();
    shipctl(&dir)
        .args(["context", "show"])
        .assert()
        .success()
        .stdout("default\n");
}

#[test]
fn test_aci_context_requires_cloud_fields() {
    let dir = TempDir::new().unwrap();
    shipctl(&dir)
        .args(["context", "create", "cloud", "--backend", "aci", "--location", "westeurope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--subscription-id"));
}

#[test]
fn test_unknown_context_override_can_still_be_listed() {
    let dir = TempDir::new().unwrap();
    shipctl(&dir)
        .env("SHIPCTL_CONTEXT", "missing")
        .args(["context", "show"])
        .assert()
        .code(125)
        .stderr(predicate::str::contains("Context 'missing' not found"));

    shipctl(&dir)
        .env("SHIPCTL_CONTEXT", "missing")
        .args(["context", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default"));
}

#[test]
fn test_secret_recover_needs_capable_backend() {
    let dir = TempDir::new().unwrap();
    shipctl(&dir)
        .args(["secret", "rm", "--recover", "db-password"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--recover is not supported by the docker backend"));
}
