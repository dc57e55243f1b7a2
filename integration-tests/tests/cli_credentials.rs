use assert_cmd::Command;
use predicates::prelude::*;

mod common;

#[test]
fn ask_without_key_fails_before_any_request() {
    let temp = tempfile::TempDir::new().unwrap();
    // Unroutable base URL: the command must fail on the credential, not on the network.
    let config = temp.path().join("config.yaml");
    std::fs::write(&config, "gateway:\n  base_url: http://127.0.0.1:9/api/v1\n").unwrap();

    Command::new(assert_cmd::cargo::cargo_bin("promptbench"))
        .env("PROMPTBENCH_HOME", temp.path())
        .env_remove("OPENROUTER_API_KEY")
        .current_dir(temp.path())
        .arg("--config")
        .arg(&config)
        .args(["ask", "hello"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "Missing API key: pass --api-key or set OPENROUTER_API_KEY",
        ));
}

#[test]
fn blank_key_counts_as_missing() {
    let temp = tempfile::TempDir::new().unwrap();

    Command::new(assert_cmd::cargo::cargo_bin("promptbench"))
        .env("PROMPTBENCH_HOME", temp.path())
        .env("OPENROUTER_API_KEY", "   ")
        .current_dir(temp.path())
        .args(["models"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Missing API key"));
}

#[test]
fn invalid_config_is_reported() {
    let temp = tempfile::TempDir::new().unwrap();
    let config = temp.path().join("config.yaml");
    std::fs::write(&config, "defaults:\n  temperature: 9\n").unwrap();

    Command::new(assert_cmd::cargo::cargo_bin("promptbench"))
        .env("PROMPTBENCH_HOME", temp.path())
        .current_dir(temp.path())
        .arg("--config")
        .arg(&config)
        .args(["ask", "hello", "--api-key", common::TEST_KEY])
        .assert()
        .failure()
        .stdout(predicate::str::contains("temperature"));
}
