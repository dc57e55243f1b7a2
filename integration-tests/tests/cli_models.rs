use assert_cmd::Command;
use predicates::prelude::*;

mod common;

fn promptbench(home: &std::path::Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin("promptbench"));
    cmd.env("PROMPTBENCH_HOME", home)
        .env_remove("OPENROUTER_API_KEY")
        .current_dir(home);
    cmd
}

#[test]
fn models_from_snapshot_work_offline_with_preferred_first() {
    let temp = tempfile::TempDir::new().unwrap();
    let snapshot = common::write_snapshot(temp.path());

    let output = promptbench(temp.path())
        .arg("--snapshot")
        .arg(&snapshot)
        .arg("models")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("openai/gpt-4o: $0.0025/$0.0100 per 1k tokens"));
    let mini = stdout.find("openai/gpt-4o-mini:").unwrap();
    let omni = stdout.find("openai/gpt-4o:").unwrap();
    let zeta = stdout.find("zeta/model:").unwrap();
    assert!(mini < omni && omni < zeta, "preferred models first:\n{stdout}");
}

#[test]
fn describe_prints_description_or_placeholder() {
    let temp = tempfile::TempDir::new().unwrap();
    let snapshot = common::write_snapshot(temp.path());

    promptbench(temp.path())
        .arg("--snapshot")
        .arg(&snapshot)
        .args(["models", "--describe", "openai/gpt-4o"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Flagship omni model"));

    promptbench(temp.path())
        .arg("--snapshot")
        .arg(&snapshot)
        .args(["models", "--describe", "openai/gpt-4o-mini"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No description available."));

    promptbench(temp.path())
        .arg("--snapshot")
        .arg(&snapshot)
        .args(["models", "--describe", "nope/none"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("not found in pricing catalog"));
}

#[test]
fn models_json_lists_per_thousand_prices() {
    let temp = tempfile::TempDir::new().unwrap();
    let snapshot = common::write_snapshot(temp.path());

    let output = promptbench(temp.path())
        .arg("--snapshot")
        .arg(&snapshot)
        .args(["models", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let models = listing.as_array().unwrap();
    assert_eq!(models.len(), 3);
    assert_eq!(models[0]["model_id"], "openai/gpt-4o-mini");
    let prompt_1k = models[0]["prompt_price_per_1k"].as_f64().unwrap();
    assert!((prompt_1k - 0.001).abs() < 1e-12);
}

#[test]
fn missing_snapshot_degrades_to_empty_listing() {
    let temp = tempfile::TempDir::new().unwrap();

    promptbench(temp.path())
        .arg("--snapshot")
        .arg(temp.path().join("absent.json"))
        .arg("models")
        .assert()
        .success()
        .stdout(predicate::str::contains("No models available"));
}
