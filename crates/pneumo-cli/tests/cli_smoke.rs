//! CLI binary smoke tests using assert_cmd.
//!
//! These tests exercise the compiled `pneumo` binary end-to-end on a small
//! generated patient table.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("pneumo").unwrap()
}

/// 120 rows, every fourth one high risk; vitals drift with risk.
fn write_patients(dir: &Path) -> PathBuf {
    let mut csv = String::from("id,age,sex,temperature,cough,risk\n");
    for i in 0..120 {
        let risk = usize::from(i % 4 == 0);
        let sex = if i % 3 == 0 { "F" } else { "M" };
        let age = 30 + (i * 7) % 50 + risk * 15;
        let temperature = 36.4 + ((i * 13) % 10) as f64 / 10.0 + risk as f64 * 1.2;
        let cough = if (i + risk) % 2 == 0 { "yes" } else { "no" };
        writeln!(csv, "{},{},{},{:.1},{},{}", i, age, sex, temperature, cough, risk).unwrap();
    }
    let path = dir.join("patients.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn write_config(dir: &Path) -> PathBuf {
    let forest = r#"{"RandomForest": {"n_estimators": 10, "max_depth": null, "min_samples_split": 2, "max_features": null}}"#;
    let config = format!(
        r#"{{
            "data": {{
                "target": "risk",
                "drop_columns": ["id"],
                "categorical_columns": ["sex", "cough"],
                "value_maps": {{
                    "sex": {{ "F": 0.0, "M": 1.0 }},
                    "cough": {{ "no": 0.0, "yes": 1.0 }}
                }}
            }},
            "active": {{ "model": {forest}, "n_rounds": 2, "resampling": {{ "k_clusters": 2 }} }},
            "baseline": {{ "model": {forest} }},
            "evaluator": {{ "num_trials": 2 }}
        }}"#
    );
    let path = dir.join("config.json");
    std::fs::write(&path, config).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

#[test]
fn no_args_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_flag() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("train"))
        .stdout(predicate::str::contains("compare"))
        .stdout(predicate::str::contains("predict"));
}

#[test]
fn version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pneumo"));
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

#[test]
fn train_nonexistent_data_errors() {
    cmd()
        .args(["train", "/nonexistent/patients.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open CSV file"));
}

#[test]
fn compare_single_trial_errors() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_patients(dir.path());
    let config = write_config(dir.path());
    cmd()
        .arg("compare")
        .arg(&data)
        .arg("--config")
        .arg(&config)
        .args(["--trials", "1", "--no-report"])
        .arg("--output-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 2 trials"));
}

#[test]
fn train_then_predict() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_patients(dir.path());
    let config = write_config(dir.path());
    let out = dir.path().join("run");

    cmd()
        .arg("train")
        .arg(&data)
        .arg("--config")
        .arg(&config)
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("rounds: 2"));

    assert!(out.join("model.json").exists());
    assert!(out.join("report.html").exists());
    let history = std::fs::read_to_string(out.join("history.csv")).unwrap();
    assert_eq!(history.lines().count(), 3);

    cmd()
        .arg("predict")
        .arg(out.join("model.json"))
        .arg(&data)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("row,prediction,p0,p1\n"))
        .stdout(predicate::str::contains("\n120,"));
}

#[test]
fn compare_writes_result_tables() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_patients(dir.path());
    let config = write_config(dir.path());

    cmd()
        .arg("compare")
        .arg(&data)
        .arg("--config")
        .arg(&config)
        .arg("--output-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("f1-score"));

    for file in ["model_a.csv", "model_b.csv", "comparison.csv", "comparison.html"] {
        assert!(dir.path().join(file).exists(), "{} missing", file);
    }
}
