use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[serial]
port = "/dev/null"

[tuning]
peaks = [
    { mz = 28, width = 1.0, gate = 0.163, detector = "F" },
    { mz = 40, width = 1.0, gate = 0.163, detector = "M" },
]
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn json_lines(args: &[&str]) -> Vec<serde_json::Value> {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let out = Command::cargo_bin("rgams")
        .unwrap()
        .arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .args(args)
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).expect("stdout line is JSON"))
        .collect()
}

/// Validate the JSONL schema of a peak record.
#[rstest]
fn jsonl_peak_schema() {
    let lines = json_lines(&["peak", "--mz", "28", "--gate", "0.163"]);
    assert_eq!(lines.len(), 1);
    let v = &lines[0];
    assert_eq!(v["type"], "peak");
    assert_eq!(v["instrument"], "RGA_SRS");
    assert_eq!(v["label"], "MS");
    assert_eq!(v["mz"], 28);
    assert_eq!(v["unit"], "A");
    assert_eq!(v["detector"], "F");
    assert!(v["value"].as_f64().unwrap() > 1e-11);
    assert!(v["timestamp"].as_f64().unwrap() > 1.0e9);
}

#[rstest]
fn jsonl_scan_schema() {
    let lines = json_lines(&["scan", "--low", "27.5", "--high", "28.5", "--gate", "0.06"]);
    assert_eq!(lines.len(), 1);
    let v = &lines[0];
    assert_eq!(v["type"], "scan");
    let mz = v["mz"].as_array().unwrap();
    let intensity = v["intensity"].as_array().unwrap();
    assert_eq!(mz.len(), intensity.len());
    assert!(mz.iter().all(|m| {
        let m = m.as_f64().unwrap();
        (27.5..=28.5).contains(&m)
    }));
}

#[rstest]
fn jsonl_tuning_schema() {
    let lines = json_lines(&["tune", "--max-iter", "2"]);
    let last = lines.last().unwrap();
    assert_eq!(last["type"], "tuning");
    let outcome = last["outcome"].as_str().unwrap();
    assert!(["Converged", "MaxIterationsReached"].contains(&outcome), "{outcome}");
    assert!(last["iterations"].as_u64().unwrap() <= 2);
    let cycles: Vec<_> = lines.iter().filter(|v| v["type"] == "tuning_cycle").collect();
    assert_eq!(cycles.len() as u64, last["iterations"].as_u64().unwrap());
    let centers = cycles[0]["centers"].as_array().unwrap();
    assert_eq!(centers.len(), 2);
    assert_eq!(centers[0]["target_mz"], 28.0);
}

#[rstest]
fn jsonl_status_schema() {
    let lines = json_lines(&["self-check"]);
    let v = &lines[0];
    assert_eq!(v["type"], "status");
    assert_eq!(v["serial_number"], "24SN19321");
    assert_eq!(v["has_multiplier"], true);
    assert_eq!(v["detector"], "F");
    assert_eq!(v["noise_floor"], 2);
}

#[rstest]
fn jsonl_error_schema() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, "[serial]\nport = \"/dev/null\"\n").unwrap();
    let out = Command::cargo_bin("rgams")
        .unwrap()
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .arg("tune")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    let stdout = String::from_utf8(out.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(v["reason"], "Usage");
    assert!(v["message"].as_str().unwrap().contains("no tuning peaks"));
}
