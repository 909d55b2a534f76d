use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal valid TOML config; the serial port is unused by the sim backend
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[serial]
port = "/dev/null"

[instrument]
label = "MS1"

[tuning]
max_iter = 10
max_delta_mz = 0.05
peaks = [
    { mz = 28, width = 1.0, gate = 0.163, detector = "F" },
    { mz = 40, width = 1.0, gate = 0.163, detector = "F" },
]
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["id"], 0, "MS1 serial number 24SN19321", "stdout")]
#[case(&["peak", "--mz", "28", "--gate", "0.163"], 0, "MS1 PEAK mz=28", "stdout")]
#[case(&["zero", "--mz", "28", "--offset", "-2", "--gate", "0.163"], 0, "offset=-2", "stdout")]
#[case(&["calibration"], 0, "RI=+2.6000 RS=1053.0000", "stdout")]
#[case(&["filament", "off"], 0, "filament off", "stdout")]
#[case(&["self-check"], 0, "self-check OK", "stdout")]
#[case(&["peak", "--gate", "0.1"], 2, "required", "stderr")]
#[case(&["peak", "--mz", "250", "--gate", "0.1"], 0, "must be 100 or less", "stderr")]
#[case(&["ports"], 2, "hardware", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("rgams").unwrap();

    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn scan_prints_one_line_per_point() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = Command::cargo_bin("rgams")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["scan", "--low", "27", "--high", "29", "--step", "10", "--gate", "0.06"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let mut lines = stdout.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("MS1 SCAN 21 points"), "{header}");
    assert_eq!(lines.count(), 21);
}

#[rstest]
fn tune_reports_outcome() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    Command::cargo_bin("rgams")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("tune")
        .assert()
        .success()
        .stdout(predicate::str::contains("iteration 1: RI=+2.6000"))
        .stdout(predicate::str::contains("tuning "));
}

#[rstest]
fn tune_without_peaks_is_a_usage_error() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, "[serial]\nport = \"/dev/null\"\n").unwrap();

    Command::cargo_bin("rgams")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("tune")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no tuning peaks"));
}

#[rstest]
fn cli_reports_bad_peak_table_header() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    // Write a bad-header CSV
    let bad_csv = dir.path().join("peaks.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "mass,width,gate,detector").unwrap();
    writeln!(f, "28,1.0,0.163,F").unwrap();

    Command::cargo_bin("rgams")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("tune")
        .arg("--peaks-csv")
        .arg(&bad_csv)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
#[case("[serial]\nport = \"\"\n")]
#[case("[serial]\nport = \"/dev/null\"\n[instrument]\nmax_buffer_points = 0\n")]
#[case("not toml at all [")]
fn invalid_config_is_explained(#[case] text: &str) {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, text).unwrap();

    Command::cargo_bin("rgams")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("id")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "What happened: Configuration is invalid or incomplete",
        ));
}

#[rstest]
fn missing_config_file_is_explained() {
    let dir = tempdir().unwrap();

    Command::cargo_bin("rgams")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("id")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("config file could not be read"));
}

#[rstest]
fn file_logging_writes_json_lines() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("rgams.log");
    let cfg = dir.path().join("cfg.toml");
    fs::write(
        &cfg,
        format!(
            "[serial]\nport = \"/dev/null\"\n[logging]\nfile = {:?}\nrotation = \"never\"\n",
            log.display().to_string()
        ),
    )
    .unwrap();

    Command::cargo_bin("rgams")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("id")
        .assert()
        .success();

    let text = fs::read_to_string(&log).unwrap();
    let first = text.lines().next().unwrap();
    let v: serde_json::Value = serde_json::from_str(first).unwrap();
    assert!(v.get("level").is_some());
    assert!(text.contains("RGA session opened"));
}
