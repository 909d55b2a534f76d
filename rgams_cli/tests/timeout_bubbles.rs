use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[rstest]
fn silent_head_timeout_bubbles_to_cli() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, "[serial]\nport = \"/dev/null\"\n").unwrap();

    let mut cmd = Command::cargo_bin("rgams").unwrap();
    cmd.env("RGAMS_TEST_SIM_SILENT", "1");
    cmd.arg("--config").arg(&cfg).arg("id");
    cmd.assert()
        .code(3)
        .stderr(predicate::str::contains(
            "What happened: The RGA did not answer within 10 s (command: ID?)",
        ));
}
