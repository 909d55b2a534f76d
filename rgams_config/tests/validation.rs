use rgams_config::{DetectorCode, load_toml};
use rstest::rstest;

const BASE: &str = r#"
[serial]
port = "/dev/ttyUSB0"

[instrument]
label = "MS"
cem_hv = 1400
max_buffer_points = 500

[tuning]
max_iter = 10
max_delta_mz = 0.05
peaks = [
    { mz = 28, width = 1.0, gate = 0.163, detector = "F" },
    { mz = 84, width = 1.0, gate = 0.48, detector = "M" },
]
"#;

#[test]
fn accepts_full_config() {
    let cfg = load_toml(BASE).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.serial.baud, 28_800);
    assert_eq!(cfg.serial.read_timeout_ms, 10_000);
    assert_eq!(cfg.tuning.peaks.len(), 2);
    assert_eq!(cfg.tuning.peaks[1].detector, DetectorCode::Multiplier);
}

#[test]
fn defaults_fill_optional_tables() {
    let cfg = load_toml("[serial]\nport = \"/dev/ttyS0\"\n").expect("parse TOML");
    cfg.validate().expect("defaults are valid");
    assert_eq!(cfg.instrument.label, "MS");
    assert_eq!(cfg.instrument.cem_hv, 1400.0);
    assert_eq!(cfg.instrument.max_buffer_points, 500);
    assert_eq!(cfg.tuning.max_iter, 10);
    assert!(cfg.tuning.peaks.is_empty());
}

#[rstest]
#[case("max_buffer_points = 500", "max_buffer_points = 0", "max_buffer_points must be >= 1")]
#[case("cem_hv = 1400", "cem_hv = 3000", "cem_hv must be in")]
#[case("max_iter = 10", "max_iter = 0", "max_iter must be >= 1")]
#[case("max_delta_mz = 0.05", "max_delta_mz = 0.0", "max_delta_mz must be > 0")]
#[case("width = 1.0, gate = 0.163", "width = 0.0, gate = 0.163", "width must be > 0")]
#[case("port = \"/dev/ttyUSB0\"", "port = \"\"", "serial.port must not be empty")]
fn rejects_invalid_values(#[case] from: &str, #[case] to: &str, #[case] msg: &str) {
    let cfg = load_toml(&BASE.replacen(from, to, 1)).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(format!("{err}").contains(msg), "{err}");
}

#[test]
fn rejects_unknown_rotation() {
    let toml = format!("{BASE}\n[logging]\nrotation = \"weekly\"\n");
    let cfg = load_toml(&toml).expect("parse TOML");
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_unknown_detector_code() {
    let toml = BASE.replacen("detector = \"M\"", "detector = \"X\"", 1);
    assert!(load_toml(&toml).is_err());
}
