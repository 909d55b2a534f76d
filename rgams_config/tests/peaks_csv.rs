use std::fs::File;
use std::io::Write;

use rgams_config::{DetectorCode, load_peaks_csv, load_toml};
use rstest::rstest;
use tempfile::tempdir;

fn write_csv(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut f = File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    path
}

#[rstest]
fn loads_peak_table() {
    let dir = tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        "peaks.csv",
        "mz,width,gate,detector\n28,1.0,0.163,F\n84, 0.8 ,0.48,M\n",
    );
    let rows = load_peaks_csv(&path).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].mz, 28.0);
    assert_eq!(rows[1].width, 0.8);
    assert_eq!(rows[1].detector, DetectorCode::Multiplier);
}

#[rstest]
#[case("mz,width,gate\n28,1.0,0.163\n", "headers")]
#[case("mz,gate,width,detector\n28,0.1,1.0,F\n", "headers")]
#[case("mz,width,gate,detector\n28,1.0,0.163,Q\n", "invalid CSV row 2")]
#[case("mz,width,gate,detector\n28,-1.0,0.163,F\n", "width must be > 0")]
#[case("mz,width,gate,detector\n", "no rows")]
fn rejects_bad_tables(#[case] body: &str, #[case] msg: &str) {
    let dir = tempdir().unwrap();
    let path = write_csv(dir.path(), "bad.csv", body);
    let err = load_peaks_csv(&path).expect_err("should fail");
    assert!(format!("{err}").contains(msg), "{err}");
}

#[rstest]
fn missing_file_is_reported() {
    let dir = tempdir().unwrap();
    let err = load_peaks_csv(&dir.path().join("nope.csv")).unwrap_err();
    assert!(format!("{err}").contains("open peak table CSV"));
}

#[rstest]
fn config_falls_back_to_relative_csv() {
    let dir = tempdir().unwrap();
    write_csv(
        dir.path(),
        "tune.csv",
        "mz,width,gate,detector\n18,1.0,0.25,F\n40,1.0,0.25,F\n",
    );
    let cfg = load_toml("[serial]\nport = \"sim\"\n[tuning]\npeaks_csv = \"tune.csv\"\n").unwrap();
    let peaks = cfg.tuning_peaks(dir.path()).unwrap();
    assert_eq!(peaks.iter().map(|p| p.mz).collect::<Vec<_>>(), vec![18.0, 40.0]);
}
