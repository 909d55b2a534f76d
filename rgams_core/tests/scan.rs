use rgams_core::error::RgaError;
use rgams_core::frame;
use rgams_core::mocks::{RecordingDiagnostics, ScriptedLink};
use rgams_core::sink::MemorySink;
use rgams_core::{Detector, RgaSession};
use rgams_traits::clock::test_clock::TestClock;

/// A Faraday-only head reporting `points` for the next scan.
fn scripted_head(points: usize, frames_sent: usize) -> ScriptedLink {
    let link = ScriptedLink::new();
    link.on_text("ID?", "SRSRGA200VER0.24SN01234\n\r")
        .on_text("MO?", "0\n\r")
        .on_text("MF?", "100\n\r")
        .on_text("NF?", "2\n\r")
        .on_text("MI?", "1\n\r")
        .on_text("AP?", &format!("{points}\n\r"));
    let mut payload = Vec::new();
    for i in 0..frames_sent {
        payload.extend(frame::encode_counts(1_000 + i as i32));
    }
    link.on("SC1", &payload);
    link
}

fn open(link: &ScriptedLink) -> (RgaSession, RecordingDiagnostics, TestClock) {
    let diag = RecordingDiagnostics::default();
    let clock = TestClock::starting_at(1_700_000_000.0);
    let s = RgaSession::builder()
        .with_link(link.clone())
        .with_clock(Box::new(clock.clone()))
        .with_diagnostics(Box::new(diag.clone()))
        .open()
        .unwrap();
    (s, diag, clock)
}

#[test]
fn scan_drains_pressure_frame_and_crops() {
    let link = scripted_head(40, 41);
    let (mut s, diag, _) = open(&link);
    let mut sink = MemorySink::default();
    let scan = s.scan(38.0, 42.0, 15, 0.5, Some(&mut sink)).unwrap();

    assert!(scan.len() <= 40);
    assert_eq!(scan.mz.len(), scan.intensity.len());
    assert!(scan.mz.iter().all(|m| (38.0..=42.0).contains(m)));
    assert_eq!(scan.mz[0], 38.0);
    assert!((scan.mz[1] - 38.1).abs() < 1e-12);
    assert!((scan.intensity[0] - 1_000e-16).abs() < 1e-24);
    assert_eq!(scan.detector, Detector::Faraday);
    assert_eq!(scan.unit, "A");
    assert!(diag.messages().is_empty(), "{:?}", diag.messages());

    let cmds = link.commands();
    let sc = cmds.iter().position(|c| c == "SC1").unwrap();
    assert_eq!(
        &cmds[sc - 4..sc],
        &["MF42", "MI38", "SA15", "AP?"].map(String::from)
    );
    assert_eq!(sink.scans.len(), 1);
    assert_eq!(sink.scans[0].gate, 0.5);
}

#[test]
fn fractional_window_keeps_only_requested_points() {
    let link = scripted_head(40, 41);
    let (mut s, _, _) = open(&link);
    let scan = s.acquire_scan(38.45, 41.5, 15, 0.5).unwrap();
    // grid 38.0, 38.1, ... 41.9; keep 38.5 ..= 41.5
    assert_eq!(scan.len(), 31);
    assert!((scan.mz[0] - 38.5).abs() < 1e-9);
    assert!((scan.mz[30] - 41.5).abs() < 1e-9);
    assert!(link.commands().contains(&"MI38".to_string()));
}

#[test]
fn lower_bound_is_moved_first_when_range_drops() {
    let link = scripted_head(40, 41);
    link.on_text("MI?", "60\n\r");
    let (mut s, _, _) = open(&link);
    s.acquire_scan(38.0, 42.0, 15, 0.5).unwrap();
    let cmds = link.commands();
    let mi = cmds.iter().position(|c| c == "MI38").unwrap();
    let mf = cmds.iter().position(|c| c == "MF42").unwrap();
    assert!(mi < mf);
}

#[test]
fn timestamp_is_acquisition_midpoint() {
    let link = scripted_head(40, 41);
    let (mut s, _, clock) = open(&link);
    let scan = s.acquire_scan(38.0, 42.0, 15, 0.5).unwrap();
    assert!(scan.timestamp >= 1_700_000_000.0);
    assert!(scan.timestamp <= 1_700_000_000.0 + clock.elapsed().as_secs_f64());
}

#[test]
fn missing_frames_abort_the_scan() {
    let link = scripted_head(40, 10);
    let (mut s, diag, clock) = open(&link);
    let err = s.acquire_scan(38.0, 42.0, 15, 0.5).unwrap_err();
    assert_eq!(
        err.downcast_ref::<RgaError>(),
        Some(&RgaError::Timeout("SC1".into()))
    );
    assert!(format!("{err:#}").contains("10 of 41"));
    assert!(diag.contains("did not produce scan result"));
    assert!(clock.elapsed().as_secs() >= 10);
}

#[test]
fn stray_bytes_before_scan_are_only_warned() {
    let link = scripted_head(40, 41);
    let (mut s, diag, _) = open(&link);
    link.inject(b" ");
    // The stray byte is read with the next reply.
    let scan = s.acquire_scan(38.0, 42.0, 15, 0.5).unwrap();
    assert!(!scan.is_empty());
    assert!(diag.contains("not empty before"));
}

#[test]
fn implausible_point_count_is_rejected_before_triggering() {
    let link = scripted_head(99_999_999_999, 0);
    let (mut s, _, _) = open(&link);
    let err = s.acquire_scan(38.0, 42.0, 15, 0.5).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RgaError>(),
        Some(RgaError::Decode(msg)) if msg.contains("99999999999")
    ));
    assert_eq!(link.count("SC1"), 0);
}
