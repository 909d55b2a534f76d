//! Session assembly and command execution.

use std::io::Write;
use std::path::Path;

use eyre::WrapErr;
use rgams_config::Config;
use rgams_core::{
    CalibrationPeak, RgaError, RgaSession, TracingDiagnostics, TuningOutcome, TuningReport,
};
use serde_json::json;

use crate::cli::{Commands, Switch};
use crate::output::ConsoleSink;

pub fn outcome_name(o: TuningOutcome) -> &'static str {
    match o {
        TuningOutcome::Converged => "Converged",
        TuningOutcome::MaxIterationsReached => "MaxIterationsReached",
        TuningOutcome::Indeterminate => "Indeterminate",
    }
}

#[cfg(feature = "hardware")]
fn open_link(cfg: &Config) -> eyre::Result<rgams_hardware::serial::SerialPortLink> {
    rgams_hardware::serial::SerialPortLink::open_with(
        &cfg.serial.port,
        cfg.serial.baud,
        std::time::Duration::from_millis(cfg.serial.read_timeout_ms),
    )
    .wrap_err_with(|| format!("open serial port {}", cfg.serial.port))
}

/// Simulated head; env knobs let tests exercise failure paths.
#[cfg(not(feature = "hardware"))]
fn open_link(cfg: &Config) -> eyre::Result<rgams_hardware::SimulatedRga> {
    let mut sim = rgams_hardware::SimulatedRga::new();
    if std::env::var_os("RGAMS_TEST_SIM_SILENT").is_some() {
        sim = sim.silent();
    }
    if std::env::var_os("RGAMS_TEST_SIM_NO_MULTIPLIER").is_some() {
        sim = sim.without_multiplier();
    }
    tracing::info!(port = %cfg.serial.port, "using simulated RGA head");
    Ok(sim)
}

pub fn open_session(cfg: &Config) -> eyre::Result<RgaSession> {
    let link = open_link(cfg)?;
    RgaSession::builder()
        .with_link(link)
        .with_instrument(&cfg.instrument)
        .with_diagnostics(Box::new(TracingDiagnostics))
        .open()
}

#[cfg(feature = "hardware")]
pub fn list_ports(json: bool) -> eyre::Result<()> {
    let ports = rgams_hardware::serial::available_ports().wrap_err("enumerate serial ports")?;
    let mut out = ConsoleSink::new(std::io::stdout().lock(), json);
    for p in ports {
        let obj = json!({
            "type": "port",
            "name": p.name,
            "kind": p.kind,
            "description": p.description,
        });
        let text = format!(
            "{}\t{}\t{}",
            p.name,
            p.kind,
            p.description.as_deref().unwrap_or("")
        );
        out.emit(&obj, &text)?;
    }
    Ok(())
}

#[cfg(not(feature = "hardware"))]
pub fn list_ports(_json: bool) -> eyre::Result<()> {
    Err(eyre::Report::new(RgaError::Usage(
        "port enumeration needs a build with the `hardware` feature".to_string(),
    )))
}

fn tuning_peaks(
    cfg: &Config,
    base_dir: &Path,
    peaks_csv: Option<&Path>,
) -> eyre::Result<Vec<CalibrationPeak>> {
    let rows = match peaks_csv {
        Some(p) => rgams_config::load_peaks_csv(p)
            .wrap_err_with(|| format!("load peak table {}", p.display()))?,
        None => cfg.tuning_peaks(base_dir)?,
    };
    if rows.is_empty() {
        return Err(eyre::Report::new(RgaError::Usage(
            "no tuning peaks: set [tuning] peaks or peaks_csv, or pass --peaks-csv".to_string(),
        )));
    }
    Ok(rows.iter().map(CalibrationPeak::from).collect())
}

fn emit_tuning<W: Write>(out: &mut ConsoleSink<W>, report: &TuningReport) -> eyre::Result<()> {
    for c in &report.cycles {
        let obj = json!({
            "type": "tuning_cycle",
            "iteration": c.iteration,
            "ri": c.ri,
            "rs": c.rs,
            "offset_at_0": c.offset_at_0,
            "offset_at_128": c.offset_at_128,
            "centers": c.observations.iter().map(|o| json!({
                "target_mz": o.target_mz,
                "center": o.center,
                "offset": o.offset,
            })).collect::<Vec<_>>(),
        });
        let text = format!(
            "iteration {}: RI={:+.4} RS={:.4} offset@0={} offset@128={}",
            c.iteration,
            c.ri,
            c.rs,
            fmt_opt(c.offset_at_0),
            fmt_opt(c.offset_at_128)
        );
        out.emit(&obj, &text)?;
    }
    let s = &report.state;
    let obj = json!({
        "type": "tuning",
        "outcome": outcome_name(report.outcome),
        "ri": s.ri,
        "rs": s.rs,
        "iterations": s.iterations,
        "tolerance": s.tolerance,
        "offset_at_0": s.offset_at_0,
        "offset_at_128": s.offset_at_128,
    });
    let text = format!(
        "tuning {} after {} iteration(s): RI={:+.4} RS={:.4}",
        outcome_name(report.outcome),
        s.iterations,
        s.ri,
        s.rs
    );
    out.emit(&obj, &text)
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |x| format!("{x:+.4}"))
}

/// Run one subcommand against an open session.
pub fn execute(
    session: &mut RgaSession,
    cmd: &Commands,
    cfg: &Config,
    base_dir: &Path,
    json: bool,
) -> eyre::Result<()> {
    let mut out = ConsoleSink::new(std::io::stdout().lock(), json);
    match cmd {
        Commands::Id => {
            let obj = json!({
                "type": "id",
                "label": session.label(),
                "serial_number": session.serial_number(),
            });
            let text = format!("{} serial number {}", session.label(), session.serial_number());
            out.emit(&obj, &text)
        }
        Commands::Peak { mz, gate } => {
            session.peak(*mz, *gate, Some(&mut out))?;
            Ok(())
        }
        Commands::Zero { mz, offset, gate } => {
            session.zero(*mz, *offset, *gate, Some(&mut out))?;
            Ok(())
        }
        Commands::Scan {
            low,
            high,
            step,
            gate,
        } => {
            session.scan(*low, *high, *step, *gate, Some(&mut out))?;
            Ok(())
        }
        Commands::Tune {
            peaks_csv,
            max_iter,
            tolerance,
        } => {
            let peaks = tuning_peaks(cfg, base_dir, peaks_csv.as_deref())?;
            let report = session.tune_peak_position(
                &peaks,
                max_iter.unwrap_or(cfg.tuning.max_iter),
                tolerance.unwrap_or(cfg.tuning.max_delta_mz),
            )?;
            emit_tuning(&mut out, &report)
        }
        Commands::Calibration => {
            let ri = session.ri()?;
            let rs = session.rs()?;
            let obj = json!({ "type": "calibration", "ri": ri, "rs": rs });
            out.emit(&obj, &format!("RI={ri:+.4} RS={rs:.4}"))
        }
        Commands::Filament { state } => {
            match state {
                Switch::On => session.filament_on()?,
                Switch::Off => session.filament_off()?,
            }
            let on = *state == Switch::On;
            let current = session.filament_current()?;
            let obj = json!({ "type": "filament", "on": on, "current_ma": current });
            out.emit(&obj, &format!("filament {} ({current:.2} mA)", if on { "on" } else { "off" }))
        }
        Commands::SelfCheck => {
            let s = session.status()?;
            let obj = json!({
                "type": "status",
                "label": s.label,
                "serial_number": s.serial_number,
                "electron_energy": s.electron_energy,
                "filament_current": s.filament_current,
                "has_multiplier": s.has_multiplier,
                "multiplier_default_hv": s.multiplier_default_hv,
                "detector": s.detector.code().to_string(),
                "noise_floor": s.noise_floor,
                "ri": s.ri,
                "rs": s.rs,
            });
            let text = format!(
                "{} (SN {}): EE={} eV FL={} mA CEM={} det={} NF={} RI={:+.4} RS={:.4}\nself-check OK",
                s.label,
                s.serial_number,
                s.electron_energy,
                s.filament_current,
                if s.has_multiplier { "installed" } else { "none" },
                s.detector,
                s.noise_floor,
                s.ri,
                s.rs
            );
            out.emit(&obj, &text)
        }
        Commands::Ports => list_ports(json),
    }
}
