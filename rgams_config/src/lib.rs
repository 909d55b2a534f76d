#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and tuning peak tables for the RGA driver.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The peak table CSV loader enforces exact headers and checks every row.
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Detector column of a peak table.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum DetectorCode {
    #[serde(rename = "F", alias = "f")]
    Faraday,
    #[serde(rename = "M", alias = "m")]
    Multiplier,
}

/// One calibration peak used for mass tuning.
///
/// CSV headers:
/// mz,width,gate,detector
///
/// Example:
/// mz,width,gate,detector
/// 28,1.0,0.163,F
/// 84,1.0,0.48,M
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct PeakRow {
    pub mz: f64,
    /// Half-width of the scan window around `mz`.
    pub width: f64,
    /// Gate time in seconds.
    pub gate: f64,
    pub detector: DetectorCode,
}

#[derive(Debug, Deserialize)]
pub struct Serial {
    /// Device path, e.g. /dev/ttyUSB0
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_baud() -> u32 {
    28_800
}

fn default_read_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Instrument {
    pub label: String,
    /// Multiplier bias voltage used when the CEM is selected (V).
    pub cem_hv: f64,
    /// Capacity of the single-mass history buffer.
    pub max_buffer_points: usize,
}

impl Default for Instrument {
    fn default() -> Self {
        Self {
            label: "MS".to_string(),
            cem_hv: 1400.0,
            max_buffer_points: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub max_iter: u32,
    /// Convergence tolerance in mz units.
    pub max_delta_mz: f64,
    pub peaks: Vec<PeakRow>,
    /// Optional CSV peak table; used when `peaks` is empty.
    pub peaks_csv: Option<PathBuf>,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            max_iter: 10,
            max_delta_mz: 0.05,
            peaks: Vec::new(),
            peaks_csv: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub serial: Serial,
    #[serde(default)]
    pub instrument: Instrument,
    #[serde(default)]
    pub tuning: Tuning,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Highest bias voltage the multiplier supply accepts (V).
pub const CEM_HV_MAX: f64 = 2490.0;

fn check_peak(what: &str, p: &PeakRow) -> eyre::Result<()> {
    if !(p.mz.is_finite() && p.mz >= 1.0) {
        eyre::bail!("{what}: mz must be >= 1, got {}", p.mz);
    }
    if !(p.width.is_finite() && p.width > 0.0) {
        eyre::bail!("{what}: width must be > 0, got {}", p.width);
    }
    if !(p.gate.is_finite() && p.gate > 0.0) {
        eyre::bail!("{what}: gate must be > 0, got {}", p.gate);
    }
    Ok(())
}

pub fn load_peaks_csv(path: &Path) -> eyre::Result<Vec<PeakRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open peak table CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["mz", "width", "gate", "detector"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "peak table CSV must have headers 'mz,width,gate,detector', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<PeakRow>().enumerate() {
        match rec {
            Ok(row) => {
                check_peak(&format!("CSV row {}", idx + 2), &row)?;
                rows.push(row);
            }
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    if rows.is_empty() {
        eyre::bail!("peak table {:?} has no rows", path);
    }
    Ok(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Serial
        if self.serial.port.trim().is_empty() {
            eyre::bail!("serial.port must not be empty");
        }
        if self.serial.baud == 0 {
            eyre::bail!("serial.baud must be > 0");
        }
        if self.serial.read_timeout_ms == 0 {
            eyre::bail!("serial.read_timeout_ms must be >= 1");
        }

        // Instrument
        if self.instrument.label.trim().is_empty() {
            eyre::bail!("instrument.label must not be empty");
        }
        if !(0.0..=CEM_HV_MAX).contains(&self.instrument.cem_hv) {
            eyre::bail!("instrument.cem_hv must be in [0, {CEM_HV_MAX}]");
        }
        if self.instrument.max_buffer_points == 0 {
            eyre::bail!("instrument.max_buffer_points must be >= 1");
        }

        // Tuning
        if self.tuning.max_iter == 0 {
            eyre::bail!("tuning.max_iter must be >= 1");
        }
        if !(self.tuning.max_delta_mz.is_finite() && self.tuning.max_delta_mz > 0.0) {
            eyre::bail!("tuning.max_delta_mz must be > 0");
        }
        for (i, p) in self.tuning.peaks.iter().enumerate() {
            check_peak(&format!("tuning.peaks[{i}]"), p)?;
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        Ok(())
    }

    /// Tuning peaks from the config, or from `peaks_csv` when none are inline.
    ///
    /// A relative `peaks_csv` path is resolved against `base_dir`.
    pub fn tuning_peaks(&self, base_dir: &Path) -> eyre::Result<Vec<PeakRow>> {
        if !self.tuning.peaks.is_empty() {
            return Ok(self.tuning.peaks.clone());
        }
        match &self.tuning.peaks_csv {
            Some(p) if p.is_absolute() => load_peaks_csv(p),
            Some(p) => load_peaks_csv(&base_dir.join(p)),
            None => Ok(Vec::new()),
        }
    }
}
