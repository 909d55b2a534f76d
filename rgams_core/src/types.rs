//! Value types shared by the acquisition and tuning paths.

use std::fmt;
use std::str::FromStr;

use crate::error::RgaError;

/// Unit tag of every analog reading the head produces.
pub const UNIT_AMPERE: &str = "A";
/// Unit tag of a skipped reading.
pub const UNIT_NONE: &str = "(none)";

/// Ion detector in the beam path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Detector {
    Faraday,
    /// Electron multiplier (CEM); needs a bias voltage.
    Multiplier,
}

impl Detector {
    /// Single-letter code used in data records and peak tables.
    pub fn code(self) -> char {
        match self {
            Detector::Faraday => 'F',
            Detector::Multiplier => 'M',
        }
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Detector {
    type Err = RgaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "F" | "f" => Ok(Detector::Faraday),
            "M" | "m" => Ok(Detector::Multiplier),
            other => Err(RgaError::Usage(format!("unknown detector '{other}'"))),
        }
    }
}

impl From<rgams_config::DetectorCode> for Detector {
    fn from(code: rgams_config::DetectorCode) -> Self {
        match code {
            rgams_config::DetectorCode::Faraday => Detector::Faraday,
            rgams_config::DetectorCode::Multiplier => Detector::Multiplier,
        }
    }
}

/// One single-mass reading as kept in the peak history.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Seconds since the UNIX epoch.
    pub timestamp: f64,
    pub mz: u32,
    pub intensity: f64,
    pub detector: Detector,
    pub unit: String,
}

/// Result of a single-mass read.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub unit: String,
    pub timestamp: f64,
    /// `None` when the read was skipped.
    pub detector: Option<Detector>,
}

impl Reading {
    pub(crate) fn skipped(timestamp: f64) -> Self {
        Self {
            value: -1.0,
            unit: UNIT_NONE.to_string(),
            timestamp,
            detector: None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.detector.is_none()
    }
}

/// An analog sweep, cropped to the requested window.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub mz: Vec<f64>,
    pub intensity: Vec<f64>,
    pub unit: String,
    pub detector: Detector,
    /// Midpoint of the acquisition, seconds since the UNIX epoch.
    pub timestamp: f64,
}

impl ScanResult {
    pub fn len(&self) -> usize {
        self.mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.mz.iter().copied().zip(self.intensity.iter().copied())
    }
}
