//! Collaborator capabilities: data records out, plots out.

use crate::buffer::PeakHistoryBuffer;
use crate::error::Result;
use crate::types::Detector;

/// Instrument tag written with every data record.
pub const INSTRUMENT_TAG: &str = "RGA_SRS";

/// A single-mass reading as handed to a data sink.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakRecord {
    pub instrument: &'static str,
    pub label: String,
    /// Requested mass, kept as given even when the read was skipped.
    pub mz: i64,
    pub value: f64,
    pub unit: String,
    pub detector: Option<Detector>,
    pub gate: f64,
    pub timestamp: f64,
}

/// A background reading taken next to a peak.
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroRecord {
    pub instrument: &'static str,
    pub label: String,
    pub mz: i64,
    pub mz_offset: i32,
    pub value: f64,
    pub unit: String,
    pub detector: Option<Detector>,
    pub gate: f64,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanRecord {
    pub instrument: &'static str,
    pub label: String,
    pub mz: Vec<f64>,
    pub intensity: Vec<f64>,
    pub unit: String,
    pub detector: Detector,
    pub gate: f64,
    pub timestamp: f64,
}

/// Destination for acquired data (a data file, a JSON stream, ...).
pub trait DataSink {
    fn write_peak(&mut self, record: &PeakRecord) -> Result<()>;
    fn write_zero(&mut self, record: &ZeroRecord) -> Result<()>;
    fn write_scan(&mut self, record: &ScanRecord) -> Result<()>;
}

/// Optional live display.
///
/// The session always calls it; `NoDisplay` stands in when there is nothing
/// to draw on.
pub trait PlotDisplay {
    fn plot_peak_history(&mut self, label: &str, history: &PeakHistoryBuffer);

    /// `cumulative` carries the normalized cumulative sum used for peak centering.
    fn plot_scan(
        &mut self,
        label: &str,
        mz: &[f64],
        intensity: &[f64],
        unit: &str,
        cumulative: Option<(&[f64], &[f64])>,
    );
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoDisplay;

impl PlotDisplay for NoDisplay {
    fn plot_peak_history(&mut self, _label: &str, _history: &PeakHistoryBuffer) {}

    fn plot_scan(
        &mut self,
        _label: &str,
        _mz: &[f64],
        _intensity: &[f64],
        _unit: &str,
        _cumulative: Option<(&[f64], &[f64])>,
    ) {
    }
}

/// Sink that keeps every record in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub peaks: Vec<PeakRecord>,
    pub zeros: Vec<ZeroRecord>,
    pub scans: Vec<ScanRecord>,
}

impl DataSink for MemorySink {
    fn write_peak(&mut self, record: &PeakRecord) -> Result<()> {
        self.peaks.push(record.clone());
        Ok(())
    }

    fn write_zero(&mut self, record: &ZeroRecord) -> Result<()> {
        self.zeros.push(record.clone());
        Ok(())
    }

    fn write_scan(&mut self, record: &ScanRecord) -> Result<()> {
        self.scans.push(record.clone());
        Ok(())
    }
}
