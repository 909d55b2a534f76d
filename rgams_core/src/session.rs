//! Session over one RGA head.
//!
//! A session owns the exclusive link, the parameter cache and the peak
//! history. It is created with [`RgaSession::builder`]; opening it queries
//! the head's identity.

use std::marker::PhantomData;
use std::sync::Arc;

use eyre::WrapErr;
use rgams_traits::{Clock, DiagnosticSink, MonotonicClock, SerialLink};
use tracing::info;

use crate::buffer::{DEFAULT_CAPACITY, PeakHistoryBuffer};
use crate::channel::CommandChannel;
use crate::diagnostics::TracingDiagnostics;
use crate::error::{Report, Result, RgaError};
use crate::frame;
use crate::gate::{gate_out_of_range, noise_floor_for_gate};
use crate::params::{ParamKey, ParameterCache};
use crate::sink::{DataSink, INSTRUMENT_TAG, NoDisplay, PeakRecord, PlotDisplay, ZeroRecord};
use crate::tuning::{
    CalibrationPeak, PeakTuner, RI_RANGE, RS_RANGE, Tunable, TuningReport,
};
use crate::types::{Detector, Reading, Sample, ScanResult, UNIT_AMPERE};

/// Link type held by a session.
pub type BoxedLink = Box<dyn SerialLink + Send>;

pub const DEFAULT_LABEL: &str = "MS";
/// Default multiplier bias voltage (V).
pub const DEFAULT_CEM_HV: f64 = 1400.0;

pub struct Missing;
pub struct Set;

/// Builder for `RgaSession`; `open()` becomes available once a link is set.
pub struct SessionBuilder<L> {
    link: Option<BoxedLink>,
    label: String,
    cem_hv: f64,
    max_buffer_points: usize,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    diagnostics: Option<Box<dyn DiagnosticSink + Send + Sync>>,
    display: Option<Box<dyn PlotDisplay>>,
    _l: PhantomData<L>,
}

impl Default for SessionBuilder<Missing> {
    fn default() -> Self {
        Self {
            link: None,
            label: DEFAULT_LABEL.to_string(),
            cem_hv: DEFAULT_CEM_HV,
            max_buffer_points: DEFAULT_CAPACITY,
            clock: None,
            diagnostics: None,
            display: None,
            _l: PhantomData,
        }
    }
}

impl SessionBuilder<Missing> {
    pub fn with_link(self, link: impl SerialLink + Send + 'static) -> SessionBuilder<Set> {
        SessionBuilder {
            link: Some(Box::new(link)),
            label: self.label,
            cem_hv: self.cem_hv,
            max_buffer_points: self.max_buffer_points,
            clock: self.clock,
            diagnostics: self.diagnostics,
            display: self.display,
            _l: PhantomData,
        }
    }
}

impl<L> SessionBuilder<L> {
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Bias voltage applied when the multiplier is selected.
    pub fn cem_hv(mut self, volts: f64) -> Self {
        self.cem_hv = volts;
        self
    }

    pub fn max_buffer_points(mut self, n: usize) -> Self {
        self.max_buffer_points = n;
        self
    }

    /// Apply the `[instrument]` section of the config file.
    pub fn with_instrument(self, cfg: &rgams_config::Instrument) -> Self {
        self.label(cfg.label.clone())
            .cem_hv(cfg.cem_hv)
            .max_buffer_points(cfg.max_buffer_points)
    }

    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Warnings go to `tracing` unless another sink is given.
    pub fn with_diagnostics(mut self, sink: Box<dyn DiagnosticSink + Send + Sync>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn with_display(mut self, display: Box<dyn PlotDisplay>) -> Self {
        self.display = Some(display);
        self
    }
}

impl SessionBuilder<Set> {
    /// Build the session and read the head's serial number.
    pub fn open(self) -> Result<RgaSession> {
        let Some(link) = self.link else {
            return Err(Report::new(RgaError::Usage("missing link".to_string())));
        };
        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };
        let diagnostics: Arc<dyn DiagnosticSink + Send + Sync> = match self.diagnostics {
            Some(b) => Arc::from(b),
            None => Arc::new(TracingDiagnostics),
        };
        let mut session = RgaSession {
            channel: CommandChannel::new(link, clock, diagnostics, self.label.clone()),
            params: ParameterCache::new(),
            buffer: PeakHistoryBuffer::with_capacity(self.max_buffer_points),
            label: self.label,
            serial_number: String::new(),
            cem_hv: self.cem_hv,
            display: self.display.unwrap_or_else(|| Box::new(NoDisplay)),
        };
        let id = session.channel.query("ID?")?;
        let Some(id) = id.text() else {
            return Err(Report::new(RgaError::Timeout("ID?".to_string())))
                .wrap_err("RGA did not identify itself");
        };
        session.serial_number = serial_from_identity(id).to_string();
        info!(
            label = %session.label,
            serial = %session.serial_number,
            "RGA session opened"
        );
        Ok(session)
    }
}

/// Serial number is the second '.'-separated field of the identity string.
fn serial_from_identity(id: &str) -> &str {
    id.split('.').nth(1).unwrap_or(id).trim()
}

/// Snapshot of the head's operating settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub label: String,
    pub serial_number: String,
    pub electron_energy: f64,
    pub filament_current: f64,
    pub has_multiplier: bool,
    pub multiplier_default_hv: f64,
    pub detector: Detector,
    pub noise_floor: i32,
    pub ri: f64,
    pub rs: f64,
}

/// One RGA head behind an exclusive link.
pub struct RgaSession {
    pub(crate) channel: CommandChannel<BoxedLink>,
    pub(crate) params: ParameterCache,
    pub(crate) buffer: PeakHistoryBuffer,
    pub(crate) label: String,
    pub(crate) serial_number: String,
    pub(crate) cem_hv: f64,
    pub(crate) display: Box<dyn PlotDisplay>,
}

impl core::fmt::Debug for RgaSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RgaSession")
            .field("label", &self.label)
            .field("serial_number", &self.serial_number)
            .field("cem_hv", &self.cem_hv)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

impl RgaSession {
    pub fn builder() -> SessionBuilder<Missing> {
        SessionBuilder::default()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    fn warn(&self, message: &str) {
        self.channel.warn(message);
    }

    fn now(&self) -> f64 {
        self.channel.clock().unix_time()
    }

    // ── Ionizer ──────────────────────────────────────────────────────────────

    /// Electron energy in eV.
    pub fn set_electron_energy(&mut self, ev: f64) -> Result<()> {
        self.channel.query(&format!("EE{ev}")).map(|_| ())
    }

    pub fn electron_energy(&mut self) -> Result<f64> {
        self.channel.query("EE?")?.parse("EE?")
    }

    /// Filament current in mA.
    pub fn set_filament_current(&mut self, ma: f64) -> Result<()> {
        self.channel.query(&format!("FL{ma}")).map(|_| ())
    }

    pub fn filament_current(&mut self) -> Result<f64> {
        self.channel.query("FL?")?.parse("FL?")
    }

    /// Filament on at the head's default current.
    pub fn filament_on(&mut self) -> Result<()> {
        self.channel.query("FL*").map(|_| ())
    }

    pub fn filament_off(&mut self) -> Result<()> {
        self.set_filament_current(0.0)
    }

    // ── Detectors ────────────────────────────────────────────────────────────

    pub fn has_multiplier(&mut self) -> Result<bool> {
        self.params.multiplier_installed(&mut self.channel)
    }

    pub fn mz_max(&mut self) -> Result<u32> {
        self.params.mz_max(&mut self.channel)
    }

    /// Drop one cached head parameter; the next use re-queries it.
    pub fn forget_parameter(&mut self, key: ParamKey) {
        self.params.invalidate(key);
    }

    /// Drop every cached head parameter, e.g. after swapping the head.
    pub fn clear_parameter_cache(&mut self) {
        self.params.clear();
    }

    pub fn set_multiplier_hv(&mut self, volts: f64) -> Result<()> {
        if !self.has_multiplier()? {
            self.warn("Cannot set multiplier (CEM) high voltage, because CEM option is not installed.");
            return Ok(());
        }
        self.channel.query(&format!("HV{volts}")).map(|_| ())
    }

    /// Multiplier bias voltage, `None` without a multiplier.
    pub fn multiplier_hv(&mut self) -> Result<Option<f64>> {
        if !self.has_multiplier()? {
            self.warn("Cannot get multiplier (CEM) high voltage, because CEM option is not installed.");
            return Ok(None);
        }
        self.channel.query("HV?")?.parse("HV?").map(Some)
    }

    /// The session's configured bias voltage, not the head's stored default.
    pub fn multiplier_default_hv(&self) -> f64 {
        self.cem_hv
    }

    pub fn set_detector(&mut self, detector: Detector) -> Result<()> {
        match detector {
            Detector::Faraday => self.channel.query("HV0").map(|_| ()),
            Detector::Multiplier => {
                if self.has_multiplier()? {
                    self.set_multiplier_hv(self.cem_hv)
                } else {
                    self.warn("RGA has no electron multiplier installed!");
                    Ok(())
                }
            }
        }
    }

    /// Detector currently in the beam path, judged from the bias voltage.
    pub fn detector(&mut self) -> Result<Detector> {
        if !self.has_multiplier()? {
            return Ok(Detector::Faraday);
        }
        let reply = self.channel.query("HV?")?;
        let Some(text) = reply.text() else {
            return Err(Report::new(RgaError::Timeout("HV?".to_string())));
        };
        let hv: f64 = text.trim().parse().map_err(|_| {
            Report::new(RgaError::Decode(format!(
                "indeterminate detector (HV? returned {text:?})"
            )))
        })?;
        Ok(if hv == 0.0 {
            Detector::Faraday
        } else {
            Detector::Multiplier
        })
    }

    // ── Gate time ────────────────────────────────────────────────────────────

    pub fn noise_floor(&mut self) -> Result<i32> {
        self.params.noise_floor(&mut self.channel)
    }

    pub fn set_noise_floor(&mut self, nf: i32) -> Result<i32> {
        self.params.set_noise_floor(&mut self.channel, nf)
    }

    /// Select the noise floor whose gate time best matches `gate` seconds.
    pub fn set_gate_time(&mut self, gate: f64) -> Result<i32> {
        if let Some(msg) = gate_out_of_range(gate) {
            self.warn(&msg);
        }
        self.set_noise_floor(noise_floor_for_gate(gate))
    }

    // ── Single-mass reads ────────────────────────────────────────────────────

    /// Read the ion current at `mz`, record it in the peak history and hand
    /// it to `sink`. Out-of-range masses and unanswered reads are skipped:
    /// the sentinel reading still goes to `sink` but not into the history.
    pub fn peak(&mut self, mz: i64, gate: f64, sink: Option<&mut dyn DataSink>) -> Result<Reading> {
        let target = self.checked_mz(mz, "mz value", "peak")?;
        let reading = match target {
            Some(target) => self.read_single(target, gate)?,
            None => Reading::skipped(self.now()),
        };
        if let Some(sink) = sink {
            sink.write_peak(&PeakRecord {
                instrument: INSTRUMENT_TAG,
                label: self.label.clone(),
                mz,
                value: reading.value,
                unit: reading.unit.clone(),
                detector: reading.detector,
                gate,
                timestamp: reading.timestamp,
            })?;
        }
        if let (Some(mz), Some(detector)) = (target, reading.detector) {
            self.buffer.append(Sample {
                timestamp: reading.timestamp,
                mz,
                intensity: reading.value,
                detector,
                unit: reading.unit.clone(),
            });
        }
        Ok(reading)
    }

    /// Background reading at `mz + offset`; not added to the peak history.
    pub fn zero(
        &mut self,
        mz: i64,
        offset: i32,
        gate: f64,
        sink: Option<&mut dyn DataSink>,
    ) -> Result<Reading> {
        let position = mz + i64::from(offset);
        let reading = match self.checked_mz(position, "mz+mz_offset", "zero")? {
            Some(target) => self.read_single(target, gate)?,
            None => Reading::skipped(self.now()),
        };
        if let Some(sink) = sink {
            sink.write_zero(&ZeroRecord {
                instrument: INSTRUMENT_TAG,
                label: self.label.clone(),
                mz,
                mz_offset: offset,
                value: reading.value,
                unit: reading.unit.clone(),
                detector: reading.detector,
                gate,
                timestamp: reading.timestamp,
            })?;
        }
        Ok(reading)
    }

    fn checked_mz(&mut self, mz: i64, what: &str, kind: &str) -> Result<Option<u32>> {
        if mz < 1 {
            self.warn(&format!("{what} must be positive! Skipping {kind} measurement..."));
            return Ok(None);
        }
        let max = self.mz_max()?;
        if mz > i64::from(max) {
            self.warn(&format!(
                "{what} must be {max} or less! Skipping {kind} measurement..."
            ));
            return Ok(None);
        }
        Ok(u32::try_from(mz).ok())
    }

    fn read_single(&mut self, mz: u32, gate: f64) -> Result<Reading> {
        self.set_gate_time(gate)?;
        let command = format!("MR{mz}");
        self.channel.trigger(&command)?;
        let timestamp = self.now();
        let Some(raw) = self.channel.read_frame()? else {
            self.warn(&format!("no response from RGA (command: {command})"));
            return Ok(Reading::skipped(timestamp));
        };
        if self.channel.pending_bytes()? > 0 {
            self.warn("serial buffer not empty after PEAK reading!");
        }
        let value = frame::decode(&raw)?;
        let detector = self.detector()?;
        Ok(Reading {
            value,
            unit: UNIT_AMPERE.to_string(),
            timestamp,
            detector: Some(detector),
        })
    }

    // ── Mass calibration ─────────────────────────────────────────────────────

    /// Low-mass tuning intercept (V).
    pub fn ri(&mut self) -> Result<f64> {
        let ri: f64 = self
            .channel
            .query("RI?")?
            .parse("RI?")
            .wrap_err("could not determine current RI setting")?;
        check_range("RI", ri, &RI_RANGE).wrap_err("RI read back out of bounds")?;
        Ok(ri)
    }

    /// High-mass tuning slope (V).
    pub fn rs(&mut self) -> Result<f64> {
        let rs: f64 = self
            .channel
            .query("RS?")?
            .parse("RS?")
            .wrap_err("could not determine current RS setting")?;
        check_range("RS", rs, &RS_RANGE).wrap_err("RS read back out of bounds")?;
        Ok(rs)
    }

    pub fn set_ri(&mut self, ri: f64) -> Result<()> {
        check_range("RI", ri, &RI_RANGE)?;
        self.channel.send(&format!("RI{ri:+.4}"))?;
        info!("RI voltage set to {ri:+.4} V");
        Ok(())
    }

    pub fn set_rs(&mut self, rs: f64) -> Result<()> {
        check_range("RS", rs, &RS_RANGE)?;
        self.channel.send(&format!("RS{rs:.4}"))?;
        info!("RS voltage set to {rs:.4} V");
        Ok(())
    }

    /// Tune RI/RS until the calibration peaks sit within `tolerance` of their
    /// nominal masses or `max_iter` cycles have run.
    pub fn tune_peak_position(
        &mut self,
        peaks: &[CalibrationPeak],
        max_iter: u32,
        tolerance: f64,
    ) -> Result<TuningReport> {
        PeakTuner::new(max_iter, tolerance).tune(self, peaks)
    }

    // ── Peak history ─────────────────────────────────────────────────────────

    pub fn peak_buffer(&self) -> &PeakHistoryBuffer {
        &self.buffer
    }

    pub fn clear_peak_buffer(&mut self) {
        self.buffer.clear();
    }

    pub fn plot_peak_buffer(&mut self) {
        self.display.plot_peak_history(&self.label, &self.buffer);
    }

    pub fn status(&mut self) -> Result<SessionStatus> {
        Ok(SessionStatus {
            label: self.label.clone(),
            serial_number: self.serial_number.clone(),
            electron_energy: self.electron_energy()?,
            filament_current: self.filament_current()?,
            has_multiplier: self.has_multiplier()?,
            multiplier_default_hv: self.cem_hv,
            detector: self.detector()?,
            noise_floor: self.noise_floor()?,
            ri: self.ri()?,
            rs: self.rs()?,
        })
    }
}

fn check_range(
    name: &'static str,
    value: f64,
    range: &std::ops::RangeInclusive<f64>,
) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(Report::new(RgaError::Range {
            name,
            value,
            min: *range.start(),
            max: *range.end(),
        }))
    }
}

impl Tunable for RgaSession {
    fn ri(&mut self) -> Result<f64> {
        RgaSession::ri(self)
    }

    fn rs(&mut self) -> Result<f64> {
        RgaSession::rs(self)
    }

    fn set_ri(&mut self, ri: f64) -> Result<()> {
        RgaSession::set_ri(self, ri)
    }

    fn set_rs(&mut self, rs: f64) -> Result<()> {
        RgaSession::set_rs(self, rs)
    }

    fn select_detector(&mut self, detector: Detector) -> Result<()> {
        self.set_detector(detector)
    }

    fn scan_peak(&mut self, low: f64, high: f64, steps: i32, gate: f64) -> Result<ScanResult> {
        self.acquire_scan(low, high, steps, gate)
    }

    fn show_scan(&mut self, mz: &[f64], intensity: &[f64], unit: &str, cumulative: (&[f64], &[f64])) {
        self.display
            .plot_scan(&self.label, mz, intensity, unit, Some(cumulative));
    }

    fn diagnostic(&self, message: &str) {
        self.warn(message);
    }
}
