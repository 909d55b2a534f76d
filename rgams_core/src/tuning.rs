//! Iterative peak-position tuning.
//!
//! Each cycle scans every calibration peak, locates its center twice (median
//! of the cumulative sum and mean position of the peak top), fits the mass
//! offsets linearly against nominal mass and corrects RI (low-mass intercept)
//! and RS (high-mass slope) from the fit extrapolated to mz 0 and 128.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use tracing::{debug, info};

use crate::error::{Report, Result, RgaError};
use crate::fit::{cumulative_sum, fit_line, line_through};
use crate::types::{Detector, ScanResult};

/// Allowed RI voltage.
pub const RI_RANGE: RangeInclusive<f64> = -86.0..=86.0;
/// Allowed RS voltage.
pub const RS_RANGE: RangeInclusive<f64> = 600.0..=1600.0;
/// Resolution of every tuning scan.
pub const TUNING_STEPS_PER_AMU: i32 = 25;
/// Largest tolerated disagreement between the two center estimates.
pub const MAX_ESTIMATE_SPREAD: f64 = 0.35;
/// Fraction of the peak maximum that defines the peak top.
pub const TOP_FRACTION: f64 = 0.8;
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;
pub const DEFAULT_TOLERANCE: f64 = 0.05;
/// Mass at which the high-end offset is evaluated.
pub const REFERENCE_MZ: f64 = 128.0;

/// A peak used as a mass reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPeak {
    pub mz: f64,
    /// Half-width of the scan window around `mz`.
    pub width: f64,
    pub gate: f64,
    pub detector: Detector,
}

impl From<&rgams_config::PeakRow> for CalibrationPeak {
    fn from(row: &rgams_config::PeakRow) -> Self {
        Self {
            mz: row.mz,
            width: row.width,
            gate: row.gate,
            detector: row.detector.into(),
        }
    }
}

/// What one tuning cycle learned about one peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationObservation {
    pub target_mz: f64,
    /// `None` when the peak center could not be determined reliably.
    pub center: Option<f64>,
    /// `target_mz - center`; positive when the peak reads low.
    pub offset: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningState {
    pub ri: f64,
    pub rs: f64,
    pub iterations: u32,
    pub tolerance: f64,
    pub offset_at_0: Option<f64>,
    pub offset_at_128: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningOutcome {
    /// Both extrapolated offsets are within tolerance.
    Converged,
    MaxIterationsReached,
    /// Fewer than two peaks gave a usable center; nothing was written.
    Indeterminate,
}

/// One pass through the peak list.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningCycle {
    pub iteration: u32,
    /// Calibration in effect while the peaks were scanned.
    pub ri: f64,
    pub rs: f64,
    pub observations: Vec<CalibrationObservation>,
    pub offset_at_0: Option<f64>,
    pub offset_at_128: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TuningReport {
    pub outcome: TuningOutcome,
    /// Calibration left on the device.
    pub state: TuningState,
    pub cycles: Vec<TuningCycle>,
}

impl TuningReport {
    pub fn converged(&self) -> bool {
        self.outcome == TuningOutcome::Converged
    }
}

/// Device operations the tuner needs.
pub trait Tunable {
    fn ri(&mut self) -> Result<f64>;
    fn rs(&mut self) -> Result<f64>;
    fn set_ri(&mut self, ri: f64) -> Result<()>;
    fn set_rs(&mut self, rs: f64) -> Result<()>;
    fn select_detector(&mut self, detector: Detector) -> Result<()>;
    fn scan_peak(&mut self, low: f64, high: f64, steps: i32, gate: f64) -> Result<ScanResult>;

    /// Show a baseline-corrected trace with its normalized cumulative sum.
    fn show_scan(&mut self, _mz: &[f64], _intensity: &[f64], _unit: &str, _cumulative: (&[f64], &[f64])) {}

    fn diagnostic(&self, message: &str) {
        tracing::warn!("{message}");
    }
}

/// Center estimates for one scanned peak.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PeakCenter {
    /// Where the normalized cumulative sum crosses 0.5.
    pub median: Option<f64>,
    /// Mean position of the points at or above `TOP_FRACTION` of the maximum.
    pub top: Option<f64>,
    pub corrected: Vec<f64>,
    pub cumulative_mz: Vec<f64>,
    pub cumulative: Vec<f64>,
}

impl PeakCenter {
    /// `(median + 3 * top) / 4`, or `None` if either is missing or they disagree.
    pub fn combined(&self) -> Option<f64> {
        let (m1, m2) = (self.median?, self.top?);
        if (m1 - m2).abs() > MAX_ESTIMATE_SPREAD {
            return None;
        }
        Some((m1 + 3.0 * m2) / 4.0)
    }
}

/// Remove the straight baseline through the averaged end points and shift
/// the trace so its minimum is zero.
pub fn subtract_baseline(mz: &[f64], intensity: &[f64]) -> Option<Vec<f64>> {
    let n = mz.len().min(intensity.len());
    if n < 2 {
        return None;
    }
    let left = ((mz[0] + mz[1]) / 2.0, (intensity[0] + intensity[1]) / 2.0);
    let right = (
        (mz[n - 1] + mz[n - 2]) / 2.0,
        (intensity[n - 1] + intensity[n - 2]) / 2.0,
    );
    let baseline = line_through(left, right)?;
    let mut out: Vec<f64> = mz[..n]
        .iter()
        .zip(&intensity[..n])
        .map(|(x, y)| y - baseline.eval(*x))
        .collect();
    let min = out.iter().copied().fold(f64::INFINITY, f64::min);
    for v in &mut out {
        *v -= min;
    }
    Some(out)
}

/// Median position of a non-negative trace from its cumulative sum.
///
/// The cumulative sum is placed half a grid step above each point. Returns
/// the estimate with the shifted positions and the normalized sum.
pub fn median_center(mz: &[f64], corrected: &[f64]) -> (Option<f64>, Vec<f64>, Vec<f64>) {
    if mz.len() < 2 || corrected.len() != mz.len() {
        return (None, Vec::new(), Vec::new());
    }
    let half_step = (mz[1] - mz[0]) / 2.0;
    let cmz: Vec<f64> = mz.iter().map(|m| m + half_step).collect();
    let cs = cumulative_sum(corrected);
    let max = cs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max > 0.0) {
        return (None, cmz, cs);
    }
    let cy: Vec<f64> = cs.iter().map(|c| c / max).collect();
    let above = cy.iter().position(|c| *c > 0.5).unwrap_or(0);
    let below = cy.iter().rposition(|c| *c <= 0.5).unwrap_or(0);
    let median = (above > below).then(|| {
        cmz[above] + (0.5 - cy[above]) / (cy[below] - cy[above]) * (cmz[below] - cmz[above])
    });
    (median, cmz, cy)
}

/// Mean position of all points at or above `TOP_FRACTION` of the maximum.
pub fn top_center(mz: &[f64], corrected: &[f64]) -> Option<f64> {
    let max = corrected.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return None;
    }
    let (sum, count) = mz
        .iter()
        .zip(corrected)
        .filter(|(_, y)| **y >= TOP_FRACTION * max)
        .fold((0.0, 0usize), |(s, c), (m, _)| (s + m, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Both center estimates for a scanned peak.
pub fn locate_peak(mz: &[f64], intensity: &[f64]) -> PeakCenter {
    let Some(corrected) = subtract_baseline(mz, intensity) else {
        return PeakCenter::default();
    };
    let (median, cumulative_mz, cumulative) = median_center(mz, &corrected);
    let top = top_center(mz, &corrected);
    PeakCenter {
        median,
        top,
        corrected,
        cumulative_mz,
        cumulative,
    }
}

/// Linear offset model extrapolated to mz 0 and `REFERENCE_MZ`.
pub fn fit_offsets(observations: &[CalibrationObservation]) -> Option<(f64, f64)> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = observations
        .iter()
        .filter_map(|o| o.offset.map(|d| (o.target_mz, d)))
        .unzip();
    let fit = fit_line(&xs, &ys)?;
    Some((fit.eval(0.0), fit.eval(REFERENCE_MZ)))
}

/// RI/RS after applying the offsets measured at mz 0 and `REFERENCE_MZ`.
///
/// `reference_mz` is the target mass of the last peak of the cycle.
pub fn corrected_calibration(
    ri: f64,
    rs: f64,
    offset_at_0: f64,
    offset_at_128: f64,
    reference_mz: f64,
) -> (f64, f64) {
    let ri_new = ri - offset_at_0 * (rs / REFERENCE_MZ);
    let rs_new = rs * reference_mz / (reference_mz + offset_at_128);
    (ri_new, rs_new)
}

/// Reject peak lists that cannot constrain a line.
pub fn validate_peaks(peaks: &[CalibrationPeak]) -> std::result::Result<(), RgaError> {
    let distinct: BTreeSet<u64> = peaks.iter().map(|p| p.mz.to_bits()).collect();
    if distinct.len() < 2 {
        return Err(RgaError::Usage(
            "need at least two distinct mz values to tune peak positions".to_string(),
        ));
    }
    if let Some(p) = peaks.iter().find(|p| !(p.width > 0.0) || !p.mz.is_finite()) {
        return Err(RgaError::Usage(format!(
            "calibration peak at mz {} needs a positive scan width",
            p.mz
        )));
    }
    Ok(())
}

/// Closed-loop RI/RS tuner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakTuner {
    pub max_iterations: u32,
    pub tolerance: f64,
}

impl Default for PeakTuner {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl PeakTuner {
    pub fn new(max_iterations: u32, tolerance: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
        }
    }

    /// Fraction of the measured offsets applied per cycle.
    ///
    /// Fixed by the iteration budget; a single-shot tune applies all of it.
    pub fn damping(&self) -> f64 {
        if self.max_iterations > 1 {
            0.2 + 1.0 / f64::from(self.max_iterations).sqrt()
        } else {
            1.0
        }
    }

    pub fn tune<T: Tunable + ?Sized>(&self, device: &mut T, peaks: &[CalibrationPeak]) -> Result<TuningReport> {
        if self.max_iterations == 0 {
            return Err(Report::new(RgaError::Usage(
                "max_iter must be >= 1".to_string(),
            )));
        }
        if !(self.tolerance > 0.0) {
            return Err(Report::new(RgaError::Usage(
                "tolerance must be > 0".to_string(),
            )));
        }
        validate_peaks(peaks).map_err(Report::new)?;
        let reference_mz = peaks.last().map_or(REFERENCE_MZ, |p| p.mz);

        let mut cycles = Vec::new();
        let mut ri = device.ri()?;
        let mut rs = device.rs()?;
        for iteration in 1..=self.max_iterations {
            info!(iteration, ri, rs, "tuning cycle");
            let observations = self.observe(device, peaks)?;
            let fitted = fit_offsets(&observations);
            cycles.push(TuningCycle {
                iteration,
                ri,
                rs,
                observations,
                offset_at_0: fitted.map(|f| f.0),
                offset_at_128: fitted.map(|f| f.1),
            });

            let state = |ri, rs| TuningState {
                ri,
                rs,
                iterations: iteration,
                tolerance: self.tolerance,
                offset_at_0: fitted.map(|f| f.0),
                offset_at_128: fitted.map(|f| f.1),
            };
            let Some((off0, off128)) = fitted else {
                device.diagnostic("fewer than two peak centers could be determined; tuning stopped");
                return Ok(TuningReport {
                    outcome: TuningOutcome::Indeterminate,
                    state: state(ri, rs),
                    cycles,
                });
            };
            info!(offset_at_0 = off0, offset_at_128 = off128, "mz offsets");

            if off0.abs() < self.tolerance && off128.abs() < self.tolerance {
                info!(iteration, tolerance = self.tolerance, "peak positions within tolerance");
                return Ok(TuningReport {
                    outcome: TuningOutcome::Converged,
                    state: state(ri, rs),
                    cycles,
                });
            }

            let damping = self.damping();
            let (ri_new, rs_new) =
                corrected_calibration(ri, rs, off0 * damping, off128 * damping, reference_mz);
            device.set_ri(ri_new)?;
            device.set_rs(rs_new)?;
            ri = device.ri()?;
            rs = device.rs()?;

            if iteration == self.max_iterations {
                info!(iterations = self.max_iterations, "tuning stopped at iteration limit");
                return Ok(TuningReport {
                    outcome: TuningOutcome::MaxIterationsReached,
                    state: state(ri, rs),
                    cycles,
                });
            }
        }
        // max_iterations >= 1, so the loop always returns.
        Err(Report::new(RgaError::Usage("max_iter must be >= 1".to_string())))
    }

    fn observe<T: Tunable + ?Sized>(
        &self,
        device: &mut T,
        peaks: &[CalibrationPeak],
    ) -> Result<Vec<CalibrationObservation>> {
        let mut observations = Vec::with_capacity(peaks.len());
        for peak in peaks {
            debug!(mz = peak.mz, detector = %peak.detector, "scanning calibration peak");
            device.select_detector(peak.detector)?;
            let scan = device.scan_peak(
                peak.mz - peak.width,
                peak.mz + peak.width,
                TUNING_STEPS_PER_AMU,
                peak.gate,
            )?;
            let located = locate_peak(&scan.mz, &scan.intensity);
            if !located.corrected.is_empty() {
                device.show_scan(
                    &scan.mz,
                    &located.corrected,
                    &scan.unit,
                    (&located.cumulative_mz, &located.cumulative),
                );
            }
            let center = match (located.median, located.top) {
                (Some(m1), Some(m2)) if (m1 - m2).abs() > MAX_ESTIMATE_SPREAD => {
                    device.diagnostic(&format!(
                        "peak center values from peak top ({m2:.3}) and median ({m1:.3}) differ by more than {MAX_ESTIMATE_SPREAD}, ignoring peak at mz = {}",
                        peak.mz
                    ));
                    None
                }
                (Some(_), Some(_)) => located.combined(),
                _ => {
                    device.diagnostic(&format!(
                        "could not reliably determine peak center at mz = {}, ignoring this peak",
                        peak.mz
                    ));
                    None
                }
            };
            if let Some(c) = center {
                debug!(mz = peak.mz, center = c, "peak center");
            }
            observations.push(CalibrationObservation {
                target_mz: peak.mz,
                center,
                offset: center.map(|c| peak.mz - c),
            });
        }
        Ok(observations)
    }
}
