//! Analog sweep acquisition.
//!
//! The head sweeps `[MI, MF]` at `SA` steps per amu and streams one 4-byte
//! frame per point followed by a total-pressure frame. All `N + 1` frames
//! are drained; only the first `N` are kept.

use std::ops::RangeInclusive;

use eyre::WrapErr;
use tracing::{debug, info};

use crate::error::{Report, Result, RgaError};
use crate::frame;
use crate::session::RgaSession;
use crate::sink::{DataSink, INSTRUMENT_TAG, ScanRecord};
use crate::types::{ScanResult, UNIT_AMPERE};

/// Steps per amu the head supports.
pub const STEPS_PER_AMU: RangeInclusive<i32> = 10..=25;

/// Device configuration derived from a requested mass window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanPlan {
    /// Integer bounds written to `MI` / `MF`.
    pub low: u32,
    pub high: u32,
    pub steps_per_amu: u32,
    /// Requested (fractional) window the result is cropped to.
    pub crop_low: f64,
    pub crop_high: f64,
}

impl ScanPlan {
    /// Most points a sweep over this window can report.
    pub fn max_points(&self) -> usize {
        let amu = (self.high - self.low) as usize + 1;
        amu * *STEPS_PER_AMU.end() as usize + 1
    }
}

/// Normalize a requested window against the head's limits.
///
/// Every adjustment is reported through `warn`.
pub fn plan_scan(
    low: f64,
    high: f64,
    steps: i32,
    mz_max: u32,
    warn: &mut dyn FnMut(&str),
) -> ScanPlan {
    let min_step = *STEPS_PER_AMU.start();
    let max_step = *STEPS_PER_AMU.end();
    let steps = if steps < min_step {
        warn(&format!("Scan step must be {min_step} or higher! Using step = {min_step}..."));
        min_step
    } else if steps > max_step {
        warn(&format!("Scan step must be {max_step} or less! Using step = {max_step}..."));
        max_step
    } else {
        steps
    };

    let (mut crop_low, mut crop_high) = (low, high);
    if crop_low > crop_high {
        warn("Scan m/z value at start must be lower than at end. Swapping values...");
        std::mem::swap(&mut crop_low, &mut crop_high);
    }
    let mut lo = crop_low.floor() as i64;
    let mut hi = crop_high.ceil() as i64;
    if lo < 0 {
        warn("Scan must start at m/z=0 or higher! Starting at m/z=0...");
        lo = 0;
    }
    if hi > i64::from(mz_max) {
        warn(&format!(
            "Scan must end at m/z={mz_max} or lower! Ending at m/z={mz_max}..."
        ));
        hi = i64::from(mz_max);
    }
    if lo > hi {
        warn("Scan m/z value at start must be lower than at end. Swapping values...");
        std::mem::swap(&mut lo, &mut hi);
        hi = hi.min(i64::from(mz_max));
        lo = lo.min(hi);
    }
    ScanPlan {
        low: lo.max(0) as u32,
        high: hi.max(0) as u32,
        steps_per_amu: steps as u32,
        crop_low,
        crop_high,
    }
}

/// `n` evenly spaced positions starting at `low`, spaced `(high - low) / n`.
pub fn mz_grid(low: f64, high: f64, n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let step = (high - low) / n as f64;
    (0..n).map(|i| low + i as f64 * step).collect()
}

/// Keep only the points whose position lies in `[low, high]`.
pub fn crop(mz: &[f64], values: &[f64], low: f64, high: f64) -> (Vec<f64>, Vec<f64>) {
    mz.iter()
        .zip(values)
        .filter(|(m, _)| **m >= low && **m <= high)
        .map(|(m, v)| (*m, *v))
        .unzip()
}

impl RgaSession {
    /// Sweep `[low, high]` and hand the result to `sink` and the display.
    pub fn scan(
        &mut self,
        low: f64,
        high: f64,
        steps: i32,
        gate: f64,
        sink: Option<&mut dyn DataSink>,
    ) -> Result<ScanResult> {
        let result = self.acquire_scan(low, high, steps, gate)?;
        self.display.plot_scan(
            &self.label,
            &result.mz,
            &result.intensity,
            &result.unit,
            None,
        );
        if let Some(sink) = sink {
            sink.write_scan(&ScanRecord {
                instrument: INSTRUMENT_TAG,
                label: self.label.clone(),
                mz: result.mz.clone(),
                intensity: result.intensity.clone(),
                unit: result.unit.clone(),
                detector: result.detector,
                gate,
                timestamp: result.timestamp,
            })?;
        }
        Ok(result)
    }

    /// Configure, trigger and read one sweep without reporting it anywhere.
    pub fn acquire_scan(&mut self, low: f64, high: f64, steps: i32, gate: f64) -> Result<ScanResult> {
        let mz_max = self.mz_max()?;
        let channel = &self.channel;
        let plan = plan_scan(low, high, steps, mz_max, &mut |m| channel.warn(m));
        debug!(?plan, "scan plan");

        self.set_gate_time(gate)?;

        let current_low: u32 = self.channel.query("MI?")?.parse("MI?")?;
        // The head rejects MF below the active MI.
        if plan.high >= current_low {
            self.channel.send(&format!("MF{}", plan.high))?;
            self.channel.send(&format!("MI{}", plan.low))?;
        } else {
            self.channel.send(&format!("MI{}", plan.low))?;
            self.channel.send(&format!("MF{}", plan.high))?;
        }
        self.channel.send(&format!("SA{}", plan.steps_per_amu))?;
        let n: usize = self.channel.query("AP?")?.parse("AP?")?;
        if n > plan.max_points() {
            return Err(Report::new(RgaError::Decode(format!(
                "AP? reported {n} points for m/z {}..{}",
                plan.low, plan.high
            ))));
        }

        self.channel.trigger("SC1")?;
        let t1 = self.channel.clock().unix_time();

        let mut intensity = Vec::with_capacity(n);
        for k in 0..=n {
            let Some(raw) = self.channel.read_frame()? else {
                self.channel
                    .warn("RGA did not produce scan result (or took too long)!");
                return Err(Report::new(RgaError::Timeout("SC1".to_string())))
                    .wrap_err_with(|| format!("scan aborted after {k} of {} frames", n + 1));
            };
            if k < n {
                intensity.push(frame::decode(&raw)?);
            }
        }
        let t2 = self.channel.clock().unix_time();

        let grid = mz_grid(f64::from(plan.low), f64::from(plan.high), n);
        let (mz, intensity) = crop(&grid, &intensity, plan.crop_low, plan.crop_high);
        let detector = self.detector()?;
        info!(
            low = plan.low,
            high = plan.high,
            points = n,
            kept = mz.len(),
            "scan complete"
        );
        Ok(ScanResult {
            mz,
            intensity,
            unit: UNIT_AMPERE.to_string(),
            detector,
            timestamp: (t1 + t2) / 2.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(low: f64, high: f64, steps: i32, mz_max: u32) -> (ScanPlan, Vec<String>) {
        let mut warnings = Vec::new();
        let p = plan_scan(low, high, steps, mz_max, &mut |m| warnings.push(m.to_string()));
        (p, warnings)
    }

    #[test]
    fn fractional_bounds_are_widened_for_the_device() {
        let (p, w) = plan(27.4, 28.6, 25, 100);
        assert_eq!((p.low, p.high, p.steps_per_amu), (27, 29, 25));
        assert_eq!((p.crop_low, p.crop_high), (27.4, 28.6));
        assert!(w.is_empty());
    }

    #[test]
    fn steps_are_clamped() {
        let (p, w) = plan(1.0, 5.0, 3, 100);
        assert_eq!(p.steps_per_amu, 10);
        assert!(w[0].contains("10 or higher"));
        let (p, w) = plan(1.0, 5.0, 40, 100);
        assert_eq!(p.steps_per_amu, 25);
        assert!(w[0].contains("25 or less"));
    }

    #[test]
    fn window_is_limited_to_head_range() {
        let (p, w) = plan(-3.0, 250.0, 10, 200);
        assert_eq!((p.low, p.high), (0, 200));
        assert_eq!(w.len(), 2);
    }

    #[test]
    fn reversed_window_is_swapped() {
        let (p, w) = plan(44.5, 40.2, 10, 100);
        assert_eq!((p.low, p.high), (40, 45));
        assert_eq!((p.crop_low, p.crop_high), (40.2, 44.5));
        assert!(w[0].contains("Swapping"));
    }

    #[test]
    fn window_beyond_head_range_collapses_to_mz_max() {
        let (p, w) = plan(150.0, 160.0, 10, 100);
        assert_eq!((p.low, p.high), (100, 100));
        assert_eq!(w.len(), 2);
    }

    #[test]
    fn point_bound_covers_the_widest_sweep() {
        let (p, _) = plan(27.0, 29.0, 10, 100);
        assert_eq!(p.max_points(), 76);
        let (p, _) = plan(150.0, 160.0, 10, 100);
        assert_eq!(p.max_points(), 26);
    }

    #[test]
    fn grid_is_open_at_the_top() {
        let g = mz_grid(10.0, 12.0, 4);
        assert_eq!(g, vec![10.0, 10.5, 11.0, 11.5]);
        assert!(mz_grid(1.0, 2.0, 0).is_empty());
    }

    #[test]
    fn crop_keeps_alignment() {
        let mz = [1.0, 2.0, 3.0, 4.0];
        let y = [10.0, 20.0, 30.0, 40.0];
        let (m, v) = crop(&mz, &y, 1.5, 3.0);
        assert_eq!(m, vec![2.0, 3.0]);
        assert_eq!(v, vec![20.0, 30.0]);
    }
}
