//! Simulated RGA head.
//!
//! Parses CRLF-terminated commands as they are written and queues replies in
//! an outbound byte buffer, so the protocol layer sees the same byte stream a
//! real head produces: text replies for queries and status commands, and
//! 4-byte little-endian frames for `MR` and `SC1`.
//!
//! Peak positions follow a linear miscalibration model driven by RI and RS:
//! a peak with nominal mass `m` shows up at `m - offset(m)` with
//! `offset(m) = A * (1 - m/128) + C * m/128`,
//! `A = (RI - RI_OPT) * 128 / RS` and `C = 128 * (RS / RS_OPT - 1)`.
//! At `RI_OPT` / `RS_OPT` all peaks sit exactly on their nominal mass.

use std::collections::VecDeque;

use rgams_traits::{BoxError, SerialLink};
use tracing::{debug, trace};

/// RI setting at which the simulated head is perfectly tuned (volts).
pub const RI_OPT: f64 = 2.0;
/// RS setting at which the simulated head is perfectly tuned (volts).
pub const RS_OPT: f64 = 1050.0;

const AMPS_PER_COUNT: f64 = 1e-16;
const PEAK_SIGMA: f64 = 0.18;
const BASELINE_A: f64 = 1e-13;
const MULTIPLIER_GAIN: f64 = 1000.0;
const DEFAULT_MZ_MAX: u32 = 100;

/// One gas line in the simulated spectrum.
#[derive(Debug, Clone, Copy)]
pub struct SimPeak {
    pub mz: f64,
    /// Faraday current at the peak top (A).
    pub amps: f64,
}

#[derive(Debug, Clone)]
struct HeadState {
    electron_energy: f64,
    filament_ma: f64,
    hv: f64,
    multiplier: bool,
    mi: u32,
    mf: u32,
    mz_max: u32,
    nf: i32,
    sa: u32,
    ri: f64,
    rs: f64,
}

impl Default for HeadState {
    fn default() -> Self {
        Self {
            electron_energy: 70.0,
            filament_ma: 1.0,
            hv: 0.0,
            multiplier: true,
            mi: 1,
            mf: 65,
            mz_max: DEFAULT_MZ_MAX,
            nf: 2,
            sa: 10,
            ri: 2.6,
            rs: 1053.0,
        }
    }
}

/// In-process stand-in for the RGA head.
#[derive(Debug, Clone)]
pub struct SimulatedRga {
    state: HeadState,
    peaks: Vec<SimPeak>,
    pending: Vec<u8>,
    outbox: VecDeque<u8>,
    silent: bool,
    serial: String,
}

impl Default for SimulatedRga {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRga {
    /// A head looking at air, slightly out of tune.
    pub fn new() -> Self {
        Self {
            state: HeadState::default(),
            peaks: vec![
                SimPeak { mz: 14.0, amps: 8e-12 },
                SimPeak { mz: 18.0, amps: 5e-12 },
                SimPeak { mz: 28.0, amps: 1e-10 },
                SimPeak { mz: 32.0, amps: 2.5e-11 },
                SimPeak { mz: 40.0, amps: 1.2e-12 },
                SimPeak { mz: 44.0, amps: 4e-13 },
                SimPeak { mz: 84.0, amps: 1e-13 },
            ],
            pending: Vec::new(),
            outbox: VecDeque::new(),
            silent: false,
            serial: "SRSRGA100VER0.24SN19321".to_string(),
        }
    }

    /// Replace the simulated spectrum.
    pub fn with_peaks(mut self, peaks: Vec<SimPeak>) -> Self {
        self.peaks = peaks;
        self
    }

    /// Start from the given RI/RS settings.
    pub fn with_calibration(mut self, ri: f64, rs: f64) -> Self {
        self.state.ri = ri;
        self.state.rs = rs;
        self
    }

    /// Model a head without the electron multiplier option.
    pub fn without_multiplier(mut self) -> Self {
        self.state.multiplier = false;
        self
    }

    pub fn with_mz_max(mut self, mz_max: u32) -> Self {
        self.state.mz_max = mz_max;
        self.state.mf = self.state.mf.min(mz_max);
        self
    }

    /// A head that accepts commands but never answers.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Pre-load unread bytes in the inbound buffer (desynchronized link).
    pub fn with_stray_bytes(mut self, bytes: &[u8]) -> Self {
        self.outbox.extend(bytes.iter().copied());
        self
    }

    pub fn ri(&self) -> f64 {
        self.state.ri
    }

    pub fn rs(&self) -> f64 {
        self.state.rs
    }

    /// Mass offset (nominal minus apparent position) at `mz` for the current RI/RS.
    pub fn offset_at(&self, mz: f64) -> f64 {
        let a = (self.state.ri - RI_OPT) * 128.0 / self.state.rs;
        let c = 128.0 * (self.state.rs / RS_OPT - 1.0);
        a * (1.0 - mz / 128.0) + c * mz / 128.0
    }

    /// Ion current seen by the active detector with the mass filter at `x`.
    pub fn current_at(&self, x: f64) -> f64 {
        let mut amps = BASELINE_A;
        for p in &self.peaks {
            let center = p.mz - self.offset_at(p.mz);
            let z = (x - center) / PEAK_SIGMA;
            amps += p.amps * (-0.5 * z * z).exp();
        }
        if self.state.filament_ma <= 0.0 {
            amps = BASELINE_A;
        }
        if self.state.hv > 0.0 {
            amps *= MULTIPLIER_GAIN;
        }
        amps
    }

    /// Number of points the next `SC1` will return (before the pressure frame).
    pub fn scan_points(&self) -> u32 {
        self.state.mf.saturating_sub(self.state.mi) * self.state.sa + 1
    }

    fn reply(&mut self, text: &str) {
        self.outbox.extend(text.as_bytes());
        self.outbox.extend(b"\n\r");
    }

    fn frame(&mut self, amps: f64) {
        let counts = (amps / AMPS_PER_COUNT)
            .round()
            .clamp(i32::MIN as f64, i32::MAX as f64) as i32;
        self.outbox.extend(counts.to_le_bytes());
    }

    fn handle(&mut self, cmd: &str) {
        trace!(cmd, "sim command");
        if self.silent {
            return;
        }
        let split = cmd.len().min(2);
        if !cmd.is_char_boundary(split) {
            debug!(cmd, "sim ignoring malformed command");
            return;
        }
        let (head, arg) = cmd.split_at(split);
        let num = arg.trim().parse::<f64>().ok();
        match (head, arg) {
            ("ID", "?") => {
                let sn = self.serial.clone();
                self.reply(&sn);
            }
            ("EE", "?") => self.reply(&format!("{:.0}", self.state.electron_energy)),
            ("EE", _) => {
                if let Some(v) = num {
                    self.state.electron_energy = v;
                }
                self.reply("0");
            }
            ("FL", "?") => self.reply(&format!("{:.2}", self.state.filament_ma)),
            ("FL", "*") => {
                self.state.filament_ma = 1.0;
                self.reply("0");
            }
            ("FL", _) => {
                if let Some(v) = num {
                    self.state.filament_ma = v;
                }
                self.reply("0");
            }
            ("HV", "?") => self.reply(&format!("{:.0}", self.state.hv)),
            ("HV", "*") => {
                if self.state.multiplier {
                    self.state.hv = 1400.0;
                }
                self.reply("0");
            }
            ("HV", _) => {
                if let Some(v) = num
                    && (self.state.multiplier || v == 0.0)
                {
                    self.state.hv = v;
                }
                self.reply("0");
            }
            ("MO", "?") => {
                let flag = if self.state.multiplier { "1" } else { "0" };
                self.reply(flag);
            }
            ("MF", "?") => self.reply(&self.state.mf.to_string()),
            ("MF", "*") => self.state.mf = self.state.mz_max,
            ("MF", _) => {
                if let Some(v) = num {
                    self.state.mf = (v as u32).min(self.state.mz_max);
                }
            }
            ("MI", "?") => self.reply(&self.state.mi.to_string()),
            ("MI", _) => {
                if let Some(v) = num {
                    self.state.mi = v as u32;
                }
            }
            ("NF", "?") => self.reply(&self.state.nf.to_string()),
            ("NF", _) => {
                if let Some(v) = num {
                    self.state.nf = (v as i32).clamp(0, 7);
                }
            }
            ("SA", _) => {
                if let Some(v) = num {
                    self.state.sa = (v as u32).clamp(10, 25);
                }
            }
            ("AP", "?") => self.reply(&self.scan_points().to_string()),
            ("SC", _) => self.run_scan(),
            ("MR", _) => {
                if let Some(v) = num {
                    let amps = self.current_at(v);
                    self.frame(amps);
                }
            }
            ("RI", "?") => self.reply(&format!("{:.4}", self.state.ri)),
            ("RI", _) => {
                if let Some(v) = num {
                    self.state.ri = v;
                }
            }
            ("RS", "?") => self.reply(&format!("{:.4}", self.state.rs)),
            ("RS", _) => {
                if let Some(v) = num {
                    self.state.rs = v;
                }
            }
            _ => debug!(cmd, "sim ignoring unknown command"),
        }
    }

    fn run_scan(&mut self) {
        let n = self.scan_points();
        let lo = f64::from(self.state.mi);
        let hi = f64::from(self.state.mf);
        for i in 0..n {
            let x = lo + f64::from(i) * (hi - lo) / f64::from(n);
            let amps = self.current_at(x);
            self.frame(amps);
        }
        // Total pressure reading appended after the last mass point.
        let total: f64 = self.peaks.iter().map(|p| p.amps).sum();
        self.frame(total);
    }
}

impl SerialLink for SimulatedRga {
    fn bytes_available(&mut self) -> Result<usize, BoxError> {
        Ok(self.outbox.len())
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), BoxError> {
        self.pending.extend_from_slice(data);
        while let Some(pos) = self.pending.windows(2).position(|w| w == b"\r\n") {
            let line: Vec<u8> = self.pending.drain(..pos + 2).collect();
            let cmd = String::from_utf8_lossy(&line[..pos]).trim().to_string();
            if !cmd.is_empty() {
                self.handle(&cmd);
            }
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BoxError> {
        let mut n = 0;
        while n < buf.len() {
            match self.outbox.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}
