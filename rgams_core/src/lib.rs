#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! SRS RGA quadrupole mass spectrometer driver (hardware-agnostic).
//!
//! All device I/O goes through `rgams_traits::SerialLink`; time comes from
//! `rgams_traits::Clock` so polling loops run instantly under test.
//!
//! ## Architecture
//!
//! - **Channel**: one command/response transaction at a time (`channel`)
//! - **Parameters**: fetch-once cache for multiplier presence, max mass and noise floor (`params`)
//! - **Frames**: 4-byte little-endian analog payloads, 1e-16 A per count (`frame`)
//! - **History**: bounded single-mass sample buffer (`buffer`)
//! - **Scans**: range setup, trigger, N+1 frame drain and cropping (`scan`)
//! - **Tuning**: RI/RS peak-position calibration loop (`tuning`)
//!
//! [`RgaSession`] ties these together for one physical head.

pub mod buffer;
pub mod channel;
pub mod diagnostics;
pub mod error;
pub mod fit;
pub mod frame;
pub mod gate;
pub mod hw_error;
pub mod mocks;
pub mod params;
pub mod scan;
pub mod session;
pub mod sink;
pub mod tuning;
pub mod types;

pub use buffer::PeakHistoryBuffer;
pub use channel::{CommandChannel, Reply};
pub use diagnostics::TracingDiagnostics;
pub use error::{Result, RgaError};
pub use params::{ParamKey, ParameterCache};
pub use scan::ScanPlan;
pub use session::{RgaSession, SessionBuilder, SessionStatus};
pub use sink::{DataSink, NoDisplay, PeakRecord, PlotDisplay, ScanRecord, ZeroRecord};
pub use tuning::{
    CalibrationObservation, CalibrationPeak, PeakTuner, Tunable, TuningOutcome, TuningReport,
    TuningState,
};
pub use types::{Detector, Reading, Sample, ScanResult};
