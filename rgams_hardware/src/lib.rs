//! Transport and simulation backends for the SRS RGA head.
//!
//! - `SerialPortLink` (feature `hardware`): the real 28800 baud 8N2 link.
//! - `SimulatedRga`: an in-process instrument speaking the same protocol.
pub mod error;
#[cfg(feature = "hardware")]
pub mod serial;
pub mod sim;

pub use sim::{SimPeak, SimulatedRga};

/// Device link baud rate.
pub const BAUD_RATE: u32 = 28_800;

/// Device link read timeout in milliseconds.
pub const READ_TIMEOUT_MS: u64 = 10_000;

/// Device link stop bits (two stop bits required by the head).
#[cfg(feature = "hardware")]
pub const STOP_BITS: serialport::StopBits = serialport::StopBits::Two;
