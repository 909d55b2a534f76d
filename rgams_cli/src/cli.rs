//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "rgams", version, about = "SRS RGA mass spectrometer CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/rgams.toml")]
    pub config: PathBuf,

    /// Print data records and logs as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG wins when set
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the head's label and serial number
    Id,
    /// Read the ion current at a single mass
    Peak {
        /// Mass-to-charge ratio (integer)
        #[arg(long, allow_negative_numbers = true)]
        mz: i64,
        /// Gate time in seconds
        #[arg(long)]
        gate: f64,
    },
    /// Background reading next to a peak (at mz + offset)
    Zero {
        #[arg(long, allow_negative_numbers = true)]
        mz: i64,
        #[arg(long, allow_negative_numbers = true)]
        offset: i32,
        /// Gate time in seconds
        #[arg(long)]
        gate: f64,
    },
    /// Analog sweep over a mass range
    Scan {
        #[arg(long, allow_negative_numbers = true)]
        low: f64,
        #[arg(long, allow_negative_numbers = true)]
        high: f64,
        /// Points per amu (10..=25)
        #[arg(long, default_value_t = 25)]
        step: i32,
        /// Gate time in seconds
        #[arg(long)]
        gate: f64,
    },
    /// Tune RI/RS so calibration peaks sit on their nominal masses
    Tune {
        /// Peak table CSV (mz,width,gate,detector); overrides [tuning] in the config
        #[arg(long, value_name = "FILE")]
        peaks_csv: Option<PathBuf>,
        /// Iteration budget (defaults to tuning.max_iter)
        #[arg(long)]
        max_iter: Option<u32>,
        /// Convergence tolerance in mz units (defaults to tuning.max_delta_mz)
        #[arg(long)]
        tolerance: Option<f64>,
    },
    /// Print the current RI/RS calibration
    Calibration,
    /// Switch the ionizer filament
    Filament {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Quick health check: identity plus operating settings
    SelfCheck,
    /// List serial ports on this host (hardware builds)
    Ports,
}
