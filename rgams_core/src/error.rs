use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RgaError {
    #[error("no response from RGA (command: {0})")]
    Timeout(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{name} value {value} out of allowed range ({min}...{max})")]
    Range {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("usage error: {0}")]
    Usage(String),
    #[error("link error: {0}")]
    Link(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
