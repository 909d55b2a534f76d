use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("serial port: {0}")]
    Serial(String),
    #[error("serial read timeout")]
    Timeout,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "hardware")]
impl From<serialport::Error> for HwError {
    fn from(e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::Io(std::io::ErrorKind::TimedOut) => HwError::Timeout,
            _ => HwError::Serial(e.to_string()),
        }
    }
}

impl HwError {
    /// Read timeouts get their own variant so callers can tell them apart.
    pub fn from_io(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => HwError::Timeout,
            _ => HwError::Io(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, HwError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::{Error, ErrorKind};

    #[rstest]
    #[case(ErrorKind::TimedOut, true)]
    #[case(ErrorKind::WouldBlock, true)]
    #[case(ErrorKind::BrokenPipe, false)]
    #[case(ErrorKind::NotFound, false)]
    fn io_errors_are_classified(#[case] kind: ErrorKind, #[case] timeout: bool) {
        let e = HwError::from_io(Error::new(kind, "port"));
        assert_eq!(matches!(e, HwError::Timeout), timeout);
        assert_eq!(matches!(e, HwError::Io(_)), !timeout);
    }
}
