pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Error type used at the hardware trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Half-duplex byte link to the instrument head.
///
/// Implementations never block in `bytes_available`; `read` may block up to
/// the link's own read timeout.
pub trait SerialLink {
    /// Number of bytes waiting in the inbound buffer.
    fn bytes_available(&mut self) -> Result<usize, BoxError>;
    fn write_all(&mut self, data: &[u8]) -> Result<(), BoxError>;
    /// Read up to `buf.len()` bytes, returning how many were read.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BoxError>;
}

impl<L: SerialLink + ?Sized> SerialLink for Box<L> {
    fn bytes_available(&mut self) -> Result<usize, BoxError> {
        (**self).bytes_available()
    }
    fn write_all(&mut self, data: &[u8]) -> Result<(), BoxError> {
        (**self).write_all(data)
    }
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BoxError> {
        (**self).read(buf)
    }
}

/// Receiver for non-fatal operating warnings, keyed by component label.
pub trait DiagnosticSink {
    fn warn(&self, component: &str, message: &str);
}
