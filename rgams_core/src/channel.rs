//! Command/response transactions over the half-duplex link.
//!
//! One transaction is in flight at a time. Buffer-sanity violations before
//! and after a command are reported through the `DiagnosticSink` and never
//! abort the exchange; a missing reply after `RESPONSE_DEADLINE` degrades to
//! [`Reply::Timeout`].

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rgams_traits::{Clock, DiagnosticSink, SerialLink};
use tracing::{debug, trace};

use crate::error::{Report, Result, RgaError};
use crate::frame::FRAME_LEN;
use crate::hw_error::link_report;

/// Poll interval while waiting for inbound bytes.
pub const POLL_TICK: Duration = Duration::from_millis(100);
/// Give up on a reply after this long.
pub const RESPONSE_DEADLINE: Duration = Duration::from_secs(10);
/// Value handed to callers that asked for a reply that never came.
pub const TIMEOUT_SENTINEL: &str = "-1";

/// Outcome of a single command transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Reply text with trailing line terminators removed.
    Text(String),
    /// A reply was expected but nothing arrived before the deadline.
    Timeout,
    /// The command does not produce a reply.
    None,
}

impl Reply {
    pub fn text(&self) -> Option<&str> {
        match self {
            Reply::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Reply::Timeout)
    }

    /// Reply text, or the `-1` sentinel on timeout.
    pub fn value(&self) -> &str {
        match self {
            Reply::Text(s) => s,
            Reply::Timeout | Reply::None => TIMEOUT_SENTINEL,
        }
    }

    /// Parse the reply of `command` as a number.
    pub fn parse<T: FromStr>(&self, command: &str) -> Result<T> {
        match self {
            Reply::Text(s) => s.trim().parse::<T>().map_err(|_| {
                Report::new(RgaError::Decode(format!(
                    "unexpected reply {s:?} to {command}"
                )))
            }),
            Reply::Timeout | Reply::None => {
                Err(Report::new(RgaError::Timeout(command.to_string())))
            }
        }
    }
}

/// Exclusive, non-reentrant command channel to one instrument head.
pub struct CommandChannel<L> {
    link: L,
    clock: Arc<dyn Clock + Send + Sync>,
    diag: Arc<dyn DiagnosticSink + Send + Sync>,
    component: String,
}

impl<L: SerialLink> CommandChannel<L> {
    pub fn new(
        link: L,
        clock: Arc<dyn Clock + Send + Sync>,
        diag: Arc<dyn DiagnosticSink + Send + Sync>,
        component: impl Into<String>,
    ) -> Self {
        Self {
            link,
            clock,
            diag,
            component: component.into(),
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Report a non-fatal condition under this channel's component label.
    pub fn warn(&self, message: &str) {
        self.diag.warn(&self.component, message);
    }

    /// Bytes currently waiting in the inbound buffer.
    pub fn pending_bytes(&mut self) -> Result<usize> {
        self.link.bytes_available().map_err(link_report)
    }

    /// Run one command transaction.
    ///
    /// With `expects_reply` the channel polls every `POLL_TICK` until bytes
    /// arrive, then drains everything buffered and strips trailing line
    /// terminators. Link failures are errors; a silent device is not.
    pub fn execute(&mut self, command: &str, expects_reply: bool) -> Result<Reply> {
        self.check_empty("serial buffer not empty before executing command")?;
        self.write_command(command)?;

        if !expects_reply {
            self.check_empty(&format!(
                "serial buffer not empty after command {command} (no response expected)"
            ))?;
            return Ok(Reply::None);
        }

        if !self.wait_for_bytes(1)? {
            self.warn(&format!(
                "no response from instrument within {} s (command: {command})",
                RESPONSE_DEADLINE.as_secs()
            ));
            return Ok(Reply::Timeout);
        }

        let raw = self.drain()?;
        let text = String::from_utf8_lossy(&raw)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        debug!(component = %self.component, command, reply = %text, "rx");
        Ok(Reply::Text(text))
    }

    /// Command that produces a reply.
    pub fn query(&mut self, command: &str) -> Result<Reply> {
        self.execute(command, true)
    }

    /// Command that produces no reply.
    pub fn send(&mut self, command: &str) -> Result<()> {
        self.execute(command, false).map(|_| ())
    }

    /// Send a command whose answer is binary and read by the caller.
    pub fn trigger(&mut self, command: &str) -> Result<()> {
        self.check_empty("serial buffer not empty before executing command")?;
        self.write_command(command)
    }

    /// Poll until at least `count` bytes are buffered.
    ///
    /// Returns `false` when the deadline passes first.
    pub fn wait_for_bytes(&mut self, count: usize) -> Result<bool> {
        let mut waited = Duration::ZERO;
        loop {
            if self.pending_bytes()? >= count {
                return Ok(true);
            }
            if waited > RESPONSE_DEADLINE {
                return Ok(false);
            }
            self.clock.sleep(POLL_TICK);
            waited += POLL_TICK;
        }
    }

    /// Read one analog frame, or `None` when it does not arrive in time.
    pub fn read_frame(&mut self) -> Result<Option<[u8; FRAME_LEN]>> {
        if !self.wait_for_bytes(FRAME_LEN)? {
            return Ok(None);
        }
        let mut frame = [0u8; FRAME_LEN];
        let mut filled = 0;
        while filled < FRAME_LEN {
            let n = self.link.read(&mut frame[filled..]).map_err(link_report)?;
            if n == 0 {
                return Ok(None);
            }
            filled += n;
        }
        trace!(component = %self.component, ?frame, "frame");
        Ok(Some(frame))
    }

    /// Read and return everything currently buffered.
    pub fn drain(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let available = self.pending_bytes()?;
            if available == 0 {
                break;
            }
            let mut buf = vec![0u8; available];
            let n = self.link.read(&mut buf).map_err(link_report)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        Ok(out)
    }

    fn write_command(&mut self, command: &str) -> Result<()> {
        debug!(component = %self.component, command, "tx");
        self.link
            .write_all(format!("{command}\r\n").as_bytes())
            .map_err(link_report)
    }

    fn check_empty(&mut self, message: &str) -> Result<()> {
        if self.pending_bytes()? > 0 {
            self.warn(message);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{RecordingDiagnostics, ScriptedLink};
    use rgams_traits::clock::test_clock::TestClock;

    fn channel(link: ScriptedLink) -> (CommandChannel<ScriptedLink>, TestClock, RecordingDiagnostics) {
        let clock = TestClock::new();
        let diag = RecordingDiagnostics::default();
        let ch = CommandChannel::new(link, Arc::new(clock.clone()), Arc::new(diag.clone()), "MS");
        (ch, clock, diag)
    }

    #[test]
    fn strips_trailing_terminators() {
        let link = ScriptedLink::new();
        link.on_text("EE?", "70\n\r");
        let (mut ch, _, diag) = channel(link);
        assert_eq!(ch.query("EE?").unwrap(), Reply::Text("70".into()));
        assert!(diag.messages().is_empty());
    }

    #[test]
    fn silent_device_times_out_after_deadline() {
        let (mut ch, clock, diag) = channel(ScriptedLink::new());
        let reply = ch.query("ID?").unwrap();
        assert!(reply.is_timeout());
        assert_eq!(reply.value(), TIMEOUT_SENTINEL);
        assert!(clock.elapsed() >= RESPONSE_DEADLINE);
        assert!(diag.contains("no response"));
    }

    #[test]
    fn stray_bytes_are_warned_not_fatal() {
        let link = ScriptedLink::new();
        link.inject(b"junk");
        link.on_text("NF?", "2\n\r");
        let (mut ch, _, diag) = channel(link);
        let reply = ch.query("NF?").unwrap();
        assert!(reply.text().is_some());
        assert!(diag.contains("not empty before"));
    }

    #[test]
    fn unsolicited_reply_is_warned() {
        let link = ScriptedLink::new();
        link.on_text("MI5", "0\n\r");
        let (mut ch, _, diag) = channel(link);
        ch.send("MI5").unwrap();
        assert!(diag.contains("no response expected"));
    }

    #[test]
    fn parse_maps_timeout_and_garbage() {
        let err = Reply::Timeout.parse::<f64>("RI?").unwrap_err();
        assert_eq!(
            err.downcast_ref::<RgaError>(),
            Some(&RgaError::Timeout("RI?".into()))
        );
        let err = Reply::Text("abc".into()).parse::<f64>("RI?").unwrap_err();
        assert!(matches!(err.downcast_ref::<RgaError>(), Some(RgaError::Decode(_))));
    }
}
