//! Test and helper mocks for rgams_core

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use rgams_traits::{BoxError, DiagnosticSink, SerialLink};

#[derive(Debug, Default)]
struct Script {
    replies: HashMap<String, Vec<u8>>,
    inbound: VecDeque<u8>,
    pending: Vec<u8>,
    commands: Vec<String>,
}

/// A link that answers each command with a canned byte sequence.
///
/// Clones share state, so a test can keep a handle after moving the link
/// into a session and inspect what was written.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLink {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Reply with `bytes` every time `command` is written.
    pub fn on(&self, command: &str, bytes: &[u8]) -> &Self {
        self.script()
            .replies
            .insert(command.to_string(), bytes.to_vec());
        self
    }

    pub fn on_text(&self, command: &str, text: &str) -> &Self {
        self.on(command, text.as_bytes())
    }

    /// Queue unsolicited inbound bytes.
    pub fn inject(&self, bytes: &[u8]) {
        self.script().inbound.extend(bytes.iter().copied());
    }

    /// Commands written so far, without terminators.
    pub fn commands(&self) -> Vec<String> {
        self.script().commands.clone()
    }

    /// How many times `command` was written.
    pub fn count(&self, command: &str) -> usize {
        self.script()
            .commands
            .iter()
            .filter(|c| c.as_str() == command)
            .count()
    }
}

impl SerialLink for ScriptedLink {
    fn bytes_available(&mut self) -> Result<usize, BoxError> {
        Ok(self.script().inbound.len())
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), BoxError> {
        let mut s = self.script();
        s.pending.extend_from_slice(data);
        while let Some(pos) = s.pending.windows(2).position(|w| w == b"\r\n") {
            let line: Vec<u8> = s.pending.drain(..pos + 2).collect();
            let cmd = String::from_utf8_lossy(&line[..pos]).to_string();
            if let Some(reply) = s.replies.get(&cmd).cloned() {
                s.inbound.extend(reply);
            }
            s.commands.push(cmd);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BoxError> {
        let mut s = self.script();
        let n = buf.len().min(s.inbound.len());
        for (slot, b) in buf.iter_mut().zip(s.inbound.drain(..n)) {
            *slot = b;
        }
        Ok(n)
    }
}

/// A link whose every operation fails.
pub struct BrokenLink;

impl SerialLink for BrokenLink {
    fn bytes_available(&mut self) -> Result<usize, BoxError> {
        Err(Box::new(std::io::Error::other("link unplugged")))
    }

    fn write_all(&mut self, _data: &[u8]) -> Result<(), BoxError> {
        Err(Box::new(std::io::Error::other("link unplugged")))
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, BoxError> {
        Err(Box::new(std::io::Error::other("link unplugged")))
    }
}

/// Diagnostic sink that keeps every warning for later assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingDiagnostics {
    entries: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingDiagnostics {
    /// Recorded `(component, message)` pairs in arrival order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|(_, m)| m).collect()
    }

    /// True when any recorded message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn warn(&self, component: &str, message: &str) {
        if let Ok(mut g) = self.entries.lock() {
            g.push((component.to_string(), message.to_string()));
        }
    }
}
