//! # Acquisition Module
//!
//! Owns the serial connection lifecycle: opens the port, frames the byte
//! stream into lines, decodes them, and pushes samples into the sample
//! channel. Survives transient I/O failures by reconnecting with a fixed
//! backoff until the stop flag is raised.
//!
//! ## State Machine
//! `Disconnected → Connecting → Connected → {Connected, Error} → Disconnected`
//!
//! A failed *initial* open ends the run: no samples were ever flowing and the
//! operator must re-trigger the session. A failed *mid-session* read closes
//! the stale handle and retries the same port, once per backoff interval,
//! bounded only by the stop flag unless a retry budget is configured.
//!
//! ## Cancellation
//! The stop flag is checked at the top of every iteration and between
//! backoff waits; serial reads carry a bounded timeout so the flag is
//! observed promptly even when the instrument is silent.

use crate::channel::{PushOutcome, SampleSender};
use crate::decoder::LineDecoder;
use crate::error::ConnectionError;
use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Connection lifecycle as observed by the rest of the application.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

/// Lock-protected connection state, written only by the acquisition loop.
///
/// Everyone else reads through `get`; a raw shared write from another thread
/// is not possible by construction.
pub struct StatusHandle {
    state: Mutex<ConnectionState>,
}

impl StatusHandle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::Disconnected),
        }
    }

    pub fn set(&self, next: ConnectionState) {
        let mut state = self.state.lock().unwrap();
        if *state != next {
            log::debug!("Connection state: {:?} -> {:?}", *state, next);
        }
        *state = next;
    }

    pub fn get(&self) -> ConnectionState {
        self.state.lock().unwrap().clone()
    }
}

impl Default for StatusHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A bidirectional byte link to the instrument.
pub trait Link: Read + Write + Send {}

impl<T: Read + Write + Send> Link for T {}

/// Opens links to the instrument; reopened on every reconnect attempt.
pub trait Connector: Send {
    fn connect(&mut self) -> io::Result<Box<dyn Link>>;

    /// Human-readable identity of the endpoint, for status messages.
    fn describe(&self) -> String;
}

/// Production connector backed by a serial port.
pub struct SerialConnector {
    pub port_name: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

impl Connector for SerialConnector {
    fn connect(&mut self) -> io::Result<Box<dyn Link>> {
        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(Box::new(port))
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.port_name, self.baud_rate)
    }
}

/// Mid-session reconnect behavior.
///
/// `max_attempts: None` retries for as long as the session runs, keeping an
/// unattended logger self-healing; a bounded budget escalates to a terminal
/// error state once spent.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub backoff: Duration,
    pub max_attempts: Option<u32>,
}

/// Accumulates raw bytes and yields complete newline-terminated lines.
///
/// Partial lines survive read timeouts; they are discarded on reconnect
/// since the stream restarts mid-record.
struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' {
                let line = String::from_utf8_lossy(&self.buf)
                    .trim_end_matches('\r')
                    .to_string();
                lines.push(line);
                self.buf.clear();
            } else {
                self.buf.push(byte);
            }
        }
        lines
    }

    fn reset(&mut self) {
        self.buf.clear();
    }
}

/// The producer side of the pipeline.
pub struct AcquisitionLoop {
    connector: Box<dyn Connector>,
    decoder: LineDecoder,
    sender: SampleSender,
    stop: Arc<AtomicBool>,
    status: Arc<StatusHandle>,
    reconnect: ReconnectPolicy,
    sync_clock: bool,
}

impl AcquisitionLoop {
    pub fn new(
        connector: Box<dyn Connector>,
        decoder: LineDecoder,
        sender: SampleSender,
        stop: Arc<AtomicBool>,
        status: Arc<StatusHandle>,
        reconnect: ReconnectPolicy,
        sync_clock: bool,
    ) -> Self {
        Self {
            connector,
            decoder,
            sender,
            stop,
            status,
            reconnect,
            sync_clock,
        }
    }

    /// Run until the stop flag is raised.
    ///
    /// Returns an error only when no data can ever flow again: the initial
    /// open failed, or a bounded reconnect budget was spent.
    pub fn run(mut self) -> Result<(), ConnectionError> {
        self.status.set(ConnectionState::Connecting);
        let mut link = match self.connector.connect() {
            Ok(link) => link,
            Err(source) => {
                let err = ConnectionError::OpenFailed {
                    port: self.connector.describe(),
                    source,
                };
                log::error!("{}", err);
                self.status.set(ConnectionState::Error(err.to_string()));
                return Err(err);
            }
        };
        log::info!("Connected to {}", self.connector.describe());
        self.after_connect(link.as_mut());
        self.status.set(ConnectionState::Connected);

        let mut framer = LineFramer::new();
        let mut buf = [0u8; 256];

        loop {
            if self.stop.load(Ordering::Relaxed) {
                break;
            }

            match link.read(&mut buf) {
                Ok(0) => thread::sleep(Duration::from_millis(10)),
                Ok(n) => {
                    for line in framer.push(&buf[..n]) {
                        self.handle_line(&line);
                    }
                }
                Err(e) if is_idle_read(&e) => {}
                Err(e) => match self.reconnect(link, e)? {
                    Some(reopened) => {
                        framer.reset();
                        link = reopened;
                    }
                    None => break,
                },
            }
        }

        self.status.set(ConnectionState::Disconnected);
        Ok(())
    }

    fn handle_line(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        match self.decoder.decode(line) {
            Ok(sample) => {
                log::debug!("Logged: {}", sample.device_timestamp);
                match self.sender.push(sample) {
                    PushOutcome::Sent => {}
                    PushOutcome::Dropped => {
                        log::warn!("Sample channel full; dropped a reading");
                    }
                    PushOutcome::Closed => {
                        log::debug!("Sample channel closed; consumer is shutting down");
                    }
                }
            }
            Err(e) => {
                log::warn!("Discarding line {:?}: {}", line, e);
            }
        }
    }

    /// Close the stale handle and reopen the same endpoint with backoff.
    ///
    /// `Ok(None)` means the stop flag ended the wait.
    fn reconnect(
        &mut self,
        stale: Box<dyn Link>,
        cause: io::Error,
    ) -> Result<Option<Box<dyn Link>>, ConnectionError> {
        drop(stale);
        let err = ConnectionError::ReadFailed(cause);
        log::warn!("{}; reconnecting to {}", err, self.connector.describe());
        self.status.set(ConnectionState::Error(err.to_string()));

        let mut attempts: u32 = 0;
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return Ok(None);
            }
            if let Some(max) = self.reconnect.max_attempts {
                if attempts >= max {
                    let err = ConnectionError::RetriesExhausted { attempts };
                    log::error!("{}", err);
                    self.status.set(ConnectionState::Error(err.to_string()));
                    return Err(err);
                }
            }

            thread::sleep(self.reconnect.backoff);
            if self.stop.load(Ordering::Relaxed) {
                return Ok(None);
            }

            attempts += 1;
            match self.connector.connect() {
                Ok(mut link) => {
                    log::info!("Reconnected to {}", self.connector.describe());
                    self.after_connect(link.as_mut());
                    self.status.set(ConnectionState::Connected);
                    return Ok(Some(link));
                }
                Err(e) => {
                    log::warn!("Reconnect attempt {} failed: {}", attempts, e);
                }
            }
        }
    }

    fn after_connect(&self, link: &mut dyn Link) {
        if self.sync_clock {
            if let Err(e) = set_instrument_clock(link, Local::now().naive_local()) {
                log::warn!("Instrument clock sync failed: {}", e);
            }
        }
    }
}

/// Fire-and-forget instrument clock calibration.
///
/// No acknowledgment is parsed; the instrument either applies the commands
/// or ignores them.
pub fn set_instrument_clock(link: &mut dyn Link, now: NaiveDateTime) -> io::Result<()> {
    let date_cmd = format!("SYST:DATE {},{},{}\r\n", now.year(), now.month(), now.day());
    let time_cmd = format!("SYST:TIME {},{},{}\r\n", now.hour(), now.minute(), now.second());
    link.write_all(date_cmd.as_bytes())?;
    link.write_all(time_cmd.as_bytes())?;
    link.flush()
}

fn is_idle_read(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
