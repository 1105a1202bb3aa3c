//! Receiver handshake
//!
//! The device only listens for frames after its `serialrx` command has run.
//! The host types that command as a control line and then watches the
//! device's log output until one of the readiness markers shows up.

use crate::error::{Result, SerialPushError};
use crate::marker::MarkerScanner;
use crate::reader::StreamReader;
use crate::transport::Transport;
use std::io::Write;
use std::time::{Duration, Instant};

/// Control prefix understood by the device's command parser
pub const TRIGGER_PREFIX: &str = "__pocketctl serialrx";
/// Default time to wait for a readiness marker
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// The wait is never shorter than this
pub const MIN_TIMEOUT: Duration = Duration::from_millis(100);

/// Build the default trigger line for a destination file name
pub fn default_trigger(remote_name: &str) -> String {
    format!("{} {}", TRIGGER_PREFIX, remote_name)
}

/// Pick the trigger line: a non-blank override verbatim (trimmed), else the
/// default for `remote_name`
pub fn resolve_trigger(remote_name: &str, custom: Option<&str>) -> String {
    match custom.map(str::trim) {
        Some(custom) if !custom.is_empty() => custom.to_string(),
        _ => default_trigger(remote_name),
    }
}

/// Handshake settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// Control line to send, without terminator; `None` skips the handshake
    pub trigger: Option<String>,
    /// Time to wait for a readiness marker after the trigger
    pub timeout: Duration,
}

impl HandshakeConfig {
    /// Trigger with the default command for `remote_name`
    pub fn for_remote(remote_name: &str) -> Self {
        Self {
            trigger: Some(default_trigger(remote_name)),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Assume the receiver is already waiting for BEGIN
    pub fn skip() -> Self {
        Self {
            trigger: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// How the receiver came to be ready
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// A readiness marker was observed
    Ready {
        /// The marker that matched
        marker: String,
        /// Time from trigger to marker
        elapsed: Duration,
    },
    /// Handshake disabled; the receiver is assumed to be listening
    Assumed,
}

/// Run the handshake
///
/// With a trigger configured, the trigger line is written and device output
/// is echoed to `echo` until a marker appears. No marker before the deadline
/// is [`SerialPushError::HandshakeTimeout`]; nothing else is written in that
/// case.
pub fn perform<T, W>(transport: &mut T, config: &HandshakeConfig, echo: &mut W) -> Result<Readiness>
where
    T: Transport + ?Sized,
    W: Write + ?Sized,
{
    let Some(trigger) = config.trigger.as_deref() else {
        log::debug!("handshake: skipped, assuming receiver is active");
        return Ok(Readiness::Assumed);
    };

    let mut line = Vec::with_capacity(trigger.len() + 1);
    line.extend_from_slice(trigger.as_bytes());
    line.push(b'\n');
    transport.write(&line)?;
    transport.flush()?;
    log::debug!("handshake: sent trigger {:?}", trigger);

    wait_for_ready(transport, config.timeout, echo)
}

/// Poll device output until a readiness marker or the deadline
pub fn wait_for_ready<T, W>(transport: &mut T, timeout: Duration, echo: &mut W) -> Result<Readiness>
where
    T: Transport + ?Sized,
    W: Write + ?Sized,
{
    let timeout = timeout.max(MIN_TIMEOUT);
    let start = Instant::now();
    let deadline = start + timeout;
    let mut scanner = MarkerScanner::default();
    let mut reader = StreamReader::new(transport, echo);

    while Instant::now() < deadline {
        let bytes = reader.poll()?;
        if bytes.is_empty() {
            continue;
        }
        let text = String::from_utf8_lossy(bytes);
        if let Some(marker) = scanner.push(&text) {
            let elapsed = start.elapsed();
            log::debug!("handshake: matched {:?} after {:?}", marker, elapsed);
            return Ok(Readiness::Ready {
                marker: marker.to_string(),
                elapsed,
            });
        }
    }

    log::debug!(
        "handshake: no marker in {} bytes of device output",
        reader.total()
    );
    Err(SerialPushError::HandshakeTimeout { waited: timeout })
}
