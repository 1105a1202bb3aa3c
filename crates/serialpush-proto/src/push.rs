//! One complete push: settle, handshake, stream, tail

use crate::error::{Result, SerialPushError};
use crate::handshake::{self, HandshakeConfig, Readiness};
use crate::payload::Payload;
use crate::session::{
    PacingPolicy, TransferProgress, TransferSession, TransferStats, DEFAULT_CHUNK_SIZE,
};
use crate::tail;
use crate::transport::Transport;
use std::io::Write;
use std::num::NonZeroUsize;
use std::time::Duration;

/// File name the receiver stores into by default
pub const DEFAULT_REMOTE_NAME: &str = "PocketSSH-TPager.bin";
/// Longest destination name the receiver accepts
pub const MAX_REMOTE_NAME_LEN: usize = 64;
/// Pause after opening the port before touching it
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(200);

/// Check a destination name against the receiver's rules
///
/// The receiver writes into the SD card root and refuses anything that could
/// leave it.
pub fn validate_remote_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_REMOTE_NAME_LEN {
        return Err(SerialPushError::InvalidParameter(format!(
            "remote name must be 1-{} bytes, got {}",
            MAX_REMOTE_NAME_LEN,
            name.len()
        )));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(SerialPushError::InvalidParameter(format!(
            "remote name {:?} must not contain '/', '\\' or '..'",
            name
        )));
    }
    Ok(())
}

/// Settings for one push
#[derive(Debug, Clone)]
pub struct PushOptions {
    pub handshake: HandshakeConfig,
    pub chunk_size: NonZeroUsize,
    pub pacing: PacingPolicy,
    /// Delay before discarding stale buffers and starting the handshake
    pub settle: Duration,
    /// How long to echo device output after END
    pub tail: Duration,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            handshake: HandshakeConfig::for_remote(DEFAULT_REMOTE_NAME),
            chunk_size: DEFAULT_CHUNK_SIZE,
            pacing: PacingPolicy::default(),
            settle: DEFAULT_SETTLE,
            tail: tail::DEFAULT_TAIL,
        }
    }
}

/// What happened during a successful push
#[derive(Debug, Clone)]
pub struct PushReport {
    pub readiness: Readiness,
    pub stats: TransferStats,
    /// Device output bytes echoed during the tail
    pub tail_bytes: usize,
}

/// Push `payload` to the receiver behind `transport`
///
/// Phases run strictly in order and the first failure ends the push. Device
/// output seen during the handshake and tail is echoed to `echo`.
pub fn push<T, P, W>(
    transport: &mut T,
    payload: &Payload,
    options: &PushOptions,
    progress: &mut P,
    echo: &mut W,
) -> Result<PushReport>
where
    T: Transport + ?Sized,
    P: TransferProgress + ?Sized,
    W: Write + ?Sized,
{
    log::debug!(
        "Payload is {} bytes, crc32 {:08x}",
        payload.len(),
        payload.crc32()
    );

    if !options.settle.is_zero() {
        std::thread::sleep(options.settle);
    }
    transport.clear_buffers()?;

    let readiness = handshake::perform(transport, &options.handshake, echo)?;
    match &readiness {
        Readiness::Ready { marker, elapsed } => {
            log::info!("Receiver ready ({:?} after {:?})", marker, elapsed)
        }
        Readiness::Assumed => log::info!("Assuming receiver is already active"),
    }

    let stats =
        TransferSession::new(options.chunk_size, options.pacing).run(transport, payload, progress)?;
    log::info!("Transfer sent, tailing device output for {:?}", options.tail);

    let tail_bytes = tail::monitor(transport, options.tail, echo);

    Ok(PushReport {
        readiness,
        stats,
        tail_bytes,
    })
}
