//! CLI command implementations
//!
//! Every command returns [`PushFailure`] on error. `main` prints it and
//! exits with the code of its [`Outcome`].

mod list;
pub mod push;

pub use list::list_ports;

use serialpush_proto::SerialPushError;
use std::path::PathBuf;
use thiserror::Error;

/// How a run ended, as seen by the calling script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    TransportError,
    FileNotFound,
    HandshakeTimeout,
    PayloadTooLarge,
    InvalidRemoteName,
}

impl Outcome {
    /// Process exit status for this outcome
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::TransportError => 1,
            Outcome::FileNotFound => 2,
            Outcome::HandshakeTimeout => 3,
            Outcome::PayloadTooLarge => 4,
            Outcome::InvalidRemoteName => 5,
        }
    }
}

/// Reasons a command can fail
#[derive(Debug, Error)]
pub enum PushFailure {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Payload is {size} bytes, more than the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("Invalid remote name: {0}")]
    InvalidRemoteName(#[source] SerialPushError),

    #[error(transparent)]
    Protocol(#[from] SerialPushError),
}

impl PushFailure {
    pub fn outcome(&self) -> Outcome {
        match self {
            PushFailure::FileNotFound(_) | PushFailure::Unreadable { .. } => Outcome::FileNotFound,
            PushFailure::PayloadTooLarge { .. } => Outcome::PayloadTooLarge,
            PushFailure::InvalidRemoteName(_) => Outcome::InvalidRemoteName,
            PushFailure::Protocol(SerialPushError::HandshakeTimeout { .. }) => {
                Outcome::HandshakeTimeout
            }
            PushFailure::Protocol(_) => Outcome::TransportError,
        }
    }
}
