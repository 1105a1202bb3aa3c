//! Error types for serialrx transfers

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the transfer engine
#[derive(Debug, Error)]
pub enum SerialPushError {
    /// Failed to connect to the endpoint
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No readiness marker was seen before the handshake deadline
    #[error("Timed out after {waited:?} waiting for serialrx readiness marker")]
    HandshakeTimeout { waited: Duration },

    /// A write did not complete within the transport's write timeout
    #[error("Communication timeout")]
    Timeout,

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A protocol line could not be parsed
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// I/O error during communication
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl SerialPushError {
    /// Whether this error came from the link itself rather than from the
    /// caller's parameters or the handshake.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SerialPushError::ConnectionFailed(_)
                | SerialPushError::Timeout
                | SerialPushError::Io(_)
                | SerialPushError::Serial(_)
        )
    }
}

/// Result type for serialrx operations
pub type Result<T> = std::result::Result<T, SerialPushError>;

impl From<std::io::Error> for SerialPushError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            SerialPushError::Timeout
        } else {
            SerialPushError::Io(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_out_io_maps_to_timeout() {
        let err = SerialPushError::from(std::io::Error::from(std::io::ErrorKind::TimedOut));
        assert!(matches!(err, SerialPushError::Timeout));
        assert!(err.is_transport());
    }

    #[test]
    fn test_handshake_timeout_is_not_transport() {
        let err = SerialPushError::HandshakeTimeout {
            waited: Duration::from_secs(10),
        };
        assert!(!err.is_transport());
        assert!(err.to_string().contains("readiness marker"));
    }
}
