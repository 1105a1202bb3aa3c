//! serialpush-proto - host side of the serialrx transfer protocol
//!
//! This crate pushes a binary file to a device running the `serialrx`
//! receiver over a serial console.
//!
//! # Protocol Overview
//!
//! The receiver is started by typing a control command on the console
//! (`__pocketctl serialrx <name>`). Once it logs a readiness marker it reads
//! newline-terminated ASCII frames:
//!
//! ```text
//! BEGIN <size> <crc32hex>
//! DATA <hex>
//! ...
//! END
//! ```
//!
//! and checks the CRC-32 of everything it received against the one declared
//! in BEGIN. There are no acknowledgements; the host paces itself and then
//! echoes the device's log for a few seconds so the result can be read.
//!
//! # Supported Transports
//!
//! - Serial port: `/dev/ttyUSB0`, `/dev/ttyACM0`, `COM1`, etc.
//! - TCP socket: `ip=host:port`
//!
//! # Example
//!
//! ```no_run
//! use serialpush_proto::{push, Endpoint, NoProgress, Payload, PushOptions, SerialConfig};
//! use std::path::Path;
//!
//! let payload = Payload::read(Path::new("firmware.bin"))?;
//! let mut transport = Endpoint::parse("/dev/ttyACM0")?.open(SerialConfig::default())?;
//! let report = push(
//!     &mut transport,
//!     &payload,
//!     &PushOptions::default(),
//!     &mut NoProgress,
//!     &mut std::io::stdout(),
//! )?;
//! println!("sent {} bytes", report.stats.total);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod checksum;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod marker;
pub mod payload;
pub mod push;
pub mod reader;
pub mod session;
pub mod tail;
pub mod transport;

// Re-exports
pub use endpoint::Endpoint;
pub use error::{Result, SerialPushError};
pub use frame::{Frame, ReceivedFrame};
pub use handshake::{HandshakeConfig, Readiness};
pub use marker::{MarkerScanner, READY_MARKERS};
pub use payload::Payload;
pub use push::{push, validate_remote_name, PushOptions, PushReport, DEFAULT_REMOTE_NAME};
pub use session::{
    progress_line, NoProgress, PacingPolicy, TransferProgress, TransferSession, TransferStats,
};
pub use transport::serial::SerialTransport;
pub use transport::tcp::TcpTransport;
pub use transport::{SerialConfig, Transport};
