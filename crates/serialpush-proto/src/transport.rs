//! Transport layer abstraction for serialrx communication
//!
//! This module provides a unified interface for serial and TCP transports.
//! Both are configured with a short read timeout, used for polling device
//! output, and a longer write timeout that bounds every frame write.

use crate::error::{Result, SerialPushError};
use std::time::Duration;

/// Default baud rate for USB CDC consoles
pub const DEFAULT_BAUD: u32 = 115_200;
/// Default bound on a single polling read
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);
/// Default bound on a single blocking write
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Link parameters shared by all transports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    /// Baud rate (ignored by TCP)
    pub baud: u32,
    /// Bound on each `read_nonblock` call
    pub read_timeout: Duration,
    /// Bound on each `write` call
    pub write_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud: DEFAULT_BAUD,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// Transport trait for reading and writing bytes
pub trait Transport {
    /// Write all bytes to the transport
    ///
    /// A single blocking attempt bounded by the write timeout. Running out of
    /// time is reported as [`SerialPushError::Timeout`].
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read whatever arrives within the read timeout
    ///
    /// Returns the number of bytes read, or 0 if nothing arrived in time.
    fn read_nonblock(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<()>;

    /// Discard pending input and output
    fn clear_buffers(&mut self) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read_nonblock(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_nonblock(buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn clear_buffers(&mut self) -> Result<()> {
        (**self).clear_buffers()
    }
}

fn is_poll_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

pub mod serial {
    //! Serial port transport implementation

    use super::*;
    use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
    use std::io::{Read, Write};

    /// Serial port transport
    pub struct SerialTransport {
        port: Box<dyn SerialPort>,
        config: SerialConfig,
        /// Timeout currently programmed into the port
        active_timeout: Duration,
    }

    impl SerialTransport {
        /// Open a serial port, 8N1 without flow control
        pub fn open(device: &str, config: SerialConfig) -> Result<Self> {
            let port = serialport::new(device, config.baud)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(config.write_timeout)
                .open()?;

            log::info!("Opened serial port {} at {} baud", device, config.baud);

            Ok(Self {
                port,
                config,
                active_timeout: config.write_timeout,
            })
        }

        /// Link parameters this port was opened with
        pub fn config(&self) -> &SerialConfig {
            &self.config
        }

        fn use_timeout(&mut self, timeout: Duration) -> Result<()> {
            if self.active_timeout != timeout {
                self.port.set_timeout(timeout)?;
                self.active_timeout = timeout;
            }
            Ok(())
        }
    }

    impl Transport for SerialTransport {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            self.use_timeout(self.config.write_timeout)?;
            self.port.write_all(data)?;
            Ok(())
        }

        fn read_nonblock(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.use_timeout(self.config.read_timeout)?;
            match self.port.read(buf) {
                Ok(n) => Ok(n),
                Err(e) if is_poll_timeout(&e) => Ok(0),
                Err(e) => Err(SerialPushError::from(e)),
            }
        }

        fn flush(&mut self) -> Result<()> {
            self.use_timeout(self.config.write_timeout)?;
            self.port.flush()?;
            Ok(())
        }

        fn clear_buffers(&mut self) -> Result<()> {
            self.port.clear(ClearBuffer::All)?;
            Ok(())
        }
    }
}

pub mod tcp {
    //! TCP socket transport implementation, for serial-over-network bridges

    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;

    /// TCP socket transport
    pub struct TcpTransport {
        stream: TcpStream,
    }

    impl TcpTransport {
        /// Connect to a bridge at the specified host and port
        pub fn connect(host: &str, port: u16, config: SerialConfig) -> Result<Self> {
            let addr = format!("{}:{}", host, port);
            log::info!("Connecting to serial bridge at {}", addr);

            let stream = TcpStream::connect(&addr)
                .map_err(|e| SerialPushError::ConnectionFailed(e.to_string()))?;

            // Frames are small; don't let Nagle hold them back
            stream.set_nodelay(true).map_err(|e| {
                SerialPushError::ConnectionFailed(format!("Failed to set TCP_NODELAY: {}", e))
            })?;
            stream
                .set_read_timeout(Some(config.read_timeout))
                .map_err(|e| {
                    SerialPushError::ConnectionFailed(format!("Failed to set read timeout: {}", e))
                })?;
            stream
                .set_write_timeout(Some(config.write_timeout))
                .map_err(|e| {
                    SerialPushError::ConnectionFailed(format!(
                        "Failed to set write timeout: {}",
                        e
                    ))
                })?;

            log::info!("Connected to serial bridge at {}", addr);

            Ok(Self { stream })
        }
    }

    impl Transport for TcpTransport {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            self.stream.write_all(data).map_err(|e| {
                if is_poll_timeout(&e) {
                    SerialPushError::Timeout
                } else {
                    SerialPushError::from(e)
                }
            })
        }

        fn read_nonblock(&mut self, buf: &mut [u8]) -> Result<usize> {
            match self.stream.read(buf) {
                Ok(0) => Err(SerialPushError::ConnectionFailed(
                    "connection closed by peer".into(),
                )),
                Ok(n) => Ok(n),
                Err(e) if is_poll_timeout(&e) => Ok(0),
                Err(e) => Err(SerialPushError::from(e)),
            }
        }

        fn flush(&mut self) -> Result<()> {
            self.stream.flush()?;
            Ok(())
        }

        fn clear_buffers(&mut self) -> Result<()> {
            // Sockets have no discard; drain whatever is already queued
            self.stream.set_nonblocking(true)?;
            let mut scratch = [0u8; 512];
            let drained = loop {
                match self.stream.read(&mut scratch) {
                    Ok(0) => break Ok(()),
                    Ok(_) => continue,
                    Err(e) if is_poll_timeout(&e) => break Ok(()),
                    Err(e) => break Err(SerialPushError::from(e)),
                }
            };
            self.stream.set_nonblocking(false)?;
            drained
        }
    }
}
