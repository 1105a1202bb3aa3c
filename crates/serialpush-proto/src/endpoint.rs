//! Endpoint strings
//!
//! Formats:
//! - `/dev/ttyACM0`, `COM3` - serial port with the configured baud rate
//! - `dev=/dev/ttyACM0:921600` - serial port with an explicit baud rate
//! - `ip=host:port` - TCP serial bridge (ser2net, esp-link, ...)

use crate::error::{Result, SerialPushError};
use crate::transport::serial::SerialTransport;
use crate::transport::tcp::TcpTransport;
use crate::transport::{SerialConfig, Transport};

/// Where the receiver is reachable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Serial port connection
    Serial {
        /// Device path (e.g., "/dev/ttyUSB0" or "COM1")
        device: String,
        /// Baud rate overriding the configured one
        baud: Option<u32>,
    },
    /// TCP socket connection
    Tcp {
        /// Hostname or IP address
        host: String,
        /// Port number
        port: u16,
    },
}

impl Endpoint {
    /// Parse an endpoint string
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(SerialPushError::InvalidParameter("empty endpoint".into()));
        }
        if let Some(dev) = s.strip_prefix("dev=") {
            if let Some((device, baud_str)) = dev.rsplit_once(':') {
                let baud = baud_str.parse().map_err(|_| {
                    SerialPushError::InvalidParameter(format!("Invalid baud rate: {}", baud_str))
                })?;
                Ok(Endpoint::Serial {
                    device: device.to_string(),
                    baud: Some(baud),
                })
            } else {
                Ok(Endpoint::Serial {
                    device: dev.to_string(),
                    baud: None,
                })
            }
        } else if let Some(ip) = s.strip_prefix("ip=") {
            let (host, port_str) = ip.rsplit_once(':').ok_or_else(|| {
                SerialPushError::InvalidParameter("Missing port in ip= parameter".into())
            })?;
            let port = port_str.parse().map_err(|_| {
                SerialPushError::InvalidParameter(format!("Invalid port: {}", port_str))
            })?;
            Ok(Endpoint::Tcp {
                host: host.to_string(),
                port,
            })
        } else {
            Ok(Endpoint::Serial {
                device: s.to_string(),
                baud: None,
            })
        }
    }

    /// Open the endpoint
    pub fn open(&self, config: SerialConfig) -> Result<Box<dyn Transport>> {
        match self {
            Endpoint::Serial { device, baud } => {
                let config = SerialConfig {
                    baud: baud.unwrap_or(config.baud),
                    ..config
                };
                Ok(Box::new(SerialTransport::open(device, config)?))
            }
            Endpoint::Tcp { host, port } => Ok(Box::new(TcpTransport::connect(host, *port, config)?)),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Serial { device, baud: None } => write!(f, "{}", device),
            Endpoint::Serial {
                device,
                baud: Some(baud),
            } => write!(f, "{} @ {} baud", device, baud),
            Endpoint::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_device() {
        assert_eq!(
            Endpoint::parse("/dev/cu.usbmodem201101").unwrap(),
            Endpoint::Serial {
                device: "/dev/cu.usbmodem201101".into(),
                baud: None
            }
        );
    }

    #[test]
    fn test_dev_with_baud() {
        assert_eq!(
            Endpoint::parse("dev=/dev/ttyACM0:921600").unwrap(),
            Endpoint::Serial {
                device: "/dev/ttyACM0".into(),
                baud: Some(921_600)
            }
        );
        assert!(Endpoint::parse("dev=/dev/ttyACM0:fast").is_err());
    }

    #[test]
    fn test_tcp() {
        assert_eq!(
            Endpoint::parse("ip=192.168.4.1:2217").unwrap(),
            Endpoint::Tcp {
                host: "192.168.4.1".into(),
                port: 2217
            }
        );
        assert!(Endpoint::parse("ip=192.168.4.1").is_err());
        assert!(Endpoint::parse("ip=host:99999").is_err());
    }

    #[test]
    fn test_empty() {
        assert!(Endpoint::parse("").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Endpoint::parse("COM3").unwrap().to_string(), "COM3");
        assert_eq!(
            Endpoint::parse("ip=bridge:23").unwrap().to_string(),
            "tcp://bridge:23"
        );
    }
}
