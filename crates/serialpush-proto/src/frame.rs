//! serialrx line framing
//!
//! The wire format is ASCII, one frame per newline-terminated line:
//!
//! ```text
//! BEGIN <total:decimal> <crc32:8-hex-lowercase>
//! DATA <hex-encoded-chunk-bytes>
//! ...
//! END
//! ```
//!
//! The host only ever encodes. Parsing follows the receiver's rules
//! (case-insensitive keywords, whitespace-separated fields) and is used by the
//! emulated receiver and by tests.

use crate::error::{Result, SerialPushError};

/// Keyword opening a transfer
pub const KW_BEGIN: &str = "BEGIN";
/// Keyword carrying one chunk
pub const KW_DATA: &str = "DATA";
/// Keyword closing a transfer
pub const KW_END: &str = "END";
/// Keyword the receiver accepts to cancel; never sent by the host
pub const KW_ABORT: &str = "ABORT";

/// Frame terminator
pub const LINE_END: u8 = b'\n';

/// A frame to be sent to the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Transfer header: payload size and CRC-32
    Begin { total: u64, crc32: u32 },
    /// One chunk of payload bytes
    Data(&'a [u8]),
    /// Transfer trailer
    End,
}

impl Frame<'_> {
    /// Length of the encoded line, terminator included
    pub fn encoded_len(&self) -> usize {
        match self {
            Frame::Begin { total, .. } => {
                KW_BEGIN.len() + 1 + total.to_string().len() + 1 + 8 + 1
            }
            Frame::Data(chunk) => KW_DATA.len() + 1 + chunk.len() * 2 + 1,
            Frame::End => KW_END.len() + 1,
        }
    }

    /// Append the encoded line to `out`
    ///
    /// Fails only for an empty DATA chunk, which the protocol never carries.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        out.reserve(self.encoded_len());
        match self {
            Frame::Begin { total, crc32 } => {
                out.extend_from_slice(format!("{} {} {:08x}", KW_BEGIN, total, crc32).as_bytes());
            }
            Frame::Data(chunk) => {
                if chunk.is_empty() {
                    return Err(SerialPushError::InvalidParameter(
                        "DATA frame needs at least one byte".into(),
                    ));
                }
                out.extend_from_slice(KW_DATA.as_bytes());
                out.push(b' ');
                let start = out.len();
                out.resize(start + chunk.len() * 2, 0);
                hex::encode_to_slice(chunk, &mut out[start..])
                    .map_err(|e| SerialPushError::InvalidParameter(e.to_string()))?;
            }
            Frame::End => out.extend_from_slice(KW_END.as_bytes()),
        }
        out.push(LINE_END);
        Ok(())
    }

    /// Encode into a fresh buffer
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out)?;
        Ok(out)
    }
}

/// A line as understood by the receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceivedFrame {
    Begin { total: u64, crc32: u32 },
    Data(Vec<u8>),
    End,
    Abort,
    /// Any other line; the receiver skips these
    Unknown(String),
}

/// Parse one line (with or without its terminator)
///
/// Returns `Ok(None)` for blank lines. Malformed BEGIN and DATA lines are
/// errors; unrecognised keywords are not.
pub fn parse_line(line: &str) -> Result<Option<ReceivedFrame>> {
    let mut parts = line.split_whitespace();
    let Some(keyword) = parts.next() else {
        return Ok(None);
    };

    let frame = if keyword.eq_ignore_ascii_case(KW_BEGIN) {
        let (Some(total), Some(crc)) = (parts.next(), parts.next()) else {
            return Err(SerialPushError::InvalidFrame(format!(
                "BEGIN needs size and CRC: {:?}",
                line.trim_end()
            )));
        };
        let total = total
            .parse::<u64>()
            .map_err(|_| SerialPushError::InvalidFrame(format!("invalid BEGIN size: {}", total)))?;
        let crc32 = u32::from_str_radix(crc, 16)
            .map_err(|_| SerialPushError::InvalidFrame(format!("invalid BEGIN CRC: {}", crc)))?;
        ReceivedFrame::Begin { total, crc32 }
    } else if keyword.eq_ignore_ascii_case(KW_DATA) {
        match parts.next() {
            Some(payload) => ReceivedFrame::Data(hex::decode(payload).map_err(|e| {
                SerialPushError::InvalidFrame(format!("invalid DATA hex payload: {}", e))
            })?),
            None => ReceivedFrame::Unknown(line.trim().to_string()),
        }
    } else if keyword.eq_ignore_ascii_case(KW_END) {
        ReceivedFrame::End
    } else if keyword.eq_ignore_ascii_case(KW_ABORT) {
        ReceivedFrame::Abort
    } else {
        ReceivedFrame::Unknown(line.trim().to_string())
    };

    Ok(Some(frame))
}
