//! Polling reader over a transport with an echo sink

use crate::error::Result;
use crate::transport::Transport;
use std::io::Write;

/// Size of a single polling read
pub const READ_CHUNK: usize = 4096;

/// Buffered polling reader
///
/// Every `poll` performs one bounded-timeout read. Whatever arrives is echoed
/// to the sink as lossily decoded text and handed back to the caller.
pub struct StreamReader<'a, T: Transport + ?Sized, W: Write + ?Sized> {
    transport: &'a mut T,
    echo: &'a mut W,
    buf: Box<[u8; READ_CHUNK]>,
    total: usize,
}

impl<'a, T: Transport + ?Sized, W: Write + ?Sized> StreamReader<'a, T, W> {
    pub fn new(transport: &'a mut T, echo: &'a mut W) -> Self {
        Self {
            transport,
            echo,
            buf: Box::new([0u8; READ_CHUNK]),
            total: 0,
        }
    }

    /// Read once; an empty slice means nothing arrived this tick
    pub fn poll(&mut self) -> Result<&[u8]> {
        let n = self.transport.read_nonblock(&mut self.buf[..])?;
        if n > 0 {
            self.total += n;
            let text = String::from_utf8_lossy(&self.buf[..n]);
            // Echo is diagnostics only; a closed stdout must not abort a transfer
            if let Err(e) = self
                .echo
                .write_all(text.as_bytes())
                .and_then(|_| self.echo.flush())
            {
                log::debug!("echo sink write failed: {}", e);
            }
        }
        Ok(&self.buf[..n])
    }

    /// Bytes received since this reader was created
    pub fn total(&self) -> usize {
        self.total
    }
}
