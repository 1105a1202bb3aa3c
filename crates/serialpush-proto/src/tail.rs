//! Post-transfer device output

use crate::reader::StreamReader;
use crate::transport::Transport;
use std::io::Write;
use std::time::{Duration, Instant};

/// Default time to keep echoing after END
pub const DEFAULT_TAIL: Duration = Duration::from_secs(3);

/// Echo device output until `duration` has elapsed
///
/// Diagnostics only: the receiver reports CRC results here, but nothing is
/// parsed. A read error ends the tail early and is logged, never returned.
/// Returns the number of bytes echoed.
pub fn monitor<T, W>(transport: &mut T, duration: Duration, echo: &mut W) -> usize
where
    T: Transport + ?Sized,
    W: Write + ?Sized,
{
    let deadline = Instant::now() + duration;
    let mut reader = StreamReader::new(transport, echo);

    while Instant::now() < deadline {
        if let Err(e) = reader.poll() {
            log::warn!("Stopped reading device output: {}", e);
            break;
        }
    }

    reader.total()
}
