//! Payload streaming
//!
//! A transfer is one BEGIN frame, one DATA frame per chunk, and one END
//! frame. Chunks are contiguous and in order, so the receiver can append them
//! to its file and check the CRC at the end.

use crate::error::Result;
use crate::frame::Frame;
use crate::payload::Payload;
use crate::transport::Transport;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

/// Payload bytes per DATA frame before hex encoding
pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = match NonZeroUsize::new(128) {
    Some(n) => n,
    None => unreachable!(),
};

/// Throttle applied while streaming
///
/// The receiver writes each chunk to an SD card as it arrives. Every `every`
/// chunks the host flushes and sleeps for `delay` so those writes can keep
/// up. This is a fixed heuristic, not flow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    /// Pause after every chunk whose index is a multiple of this (0 disables)
    pub every: usize,
    /// Length of each pause
    pub delay: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            every: 32,
            delay: Duration::from_millis(3),
        }
    }
}

impl PacingPolicy {
    /// No pauses at all
    pub fn none() -> Self {
        Self {
            every: 0,
            delay: Duration::ZERO,
        }
    }

    fn pauses_after(&self, chunk_index: usize) -> bool {
        self.every != 0 && chunk_index % self.every == 0
    }
}

/// Summary of a completed transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStats {
    /// Payload size in bytes
    pub total: usize,
    /// CRC-32 declared in BEGIN
    pub crc32: u32,
    /// Number of DATA frames sent
    pub data_frames: usize,
    /// Number of pacing pauses taken
    pub pauses: usize,
    /// Bytes put on the wire, framing included
    pub wire_bytes: usize,
    /// Time from BEGIN to END
    pub elapsed: Duration,
}

/// Progress reporting callbacks
pub trait TransferProgress {
    /// Called once before BEGIN is written
    fn started(&mut self, _total: usize, _crc32: u32) {}

    /// Called when the running percentage reaches a new multiple of ten
    fn milestone(&mut self, percent: u8, bytes_sent: usize, total: usize);

    /// Called once after END has been flushed
    fn finished(&mut self, _stats: &TransferStats) {}
}

/// Progress sink that ignores everything
pub struct NoProgress;

impl TransferProgress for NoProgress {
    fn milestone(&mut self, _percent: u8, _bytes_sent: usize, _total: usize) {}
}

/// Format a milestone the way the CLI prints it
pub fn progress_line(percent: u8, bytes_sent: usize, total: usize) -> String {
    format!("  {}% ({}/{})", percent, bytes_sent, total)
}

/// Streaming state for one transfer
///
/// Consumed by [`TransferSession::run`]; a session streams exactly once.
#[derive(Debug)]
pub struct TransferSession {
    chunk_size: NonZeroUsize,
    pacing: PacingPolicy,
    bytes_sent: usize,
    last_reported_decile: Option<u8>,
}

impl TransferSession {
    pub fn new(chunk_size: NonZeroUsize, pacing: PacingPolicy) -> Self {
        Self {
            chunk_size,
            pacing,
            bytes_sent: 0,
            last_reported_decile: None,
        }
    }

    /// Stream `payload`
    ///
    /// The receiver must already be waiting for BEGIN. A failed write ends the
    /// session immediately; nothing further is written.
    pub fn run<T, P>(
        mut self,
        transport: &mut T,
        payload: &Payload,
        progress: &mut P,
    ) -> Result<TransferStats>
    where
        T: Transport + ?Sized,
        P: TransferProgress + ?Sized,
    {
        let crc32 = payload.crc32();
        let payload = payload.bytes();
        let total = payload.len();
        let start = Instant::now();
        let widest = &payload[..self.chunk_size.get().min(total)];
        let mut line = Vec::with_capacity(Frame::Data(widest).encoded_len());
        let mut wire_bytes = 0;
        let mut pauses = 0;
        let mut data_frames = 0;

        progress.started(total, crc32);
        log::info!(
            "Streaming {} bytes in {}-byte chunks (crc32 {:08x})",
            total,
            self.chunk_size,
            crc32
        );

        Frame::Begin {
            total: total as u64,
            crc32,
        }
        .encode_into(&mut line)?;
        transport.write(&line)?;
        wire_bytes += line.len();

        for (index, chunk) in payload.chunks(self.chunk_size.get()).enumerate() {
            line.clear();
            Frame::Data(chunk).encode_into(&mut line)?;
            transport.write(&line)?;
            wire_bytes += line.len();
            data_frames += 1;
            self.bytes_sent += chunk.len();

            if self.pacing.pauses_after(index) {
                transport.flush()?;
                if !self.pacing.delay.is_zero() {
                    std::thread::sleep(self.pacing.delay);
                }
                pauses += 1;
                log::trace!("paced after chunk {}", index);
            }

            if let Some(percent) = self.next_milestone(total) {
                progress.milestone(percent, self.bytes_sent, total);
            }
        }

        line.clear();
        Frame::End.encode_into(&mut line)?;
        transport.write(&line)?;
        transport.flush()?;
        wire_bytes += line.len();

        debug_assert_eq!(self.bytes_sent, total);
        let stats = TransferStats {
            total,
            crc32,
            data_frames,
            pauses,
            wire_bytes,
            elapsed: start.elapsed(),
        };
        log::debug!(
            "Sent {} DATA frames, {} wire bytes, {} pauses in {:?}",
            stats.data_frames,
            stats.wire_bytes,
            stats.pauses,
            stats.elapsed
        );
        progress.finished(&stats);
        Ok(stats)
    }

    /// Percentage to report now, if any
    fn next_milestone(&mut self, total: usize) -> Option<u8> {
        if total == 0 {
            return None;
        }
        let percent = (self.bytes_sent as u128 * 100 / total as u128) as u8;
        if percent % 10 != 0 {
            return None;
        }
        if self.last_reported_decile.is_some_and(|last| percent <= last) {
            return None;
        }
        self.last_reported_decile = Some(percent);
        Some(percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SerialPushError;
    use crate::frame::{parse_line, ReceivedFrame};
    use crate::transport::mock::ScriptedTransport;

    #[derive(Default)]
    struct Recorder {
        started: Option<(usize, u32)>,
        milestones: Vec<(u8, usize, usize)>,
        finished: Option<TransferStats>,
    }

    impl TransferProgress for Recorder {
        fn started(&mut self, total: usize, crc32: u32) {
            self.started = Some((total, crc32));
        }

        fn milestone(&mut self, percent: u8, bytes_sent: usize, total: usize) {
            self.milestones.push((percent, bytes_sent, total));
        }

        fn finished(&mut self, stats: &TransferStats) {
            self.finished = Some(*stats);
        }
    }

    fn chunk(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn frames(written: &[u8]) -> Vec<ReceivedFrame> {
        String::from_utf8_lossy(written)
            .lines()
            .filter_map(|l| parse_line(l).unwrap())
            .collect()
    }

    #[test]
    fn test_three_chunks_of_0xaa() {
        let payload = Payload::new(vec![0xAA; 300]);
        let crc = payload.crc32();
        let mut transport = ScriptedTransport::default();
        let mut progress = Recorder::default();

        let stats = TransferSession::new(chunk(128), PacingPolicy::none())
            .run(&mut transport, &payload, &mut progress)
            .unwrap();

        let frames = frames(&transport.written);
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[0], ReceivedFrame::Begin { total: 300, crc32: crc });
        let sizes: Vec<usize> = frames[1..4]
            .iter()
            .map(|f| match f {
                ReceivedFrame::Data(d) => {
                    assert!(d.iter().all(|&b| b == 0xAA));
                    d.len()
                }
                other => panic!("expected DATA, got {:?}", other),
            })
            .collect();
        assert_eq!(sizes, [128, 128, 44]);
        assert_eq!(frames[4], ReceivedFrame::End);

        assert_eq!(stats.data_frames, 3);
        assert_eq!(stats.wire_bytes, transport.written.len());
        assert_eq!(progress.milestones, [(100, 300, 300)]);
        assert_eq!(progress.started, Some((300, crc)));
        assert_eq!(progress.finished.map(|s| s.total), Some(300));
    }

    #[test]
    fn test_empty_payload() {
        let mut transport = ScriptedTransport::default();
        let mut progress = Recorder::default();

        let stats = TransferSession::new(DEFAULT_CHUNK_SIZE, PacingPolicy::default())
            .run(&mut transport, &Payload::new(Vec::new()), &mut progress)
            .unwrap();

        assert_eq!(transport.written_text(), "BEGIN 0 00000000\nEND\n");
        assert_eq!(stats.data_frames, 0);
        assert_eq!(stats.pauses, 0);
        assert!(progress.milestones.is_empty());
        assert_eq!(transport.flushes, 1);
    }

    #[test]
    fn test_milestones_are_distinct_multiples_of_ten() {
        let payload = Payload::new(vec![0x5A; 1000]);
        let mut transport = ScriptedTransport::default();
        let mut progress = Recorder::default();

        TransferSession::new(chunk(7), PacingPolicy::none())
            .run(&mut transport, &payload, &mut progress)
            .unwrap();

        let percents: Vec<u8> = progress.milestones.iter().map(|m| m.0).collect();
        assert_eq!(percents, [0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
        assert_eq!(progress.milestones.last(), Some(&(100, 1000, 1000)));
    }

    #[test]
    fn test_pacing_flushes_every_32nd_chunk() {
        let payload = Payload::new(vec![0u8; 65]);
        let mut transport = ScriptedTransport::default();
        let pacing = PacingPolicy {
            every: 32,
            delay: Duration::ZERO,
        };

        let stats = TransferSession::new(chunk(1), pacing)
            .run(&mut transport, &payload, &mut NoProgress)
            .unwrap();

        // chunks 0, 32 and 64, then the final flush after END
        assert_eq!(stats.pauses, 3);
        assert_eq!(transport.flushes, 4);
    }

    #[test]
    fn test_write_failure_stops_stream() {
        let payload = Payload::new(vec![1u8; 64]);
        let mut transport = ScriptedTransport {
            fail_after_writes: Some(2),
            ..Default::default()
        };
        let mut progress = Recorder::default();

        let err = TransferSession::new(chunk(16), PacingPolicy::none())
            .run(&mut transport, &payload, &mut progress)
            .unwrap_err();

        assert!(matches!(err, SerialPushError::Timeout));
        let frames = frames(&transport.written);
        assert_eq!(frames.len(), 2);
        assert!(!frames.contains(&ReceivedFrame::End));
        assert!(progress.finished.is_none());
    }

    #[test]
    fn test_progress_line_format() {
        assert_eq!(progress_line(40, 4096, 10240), "  40% (4096/10240)");
    }

    mod laws {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn frames_reassemble_payload(
                payload in proptest::collection::vec(any::<u8>(), 0..2048),
                size in 1usize..300,
            ) {
                let mut transport = ScriptedTransport::default();
                let mut progress = Recorder::default();

                TransferSession::new(chunk(size), PacingPolicy::none())
                    .run(&mut transport, &Payload::from(&payload[..]), &mut progress)
                    .unwrap();

                let frames = frames(&transport.written);
                let declared = match frames.first() {
                    Some(ReceivedFrame::Begin { total, crc32 }) => (*total, *crc32),
                    other => panic!("expected BEGIN, got {:?}", other),
                };
                prop_assert_eq!(frames.last(), Some(&ReceivedFrame::End));

                let mut reassembled = Vec::new();
                let mut data_frames = 0;
                for frame in &frames[1..frames.len() - 1] {
                    match frame {
                        ReceivedFrame::Data(d) => {
                            prop_assert!(!d.is_empty() && d.len() <= size);
                            reassembled.extend_from_slice(d);
                            data_frames += 1;
                        }
                        other => panic!("unexpected frame {:?}", other),
                    }
                }

                prop_assert_eq!(data_frames, payload.len().div_ceil(size));
                prop_assert_eq!(&reassembled, &payload);
                prop_assert_eq!(declared, (payload.len() as u64, crate::checksum::compute(&reassembled)));

                let percents: Vec<u8> = progress.milestones.iter().map(|m| m.0).collect();
                prop_assert!(percents.iter().all(|p| p % 10 == 0));
                prop_assert!(percents.windows(2).all(|w| w[0] < w[1]));
                if !payload.is_empty() {
                    prop_assert_eq!(percents.last(), Some(&100));
                }
            }
        }
    }
}
