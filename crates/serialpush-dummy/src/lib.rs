//! serialpush-dummy - In-memory serialrx receiver for testing
//!
//! This crate provides a transport that behaves like a device running the
//! serialrx receiver: it reacts to the trigger command on its console, logs
//! the readiness markers, decodes BEGIN/DATA/END frames, checks the CRC and
//! stores the file in memory. It's useful for testing without real hardware.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serialpush_proto::checksum::Crc32;
use serialpush_proto::frame::{parse_line, ReceivedFrame};
use serialpush_proto::{validate_remote_name, Result, SerialPushError, Transport};

/// Configuration for the dummy receiver
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Console command that starts the receiver (followed by a file name)
    pub command: String,
    /// SD card mount point used in log lines
    pub root: String,
    /// Start already waiting for BEGIN, as if serialrx had been run by hand
    pub start_active: bool,
    /// Run the receiver without printing any readiness marker
    pub silent: bool,
    /// File name used when `start_active` is set
    pub default_name: String,
    /// Fail every write once this many writes have been accepted
    pub fail_after_writes: Option<usize>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            command: "__pocketctl serialrx".into(),
            root: "/sdcard".into(),
            start_active: false,
            silent: false,
            default_name: serialpush_proto::DEFAULT_REMOTE_NAME.into(),
            fail_after_writes: None,
        }
    }
}

/// Receiver state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RxState {
    /// Console mode, waiting for the trigger command
    Console,
    /// Waiting for BEGIN
    AwaitBegin { name: String },
    /// Accepting DATA frames
    Receiving {
        name: String,
        expected: u64,
        crc32: u32,
    },
    /// All bytes received, waiting for END
    AwaitEnd {
        name: String,
        crc32: u32,
    },
    /// Transfer stored
    Complete { name: String },
    /// Transfer rejected; the partial file was discarded
    Failed { reason: String },
}

/// Dummy serialrx receiver
///
/// Emulates the device end of a serial console in memory.
pub struct DummyReceiver {
    config: DummyConfig,
    state: RxState,
    /// Host bytes not yet terminated by a newline
    line_buf: Vec<u8>,
    /// Device output waiting to be read by the host
    output: VecDeque<u8>,
    /// Every complete line the host sent, in order
    lines: Vec<String>,
    received: Vec<u8>,
    crc: Crc32,
    last_percent: Option<u64>,
    files: HashMap<String, Vec<u8>>,
    writes: usize,
    flushes: usize,
}

impl DummyReceiver {
    /// Create a new dummy receiver with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let mut rx = Self {
            state: RxState::Console,
            line_buf: Vec::new(),
            output: VecDeque::new(),
            lines: Vec::new(),
            received: Vec::new(),
            crc: Crc32::new(),
            last_percent: None,
            files: HashMap::new(),
            writes: 0,
            flushes: 0,
            config,
        };
        if rx.config.start_active {
            let name = rx.config.default_name.clone();
            rx.start_receiver(name);
        }
        rx
    }

    /// Create a new dummy receiver with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Queue console output as if the device had logged it
    pub fn emit(&mut self, text: &str) {
        self.output.extend(text.as_bytes());
    }

    /// Current receiver state
    pub fn state(&self) -> &RxState {
        &self.state
    }

    /// Contents of a stored file
    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// Every line the host sent, without terminators
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines that look like protocol frames
    pub fn frame_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str).filter(|l| {
            let keyword = l.split_whitespace().next().unwrap_or("");
            ["BEGIN", "DATA", "END"]
                .iter()
                .any(|k| keyword.eq_ignore_ascii_case(k))
        })
    }

    /// Number of flushes requested by the host
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    fn start_receiver(&mut self, name: String) {
        if validate_remote_name(&name).is_err() {
            self.emit("serialrx: invalid target filename\n");
            return;
        }
        if !self.config.silent {
            let path = format!("{}/{}", self.config.root, name);
            self.emit("serialrx: waiting for BEGIN <size> <crc32hex>\n");
            self.emit("serialrx: send DATA <hex> lines, then END\n");
            self.emit(&format!("I (4242) ssh: serialrx ready: target={}\n", path));
            self.emit(&format!(
                "I (4242) ssh: POCKETCTL serialrx_ready target={}\n",
                path
            ));
        }
        self.received.clear();
        self.crc = Crc32::new();
        self.last_percent = None;
        self.state = RxState::AwaitBegin { name };
    }

    fn fail(&mut self, reason: &str) {
        self.emit(&format!("serialrx: {}\n", reason));
        log::debug!("dummy receiver failed: {}", reason);
        self.received.clear();
        self.state = RxState::Failed {
            reason: reason.to_string(),
        };
    }

    fn handle_console(&mut self, line: &str) {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix(self.config.command.as_str()) {
            let name = match rest.trim() {
                "" => self.config.default_name.clone(),
                name => name.to_string(),
            };
            self.emit(&format!("> {}\n", trimmed));
            self.start_receiver(name);
        } else if !trimmed.is_empty() {
            self.emit(&format!("unknown command: {}\n", trimmed));
        }
    }

    fn handle_line(&mut self, line: &str) {
        // Finished receivers are back at the console prompt
        if matches!(
            self.state,
            RxState::Console | RxState::Complete { .. } | RxState::Failed { .. }
        ) {
            self.handle_console(line);
            return;
        }

        let frame = match parse_line(line) {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(e) => {
                let reason = match (&self.state, e) {
                    (RxState::AwaitBegin { .. }, _) => "invalid BEGIN header".to_string(),
                    (_, SerialPushError::InvalidFrame(msg)) if msg.contains("DATA") => {
                        "invalid DATA hex payload".to_string()
                    }
                    (_, e) => e.to_string(),
                };
                self.fail(&reason);
                return;
            }
        };

        match (self.state.clone(), frame) {
            (RxState::AwaitBegin { name }, ReceivedFrame::Begin { total, crc32 }) => {
                self.emit(&format!(
                    "serialrx: receiving {} bytes to {}/{}\n",
                    total, self.config.root, name
                ));
                self.state = if total == 0 {
                    RxState::AwaitEnd { name, crc32 }
                } else {
                    RxState::Receiving {
                        name,
                        expected: total,
                        crc32,
                    }
                };
            }
            (RxState::AwaitBegin { .. }, _) => self.fail("invalid BEGIN header"),
            (RxState::Receiving { .. }, ReceivedFrame::Abort) => self.fail("aborted by host"),
            (
                RxState::Receiving {
                    name,
                    expected,
                    crc32,
                },
                ReceivedFrame::Data(chunk),
            ) => {
                if chunk.is_empty() {
                    return;
                }
                if self.received.len() as u64 + chunk.len() as u64 > expected {
                    self.fail("DATA exceeds expected size");
                    return;
                }
                self.crc.update(&chunk);
                self.received.extend_from_slice(&chunk);

                let got = self.received.len() as u64;
                let pct = got * 100 / expected;
                if self.last_percent.map_or(true, |last| pct >= last + 10) || pct == 100 {
                    self.last_percent = Some(pct);
                    self.emit(&format!("serialrx: {}% ({}/{})\n", pct, got, expected));
                }
                if got == expected {
                    self.state = RxState::AwaitEnd { name, crc32 };
                }
            }
            (RxState::Receiving { .. }, _) => {}
            (RxState::AwaitEnd { name, crc32 }, ReceivedFrame::End) => {
                let actual = self.crc.value();
                if actual != crc32 {
                    log::debug!("dummy receiver: crc expected {:08x} got {:08x}", crc32, actual);
                    self.fail("CRC mismatch, file removed");
                    return;
                }
                self.emit("serialrx: transfer complete\n");
                self.files
                    .insert(name.clone(), std::mem::take(&mut self.received));
                self.state = RxState::Complete { name };
            }
            (RxState::AwaitEnd { .. }, _) => self.fail("invalid END marker"),
            (RxState::Console | RxState::Complete { .. } | RxState::Failed { .. }, _) => {}
        }
    }
}

impl Transport for DummyReceiver {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        if let Some(limit) = self.config.fail_after_writes {
            if self.writes >= limit {
                return Err(SerialPushError::Timeout);
            }
        }
        self.writes += 1;

        for &byte in data {
            if byte == b'\n' {
                let line = String::from_utf8_lossy(&self.line_buf).into_owned();
                self.line_buf.clear();
                self.handle_line(&line);
                self.lines.push(line);
            } else {
                self.line_buf.push(byte);
            }
        }
        Ok(())
    }

    fn read_nonblock(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.output.is_empty() {
            // Stand in for the port's read timeout without stalling tests
            std::thread::sleep(Duration::from_millis(1));
            return Ok(0);
        }
        let n = buf.len().min(self.output.len());
        for (slot, byte) in buf.iter_mut().zip(self.output.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.line_buf.clear();
        self.output.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialpush_proto::{
        push, HandshakeConfig, NoProgress, PacingPolicy, Payload, PushOptions, Readiness,
        TransferProgress,
    };
    use std::num::NonZeroUsize;

    fn options(remote: &str) -> PushOptions {
        PushOptions {
            handshake: HandshakeConfig {
                timeout: Duration::from_secs(2),
                ..HandshakeConfig::for_remote(remote)
            },
            pacing: PacingPolicy {
                every: 32,
                delay: Duration::ZERO,
            },
            settle: Duration::ZERO,
            tail: Duration::from_millis(30),
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct Lines(Vec<String>);

    impl TransferProgress for Lines {
        fn milestone(&mut self, percent: u8, bytes_sent: usize, total: usize) {
            self.0
                .push(serialpush_proto::progress_line(percent, bytes_sent, total));
        }
    }

    #[test]
    fn test_push_stores_file() {
        let payload: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
        let mut rx = DummyReceiver::new_default();
        let mut echo = Vec::new();
        let mut progress = Lines::default();

        let report = push(
            &mut rx,
            &Payload::from(&payload[..]),
            &options("fw.bin"),
            &mut progress,
            &mut echo,
        )
        .unwrap();

        assert!(matches!(report.readiness, Readiness::Ready { .. }));
        assert_eq!(rx.state(), &RxState::Complete { name: "fw.bin".into() });
        assert_eq!(rx.file("fw.bin"), Some(&payload[..]));
        assert_eq!(rx.frame_lines().count(), 2 + 5000usize.div_ceil(128));
        assert_eq!(progress.0.last().map(String::as_str), Some("  100% (5000/5000)"));

        let echo = String::from_utf8(echo).unwrap();
        assert!(echo.contains("serialrx ready: target=/sdcard/fw.bin"));
        assert!(echo.contains("serialrx: transfer complete"));
        assert_eq!(report.tail_bytes, echo.len() - echo.find("serialrx: receiving").unwrap());
    }

    #[test]
    fn test_three_chunks_of_0xaa() {
        let payload = Payload::new(vec![0xAA; 300]);
        let mut rx = DummyReceiver::new_default();
        let mut echo = Vec::new();

        push(&mut rx, &payload, &options("a.bin"), &mut NoProgress, &mut echo).unwrap();

        let frames: Vec<&str> = rx.frame_lines().collect();
        assert_eq!(frames.len(), 5);
        assert_eq!(
            frames[0],
            format!("BEGIN 300 {:08x}", payload.crc32())
        );
        let sizes: Vec<usize> = frames[1..4]
            .iter()
            .map(|l| l.strip_prefix("DATA ").unwrap().len() / 2)
            .collect();
        assert_eq!(sizes, [128, 128, 44]);
        assert_eq!(frames[4], "END");
        assert_eq!(rx.file("a.bin"), Some(payload.bytes()));
    }

    #[test]
    fn test_empty_payload() {
        let mut rx = DummyReceiver::new_default();
        let mut echo = Vec::new();

        let payload = Payload::new(Vec::new());

        push(&mut rx, &payload, &options("empty.bin"), &mut NoProgress, &mut echo).unwrap();

        let frames: Vec<&str> = rx.frame_lines().collect();
        assert_eq!(frames, ["BEGIN 0 00000000", "END"]);
        assert_eq!(rx.file("empty.bin"), Some(&[][..]));
    }

    #[test]
    fn test_silent_receiver_times_out_before_begin() {
        let mut rx = DummyReceiver::new(DummyConfig {
            silent: true,
            ..Default::default()
        });
        let mut echo = Vec::new();
        let mut opts = options("fw.bin");
        opts.handshake.timeout = Duration::from_millis(200);

        let payload = Payload::new(vec![1, 2, 3]);

        let err = push(&mut rx, &payload, &opts, &mut NoProgress, &mut echo).unwrap_err();

        assert!(matches!(err, SerialPushError::HandshakeTimeout { .. }));
        assert_eq!(rx.lines(), ["__pocketctl serialrx fw.bin"]);
        assert_eq!(rx.frame_lines().count(), 0);
    }

    #[test]
    fn test_no_trigger_starts_with_begin() {
        let mut rx = DummyReceiver::new(DummyConfig {
            start_active: true,
            default_name: "pre.bin".into(),
            ..Default::default()
        });
        let mut echo = Vec::new();
        let opts = PushOptions {
            handshake: HandshakeConfig::skip(),
            ..options("ignored.bin")
        };

        let payload = Payload::from(&b"payload"[..]);

        let report = push(&mut rx, &payload, &opts, &mut NoProgress, &mut echo).unwrap();

        assert_eq!(report.readiness, Readiness::Assumed);
        assert!(rx.lines()[0].starts_with("BEGIN 7 "));
        assert_eq!(rx.file("pre.bin"), Some(&b"payload"[..]));
    }

    #[test]
    fn test_write_failure_leaves_no_file() {
        let mut rx = DummyReceiver::new(DummyConfig {
            fail_after_writes: Some(4),
            ..Default::default()
        });
        let mut echo = Vec::new();

        let payload = Payload::new(vec![0x11; 1024]);

        let err = push(&mut rx, &payload, &options("fw.bin"), &mut NoProgress, &mut echo)
            .unwrap_err();

        assert!(err.is_transport());
        assert!(!rx.frame_lines().any(|l| l == "END"));
        assert_eq!(rx.file("fw.bin"), None);
    }

    #[test]
    fn test_crc_mismatch_is_rejected() {
        let mut rx = DummyReceiver::new_default();
        rx.write(b"__pocketctl serialrx x.bin\n").unwrap();
        rx.write(b"BEGIN 2 00000000\nDATA abcd\nEND\n").unwrap();

        assert_eq!(
            rx.state(),
            &RxState::Failed {
                reason: "CRC mismatch, file removed".into()
            }
        );
        assert_eq!(rx.file("x.bin"), None);
    }

    #[test]
    fn test_oversized_data_is_rejected() {
        let mut rx = DummyReceiver::new_default();
        rx.write(b"__pocketctl serialrx x.bin\nBEGIN 1 00000000\nDATA abcd\n")
            .unwrap();

        assert!(matches!(rx.state(), RxState::Failed { reason } if reason == "DATA exceeds expected size"));
    }

    #[test]
    fn test_invalid_name_keeps_console() {
        let mut rx = DummyReceiver::new_default();
        rx.write(b"__pocketctl serialrx ../etc/passwd\n").unwrap();

        assert_eq!(rx.state(), &RxState::Console);
        let mut buf = [0u8; 256];
        let n = rx.read_nonblock(&mut buf).unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).contains("invalid target filename"));
    }

    #[test]
    fn test_small_chunks_with_pacing() {
        let payload = Payload::new(vec![0x42; 257]);
        let mut rx = DummyReceiver::new_default();
        let mut echo = Vec::new();
        let opts = PushOptions {
            chunk_size: NonZeroUsize::new(4).unwrap(),
            ..options("p.bin")
        };

        let report = push(&mut rx, &payload, &opts, &mut NoProgress, &mut echo).unwrap();

        // 65 chunks: pauses after chunks 0, 32 and 64
        assert_eq!(report.stats.data_frames, 65);
        assert_eq!(report.stats.pauses, 3);
        assert_eq!(rx.file("p.bin"), Some(payload.bytes()));
    }
}
