//! Push command implementation

use super::PushFailure;
use crate::cli::{PushArgs, DEFAULT_FILE, FALLBACK_FILE};
use serialpush_proto::handshake::resolve_trigger;
use serialpush_proto::{
    progress_line, push, validate_remote_name, Endpoint, HandshakeConfig, PacingPolicy, Payload,
    PushOptions, SerialConfig, SerialPushError, TransferProgress, TransferStats, Transport,
};
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything needed to run a push, checked before the port is opened
#[derive(Debug)]
pub struct PushPlan {
    pub path: PathBuf,
    pub payload: Payload,
    pub remote_name: String,
    pub options: PushOptions,
}

impl PushPlan {
    /// Lines printed before the transport is touched
    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "Sending {} bytes from {}",
                self.payload.len(),
                self.path.display()
            ),
            format!("CRC32: {:08x}", self.payload.crc32()),
            format!("Remote filename: {}", self.remote_name),
        ];
        match &self.options.handshake.trigger {
            Some(trigger) => lines.push(format!("Triggering receiver: {}", trigger)),
            None => lines.push("No trigger mode: assuming serialrx is already active.".into()),
        }
        lines
    }
}

/// Prints progress milestones to a console
pub struct ConsoleProgress<W: Write> {
    out: W,
}

impl<W: Write> ConsoleProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text).and_then(|_| self.out.flush()) {
            log::debug!("progress output failed: {}", e);
        }
    }
}

impl<W: Write> TransferProgress for ConsoleProgress<W> {
    fn milestone(&mut self, percent: u8, bytes_sent: usize, total: usize) {
        self.line(&progress_line(percent, bytes_sent, total));
    }

    fn finished(&mut self, stats: &TransferStats) {
        log::debug!(
            "{} DATA frames, {} pauses, {} wire bytes in {:?}",
            stats.data_frames,
            stats.pauses,
            stats.wire_bytes,
            stats.elapsed
        );
        self.line("Transfer sent. Tailing device output...");
    }
}

/// Run the push command against the port named on the command line
pub fn run(args: &PushArgs) -> Result<(), PushFailure> {
    let plan = prepare(args, Path::new(DEFAULT_FILE), Path::new(FALLBACK_FILE))?;
    for line in plan.summary() {
        println!("{}", line);
    }

    let endpoint = Endpoint::parse(&args.port)?;
    let config = SerialConfig {
        baud: args.baud,
        ..Default::default()
    };
    log::info!("Opening {}", endpoint);
    let mut transport = endpoint.open(config)?;

    execute(
        &mut transport,
        &plan,
        &mut ConsoleProgress::new(std::io::stdout()),
        &mut std::io::stdout(),
    )
}

/// Validate arguments and load the payload
///
/// Nothing here touches the transport, so every input error is reported
/// before the device sees a single byte.
pub fn prepare(
    args: &PushArgs,
    default_file: &Path,
    fallback_file: &Path,
) -> Result<PushPlan, PushFailure> {
    let path = resolve_file(&args.file, default_file, fallback_file)?;
    let payload = load_payload(&path, args.max_bytes)?;
    let options = build_options(args)?;

    Ok(PushPlan {
        path,
        payload,
        remote_name: args.remote_name.clone(),
        options,
    })
}

/// Stream a prepared plan over an open transport
pub fn execute<T, P, W>(
    transport: &mut T,
    plan: &PushPlan,
    progress: &mut P,
    echo: &mut W,
) -> Result<(), PushFailure>
where
    T: Transport + ?Sized,
    P: TransferProgress + ?Sized,
    W: Write + ?Sized,
{
    let report = push(transport, &plan.payload, &plan.options, progress, echo)?;
    log::info!(
        "Pushed {} bytes to {} ({} bytes of device output after END)",
        report.stats.total,
        plan.remote_name,
        report.tail_bytes
    );
    Ok(())
}

/// Pick the payload file, falling back to a fresh build output when the
/// packaged default is missing
fn resolve_file(
    requested: &Path,
    default_file: &Path,
    fallback_file: &Path,
) -> Result<PathBuf, PushFailure> {
    if requested.exists() {
        return Ok(requested.to_path_buf());
    }
    if requested == default_file && fallback_file.exists() {
        println!(
            "Packaged binary not found at {}; falling back to {}",
            requested.display(),
            fallback_file.display()
        );
        return Ok(fallback_file.to_path_buf());
    }
    Err(PushFailure::FileNotFound(requested.to_path_buf()))
}

fn load_payload(path: &Path, max_bytes: Option<u64>) -> Result<Payload, PushFailure> {
    let unreadable = |source| PushFailure::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    if let Some(limit) = max_bytes {
        let size = std::fs::metadata(path).map_err(unreadable)?.len();
        if size > limit {
            return Err(PushFailure::PayloadTooLarge { size, limit });
        }
    }

    let payload = Payload::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PushFailure::FileNotFound(path.to_path_buf()),
        _ => unreadable(e),
    })?;
    log::debug!("Loaded {} bytes from {}", payload.len(), path.display());
    Ok(payload)
}

fn seconds(value: f64, what: &str) -> Result<Duration, PushFailure> {
    Duration::try_from_secs_f64(value.max(0.0)).map_err(|_| {
        SerialPushError::InvalidParameter(format!("{} out of range: {}", what, value)).into()
    })
}

fn build_options(args: &PushArgs) -> Result<PushOptions, PushFailure> {
    let handshake = if args.no_trigger {
        HandshakeConfig::skip()
    } else {
        let custom = args
            .trigger_command
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        // The name only reaches the device through the default trigger
        if custom.is_none() {
            validate_remote_name(&args.remote_name).map_err(PushFailure::InvalidRemoteName)?;
        }
        HandshakeConfig {
            trigger: Some(resolve_trigger(&args.remote_name, custom)),
            timeout: seconds(args.trigger_timeout, "trigger timeout")?,
        }
    };

    Ok(PushOptions {
        handshake,
        chunk_size: NonZeroUsize::new(args.chunk_bytes).unwrap_or(NonZeroUsize::MIN),
        pacing: PacingPolicy {
            every: args.pace_every,
            delay: Duration::from_millis(args.pace_delay_ms),
        },
        settle: Duration::from_millis(args.settle_ms),
        tail: seconds(args.tail_seconds, "tail duration")?,
    })
}
