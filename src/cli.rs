//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Payload pushed when `--file` is not given
pub const DEFAULT_FILE: &str = "PocketSSH-TPager.bin";
/// Fresh build output used when the packaged default is missing
pub const FALLBACK_FILE: &str = "build/PocketSSH.bin";

#[derive(Parser)]
#[command(name = "serialpush")]
#[command(author, version, about = "Push a binary to a serialrx receiver", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options of the push command
#[derive(clap::Args, Debug, Clone)]
pub struct PushArgs {
    /// Serial port or bridge (e.g. /dev/ttyACM0, dev=/dev/ttyACM0:921600, ip=host:port)
    #[arg(short, long)]
    pub port: String,

    /// Path to the binary to send
    #[arg(short, long, default_value = DEFAULT_FILE)]
    pub file: PathBuf,

    /// Bytes per DATA frame before hex encoding (0 is treated as 1)
    #[arg(long, default_value_t = 128)]
    pub chunk_bytes: usize,

    /// Baud rate
    #[arg(short, long, default_value_t = 115_200)]
    pub baud: u32,

    /// Seconds to echo device output after the transfer
    #[arg(long, default_value_t = 3.0)]
    pub tail_seconds: f64,

    /// Destination file name on the SD card root
    #[arg(long, default_value = serialpush_proto::DEFAULT_REMOTE_NAME)]
    pub remote_name: String,

    /// Do not send the trigger; assume serialrx is already active
    #[arg(long)]
    pub no_trigger: bool,

    /// Seconds to wait for the readiness marker after the trigger
    #[arg(long, default_value_t = 10.0)]
    pub trigger_timeout: f64,

    /// Override the control command (default: '__pocketctl serialrx <remote-name>')
    #[arg(long)]
    pub trigger_command: Option<String>,

    /// Milliseconds to let the link settle after opening it
    #[arg(long, default_value_t = 200)]
    pub settle_ms: u64,

    /// Flush and pause after every Nth DATA frame (0 disables pacing)
    #[arg(long, default_value_t = 32)]
    pub pace_every: usize,

    /// Length of each pacing pause in milliseconds
    #[arg(long, default_value_t = 3)]
    pub pace_delay_ms: u64,

    /// Refuse payloads larger than this many bytes
    #[arg(long)]
    pub max_bytes: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Push a file to the device
    Push(PushArgs),

    /// List serial ports
    ListPorts,
}
