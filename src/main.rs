//! serialpush - push a binary to a device over its serial console
//!
//! The device runs a `serialrx` receiver that is started from its console
//! with a control command. serialpush types that command, waits for the
//! receiver to announce itself, streams the file as hex-encoded
//! `BEGIN`/`DATA`/`END` lines and then echoes the device log for a few
//! seconds so the verification result can be read.
//!
//! The exit status tells scripts how the run ended: 0 on success, 1 for
//! transport failures, 2 for a missing input file, 3 when the receiver never
//! became ready, 4 for an oversized payload and 5 for a rejected remote name.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::Outcome;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let result = match cli.command {
        Commands::Push(args) => commands::push::run(&args),
        Commands::ListPorts => commands::list_ports(),
    };

    match result {
        Ok(()) => ExitCode::from(Outcome::Success.exit_code()),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.outcome().exit_code())
        }
    }
}
