//! Man page generator for serialpush
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::path::PathBuf;

#[path = "../cli.rs"]
#[allow(dead_code)]
mod cli;

fn main() -> std::io::Result<()> {
    // Default to ./man directory
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));

    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();
    let mut pages = vec![("serialpush.1".to_string(), clap_mangen::Man::new(cmd.clone()))];
    for sub in cmd.get_subcommands() {
        let name = format!("serialpush-{}", sub.get_name());
        let page = clap_mangen::Man::new(sub.clone().name(name.clone()));
        pages.push((format!("{}.1", name), page));
    }

    for (file_name, man) in pages {
        let mut buffer = Vec::new();
        man.render(&mut buffer)?;
        let output_path = output_dir.join(file_name);
        fs::write(&output_path, buffer)?;
        println!("Man page generated at: {}", output_path.display());
    }

    println!("\nTo view the man page:");
    println!("  man -l {}", output_dir.join("serialpush.1").display());

    Ok(())
}
