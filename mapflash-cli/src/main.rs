//! mapflash CLI - Command-line tool for programming device memory over a
//! packetized MAP link.
//!
//! ## Features
//!
//! - Write headered firmware files, raw binaries and Intel-HEX files
//! - Read file sections back to disk
//! - Byte-wise verification against reference files
//! - Sector and region erase
//! - Environment variable support
//!
//! Sections, timeouts and erase triggers come from a TOML configuration file
//! (`mapflash.toml` next to the working directory or the per-user config
//! directory).

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use env_logger::Env;
use mapflash::CancelToken;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod config;

use config::Config;

/// mapflash - a cross-platform tool for programming device memory.
///
/// Environment variables:
///   MAPFLASH_PORT   - Default serial port
///   MAPFLASH_BAUD   - Default baud rate (default: 115200)
#[derive(Parser)]
#[command(name = "mapflash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port to use (e.g. /dev/ttyUSB0 or COM3).
    #[arg(short, long, global = true, env = "MAPFLASH_PORT")]
    port: Option<String>,

    /// Baud rate.
    #[arg(short, long, global = true, default_value = "115200", env = "MAPFLASH_BAUD")]
    baud: u32,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    /// Assume "yes" for integrity-override prompts instead of asking.
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Verbose output level (-v, -vv, -vvv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a file into a section (headered, raw, or Intel-HEX by extension).
    Write {
        /// Section name from the configuration file.
        section: String,
        /// File to write.
        file: PathBuf,
    },

    /// Read the file stored in a section back to disk.
    Read {
        /// Section name from the configuration file.
        section: String,
        /// Output file.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Compare a section's contents against a reference file.
    Verify {
        /// Section name from the configuration file.
        section: String,
        /// Reference file.
        file: PathBuf,
    },

    /// Erase a section.
    Erase {
        /// Section name from the configuration file.
        section: String,
        /// Erase the whole region with one command instead of per sector.
        #[arg(long)]
        region: bool,
    },

    /// Decode and print the file header stored in a section.
    Header {
        /// Section name from the configuration file.
        section: String,
    },

    /// List available serial ports.
    Ports,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", style("error:").red().bold());
            ExitCode::FAILURE
        },
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config_path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load(),
    };

    // Ctrl-C requests a cooperative stop at the next chunk boundary.
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        let _ = ctrlc::set_handler(move || cancel.cancel());
    }

    let ctx = commands::Context {
        port: cli.port.clone(),
        baud: cli.baud,
        yes: cli.yes,
        quiet: cli.quiet,
        config,
        cancel,
    };

    match &cli.command {
        Commands::Write { section, file } => commands::write::cmd_write(&ctx, section, file),
        Commands::Read { section, output } => commands::read::cmd_read(&ctx, section, output),
        Commands::Verify { section, file } => commands::verify::cmd_verify(&ctx, section, file),
        Commands::Erase { section, region } => {
            commands::erase::cmd_erase(&ctx, section, *region)
        },
        Commands::Header { section } => commands::info::cmd_header(&ctx, section),
        Commands::Ports => commands::info::cmd_ports(&ctx),
    }
}
