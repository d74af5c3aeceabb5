//! Moments CLI - stamp image tooling for Epic Moments.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;
use url::Url;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error
  65  Data error (undecodable image, malformed targets file)
  66  Input file not found or unreadable
  69  Server unavailable
  74  Output could not be written";

#[derive(Parser)]
#[command(name = "moments")]
#[command(author, version, about = "Stamp enhancement, fingerprinting and scanning", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the edge-enhanced PNG variant of an image
    Enhance {
        /// Image to enhance (JPEG, PNG, GIF or WebP)
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Output path (defaults to <IMAGE stem>.enhanced.png)
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,
    },

    /// Print the 64-bit perceptual fingerprint of an image
    Fingerprint {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Enhance the image before fingerprinting, as uploads are
        #[arg(long)]
        enhance: bool,
    },

    /// Build a recognition targets file from a running server
    Targets {
        /// Base URL of the moments server
        #[arg(long, value_name = "URL", value_parser = utils::parse_server_url)]
        server: Url,

        /// Where to write the targets JSON
        #[arg(short, long, value_name = "FILE", default_value = "targets.json")]
        output: PathBuf,
    },

    /// Run a scanner session over captured frames
    Scan {
        /// Frame images, played back in order by a simulated camera
        #[arg(value_name = "FRAMES", required = true)]
        frames: Vec<PathBuf>,

        /// Targets file produced by `moments targets`
        #[arg(long, value_name = "FILE")]
        targets: PathBuf,

        /// Interval between recognition cycles
        #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: u64,

        /// Number of cycles to run (defaults to one per frame)
        #[arg(long)]
        cycles: Option<u64>,

        /// Maximum fingerprint Hamming distance for a match
        #[arg(long, default_value_t = moments_core::recognition::DEFAULT_MAX_DISTANCE)]
        max_distance: u32,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "moments=debug,moments_core=debug"
    } else {
        "moments=warn,moments_core=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let quiet = cli.quiet;

    let result = match cli.command {
        Commands::Enhance { image, output } => commands::enhance::execute(image, output, quiet).await,
        Commands::Fingerprint { image, enhance } => commands::fingerprint::execute(image, enhance).await,
        Commands::Targets { server, output } => commands::targets::execute(server, output, quiet).await,
        Commands::Scan {
            frames,
            targets,
            interval_ms,
            cycles,
            max_distance,
            json,
        } => {
            let options = commands::scan::ScanOptions {
                interval_ms,
                cycles,
                max_distance,
                json,
                quiet,
            };
            commands::scan::execute(frames, targets, options).await
        }
    };

    let exit = match result {
        Ok(()) => ExitCode::success(),
        Err(e) => ExitCode::from_anyhow(&e),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "Error:".red().bold(), message);
    }
    process::exit(exit.code);
}
