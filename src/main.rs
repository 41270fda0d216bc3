//! seghash - Segment hash client
//!
//! Reads text lines, splits each into 16-character segments and asks a hash
//! server for the hash of every segment over a small binary protocol.

mod client;
mod config;
mod input;
mod network;
mod protocol;
mod status;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use client::HashClient;
use config::{Config, LoggingConfig};
use input::LineReader;
use network::{Connector, TcpConnector};
use status::TracingSink;

/// seghash - per-segment hashing client
#[derive(Parser)]
#[command(name = "seghash")]
#[command(version)]
#[command(about = "Request hashes of 16-character line segments from a hash server", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash every line of an input file
    Run {
        /// Input file, one line per session
        #[arg(short, long)]
        file: PathBuf,

        /// Server host or IP address
        #[arg(short, long)]
        address: Option<String>,

        /// Server port (must be greater than 1024)
        #[arg(short, long)]
        port: Option<u16>,

        /// Log file (truncated on start)
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Log to the console only
        #[arg(long, conflicts_with = "log_file")]
        no_log_file: bool,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };

    match cli.command {
        Commands::Run {
            file,
            address,
            port,
            log_file,
            no_log_file,
        } => {
            if let Some(address) = address {
                config.server.host = address;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if no_log_file {
                config.logging.log_file = None;
            } else if log_file.is_some() {
                config.logging.log_file = log_file;
            }
            config.logging.verbose |= cli.verbose;

            config.validate()?;
            init_logging(&config.logging)?;
            run_client(config, &file).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                if let Some(path) = output {
                    config::sample_config().save(&path)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", config::generate_sample_config()?);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

/// Install console logging and, if configured, a plain-text log file
fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if logging.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let log_file = match &logging.log_file {
        Some(path) => Some(file_layer(path)?),
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(log_file)
        .with(filter)
        .init();

    if let Some(path) = &logging.log_file {
        tracing::info!("Log file {} opened", path.display());
    }

    Ok(())
}

/// Plain-text layer writing to `path`, which is created or truncated
fn file_layer<S>(path: &Path) -> anyhow::Result<fmt::Layer<S, DefaultFields, Format, Mutex<File>>> {
    let file = File::create(path)
        .with_context(|| format!("Could not open log file {}", path.display()))?;
    Ok(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
}

/// Process the input file line by line
async fn run_client(config: Config, file: &Path) -> anyhow::Result<()> {
    let mut reader = LineReader::open(file)
        .await
        .with_context(|| format!("Could not open input file {}", file.display()))?;
    tracing::info!("Input file {} opened", file.display());

    let connector = TcpConnector::new(config.network());
    tracing::info!("Sending lines to hash server {}", connector.peer());

    let mut client = HashClient::new(connector, TracingSink);
    let summary = client
        .run(&mut reader)
        .await
        .with_context(|| format!("Error reading input file {}", file.display()))?;

    tracing::info!("End of input file reached. {}", summary);

    Ok(())
}
