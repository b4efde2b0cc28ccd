//! docbridge - HTTP save and search over a document database
//!
//! Single binary that provides:
//! - Keyed upserts with managed `created_at` / `updated_at`
//! - Filtered, sorted and paged search
//! - Health and Prometheus metrics endpoints

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use docbridge_common::config::{Config, LogFormat};

mod config;
mod server;

use config::Overrides;
use server::DocbridgeServer;

#[derive(Parser)]
#[command(name = "docbridge")]
#[command(author, version, about = "docbridge - HTTP facade over a document database", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Print the effective configuration and exit
    Config,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = config::load(&cli.overrides).await?;
            init_tracing(&config)?;

            info!("Starting docbridge server...");
            let server = DocbridgeServer::new(&config).await?;

            let shutdown = async {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutdown signal received");
            };
            server.run(shutdown).await?;
        }

        Commands::Config => {
            let config = config::load(&cli.overrides).await?;
            print!("{}", config::render(&config)?);
        }

        Commands::Version => {
            println!("docbridge version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(config: &Config) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.logging.level)?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }

    if config.server.debug {
        info!("Debug mode enabled");
    }
    Ok(())
}
