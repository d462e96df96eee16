//! TerraLayer CLI - Command-line interface
//!
//! Loads GML features and streams WMS imagery into an in-memory scene,
//! and manages the configuration file.

mod commands;
mod error;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use terralayer::config::ConfigFile;
use terralayer::logging::{init_logging, LoggingGuard};
use tracing::warn;

use commands::config::ConfigCommands;
use commands::crs::CrsCommands;
use commands::gml::GmlArgs;
use commands::wms::WmsArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "terralayer")]
#[command(about = "Import WMS imagery and GML features into a local 3D scene")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load a GML document and summarize the resulting layer
    Gml(GmlArgs),

    /// Import a WMS layer and drive it with camera poses
    Wms(WmsArgs),

    /// Coordinate reference systems
    Crs {
        #[command(subcommand)]
        command: CrsCommands,
    },

    /// View or edit the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    // Config edits must work even when the current file is broken.
    if let Commands::Config { command } = cli.command {
        return commands::config::run(command);
    }

    let (config, load_error) = match ConfigFile::load() {
        Ok(config) => (config, None),
        Err(e) => (ConfigFile::default(), Some(e)),
    };
    let _guard: LoggingGuard = init_logging(&config.logging, cli.verbose)?;
    if let Some(e) = load_error {
        warn!(error = %e, "Ignoring unreadable config file, using defaults");
    }

    match cli.command {
        Commands::Gml(args) => commands::gml::run(args, &config).await,
        Commands::Wms(args) => commands::wms::run(args, &config).await,
        Commands::Crs { command } => commands::crs::run(command, &config),
        Commands::Config { .. } => Ok(()),
    }
}
