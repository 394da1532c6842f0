//! TwinGraph CLI - Load and query a digital-twin graph cache
//!
//! Loads a graph snapshot into an in-process cache and answers queries
//! against it.
//!
//! # Usage
//!
//! ```bash
//! # Load a snapshot and print cache statistics
//! twingraph load -s exports/building.json
//!
//! # List every model descending from an interface
//! twingraph descendants "dtmi:com:acme:Space;1" -s exports/building.json
//!
//! # Show a twin with its relationships
//! twingraph twin hq-1 -s exports/building.json
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use twingraph_config::{ConfigOverrides, LogFormat};

mod commands;
mod progress;

/// TwinGraph - Digital-twin graph cache
#[derive(Parser, Debug)]
#[command(name = "twingraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Workspace directory holding `.twingraph/config.toml`
    #[arg(long, short = 'w', global = true, env = "TWINGRAPH_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Load every relationship up front instead of on demand
    #[arg(long, global = true)]
    eager: bool,
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            eager_relationships: self.eager.then_some(true),
            log_level: if self.quiet {
                Some("error".to_string())
            } else if self.verbose {
                Some("debug".to_string())
            } else {
                None
            },
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a snapshot and report cache statistics
    Load(commands::load::LoadArgs),

    /// List the models descending from a model
    Descendants(commands::descendants::DescendantsArgs),

    /// Show a twin and its relationships
    Twin(commands::twin::TwinArgs),

    /// View and manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Flags win; otherwise fall back to the configured level
    let settings = commands::logging_settings(&cli.global);
    let log_level = if cli.global.quiet {
        Level::ERROR
    } else if cli.global.verbose {
        Level::DEBUG
    } else {
        settings.level
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr);
    match settings.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => {
            tracing::subscriber::set_global_default(builder.with_ansi(true).finish())?
        }
    }

    match cli.command {
        Commands::Load(args) => commands::load::execute(args, cli.global).await,
        Commands::Descendants(args) => commands::descendants::execute(args, cli.global).await,
        Commands::Twin(args) => commands::twin::execute(args, cli.global).await,
        Commands::Config(cmd) => commands::config::execute(cmd, cli.global).await,
    }
}
