//! Config command - View and initialize configuration
//!
//! - Show the effective configuration and the files it was read from
//! - Create a default config file (local or global)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use twingraph_config::{ConfigLoader, TwinGraphConfig};

use super::{load_config, print_info, resolve_workspace};
use crate::GlobalOptions;

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show(ShowArgs),

    /// Create a config file with default values
    Init(InitArgs),
}

/// Arguments for the show command
#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the init command
#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Create ~/.twingraph/config.toml instead of the workspace config
    #[arg(long)]
    global: bool,
}

/// Effective configuration with the files that contributed to it
#[derive(Debug, Serialize)]
struct ShowOutput {
    global_path: Option<PathBuf>,
    global_exists: bool,
    local_path: PathBuf,
    local_exists: bool,
    config: TwinGraphConfig,
}

/// Execute the config command
pub async fn execute(cmd: ConfigCommand, global: GlobalOptions) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => execute_show(args, global),
        ConfigCommand::Init(args) => execute_init(args, global),
    }
}

fn execute_show(args: ShowArgs, global: GlobalOptions) -> Result<()> {
    let (workspace, config) = load_config(&global)?;
    let loader = ConfigLoader::new();

    let global_path = loader.global_config_path();
    let local_path = loader.local_config_path(&workspace);
    let output = ShowOutput {
        global_exists: global_path.as_ref().is_some_and(|p| p.exists()),
        global_path,
        local_exists: local_path.exists(),
        local_path,
        config,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match (&output.global_path, output.global_exists) {
        (Some(path), true) => print_info(&format!("# global: {}", path.display()), global.quiet),
        _ => print_info("# global: (none)", global.quiet),
    }
    if output.local_exists {
        print_info(
            &format!("# local: {}", output.local_path.display()),
            global.quiet,
        );
    } else {
        print_info("# local: (none)", global.quiet);
    }

    let rendered = render_settings(&output.config).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}

fn execute_init(args: InitArgs, global: GlobalOptions) -> Result<()> {
    let loader = ConfigLoader::new();
    let path = if args.global {
        loader.init_global().context("Failed to create global config")?
    } else {
        let workspace = resolve_workspace(&global)?;
        loader
            .init_local(&workspace)
            .context("Failed to create workspace config")?
    };

    println!("{}", path.display());
    Ok(())
}

/// Render the configuration as `section.key = value` lines.
fn render_settings(config: &TwinGraphConfig) -> Result<String> {
    let value = serde_json::to_value(config)?;
    let mut lines = Vec::new();
    if let serde_json::Value::Object(sections) = value {
        for (section, fields) in sections {
            if let serde_json::Value::Object(fields) = fields {
                for (key, value) in fields {
                    lines.push(format!("{}.{} = {}", section, key, value));
                }
            }
        }
    }
    Ok(lines.join("\n"))
}
