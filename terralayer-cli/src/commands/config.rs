//! Configuration CLI commands.
//!
//! `config get|set|unset|list|path|init` read and edit
//! `<config dir>/terralayer/config.ini`.

use std::path::Path;

use clap::Subcommand;
use console::style;
use terralayer::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print one setting
    Get {
        /// Key as section.key (e.g. wms.mode)
        key: String,
    },

    /// Change one setting
    Set {
        /// Key as section.key (e.g. wms.mode)
        key: String,

        value: String,
    },

    /// Reset one setting to its default
    Unset { key: String },

    /// List every setting
    List,

    /// Print the configuration file path
    Path,

    /// Write a file with every default, unless one exists
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand against the default file location.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    run_at(command, &config_file_path())
}

fn run_at(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => {
            let key = parse_key(&key)?;
            let value = key.get(&ConfigFile::load_from(path)?);
            println!("{}", if value.is_empty() { "(not set)" } else { value.as_str() });
        }
        ConfigCommands::Set { key, value } => {
            let key = parse_key(&key)?;
            let mut config = ConfigFile::load_from(path)?;
            key.set(&mut config, &value)?;
            config.save_to(path)?;
            println!("Set {} = {}", key, key.get(&config));
        }
        ConfigCommands::Unset { key } => {
            let key = parse_key(&key)?;
            let mut config = ConfigFile::load_from(path)?;
            let default = key.get(&ConfigFile::default());
            key.set(&mut config, &default)?;
            config.save_to(path)?;
            println!("Reset {}", key);
        }
        ConfigCommands::List => list(&ConfigFile::load_from(path)?, path),
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::Config(format!(
                    "{} already exists; use --force to overwrite",
                    path.display()
                )));
            }
            ConfigFile::default().save_to(path)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'terralayer config list' to see available keys.",
            key
        ))
    })
}

fn list(config: &ConfigFile, path: &Path) {
    println!("{}", style("Configuration Settings").bold().cyan());
    println!("{}", style(path.display()).dim());

    let mut current_section = "";
    for key in ConfigKey::all() {
        if key.section() != current_section {
            current_section = key.section();
            println!();
            println!("{}", style(format!("[{}]", current_section)).bold());
        }
        let value = key.get(config);
        if value.is_empty() {
            println!("  {} = {}", key.key_name(), style("(not set)").dim());
        } else {
            println!("  {} = {}", key.key_name(), value);
        }
    }

    if !config.crs.is_empty() {
        println!();
        println!("{}", style("[crs]").bold());
        for (code, proj4) in &config.crs {
            println!("  {} = {}", code, proj4);
        }
    }
}
