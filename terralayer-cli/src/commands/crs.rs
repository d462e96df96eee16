//! `crs` commands: list registered systems and transform points.

use clap::Subcommand;
use serde_json::json;
use terralayer::config::ConfigFile;

use super::common::{self, heading};
use crate::error::CliError;

/// CRS subcommands.
#[derive(Debug, Subcommand)]
pub enum CrsCommands {
    /// List registered coordinate reference systems
    List,

    /// Transform a point between two registered systems
    Transform {
        /// Source CRS, e.g. EPSG:4326 or urn:ogc:def:crs:EPSG::4326
        from: String,

        /// Target CRS
        to: String,

        /// Easting or longitude
        #[arg(allow_hyphen_values = true)]
        x: f64,

        /// Northing or latitude
        #[arg(allow_hyphen_values = true)]
        y: f64,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Run a crs subcommand.
pub fn run(command: CrsCommands, config: &ConfigFile) -> Result<(), CliError> {
    let registry = common::registry(config)?;
    match command {
        CrsCommands::List => {
            heading("Registered CRS");
            let mut ids = registry.ids();
            ids.sort_by_key(|id| {
                id.trim_start_matches("EPSG:")
                    .parse::<u32>()
                    .unwrap_or(u32::MAX)
            });
            for id in ids {
                if let Some(definition) = registry.get(&id) {
                    println!("  {:<12} {}", definition.id, definition.name);
                }
            }
            Ok(())
        }
        CrsCommands::Transform {
            from,
            to,
            x,
            y,
            json,
        } => {
            let transform = registry.transform(&from, &to)?;
            let (tx, ty) = transform.apply(x, y);
            if json {
                return common::print_json(&json!({
                    "from": transform.source().id,
                    "to": transform.target().id,
                    "x": tx,
                    "y": ty,
                }));
            }
            println!("{:.6} {:.6}", tx, ty);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_unknown_crs() {
        let err = run(
            CrsCommands::Transform {
                from: "EPSG:4326".into(),
                to: "EPSG:999999".into(),
                x: 2.0,
                y: 41.0,
                json: false,
            },
            &ConfigFile::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Crs(_)));
    }

    #[test]
    fn test_list_runs() {
        run(CrsCommands::List, &ConfigFile::default()).unwrap();
    }
}
