//! Configuration view and initialization — `markup-migrator config`.

use anyhow::{Context, Result};
use markup_migrator::config::{CONFIG_FILE_NAME, MigratorConfig};
use std::path::Path;

use super::super::{Cli, ConfigCommands};

pub fn cmd_config(
    cli: &Cli,
    work_dir: &Path,
    config: &MigratorConfig,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| work_dir.join(CONFIG_FILE_NAME));

    match command {
        None | Some(ConfigCommands::Show) => {
            if config_path.exists() {
                println!("# Config file: {}", config_path.display());
            } else {
                println!("# No {} found, showing defaults", config_path.display());
            }
            println!("# Effective values (with env/CLI overrides)");
            println!();
            print!("{}", config.to_toml()?);
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("{} already exists", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            let toml = MigratorConfig::default().to_toml()?;
            std::fs::write(&config_path, toml)
                .with_context(|| format!("Failed to write {}", config_path.display()))?;

            println!("Created {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [converter] command, args, timeout_secs");
            println!("  - [database] path");
            println!("  - [[targets]] table, attributes, scope");
            println!();
        }
    }

    Ok(())
}
