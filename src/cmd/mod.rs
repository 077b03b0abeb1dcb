//! CLI command implementations.
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `run`      | `Run`            |
//! | `convert`  | `Convert`        |
//! | `targets`  | `Targets`        |
//! | `config`   | `Config`         |

pub mod config;
pub mod convert;
pub mod run;
pub mod targets;

use anyhow::Result;
use markup_migrator::config::MigratorConfig;
use std::path::Path;

use super::Cli;

pub use config::cmd_config;
pub use convert::cmd_convert;
pub use run::cmd_run;
pub use targets::cmd_targets;

/// Defaults, then the config file, then environment, then CLI flags.
pub fn load_config(cli: &Cli, work_dir: &Path) -> Result<MigratorConfig> {
    let mut config = MigratorConfig::load(cli.config.as_deref(), work_dir)?;
    config.apply_env();
    if let Some(database) = &cli.database {
        config.database.path = Some(database.clone());
    }
    Ok(config)
}
