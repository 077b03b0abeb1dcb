use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "markup-migrator")]
#[command(version, about = "Convert stored Textile markup to CommonMark + GFM")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to migrator.toml. Defaults to ./migrator.toml when present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database to migrate. Overrides the config file and MIGRATOR_DATABASE
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert every configured setting, target and custom value
    Run {
        /// Convert and write everything, then roll the transaction back
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON instead of progress output
        #[arg(long)]
        json: bool,
    },
    /// Convert a single Textile document (file or stdin) to stdout
    Convert {
        /// Input file. Reads stdin when omitted
        file: Option<PathBuf>,
    },
    /// List the configured conversion targets
    Targets,
    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a default migrator.toml
    Init,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "markup_migrator=debug"
    } else {
        "markup_migrator=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let work_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config = cmd::load_config(&cli, &work_dir)?;

    match &cli.command {
        Commands::Run { dry_run, json } => cmd::cmd_run(&config, *dry_run, *json).await?,
        Commands::Convert { file } => cmd::cmd_convert(&config, file.as_deref()).await?,
        Commands::Targets => cmd::cmd_targets(&config)?,
        Commands::Config { command } => cmd::cmd_config(&cli, &work_dir, &config, command.clone())?,
    }

    Ok(())
}
