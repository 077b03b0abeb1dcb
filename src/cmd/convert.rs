//! Single-document conversion — `markup-migrator convert [FILE]`.

use anyhow::{Context, Result};
use markup_migrator::config::MigratorConfig;
use markup_migrator::convert::{PandocConverter, convert_textile};
use std::io::Read;
use std::path::Path;

pub async fn cmd_convert(config: &MigratorConfig, file: Option<&Path>) -> Result<()> {
    let textile = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let converter = PandocConverter::new(&config.converter);
    let markdown = convert_textile(&converter, &textile).await?;
    print!("{}", markdown);
    if !markdown.is_empty() && !markdown.ends_with('\n') {
        println!();
    }
    Ok(())
}
