//! Full migration — `markup-migrator run`.

use anyhow::{Context, Result};
use markup_migrator::config::MigratorConfig;
use markup_migrator::convert::PandocConverter;
use markup_migrator::migrate::{MigrationReport, Migrator};
use markup_migrator::store::SqliteStore;
use markup_migrator::ui::MigrationUI;

pub async fn cmd_run(config: &MigratorConfig, dry_run: bool, json: bool) -> Result<()> {
    let Some(db_path) = &config.database.path else {
        anyhow::bail!(
            "No database configured. Pass --database, set MIGRATOR_DATABASE or add [database] path to migrator.toml."
        );
    };

    let plan = config.plan().context("Invalid migration plan")?;
    let store = SqliteStore::open(db_path)?;
    let converter = PandocConverter::new(&config.converter);
    let ui = if json {
        MigrationUI::hidden()
    } else {
        MigrationUI::new()
    };

    tracing::info!(
        database = %db_path.display(),
        converter = %converter.command_line(),
        targets = plan.targets.len(),
        "Migration configured"
    );

    let report = Migrator::new(&plan, &store, &store, &converter, &ui)
        .run(dry_run)
        .await
        .with_context(|| format!("Migration of {} failed", db_path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &MigrationReport) {
    println!();
    println!("Settings converted: {}", report.settings_converted);
    for target in &report.targets {
        if target.fallback_batches > 0 {
            println!(
                "  {:<28} {:>6} rows  ({} batches, {} converted one by one)",
                target.table, target.rows, target.batches, target.fallback_batches
            );
        } else {
            println!(
                "  {:<28} {:>6} rows  ({} batches)",
                target.table, target.rows, target.batches
            );
        }
    }
    println!("Custom values converted: {}", report.custom_values_converted);
    println!("Total rows converted: {}", report.rows_converted());
    if report.dry_run {
        println!("Dry run: no changes were kept.");
    }
}
