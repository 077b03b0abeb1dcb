//! Target listing — `markup-migrator targets`.

use anyhow::Result;
use markup_migrator::config::MigratorConfig;

pub fn cmd_targets(config: &MigratorConfig) -> Result<()> {
    let plan = config.plan()?;

    println!();
    println!("Conversion targets (batches of {})", plan.model_batch_size);
    println!("==================");
    for target in &plan.targets {
        match target.scope() {
            Some(scope) => println!(
                "  {:<28} {}  where {}",
                target.table(),
                target.attributes().join(", "),
                scope
            ),
            None => println!("  {:<28} {}", target.table(), target.attributes().join(", ")),
        }
    }
    println!();

    match &plan.custom_values {
        Some(custom) => {
            println!(
                "Custom values (one row at a time, pages of {}):",
                plan.custom_value_batch_size
            );
            println!(
                "  {:<28} {}  where {}",
                custom.table(),
                custom.attributes().join(", "),
                custom.scope().unwrap_or("-")
            );
        }
        None => println!("Custom values: disabled"),
    }
    println!();
    println!(
        "Settings: {}, {}",
        plan.settings.welcome_text, plan.settings.registration_footer
    );
    println!();
    Ok(())
}
