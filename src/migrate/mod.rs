//! The migration run: settings, model attributes and long-text custom values.
//!
//! Every pass goes through [`convert_textile`]. Model attributes are converted
//! a batch at a time: all values of a batch are joined into one document, the
//! converter runs once, and the output is split back on the document
//! boundary. When the split does not yield one piece per value (malformed
//! Textile such as an unclosed `<pre` can swallow a boundary) the batch is
//! converted value by value instead.
//!
//! The whole run happens inside one store transaction. Any fatal error rolls
//! it back.

pub mod extract;
pub mod plan;

use crate::convert::{Converter, convert_textile, join_documents, split_documents};
use crate::errors::MigrationError;
use crate::store::sql::{batch_update_statement, single_update_statement};
use crate::store::{ConvertedRow, Row, SettingsStore, Store};
use crate::ui::MigrationUI;
use extract::BatchCursor;
use plan::{ConversionTarget, MigrationPlan};
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of one target's model pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    pub table: String,
    pub rows: usize,
    pub batches: usize,
    pub fallback_batches: usize,
}

/// What a run converted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub settings_converted: usize,
    pub targets: Vec<TargetReport>,
    pub custom_values_converted: usize,
    pub dry_run: bool,
}

impl MigrationReport {
    pub fn rows_converted(&self) -> usize {
        self.targets.iter().map(|t| t.rows).sum()
    }

    pub fn fallback_batches(&self) -> usize {
        self.targets.iter().map(|t| t.fallback_batches).sum()
    }
}

/// A batch after conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedBatch {
    pub rows: Vec<ConvertedRow>,
    pub fell_back: bool,
}

/// Drives the conversion passes against injected collaborators.
pub struct Migrator<'a> {
    plan: &'a MigrationPlan,
    store: &'a dyn Store,
    settings: &'a dyn SettingsStore,
    converter: &'a dyn Converter,
    ui: &'a MigrationUI,
}

impl<'a> Migrator<'a> {
    pub fn new(
        plan: &'a MigrationPlan,
        store: &'a dyn Store,
        settings: &'a dyn SettingsStore,
        converter: &'a dyn Converter,
        ui: &'a MigrationUI,
    ) -> Self {
        Self {
            plan,
            store,
            settings,
            converter,
            ui,
        }
    }

    /// Run every pass inside one transaction.
    ///
    /// With `dry_run` the transaction is rolled back after all conversions
    /// and statements succeeded.
    pub async fn run(&self, dry_run: bool) -> Result<MigrationReport, MigrationError> {
        tracing::info!(
            dry_run,
            dialect = %self.store.dialect(),
            "Starting conversion of Textile fields to CommonMark+GFM"
        );
        self.store
            .begin()
            .await
            .map_err(|e| MigrationError::persistence("transaction", e))?;

        let mut report = MigrationReport {
            dry_run,
            ..Default::default()
        };

        if let Err(err) = self.run_passes(&mut report).await {
            tracing::error!(error = %err, "Migration failed, rolling back");
            if let Err(rollback_err) = self.store.rollback().await {
                tracing::error!(error = %rollback_err, "Rollback failed");
            }
            self.ui.failed(&err.to_string());
            return Err(err);
        }

        let finish = if dry_run {
            self.store.rollback().await
        } else {
            self.store.commit().await
        };
        finish.map_err(|e| MigrationError::persistence("transaction", e))?;

        self.ui.completed(dry_run);
        tracing::info!(
            settings = report.settings_converted,
            rows = report.rows_converted(),
            custom_values = report.custom_values_converted,
            fallbacks = report.fallback_batches(),
            "Conversion completed"
        );
        Ok(report)
    }

    async fn run_passes(&self, report: &mut MigrationReport) -> Result<(), MigrationError> {
        report.settings_converted = self.convert_settings().await?;
        report.targets = self.convert_models().await?;
        report.custom_values_converted = self.convert_custom_values().await?;
        Ok(())
    }

    /// Convert the welcome text and every locale of the registration footer.
    pub async fn convert_settings(&self) -> Result<usize, MigrationError> {
        self.ui.start_pass("Settings", "settings");
        let mut converted = 0;

        let name = &self.plan.settings.welcome_text;
        if let Some(text) = self.read_setting(name).await? {
            let markdown = convert_textile(self.converter, &text).await?;
            self.write_setting(name, &markdown).await?;
            converted += 1;
            self.ui.tick();
        }

        let name = &self.plan.settings.registration_footer;
        if let Some(raw) = self.read_setting(name).await?
            && !raw.trim().is_empty()
        {
            let footer: BTreeMap<String, Option<String>> =
                serde_yaml::from_str(&raw).map_err(|e| MigrationError::InvalidSetting {
                    name: name.clone(),
                    message: e.to_string(),
                })?;

            let mut rewritten = BTreeMap::new();
            for (locale, text) in footer {
                let markdown = match text {
                    Some(text) => Some(convert_textile(self.converter, &text).await?),
                    None => None,
                };
                rewritten.insert(locale, markdown);
                self.ui.tick();
            }

            let serialized =
                serde_yaml::to_string(&rewritten).map_err(|e| MigrationError::InvalidSetting {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            self.write_setting(name, &serialized).await?;
            converted += 1;
        }

        self.ui.finish_pass("settings", converted);
        tracing::info!(converted, "Settings converted");
        Ok(converted)
    }

    async fn read_setting(&self, name: &str) -> Result<Option<String>, MigrationError> {
        self.settings
            .get_setting(name)
            .await
            .map_err(|e| MigrationError::persistence(format!("setting {}", name), e))
    }

    async fn write_setting(&self, name: &str, value: &str) -> Result<(), MigrationError> {
        self.settings
            .set_setting(name, value)
            .await
            .map_err(|e| MigrationError::persistence(format!("setting {}", name), e))
    }

    pub async fn convert_models(&self) -> Result<Vec<TargetReport>, MigrationError> {
        let mut reports = Vec::with_capacity(self.plan.targets.len());
        for target in &self.plan.targets {
            reports.push(self.convert_target(target).await?);
        }
        Ok(reports)
    }

    /// Convert all populated rows of one target, one bulk update per batch.
    pub async fn convert_target(
        &self,
        target: &ConversionTarget,
    ) -> Result<TargetReport, MigrationError> {
        self.ui.start_pass("Models", target.table());
        let mut report = TargetReport {
            table: target.table().to_string(),
            ..Default::default()
        };

        let mut cursor = BatchCursor::new(self.store, target, self.plan.model_batch_size);
        while let Some(rows) = cursor.next_batch().await? {
            let batch = self.convert_batch(target, &rows).await?;
            if batch.fell_back {
                report.fallback_batches += 1;
                self.ui.fallback(target.table(), rows.len());
            }

            let Some(statement) = batch_update_statement(self.store.dialect(), target, &batch.rows)
            else {
                continue;
            };
            self.store
                .execute(&statement.sql)
                .await
                .map_err(|e| MigrationError::persistence(target.table(), e))?;

            report.rows += batch.rows.len();
            report.batches += 1;
            tracing::debug!(table = %statement.table, ids = ?statement.ids, "Batch persisted");
        }

        self.ui.finish_pass(target.table(), report.rows);
        tracing::info!(
            table = target.table(),
            rows = report.rows,
            batches = report.batches,
            fallback_batches = report.fallback_batches,
            "Target converted"
        );
        Ok(report)
    }

    /// Convert every attribute of every row with one converter call, falling
    /// back to one call per value when the output cannot be split back.
    pub async fn convert_batch(
        &self,
        target: &ConversionTarget,
        rows: &[Row],
    ) -> Result<ConvertedBatch, MigrationError> {
        let width = target.attributes().len();
        let originals: Vec<&str> = rows
            .iter()
            .flat_map(|row| {
                (0..width).map(move |i| row.values.get(i).and_then(|v| v.as_deref()).unwrap_or(""))
            })
            .collect();

        let markdown = convert_textile(self.converter, &join_documents(&originals)).await?;
        let pieces = split_documents(&markdown);

        let (values, fell_back) = match check_grouping(target.table(), pieces.len(), originals.len())
        {
            Ok(()) => (pieces, false),
            Err(mismatch) if mismatch.is_recoverable() => {
                tracing::warn!(
                    table = target.table(),
                    first_id = rows.first().map(|r| r.id),
                    error = %mismatch,
                    "Batch conversion lost document boundaries, converting values one by one"
                );
                let mut individual = Vec::with_capacity(originals.len());
                for original in &originals {
                    let converted = convert_textile(self.converter, original).await?;
                    individual.push(converted.trim().to_string());
                }
                (individual, true)
            }
            Err(err) => return Err(err),
        };

        let rows = rows
            .iter()
            .zip(values.chunks(width))
            .map(|(row, values)| {
                self.ui.tick();
                ConvertedRow {
                    id: row.id,
                    values: values.to_vec(),
                }
            })
            .collect();

        Ok(ConvertedBatch { rows, fell_back })
    }

    /// Convert long-text custom values one row at a time.
    pub async fn convert_custom_values(&self) -> Result<usize, MigrationError> {
        let Some(target) = &self.plan.custom_values else {
            return Ok(0);
        };
        let Some(column) = target.attributes().first() else {
            return Ok(0);
        };

        self.ui.start_pass("Custom values", target.table());
        let mut converted = 0;
        let mut cursor = BatchCursor::new(self.store, target, self.plan.custom_value_batch_size);
        while let Some(rows) = cursor.next_batch().await? {
            for row in rows {
                let original = row.values.first().cloned().flatten().unwrap_or_default();
                let markdown = convert_textile(self.converter, &original).await?;
                let sql = single_update_statement(
                    self.store.dialect(),
                    target.table(),
                    column,
                    row.id,
                    &markdown,
                );
                self.store
                    .execute(&sql)
                    .await
                    .map_err(|e| MigrationError::persistence(target.table(), e))?;
                converted += 1;
                self.ui.tick();
            }
        }

        self.ui.finish_pass(target.table(), converted);
        tracing::info!(table = target.table(), converted, "Custom values converted");
        Ok(converted)
    }
}

fn check_grouping(table: &str, actual: usize, expected: usize) -> Result<(), MigrationError> {
    if actual == expected {
        Ok(())
    } else {
        Err(MigrationError::BatchGroupingMismatch {
            table: table.to_string(),
            expected,
            actual,
        })
    }
}
