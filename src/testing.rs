//! In-memory collaborators shared by unit tests.

use crate::convert::{Converter, DOCUMENT_BOUNDARY};
use crate::errors::MigrationError;
use crate::migrate::plan::ConversionTarget;
use crate::store::{Dialect, Row, SettingsStore, Store};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Returns its input unchanged and records every call.
#[derive(Default)]
pub struct IdentityConverter {
    inputs: Mutex<Vec<String>>,
}

impl IdentityConverter {
    pub fn calls(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Converter for IdentityConverter {
    async fn convert(&self, textile: &str) -> Result<String, MigrationError> {
        self.inputs.lock().unwrap().push(textile.to_string());
        Ok(textile.to_string())
    }
}

/// Identity, except that joined documents lose their boundaries.
#[derive(Default)]
pub struct BoundaryDroppingConverter {
    calls: AtomicUsize,
}

impl BoundaryDroppingConverter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Converter for BoundaryDroppingConverter {
    async fn convert(&self, textile: &str) -> Result<String, MigrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(textile.replace(DOCUMENT_BOUNDARY, ""))
    }
}

/// Fails every call as a crashing converter would.
pub struct FailingConverter;

#[async_trait]
impl Converter for FailingConverter {
    async fn convert(&self, _textile: &str) -> Result<String, MigrationError> {
        Err(MigrationError::ConverterFailed {
            program: "pandoc".to_string(),
            status: Some(1),
            stderr: "pandoc: parse error".to_string(),
        })
    }
}

/// Store that serves rows from memory and records statements instead of
/// executing them.
pub struct RecordingStore {
    dialect: Dialect,
    tables: Mutex<BTreeMap<String, BTreeMap<i64, Vec<Option<String>>>>>,
    settings: Mutex<BTreeMap<String, String>>,
    statements: Mutex<Vec<String>>,
    transaction_log: Mutex<Vec<&'static str>>,
    fail_execute: AtomicBool,
}

impl Default for RecordingStore {
    fn default() -> Self {
        Self::new(Dialect::Postgres)
    }
}

impl RecordingStore {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            tables: Mutex::new(BTreeMap::new()),
            settings: Mutex::new(BTreeMap::new()),
            statements: Mutex::new(Vec::new()),
            transaction_log: Mutex::new(Vec::new()),
            fail_execute: AtomicBool::new(false),
        }
    }

    pub fn insert_row(&self, table: &str, id: i64, values: Vec<Option<String>>) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .insert(id, values);
    }

    pub fn insert_setting(&self, name: &str, value: &str) {
        self.settings
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    pub fn setting(&self, name: &str) -> Option<String> {
        self.settings.lock().unwrap().get(name).cloned()
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn transaction_log(&self) -> Vec<&'static str> {
        self.transaction_log.lock().unwrap().clone()
    }

    pub fn fail_statements(&self) {
        self.fail_execute.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for RecordingStore {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn fetch_rows(
        &self,
        target: &ConversionTarget,
        after_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Row>> {
        let tables = self.tables.lock().unwrap();
        let Some(rows) = tables.get(target.table()) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .iter()
            .filter(|(id, _)| after_id.is_none_or(|after| **id > after))
            .filter(|(_, values)| values.iter().flatten().any(|v| !v.is_empty()))
            .take(limit)
            .map(|(id, values)| Row {
                id: *id,
                values: values.clone(),
            })
            .collect())
    }

    async fn execute(&self, statement: &str) -> Result<usize> {
        if self.fail_execute.load(Ordering::SeqCst) {
            anyhow::bail!("statement rejected");
        }
        self.statements.lock().unwrap().push(statement.to_string());
        Ok(1)
    }

    async fn begin(&self) -> Result<()> {
        self.transaction_log.lock().unwrap().push("begin");
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.transaction_log.lock().unwrap().push("commit");
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.transaction_log.lock().unwrap().push("rollback");
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for RecordingStore {
    async fn get_setting(&self, name: &str) -> Result<Option<String>> {
        Ok(self.setting(name))
    }

    async fn set_setting(&self, name: &str, value: &str) -> Result<()> {
        self.insert_setting(name, value);
        Ok(())
    }
}
