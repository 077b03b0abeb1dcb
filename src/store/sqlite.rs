use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};

use super::sql::select_batch_statement;
use super::{Dialect, Row, SettingsStore, Store};
use crate::migrate::plan::ConversionTarget;

/// SQLite-backed store.
///
/// The connection sits behind `Arc<Mutex>` and every call runs on tokio's
/// blocking pool via `spawn_blocking`. Transactions are plain
/// `BEGIN`/`COMMIT` on that single connection.
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open an existing database file. The file must already exist.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Database {} does not exist", path.display());
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database {}", path.display()))?;
        Ok(Self::from_connection(conn))
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run a closure with the connection on a blocking thread.
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn fetch_rows(
        &self,
        target: &ConversionTarget,
        after_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Row>> {
        let sql = select_batch_statement(target, after_id, limit);
        let width = target.attributes().len();
        let table = target.table().to_string();

        self.call(move |conn| {
            let mut stmt = conn
                .prepare(&sql)
                .with_context(|| format!("Failed to prepare batch query for {}", table))?;
            let rows = stmt
                .query_map([], |row| {
                    let id: i64 = row.get(0)?;
                    let values = (1..=width)
                        .map(|i| row.get::<_, Option<String>>(i))
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    Ok(Row { id, values })
                })
                .with_context(|| format!("Failed to query {}", table))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .with_context(|| format!("Failed to read rows of {}", table))?;
            Ok(rows)
        })
        .await
    }

    async fn execute(&self, statement: &str) -> Result<usize> {
        let sql = statement.to_string();
        self.call(move |conn| conn.execute(&sql, []).context("Failed to execute statement"))
            .await
    }

    async fn begin(&self) -> Result<()> {
        self.call(|conn| {
            conn.execute_batch("BEGIN IMMEDIATE")
                .context("Failed to begin transaction")
        })
        .await
    }

    async fn commit(&self) -> Result<()> {
        self.call(|conn| conn.execute_batch("COMMIT").context("Failed to commit transaction"))
            .await
    }

    async fn rollback(&self) -> Result<()> {
        self.call(|conn| {
            conn.execute_batch("ROLLBACK")
                .context("Failed to roll back transaction")
        })
        .await
    }
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn get_setting(&self, name: &str) -> Result<Option<String>> {
        let name = name.to_string();
        self.call(move |conn| {
            conn.query_row(
                "SELECT value FROM settings WHERE name = ?1",
                params![name],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .context("Failed to read setting")
            .map(Option::flatten)
        })
        .await
    }

    async fn set_setting(&self, name: &str, value: &str) -> Result<()> {
        let name = name.to_string();
        let value = value.to_string();
        self.call(move |conn| {
            let updated = conn
                .execute(
                    "UPDATE settings SET value = ?2 WHERE name = ?1",
                    params![name, value],
                )
                .context("Failed to update setting")?;
            if updated == 0 {
                conn.execute(
                    "INSERT INTO settings (name, value) VALUES (?1, ?2)",
                    params![name, value],
                )
                .context("Failed to insert setting")?;
            }
            Ok(())
        })
        .await
    }
}
