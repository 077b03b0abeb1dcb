//! Storage collaborators.
//!
//! The migrator only needs to page through rows of a target, run one raw
//! statement per batch, wrap the run in a transaction, and read/write a few
//! named settings. [`SqliteStore`] implements both traits on top of rusqlite;
//! other backends plug in by implementing [`Store`] and [`SettingsStore`].

pub mod sql;
pub mod sqlite;

use crate::migrate::plan::ConversionTarget;
use anyhow::Result;
use async_trait::async_trait;

pub use sqlite::SqliteStore;

/// SQL dialect spoken by the backing store. Selects the shape of the bulk
/// update statement and string quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Mysql,
    Sqlite,
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::Mysql => write!(f, "mysql"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// A row as read from storage: its id and one value per target attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: i64,
    pub values: Vec<Option<String>>,
}

/// A row after conversion, ready to be written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedRow {
    pub id: i64,
    pub values: Vec<String>,
}

/// Bulk access to the records being migrated.
#[async_trait]
pub trait Store: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Rows of `target` with at least one populated attribute and an id
    /// greater than `after_id`, ordered by id, at most `limit` of them.
    async fn fetch_rows(
        &self,
        target: &ConversionTarget,
        after_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Row>>;

    /// Execute one raw statement, returning the number of affected rows.
    async fn execute(&self, statement: &str) -> Result<usize>;

    async fn begin(&self) -> Result<()>;
    async fn commit(&self) -> Result<()>;
    async fn rollback(&self) -> Result<()>;
}

/// Named global settings, stored as raw text.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, name: &str) -> Result<Option<String>>;
    async fn set_setting(&self, name: &str, value: &str) -> Result<()>;
}
