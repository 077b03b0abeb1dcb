//! Typed error hierarchy for the markup migrator.
//!
//! Converter failures, persistence failures and configuration problems are
//! fatal and abort the run (rolling back the enclosing transaction).
//! `BatchGroupingMismatch` is the one recoverable variant: the orchestrator
//! logs it and converts the batch value by value instead.

use thiserror::Error;

/// Errors raised while converting and persisting legacy markup.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to start converter '{program}': {source}")]
    ConverterUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Converter '{program}' failed ({}): {stderr}", describe_status(.status))]
    ConverterFailed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Converter '{program}' timed out after {timeout_secs} seconds")]
    ConverterTimedOut { program: String, timeout_secs: u64 },

    #[error("I/O error while talking to converter '{program}': {source}")]
    ConverterIo {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Batch of {table} split into {actual} pieces, expected {expected}")]
    BatchGroupingMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("Storage failure on {table}: {source}")]
    PersistenceFailure {
        table: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Setting '{name}' could not be parsed: {message}")]
    InvalidSetting { name: String, message: String },

    #[error("'{0}' is not a valid SQL identifier")]
    InvalidIdentifier(String),
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit {}", code),
        None => "killed by signal".to_string(),
    }
}

impl MigrationError {
    /// Wrap a store error with the table (or setting) it concerns.
    pub fn persistence(table: impl Into<String>, source: anyhow::Error) -> Self {
        Self::PersistenceFailure {
            table: table.into(),
            source,
        }
    }

    /// Whether the orchestrator may recover from this error locally.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::BatchGroupingMismatch { .. })
    }
}
