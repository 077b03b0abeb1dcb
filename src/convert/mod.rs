//! Textile → Markdown conversion through an external converter process.
//!
//! - [`Converter`] is the seam to the external tool; [`PandocConverter`] is the
//!   production implementation.
//! - [`convert_textile`] wraps a converter call in the pre/post rewrite rules.
//! - [`document`] holds the boundary protocol used to convert a whole batch
//!   in one call.

pub mod document;
pub mod filters;

use crate::config::ConverterConfig;
use crate::errors::MigrationError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

pub use document::{DOCUMENT_BOUNDARY, join_documents, split_documents};

/// Converts Textile text to Markdown.
///
/// Implementations receive text that already went through the
/// pre-conversion rules and return the raw converter output.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, textile: &str) -> Result<String, MigrationError>;
}

/// Runs an external program with the text on stdin and reads stdout.
///
/// A non-zero exit status is always a failure. Output on stderr is a failure
/// too unless `fail_on_diagnostics` is off.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    fail_on_diagnostics: bool,
}

impl PandocConverter {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            program: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            fail_on_diagnostics: config.fail_on_diagnostics,
        }
    }

    /// The command line as it will be spawned, for logging.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn io_error(&self, source: std::io::Error) -> MigrationError {
        MigrationError::ConverterIo {
            program: self.program.clone(),
            source,
        }
    }
}

#[async_trait]
impl Converter for PandocConverter {
    async fn convert(&self, textile: &str) -> Result<String, MigrationError> {
        tracing::debug!(command = %self.command_line(), bytes = textile.len(), "Spawning converter");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MigrationError::ConverterUnavailable {
                program: self.program.clone(),
                source,
            })?;

        // Feed stdin from its own task: a streaming converter may fill the
        // stdout pipe before it has read all of its input.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.io_error(std::io::Error::other("stdin was not captured")))?;
        let input = textile.as_bytes().to_vec();
        let writer = tokio::spawn(async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        });

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| self.io_error(e))?,
            Err(_) => {
                writer.abort();
                return Err(MigrationError::ConverterTimedOut {
                    program: self.program.clone(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() || (self.fail_on_diagnostics && !stderr.is_empty()) {
            return Err(MigrationError::ConverterFailed {
                program: self.program.clone(),
                status: output.status.code(),
                stderr,
            });
        }
        if !stderr.is_empty() {
            tracing::warn!(stderr = %stderr, "Converter reported diagnostics");
        }

        match writer.await {
            Ok(Ok(())) => {}
            // The converter exited successfully without reading everything.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(self.io_error(e)),
            Err(join_err) => return Err(self.io_error(std::io::Error::other(join_err))),
        }

        String::from_utf8(output.stdout)
            .map_err(|e| self.io_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }
}

/// Convert one Textile document to Markdown.
///
/// Blank input converts to an empty string without calling the converter.
pub async fn convert_textile(
    converter: &dyn Converter,
    textile: &str,
) -> Result<String, MigrationError> {
    if textile.trim().is_empty() {
        return Ok(String::new());
    }

    let prepared = filters::before_conversion(textile);
    let markdown = converter.convert(&prepared).await?;
    Ok(filters::after_conversion(&markdown))
}
