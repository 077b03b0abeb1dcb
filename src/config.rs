//! Layered configuration for the migrator.
//!
//! Values come from built-in defaults, then `migrator.toml`, then the
//! environment (`MIGRATOR_CONVERTER`, `MIGRATOR_DATABASE`), and finally CLI
//! flags applied by the binary.
//!
//! # Configuration File Format
//!
//! ```toml
//! [converter]
//! command = "pandoc"
//! args = ["--wrap=preserve", "--atx-headers", "-f", "textile", "-t", "markdown_github"]
//! timeout_secs = 300
//! fail_on_diagnostics = true
//!
//! [database]
//! path = "db/production.sqlite3"
//!
//! [batches]
//! models = 50
//! custom_values = 200
//!
//! [settings]
//! welcome_text = "welcome_text"
//! registration_footer = "registration_footer"
//!
//! [[targets]]
//! table = "work_packages"
//! attributes = ["description"]
//!
//! [custom_values]
//! enabled = true
//! table = "custom_values"
//! column = "value"
//! scope = "custom_field_id IN (SELECT id FROM custom_fields WHERE field_format = 'text')"
//! ```

use crate::errors::MigrationError;
use crate::migrate::plan::{ConversionTarget, MigrationPlan, SettingsPlan};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "migrator.toml";

/// External converter invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConverterConfig {
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Seconds per converter call; values below 1 are raised to 1
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Treat any output on stderr as a failed conversion
    #[serde(default = "default_true")]
    pub fail_on_diagnostics: bool,
}

fn default_command() -> String {
    "pandoc".to_string()
}

// --wrap=preserve keeps line wrapping, --atx-headers emits `## Header`.
fn default_args() -> Vec<String> {
    ["--wrap=preserve", "--atx-headers", "-f", "textile", "-t", "markdown_github"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: default_args(),
            timeout_secs: default_timeout_secs(),
            fail_on_diagnostics: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database to migrate
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_model_batch")]
    pub models: usize,
    #[serde(default = "default_custom_value_batch")]
    pub custom_values: usize,
}

fn default_model_batch() -> usize {
    50
}

fn default_custom_value_batch() -> usize {
    200
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            models: default_model_batch(),
            custom_values: default_custom_value_batch(),
        }
    }
}

/// Names of the global settings to convert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsConfig {
    #[serde(default = "default_welcome_text")]
    pub welcome_text: String,
    /// YAML map of locale to footer text
    #[serde(default = "default_registration_footer")]
    pub registration_footer: String,
}

fn default_welcome_text() -> String {
    "welcome_text".to_string()
}

fn default_registration_footer() -> String {
    "registration_footer".to_string()
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            welcome_text: default_welcome_text(),
            registration_footer: default_registration_footer(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub table: String,
    pub attributes: Vec<String>,
    /// Extra SQL condition rows must satisfy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TargetConfig {
    fn new(table: &str, attributes: &[&str]) -> Self {
        Self {
            table: table.to_string(),
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
            scope: None,
        }
    }
}

fn default_targets() -> Vec<TargetConfig> {
    vec![
        TargetConfig::new("announcements", &["text"]),
        TargetConfig::new("attribute_help_texts", &["help_text"]),
        TargetConfig::new("comments", &["comments"]),
        TargetConfig::new("wiki_contents", &["text"]),
        TargetConfig::new("work_packages", &["description"]),
        TargetConfig::new("messages", &["content"]),
        TargetConfig::new("news", &["description"]),
        TargetConfig::new("boards", &["description"]),
        TargetConfig::new("projects", &["description"]),
        TargetConfig::new("journals", &["notes"]),
        TargetConfig::new("message_journals", &["content"]),
        TargetConfig::new("wiki_content_journals", &["text"]),
        TargetConfig::new("work_package_journals", &["description"]),
    ]
}

/// Long-text custom values, converted one row at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomValuesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_custom_values_table")]
    pub table: String,
    #[serde(default = "default_custom_values_column")]
    pub column: String,
    #[serde(default = "default_custom_values_scope")]
    pub scope: String,
}

fn default_custom_values_table() -> String {
    "custom_values".to_string()
}

fn default_custom_values_column() -> String {
    "value".to_string()
}

fn default_custom_values_scope() -> String {
    "custom_field_id IN (SELECT id FROM custom_fields WHERE field_format = 'text')".to_string()
}

impl Default for CustomValuesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            table: default_custom_values_table(),
            column: default_custom_values_column(),
            scope: default_custom_values_scope(),
        }
    }
}

/// Root of `migrator.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigratorConfig {
    #[serde(default)]
    pub converter: ConverterConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub batches: BatchConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default = "default_targets")]
    pub targets: Vec<TargetConfig>,
    #[serde(default)]
    pub custom_values: CustomValuesConfig,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            converter: ConverterConfig::default(),
            database: DatabaseConfig::default(),
            batches: BatchConfig::default(),
            settings: SettingsConfig::default(),
            targets: default_targets(),
            custom_values: CustomValuesConfig::default(),
        }
    }
}

impl MigratorConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse migrator configuration")
    }

    /// Load from an explicit file, or `migrator.toml` in `dir` if present,
    /// or fall back to defaults.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = dir.join(CONFIG_FILE_NAME);
                if !candidate.exists() {
                    return Ok(Self::default());
                }
                candidate
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Apply environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var("MIGRATOR_CONVERTER").ok(),
            std::env::var("MIGRATOR_DATABASE").ok(),
        );
    }

    fn apply_overrides(&mut self, converter: Option<String>, database: Option<String>) {
        if let Some(command) = converter.filter(|c| !c.trim().is_empty()) {
            self.converter.command = command;
        }
        if let Some(path) = database.filter(|p| !p.trim().is_empty()) {
            self.database.path = Some(PathBuf::from(path));
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize migrator configuration")
    }

    /// Build the validated migration plan.
    pub fn plan(&self) -> Result<MigrationPlan, MigrationError> {
        let targets = self
            .targets
            .iter()
            .map(|t| ConversionTarget::new(&t.table, &t.attributes, t.scope.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let custom_values = if self.custom_values.enabled {
            Some(ConversionTarget::new(
                &self.custom_values.table,
                std::slice::from_ref(&self.custom_values.column),
                Some(self.custom_values.scope.clone()),
            )?)
        } else {
            None
        };

        Ok(MigrationPlan {
            settings: SettingsPlan {
                welcome_text: self.settings.welcome_text.clone(),
                registration_footer: self.settings.registration_footer.clone(),
            },
            targets,
            model_batch_size: self.batches.models.max(1),
            custom_values,
            custom_value_batch_size: self.batches.custom_values.max(1),
        })
    }
}
