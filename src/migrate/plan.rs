//! What the migrator converts.

use crate::errors::MigrationError;
use crate::store::sql::validate_identifier;
use serde::Serialize;

/// A table and the text attributes of it that hold Textile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionTarget {
    table: String,
    attributes: Vec<String>,
    scope: Option<String>,
}

impl ConversionTarget {
    /// Table and attribute names must be plain SQL identifiers. `scope` is an
    /// optional SQL condition taken verbatim from the operator's config.
    pub fn new(
        table: &str,
        attributes: &[String],
        scope: Option<String>,
    ) -> Result<Self, MigrationError> {
        validate_identifier(table)?;
        if attributes.is_empty() {
            return Err(MigrationError::InvalidIdentifier(format!(
                "{} (no attributes)",
                table
            )));
        }
        for attribute in attributes {
            validate_identifier(attribute)?;
        }
        Ok(Self {
            table: table.to_string(),
            attributes: attributes.to_vec(),
            scope: scope.filter(|s| !s.trim().is_empty()),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsPlan {
    pub welcome_text: String,
    pub registration_footer: String,
}

/// Everything one run converts, in the order it is converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    pub settings: SettingsPlan,
    pub targets: Vec<ConversionTarget>,
    pub model_batch_size: usize,
    pub custom_values: Option<ConversionTarget>,
    pub custom_value_batch_size: usize,
}
