//! SQL text generation for reading batches and writing them back.
//!
//! Values are inlined as quoted literals so one statement can update a whole
//! batch. Identifiers are never quoted, so they are validated up front.

use super::{ConvertedRow, Dialect};
use crate::errors::MigrationError;
use crate::migrate::plan::ConversionTarget;

/// Accept only plain identifiers: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_identifier(name: &str) -> Result<(), MigrationError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(MigrationError::InvalidIdentifier(name.to_string()))
    }
}

/// Quote a string literal for `dialect`.
pub fn quote_literal(dialect: Dialect, value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    match dialect {
        Dialect::Postgres | Dialect::Sqlite => {
            for c in value.chars() {
                if c == '\'' {
                    quoted.push('\'');
                }
                quoted.push(c);
            }
        }
        // MySQL treats backslash as an escape character by default.
        Dialect::Mysql => {
            for c in value.chars() {
                match c {
                    '\\' => quoted.push_str("\\\\"),
                    '\'' => quoted.push_str("\\'"),
                    '\0' => quoted.push_str("\\0"),
                    '\x1a' => quoted.push_str("\\Z"),
                    _ => quoted.push(c),
                }
            }
        }
    }
    quoted.push('\'');
    quoted
}

/// Page query: rows after `after_id` with at least one populated attribute.
pub fn select_batch_statement(
    target: &ConversionTarget,
    after_id: Option<i64>,
    limit: usize,
) -> String {
    let columns = target.attributes().join(", ");
    let populated = target
        .attributes()
        .iter()
        .map(|a| format!("({a} IS NOT NULL AND {a} <> '')"))
        .collect::<Vec<_>>()
        .join(" OR ");

    let mut conditions = Vec::new();
    if let Some(id) = after_id {
        conditions.push(format!("id > {id}"));
    }
    if let Some(scope) = target.scope() {
        conditions.push(format!("({scope})"));
    }
    conditions.push(format!("({populated})"));

    format!(
        "SELECT id, {columns} FROM {table} WHERE {conditions} ORDER BY id LIMIT {limit}",
        table = target.table(),
        conditions = conditions.join(" AND "),
    )
}

/// A bulk update for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatement {
    pub table: String,
    pub ids: Vec<i64>,
    pub sql: String,
}

/// Build the single statement that writes every row of a batch back.
///
/// Returns `None` for an empty batch. Every row must carry one value per
/// target attribute.
pub fn batch_update_statement(
    dialect: Dialect,
    target: &ConversionTarget,
    rows: &[ConvertedRow],
) -> Option<UpdateStatement> {
    if rows.is_empty() {
        return None;
    }

    let sql = match dialect {
        Dialect::Postgres => postgres_update(target, rows),
        Dialect::Mysql => mysql_update(target, rows),
        Dialect::Sqlite => sqlite_update(target, rows),
    };

    Some(UpdateStatement {
        table: target.table().to_string(),
        ids: rows.iter().map(|r| r.id).collect(),
        sql,
    })
}

fn values_tuples(dialect: Dialect, rows: &[ConvertedRow]) -> String {
    rows.iter()
        .map(|row| {
            let values = row
                .values
                .iter()
                .map(|v| quote_literal(dialect, v))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({}, {})", row.id, values)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn postgres_update(target: &ConversionTarget, rows: &[ConvertedRow]) -> String {
    let table = target.table();
    let sets = target
        .attributes()
        .iter()
        .map(|a| format!("{a} = new_values.{a}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "UPDATE {table} SET {sets} FROM (VALUES {values}) AS new_values (id, {columns}) WHERE {table}.id = new_values.id",
        values = values_tuples(Dialect::Postgres, rows),
        columns = target.attributes().join(", "),
    )
}

fn mysql_update(target: &ConversionTarget, rows: &[ConvertedRow]) -> String {
    let table = target.table();
    let sets = target
        .attributes()
        .iter()
        .map(|a| format!("{table}.{a} = new_values.{a}"))
        .collect::<Vec<_>>()
        .join(", ");
    let union = rows
        .iter()
        .map(|row| {
            let values = target
                .attributes()
                .iter()
                .zip(&row.values)
                .map(|(a, v)| format!("{} AS {a}", quote_literal(Dialect::Mysql, v)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("SELECT {} AS id, {}", row.id, values)
        })
        .collect::<Vec<_>>()
        .join(" UNION ");

    format!(
        "UPDATE {table}, ({union}) AS new_values SET {sets} WHERE {table}.id = new_values.id"
    )
}

fn sqlite_update(target: &ConversionTarget, rows: &[ConvertedRow]) -> String {
    let table = target.table();
    let sets = target
        .attributes()
        .iter()
        .map(|a| format!("{a} = new_values.{a}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "WITH new_values (id, {columns}) AS (VALUES {values}) UPDATE {table} SET {sets} FROM new_values WHERE {table}.id = new_values.id",
        columns = target.attributes().join(", "),
        values = values_tuples(Dialect::Sqlite, rows),
    )
}

/// Update of a single column of a single row.
pub fn single_update_statement(
    dialect: Dialect,
    table: &str,
    column: &str,
    id: i64,
    value: &str,
) -> String {
    format!(
        "UPDATE {table} SET {column} = {} WHERE id = {id}",
        quote_literal(dialect, value)
    )
}
