pub mod config;
pub mod convert;
pub mod errors;
pub mod migrate;
pub mod store;
pub mod ui;

#[cfg(test)]
mod testing;

pub use errors::MigrationError;
pub use migrate::{MigrationReport, Migrator};
