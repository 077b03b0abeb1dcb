pub mod icons;
pub mod progress;

pub use progress::MigrationUI;
