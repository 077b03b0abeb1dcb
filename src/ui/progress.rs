use crate::ui::icons::{CHECK, CROSS, DRY_RUN, WARN};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Terminal progress for a migration run, rendered via one `indicatif`
/// spinner that is reused for every pass.
///
/// The spinner counts converted rows (or setting values) of the current
/// pass. Finished passes are printed as permanent lines above it.
pub struct MigrationUI {
    bar: ProgressBar,
}

impl MigrationUI {
    pub fn new() -> Self {
        let style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg} {pos}")
            .expect("progress bar template is a valid static string");
        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        Self { bar }
    }

    /// A UI that draws nothing, for tests and machine-readable output.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    fn print_line(&self, msg: impl AsRef<str>) {
        if self.bar.is_hidden() {
            return;
        }
        self.bar.println(msg.as_ref());
    }

    /// Reset the counter and label it with the pass about to run.
    pub fn start_pass(&self, pass: &str, label: &str) {
        self.bar.reset();
        self.bar.set_prefix(pass.to_string());
        self.bar.set_message(style(label).yellow().to_string());
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    /// One more row or value converted.
    pub fn tick(&self) {
        self.bar.inc(1);
    }

    pub fn finish_pass(&self, label: &str, converted: usize) {
        self.bar.disable_steady_tick();
        self.print_line(format!(
            "{}{} {}",
            CHECK,
            label,
            style(format!("({} converted)", converted)).dim()
        ));
    }

    /// Surface a batch that had to be converted value by value.
    pub fn fallback(&self, table: &str, rows: usize) {
        self.print_line(format!(
            "{}{}",
            WARN,
            style(format!(
                "{}: batch of {} rows lost its document boundaries, converted one by one",
                table, rows
            ))
            .yellow()
        ));
    }

    pub fn completed(&self, dry_run: bool) {
        self.bar.finish_and_clear();
        if dry_run {
            self.print_line(format!(
                "{}{}",
                DRY_RUN,
                style("Dry run: all changes rolled back").cyan().bold()
            ));
        } else {
            self.print_line(format!("{}{}", CHECK, style("-- Completed --").green().bold()));
        }
    }

    pub fn failed(&self, error: &str) {
        self.bar.abandon();
        self.print_line(format!("{}{}", CROSS, style(error).red()));
    }
}

impl Default for MigrationUI {
    fn default() -> Self {
        Self::new()
    }
}
