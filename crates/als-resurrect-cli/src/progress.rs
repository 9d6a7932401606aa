use als_resurrect_core::ProgressReporter;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Batch progress bar: one tick per finished project.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "  {spinner:.cyan} Repairing [{bar:30.cyan/dim}] {pos}/{len} projects ({eta} remaining) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("━╸─")
    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
}

impl ProgressReporter for CliReporter {
    fn on_batch_start(&self, total: usize) {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(bar_style());
        pb.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn on_project_complete(&self, project: &Path, succeeded: bool, done: usize, _total: usize) {
        self.with_bar(|pb| {
            pb.set_position(done as u64);
            let name = project
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if succeeded {
                pb.set_message(name);
            } else {
                pb.set_message(format!("{} (failed)", name));
            }
        });
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, duration_secs: f64) {
        self.finish_bar();
        let mark = if failed == 0 {
            "\x1b[32m✓\x1b[0m"
        } else {
            "\x1b[31m✗\x1b[0m"
        };
        eprintln!(
            "  {} Batch complete: {} repaired, {} failed in {:.2}s",
            mark, succeeded, failed, duration_secs
        );
    }
}
