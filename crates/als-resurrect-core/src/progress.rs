use std::path::Path;

/// Trait for reporting batch progress.
///
/// The CLI implements it with indicatif; tests use [`SilentReporter`].
/// Methods are called from worker threads. All have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_batch_start(&self, _total_projects: usize) {}
    fn on_project_complete(&self, _project: &Path, _succeeded: bool, _done: usize, _total: usize) {}
    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
