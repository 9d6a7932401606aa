use crate::engine::{RepairReport, ResolveEngine};
use crate::error::{Error, RepairError};
use crate::progress::ProgressReporter;
use rayon::prelude::*;
use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

#[derive(Debug)]
pub enum ProjectStatus {
    Repaired(RepairReport),
    Failed(RepairError),
}

impl ProjectStatus {
    /// 0 for success, 1 for either kind of failure.
    pub fn code(&self) -> i32 {
        match self {
            ProjectStatus::Repaired(_) => 0,
            ProjectStatus::Failed(_) => 1,
        }
    }
}

#[derive(Debug)]
pub struct ProjectOutcome {
    pub project: PathBuf,
    pub status: ProjectStatus,
}

#[derive(Debug)]
pub struct BatchSummary {
    /// One entry per input path, in input order.
    pub outcomes: Vec<ProjectOutcome>,
    pub duration: Duration,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.code() == 0).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn recovered_samples(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.status {
                ProjectStatus::Repaired(report) => Some(report.stats.recovered),
                ProjectStatus::Failed(_) => None,
            })
            .sum()
    }
}

/// Runs project repairs on a fixed-size pool. Each project is one unit of
/// work; a failure in one never affects the others.
pub struct BatchRunner {
    engine: Arc<ResolveEngine>,
    workers: usize,
}

impl BatchRunner {
    pub fn new(engine: Arc<ResolveEngine>, workers: usize) -> Self {
        Self { engine, workers }
    }

    pub fn run(
        &self,
        projects: &[PathBuf],
        reporter: &dyn ProgressReporter,
    ) -> Result<BatchSummary, Error> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("resurrect-{}", i))
            .build()?;

        info!(
            "Repairing {} projects on {} workers",
            projects.len(),
            self.workers
        );
        reporter.on_batch_start(projects.len());
        let start = Instant::now();
        let done = AtomicUsize::new(0);
        let total = projects.len();

        let outcomes: Vec<ProjectOutcome> = pool.install(|| {
            projects
                .par_iter()
                .map(|project| {
                    let status = run_project(&self.engine, project);
                    let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                    reporter.on_project_complete(project, status.code() == 0, finished, total);
                    ProjectOutcome {
                        project: project.clone(),
                        status,
                    }
                })
                .collect()
        });

        let summary = BatchSummary {
            outcomes,
            duration: start.elapsed(),
        };
        reporter.on_batch_complete(
            summary.succeeded(),
            summary.failed(),
            summary.duration.as_secs_f64(),
        );
        Ok(summary)
    }
}

/// Repair one project, turning every failure (panics included) into a status.
pub fn run_project(engine: &ResolveEngine, project: &Path) -> ProjectStatus {
    let result = panic::catch_unwind(AssertUnwindSafe(|| engine.repair(project)))
        .unwrap_or_else(|payload| {
            Err(RepairError::resolution(
                project,
                Error::Panicked(panic_message(payload.as_ref())),
            ))
        });

    match result {
        Ok(report) => ProjectStatus::Repaired(report),
        Err(err) => {
            log_failure(&err, engine.options().debug);
            ProjectStatus::Failed(err)
        }
    }
}

/// One line per failed project; the error chain only in debug mode.
pub fn log_failure(err: &RepairError, debug: bool) {
    error!("{}: {}", err.kind.tag(), err.path.display());
    if debug {
        error!("{:#?}", err);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Newline-delimited list of archive paths. Blank lines are skipped.
pub fn read_project_list(list_path: &Path) -> Result<Vec<PathBuf>, Error> {
    let content = fs::read_to_string(list_path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}
