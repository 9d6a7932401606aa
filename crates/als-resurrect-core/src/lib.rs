pub mod archive;
pub mod batch;
pub mod classify;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod materialize;
pub mod path_ids;
pub mod progress;
pub mod reference;
pub mod search;

pub use batch::{BatchRunner, BatchSummary, ProjectOutcome, ProjectStatus};
pub use config::AppConfig;
pub use engine::{EngineOptions, PassStats, RepairReport, ResolveEngine};
pub use error::{Error, FailureKind, RepairError};
pub use progress::{ProgressReporter, SilentReporter};
