use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Malformed sample reference: {0}")]
    MalformedReference(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Worker pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("Repair panicked: {0}")]
    Panicked(String),
}

/// Which half of a repair run failed. Decode covers reading and parsing the
/// archive, Resolution covers everything after the document was parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Decode,
    Resolution,
}

impl FailureKind {
    /// Log tag used for the per-project failure line.
    pub fn tag(&self) -> &'static str {
        match self {
            FailureKind::Decode => "ERROR_DECOMPRESSING",
            FailureKind::Resolution => "ERROR_RESURRECTING",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Decode => write!(f, "decode failed"),
            FailureKind::Resolution => write!(f, "resolution failed"),
        }
    }
}

/// A failed project repair, tagged with the stage it failed in.
#[derive(Error, Debug)]
#[error("{kind} for {}: {source}", path.display())]
pub struct RepairError {
    pub kind: FailureKind,
    pub path: PathBuf,
    #[source]
    pub source: Error,
}

impl RepairError {
    pub fn decode(path: impl Into<PathBuf>, source: Error) -> Self {
        Self {
            kind: FailureKind::Decode,
            path: path.into(),
            source,
        }
    }

    pub fn resolution(path: impl Into<PathBuf>, source: Error) -> Self {
        Self {
            kind: FailureKind::Resolution,
            path: path.into(),
            source,
        }
    }
}
