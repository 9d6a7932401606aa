pub mod index;
pub mod spotlight;

pub use index::IndexedSearch;
pub use spotlight::SpotlightSearch;

use crate::config::{AppConfig, SearchBackend};
use crate::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// A possible replacement file, with its size when it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryCandidate {
    pub path: PathBuf,
    pub size: u64,
}

/// Finds files on disk by display name.
///
/// Implementations return candidates in whatever order the underlying
/// service yields them; callers must not assume a ranking.
pub trait CandidateSearch: Send + Sync {
    fn search(&self, name: &str) -> Result<Vec<RecoveryCandidate>, Error>;
}

/// Pair each path with its current size. Paths that vanished since the
/// service reported them are dropped.
pub fn stat_candidates(paths: impl IntoIterator<Item = PathBuf>) -> Vec<RecoveryCandidate> {
    paths
        .into_iter()
        .filter_map(|path| match fs::metadata(&path) {
            Ok(metadata) => Some(RecoveryCandidate {
                path,
                size: metadata.len(),
            }),
            Err(e) => {
                warn!("Skipping candidate {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

/// Build the search service selected in the configuration.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn CandidateSearch>, Error> {
    match config.search_backend {
        SearchBackend::Spotlight => Ok(Arc::new(SpotlightSearch::default())),
        SearchBackend::Index => {
            let roots: Vec<&str> = config.search_roots.iter().map(|s| s.as_str()).collect();
            let ignore: Vec<&str> = config.ignore_patterns.iter().map(|s| s.as_str()).collect();
            info!("Indexing search roots: {:?}", roots);
            let index = IndexedSearch::build(&roots, &ignore)?;
            info!("Indexed {} files", index.file_count());
            Ok(Arc::new(index))
        }
    }
}
