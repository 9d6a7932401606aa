use super::{stat_candidates, CandidateSearch, RecoveryCandidate};
use crate::error::Error;
use dashmap::DashMap;
use glob::Pattern;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// File-name index over a set of directory trees, for systems without a
/// metadata search service.
#[derive(Debug, Default)]
pub struct IndexedSearch {
    by_name: HashMap<String, Vec<PathBuf>>,
}

impl IndexedSearch {
    /// Index every regular file under `root_paths` by file name. Symlinks are
    /// not followed and paths matching an ignore glob are left out.
    pub fn build(root_paths: &[&str], ignore_globs: &[&str]) -> Result<Self, Error> {
        let ignore: Vec<Pattern> = ignore_globs
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();

        let indexer = Indexer {
            ignore,
            by_name: DashMap::new(),
        };
        root_paths.par_iter().try_for_each(|root| {
            let root = Path::new(root);
            if root.is_dir() {
                indexer.index_dir(root)
            } else {
                warn!("Search root {} is not a directory", root.display());
                Ok(())
            }
        })?;

        Ok(Self {
            by_name: indexer.finish(),
        })
    }

    pub fn file_count(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    pub fn paths_named(&self, name: &str) -> &[PathBuf] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl CandidateSearch for IndexedSearch {
    fn search(&self, name: &str) -> Result<Vec<RecoveryCandidate>, Error> {
        Ok(stat_candidates(self.paths_named(name).iter().cloned()))
    }
}

/// Immediate contents of one directory.
#[derive(Debug, Default)]
struct Listing {
    files: Vec<PathBuf>,
    subdirs: Vec<PathBuf>,
}

struct Indexer {
    ignore: Vec<Pattern>,
    by_name: DashMap<String, Vec<PathBuf>>,
}

impl Indexer {
    fn ignored(&self, path: &Path) -> bool {
        self.ignore.iter().any(|pattern| pattern.matches_path(path))
    }

    /// Record this directory's files, then fan out over its subdirectories.
    fn index_dir(&self, dir: &Path) -> Result<(), Error> {
        if self.ignored(dir) {
            return Ok(());
        }
        let Some(listing) = list_dir(dir)? else {
            return Ok(());
        };

        for path in listing.files {
            if self.ignored(&path) {
                continue;
            }
            if let Some(name) = path.file_name() {
                let name = name.to_string_lossy().into_owned();
                self.by_name.entry(name).or_default().push(path);
            }
        }

        listing
            .subdirs
            .par_iter()
            .try_for_each(|subdir| self.index_dir(subdir))
    }

    /// Walk order is not deterministic; sort so lookups are.
    fn finish(self) -> HashMap<String, Vec<PathBuf>> {
        self.by_name
            .into_iter()
            .map(|(name, mut paths)| {
                paths.sort();
                paths.dedup();
                (name, paths)
            })
            .collect()
    }
}

fn walk_error(path: &Path, err: io::Error) -> Error {
    Error::Search(format!("cannot index {}: {}", path.display(), err))
}

/// `None` for directories we may not read; those are logged and skipped.
fn list_dir(dir: &Path) -> Result<Option<Listing>, Error> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            error!("Access denied reading directory {}: {}", dir.display(), err);
            return Ok(None);
        }
        Err(err) => return Err(walk_error(dir, err)),
    };

    let mut listing = Listing::default();
    for entry in entries {
        let entry = entry.map_err(|e| walk_error(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| walk_error(&path, e))?;
        if file_type.is_dir() {
            listing.subdirs.push(path);
        } else if file_type.is_file() {
            listing.files.push(path);
        } else {
            debug!("Not indexing {}", path.display());
        }
    }
    Ok(Some(listing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_index_finds_files_by_name_in_sorted_order() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("b/deep")).unwrap();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::write(root.join("b/deep/kick.wav"), vec![0u8; 10]).unwrap();
        fs::write(root.join("a/kick.wav"), vec![0u8; 20]).unwrap();
        fs::write(root.join("a/snare.wav"), vec![0u8; 5]).unwrap();

        let root_str = root.to_string_lossy().into_owned();
        let index = IndexedSearch::build(&[&root_str], &[]).unwrap();
        assert_eq!(index.file_count(), 3);

        let found = index.search("kick.wav").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].path, root.join("a/kick.wav"));
        assert_eq!(found[0].size, 20);
        assert_eq!(found[1].path, root.join("b/deep/kick.wav"));
        assert_eq!(found[1].size, 10);

        assert!(index.search("hat.wav").unwrap().is_empty());
    }

    #[test]
    fn test_index_respects_ignore_patterns() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("keep")).unwrap();
        fs::create_dir_all(root.join("Resurrected Files")).unwrap();
        fs::write(root.join("keep/kick.wav"), b"x").unwrap();
        fs::write(root.join("Resurrected Files/kick.wav"), b"x").unwrap();

        let root_str = root.to_string_lossy().into_owned();
        let index = IndexedSearch::build(&[&root_str], &["**/Resurrected Files/**"]).unwrap();
        assert_eq!(index.paths_named("kick.wav"), &[root.join("keep/kick.wav")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_indexed() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("real")).unwrap();
        fs::write(root.join("real/kick.wav"), b"x").unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("linked-dir")).unwrap();
        std::os::unix::fs::symlink(root.join("real/kick.wav"), root.join("kick.wav")).unwrap();

        let root_str = root.to_string_lossy().into_owned();
        let index = IndexedSearch::build(&[&root_str], &[]).unwrap();
        assert_eq!(index.paths_named("kick.wav"), &[root.join("real/kick.wav")]);
    }

    #[test]
    fn test_missing_root_is_empty_index() {
        let index = IndexedSearch::build(&["/nonexistent/als-resurrect-root"], &[]).unwrap();
        assert_eq!(index.file_count(), 0);
    }
}
