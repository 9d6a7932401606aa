use std::path::{Path, PathBuf};

/// How the stored path of a sample reference is interpreted (`RelativePathType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    Missing,
    External,
    Library,
    CurrentProject,
}

impl PathType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(PathType::Missing),
            1 => Some(PathType::External),
            2 => Some(PathType::Library),
            3 => Some(PathType::CurrentProject),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            PathType::Missing => 0,
            PathType::External => 1,
            PathType::Library => 2,
            PathType::CurrentProject => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing to do this pass.
    Resolved,
    NeedsSearch,
}

/// Where the stored metadata says the file should be, when that is computable.
///
/// External paths are rooted at `/`; current-project paths hang off the
/// project directory. Missing and Library references have no stored location.
pub fn candidate_path(
    path_type: PathType,
    relative_path: &[String],
    search_hint_path: &[String],
    name: &str,
    project_dir: &Path,
) -> Option<PathBuf> {
    let (base, dirs) = match path_type {
        PathType::External => (PathBuf::from("/"), search_hint_path),
        PathType::CurrentProject => (project_dir.to_path_buf(), relative_path),
        PathType::Missing | PathType::Library => return None,
    };

    let mut path = base;
    for dir in dirs {
        path.push(dir);
    }
    path.push(name);
    Some(path)
}

/// Library references that are not Missing are accepted without checking disk.
pub fn classify(
    path_type: PathType,
    candidate: Option<&Path>,
    exists: impl Fn(&Path) -> bool,
) -> Resolution {
    if path_type == PathType::Missing {
        return Resolution::NeedsSearch;
    }
    match candidate {
        Some(path) if !exists(path) => Resolution::NeedsSearch,
        _ => Resolution::Resolved,
    }
}
