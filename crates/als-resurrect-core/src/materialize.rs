use crate::config::is_plain_file_name;
use crate::error::Error;
use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeMode {
    Copy,
    Link,
}

impl MaterializeMode {
    pub fn from_symlink_flag(symlink: bool) -> Self {
        if symlink {
            MaterializeMode::Link
        } else {
            MaterializeMode::Copy
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialized {
    Created(PathBuf),
    /// Something with this name was already recovered; left untouched.
    AlreadyPresent(PathBuf),
    /// The candidate cannot be placed; try the next one.
    Rejected(String),
}

/// Places a chosen candidate into a recovery directory.
pub trait Materializer: Send + Sync {
    fn materialize(&self, candidate: &Path, dest_dir: &Path, name: &str)
        -> Result<Materialized, Error>;
}

#[derive(Debug, Clone)]
pub struct FsMaterializer {
    mode: MaterializeMode,
}

impl FsMaterializer {
    pub fn new(mode: MaterializeMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> MaterializeMode {
        self.mode
    }
}

impl Materializer for FsMaterializer {
    fn materialize(
        &self,
        candidate: &Path,
        dest_dir: &Path,
        name: &str,
    ) -> Result<Materialized, Error> {
        if !is_plain_file_name(name) {
            return Ok(Materialized::Rejected(format!(
                "'{}' is not a plain file name",
                name
            )));
        }

        let dest = dest_dir.join(name);
        match fs::symlink_metadata(&dest) {
            Ok(metadata) if metadata.is_dir() => {
                return Ok(Materialized::Rejected(format!(
                    "{} exists as a directory",
                    dest.display()
                )));
            }
            Ok(_) => return Ok(Materialized::AlreadyPresent(dest)),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        match fs::metadata(candidate) {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => {
                return Ok(Materialized::Rejected(format!(
                    "{} is not a regular file",
                    candidate.display()
                )));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(Materialized::Rejected(format!(
                    "{} no longer exists",
                    candidate.display()
                )));
            }
            Err(e) => return Err(e.into()),
        }

        fs::create_dir_all(dest_dir)?;

        let placed = match self.mode {
            MaterializeMode::Copy => copy_no_clobber(candidate, dest_dir, &dest),
            MaterializeMode::Link => link(candidate, &dest),
        };
        match placed {
            Ok(()) => Ok(Materialized::Created(dest)),
            // Lost a race with another writer; theirs wins.
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(Materialized::AlreadyPresent(dest)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Copy through a temp file so an interrupted copy never leaves a partial
/// file under the final name.
fn copy_no_clobber(candidate: &Path, dest_dir: &Path, dest: &Path) -> io::Result<()> {
    let mut source = File::open(candidate)?;
    let mut tmp = NamedTempFile::new_in(dest_dir)?;
    io::copy(&mut source, tmp.as_file_mut())?;
    let permissions = source.metadata()?.permissions();
    tmp.as_file().set_permissions(permissions)?;
    tmp.persist_noclobber(dest).map_err(|e| e.error)?;
    Ok(())
}

fn link(candidate: &Path, dest: &Path) -> io::Result<()> {
    let target = fs::canonicalize(candidate)?;
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(&target, dest)
    }
    #[cfg(windows)]
    {
        std::os::windows::fs::symlink_file(&target, dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_copy_creates_recovery_dir_and_file() {
        let tmp = tempdir().unwrap();
        let source = tmp.path().join("kick.wav");
        fs::write(&source, b"RIFF....WAVE").unwrap();
        let dest_dir = tmp.path().join("project/Resurrected Files");

        let result = FsMaterializer::new(MaterializeMode::Copy)
            .materialize(&source, &dest_dir, "kick.wav")
            .unwrap();

        assert_eq!(result, Materialized::Created(dest_dir.join("kick.wav")));
        assert_eq!(fs::read(dest_dir.join("kick.wav")).unwrap(), b"RIFF....WAVE");
        assert_eq!(fs::read_dir(&dest_dir).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_link_mode_creates_symlink() {
        let tmp = tempdir().unwrap();
        let source = tmp.path().join("kick.wav");
        fs::write(&source, b"data").unwrap();
        let dest_dir = tmp.path().join("rec");

        FsMaterializer::new(MaterializeMode::Link)
            .materialize(&source, &dest_dir, "kick.wav")
            .unwrap();

        let dest = dest_dir.join("kick.wav");
        assert!(fs::symlink_metadata(&dest).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&dest).unwrap(), fs::canonicalize(&source).unwrap());
    }

    #[test]
    fn test_existing_destination_is_left_alone() {
        let tmp = tempdir().unwrap();
        let source = tmp.path().join("kick.wav");
        fs::write(&source, b"new").unwrap();
        let dest_dir = tmp.path().join("rec");
        fs::create_dir_all(&dest_dir).unwrap();
        fs::write(dest_dir.join("kick.wav"), b"old").unwrap();

        let result = FsMaterializer::new(MaterializeMode::Copy)
            .materialize(&source, &dest_dir, "kick.wav")
            .unwrap();

        assert_eq!(result, Materialized::AlreadyPresent(dest_dir.join("kick.wav")));
        assert_eq!(fs::read(dest_dir.join("kick.wav")).unwrap(), b"old");
    }

    #[test]
    fn test_candidate_is_destination() {
        let tmp = tempdir().unwrap();
        let dest_dir = tmp.path().join("rec");
        fs::create_dir_all(&dest_dir).unwrap();
        let source = dest_dir.join("kick.wav");
        fs::write(&source, b"same").unwrap();

        let result = FsMaterializer::new(MaterializeMode::Copy)
            .materialize(&source, &dest_dir, "kick.wav")
            .unwrap();
        assert!(matches!(result, Materialized::AlreadyPresent(_)));
    }

    #[test]
    fn test_directory_at_destination_is_rejected() {
        let tmp = tempdir().unwrap();
        let source = tmp.path().join("kick.wav");
        fs::write(&source, b"x").unwrap();
        let dest_dir = tmp.path().join("rec");
        fs::create_dir_all(dest_dir.join("kick.wav")).unwrap();

        let result = FsMaterializer::new(MaterializeMode::Copy)
            .materialize(&source, &dest_dir, "kick.wav")
            .unwrap();
        assert!(matches!(result, Materialized::Rejected(_)));
    }

    #[test]
    fn test_directory_candidate_is_rejected() {
        let tmp = tempdir().unwrap();
        let source = tmp.path().join("kick.wav");
        fs::create_dir_all(&source).unwrap();

        let result = FsMaterializer::new(MaterializeMode::Copy)
            .materialize(&source, &tmp.path().join("rec"), "kick.wav")
            .unwrap();
        assert!(matches!(result, Materialized::Rejected(_)));
        assert!(!tmp.path().join("rec").exists());
    }

    #[test]
    fn test_unsafe_name_is_rejected() {
        let tmp = tempdir().unwrap();
        let source = tmp.path().join("kick.wav");
        fs::write(&source, b"x").unwrap();

        let result = FsMaterializer::new(MaterializeMode::Copy)
            .materialize(&source, &tmp.path().join("rec"), "../kick.wav")
            .unwrap();
        assert!(matches!(result, Materialized::Rejected(_)));
    }
}
