use crate::archive;
use crate::classify::{self, PathType, Resolution};
use crate::config::AppConfig;
use crate::document::XmlDocument;
use crate::error::{Error, RepairError};
use crate::materialize::{FsMaterializer, MaterializeMode, Materialized, Materializer};
use crate::path_ids::PathIdAllocator;
use crate::reference::{
    self, SampleReference, DIR_ATTR, ID_ATTR, RELATIVE_PATH_ELEMENT, VALUE_ATTR,
};
use crate::search::{self, CandidateSearch};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Marks files written next to a project by this tool.
pub const OUTPUT_SUFFIX: &str = "🐰";

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub recovery_dir: String,
    pub in_place: bool,
    pub debug: bool,
}

impl From<&AppConfig> for EngineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            recovery_dir: config.recovery_dir.clone(),
            in_place: config.in_place,
            debug: config.debug,
        }
    }
}

/// Progress of one project through a repair run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Unpacked,
    Scanned,
    Rewriting,
    Repacked,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassStats {
    pub references: usize,
    pub resolved: usize,
    pub searched: usize,
    pub recovered: usize,
    pub unresolved: usize,
}

#[derive(Debug)]
pub struct RepairReport {
    pub project: PathBuf,
    pub output: PathBuf,
    pub debug_artifact: Option<PathBuf>,
    pub stats: PassStats,
    pub duration: Duration,
}

pub struct ResolveEngine {
    options: EngineOptions,
    search: Arc<dyn CandidateSearch>,
    materializer: Arc<dyn Materializer>,
}

impl ResolveEngine {
    pub fn new(
        options: EngineOptions,
        search: Arc<dyn CandidateSearch>,
        materializer: Arc<dyn Materializer>,
    ) -> Self {
        Self {
            options,
            search,
            materializer,
        }
    }

    /// Engine wired to the configured search backend and the filesystem.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        config.validate()?;
        let search = search::from_config(config)?;
        let materializer = FsMaterializer::new(MaterializeMode::from_symlink_flag(config.symlink));
        Ok(Self::new(
            EngineOptions::from(config),
            search,
            Arc::new(materializer),
        ))
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Repair one project archive:
    /// 1. Unpack and parse the document
    /// 2. Classify every sample reference, recovering the broken ones
    /// 3. Serialize, compress and write the archive back
    ///
    /// The archive on disk is only replaced once the whole document has been
    /// rewritten in memory.
    pub fn repair(&self, archive_path: &Path) -> Result<RepairReport, RepairError> {
        info!("RESURRECTING: {}", archive_path.display());
        let start = Instant::now();

        let bytes =
            archive::unpack(archive_path).map_err(|e| RepairError::decode(archive_path, e))?;
        let mut doc =
            XmlDocument::parse(&bytes).map_err(|e| RepairError::decode(archive_path, e))?;
        debug!("{:?}: {} ({} bytes)", Stage::Unpacked, archive_path.display(), bytes.len());

        let project_dir = project_dir(archive_path);
        let stats = self
            .resolve_document(&mut doc, &project_dir)
            .map_err(|e| RepairError::resolution(archive_path, e))?;

        let (output, debug_artifact) = self
            .repack(&doc, archive_path)
            .map_err(|e| RepairError::resolution(archive_path, e))?;
        debug!("{:?}: {}", Stage::Repacked, output.display());

        let duration = start.elapsed();
        info!(
            "Resurrected {} of {} missing samples in {} ({:.2}s)",
            stats.recovered,
            stats.searched,
            archive_path.display(),
            duration.as_secs_f64(),
        );

        Ok(RepairReport {
            project: archive_path.to_path_buf(),
            output,
            debug_artifact,
            stats,
            duration,
        })
    }

    /// Single pass over every `SampleRef`, in document order.
    pub fn resolve_document(
        &self,
        doc: &mut XmlDocument,
        project_dir: &Path,
    ) -> Result<PassStats, Error> {
        let mut ids = PathIdAllocator::scan(doc);
        debug!("{:?}: path id high-water mark {}", Stage::Scanned, ids.high_water());

        let recovery_dir = project_dir.join(&self.options.recovery_dir);
        let mut stats = PassStats::default();

        for node in reference::sample_refs(doc) {
            let sample = SampleReference::read(doc, node)?;
            stats.references += 1;

            let expected_at = classify::candidate_path(
                sample.path_type,
                &sample.relative_path,
                &sample.search_hint_path,
                &sample.name,
                project_dir,
            );
            let resolution =
                classify::classify(sample.path_type, expected_at.as_deref(), |p| p.exists());
            trace!(
                "{:?}: {} {:?} -> {:?}",
                Stage::Rewriting,
                sample.name,
                sample.path_type,
                resolution
            );

            if resolution == Resolution::Resolved {
                stats.resolved += 1;
                continue;
            }

            stats.searched += 1;
            if self.recover(&sample, &recovery_dir)? {
                rewrite_reference(doc, &sample, &mut ids, &self.options.recovery_dir)?;
                stats.recovered += 1;
            } else {
                debug!("No replacement found for {}", sample.name);
                stats.unresolved += 1;
            }
        }

        Ok(stats)
    }

    /// Try candidates in search order; the first one that matches on size and
    /// can be placed wins.
    fn recover(&self, sample: &SampleReference, recovery_dir: &Path) -> Result<bool, Error> {
        let candidates = self.search.search(&sample.name)?;
        debug!("{} candidates for {}", candidates.len(), sample.name);

        for candidate in candidates {
            if !size_matches(sample.expected_size, candidate.size) {
                trace!(
                    "Skipping {}: {} bytes, expected {}",
                    candidate.path.display(),
                    candidate.size,
                    sample.expected_size
                );
                continue;
            }

            match self
                .materializer
                .materialize(&candidate.path, recovery_dir, &sample.name)?
            {
                Materialized::Created(dest) => {
                    info!("Recovered {} from {}", dest.display(), candidate.path.display());
                    return Ok(true);
                }
                Materialized::AlreadyPresent(dest) => {
                    debug!("Already recovered: {}", dest.display());
                    return Ok(true);
                }
                Materialized::Rejected(reason) => {
                    warn!("Candidate {} not used: {}", candidate.path.display(), reason);
                }
            }
        }

        Ok(false)
    }

    fn repack(
        &self,
        doc: &XmlDocument,
        archive_path: &Path,
    ) -> Result<(PathBuf, Option<PathBuf>), Error> {
        let xml = doc.serialize()?;
        let packed = archive::pack(&xml)?;

        let output = if self.options.in_place {
            archive_path.to_path_buf()
        } else {
            sibling_path(archive_path, "als")
        };
        archive::write_atomic(&output, &packed)?;

        // Same bytes as the archive, just not compressed.
        let debug_artifact = if self.options.debug {
            let path = sibling_path(archive_path, "xml");
            fs::write(&path, &xml)?;
            debug!("Wrote uncompressed copy to {}", path.display());
            Some(path)
        } else {
            None
        };

        Ok((output, debug_artifact))
    }
}

/// An expected size of 0 means the size is unknown and anything goes.
pub fn size_matches(expected: u64, actual: u64) -> bool {
    expected == 0 || expected == actual
}

/// Point a recovered reference at its copy in the recovery directory.
/// Returns the id given to the new path segment. The document is left
/// untouched when no id can be allocated.
pub fn rewrite_reference(
    doc: &mut XmlDocument,
    sample: &SampleReference,
    ids: &mut PathIdAllocator,
    recovery_dir_name: &str,
) -> Result<u64, Error> {
    let id = ids.allocate(doc)?;
    doc.clear(sample.relative_path_node);

    let id_value = id.to_string();
    let segment = doc.create_node(
        RELATIVE_PATH_ELEMENT,
        &[(ID_ATTR, id_value.as_str()), (DIR_ATTR, recovery_dir_name)],
    );
    doc.append_child(sample.relative_path_node, segment);

    doc.set_attr(
        sample.path_type_node,
        VALUE_ATTR,
        &PathType::CurrentProject.code().to_string(),
    );
    doc.set_attr(sample.has_relative_path_node, VALUE_ATTR, "true");
    Ok(id)
}

pub fn project_dir(archive_path: &Path) -> PathBuf {
    match archive_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// `<dir>/<stem>-🐰.<extension>` next to the archive.
pub fn sibling_path(archive_path: &Path, extension: &str) -> PathBuf {
    let stem = archive_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    project_dir(archive_path).join(format!("{}-{}.{}", stem, OUTPUT_SUFFIX, extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_matches() {
        assert!(size_matches(0, 12345));
        assert!(size_matches(4096, 4096));
        assert!(!size_matches(4096, 2048));
    }

    #[test]
    fn test_project_dir() {
        assert_eq!(project_dir(Path::new("/music/song.als")), PathBuf::from("/music"));
        assert_eq!(project_dir(Path::new("song.als")), PathBuf::from("."));
    }

    #[test]
    fn test_sibling_path() {
        assert_eq!(
            sibling_path(Path::new("/music/My Song.als"), "xml"),
            PathBuf::from("/music/My Song-🐰.xml")
        );
    }

    #[test]
    fn test_rewrite_reference_postconditions() {
        let mut doc = XmlDocument::parse(
            br#"<SampleRef><FileRef><HasRelativePath Value="false"/><RelativePathType Value="0"/><RelativePath><RelativePathElement Id="3" Dir="Old"/><RelativePathElement Id="4" Dir="Gone"/></RelativePath><Name Value="kick.wav"/><SearchHint><FileSize Value="0"/></SearchHint></FileRef></SampleRef>"#,
        )
        .unwrap();
        let node = reference::sample_refs(&doc)[0];
        let sample = SampleReference::read(&doc, node).unwrap();
        let mut ids = PathIdAllocator::scan(&doc);

        let id = rewrite_reference(&mut doc, &sample, &mut ids, "Resurrected Files").unwrap();

        let after = SampleReference::read(&doc, node).unwrap();
        assert_eq!(after.path_type, PathType::CurrentProject);
        assert!(after.has_relative_path);
        assert_eq!(after.relative_path, vec!["Resurrected Files"]);
        assert_eq!(id, 5);
    }
}
