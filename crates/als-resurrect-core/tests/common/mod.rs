#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use als_resurrect_core::archive;
use als_resurrect_core::document::XmlDocument;
use als_resurrect_core::materialize::{FsMaterializer, MaterializeMode};
use als_resurrect_core::reference::{sample_refs, SampleReference};
use als_resurrect_core::search::{CandidateSearch, RecoveryCandidate};
use als_resurrect_core::{EngineOptions, Error, ResolveEngine};

pub const RECOVERY_DIR: &str = "Resurrected Files";

/// One `SampleRef` in a generated Live set.
pub struct SampleSpec {
    pub name: String,
    pub path_type: i64,
    pub size: u64,
    pub relative: Vec<String>,
    pub hint: Vec<String>,
}

impl SampleSpec {
    pub fn missing(name: &str, size: u64) -> Self {
        Self {
            name: name.to_string(),
            path_type: 0,
            size,
            relative: vec!["Samples".to_string(), "Imported".to_string()],
            hint: vec!["Users".to_string(), "nobody".to_string()],
        }
    }

    /// External reference whose search hint points at `existing`.
    pub fn external(existing: &Path, size: u64) -> Self {
        let name = existing.file_name().unwrap().to_string_lossy().into_owned();
        Self {
            name,
            path_type: 1,
            size,
            relative: Vec::new(),
            hint: dirs_of(existing.parent().unwrap()),
        }
    }

    pub fn with_type(mut self, path_type: i64) -> Self {
        self.path_type = path_type;
        self
    }
}

fn dirs_of(dir: &Path) -> Vec<String> {
    dir.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Minimal Live set with the given sample references. Path element ids
/// start at 100 and increase by one per element.
pub fn live_set(samples: &[SampleSpec]) -> String {
    let mut id = 100;
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Ableton MajorVersion=\"4\" MinorVersion=\"9.7_178\" Creator=\"Ableton Live 9.7.7\">\n\t<LiveSet>\n",
    );
    for sample in samples {
        xml.push_str("\t\t<SampleRef>\n\t\t\t<FileRef>\n");
        xml.push_str(&format!(
            "\t\t\t\t<HasRelativePath Value=\"{}\" />\n",
            !sample.relative.is_empty()
        ));
        xml.push_str(&format!(
            "\t\t\t\t<RelativePathType Value=\"{}\" />\n",
            sample.path_type
        ));
        xml.push_str("\t\t\t\t<RelativePath>\n");
        for dir in &sample.relative {
            xml.push_str(&format!(
                "\t\t\t\t\t<RelativePathElement Id=\"{}\" Dir=\"{}\" />\n",
                id,
                escape(dir)
            ));
            id += 1;
        }
        xml.push_str("\t\t\t\t</RelativePath>\n");
        xml.push_str(&format!("\t\t\t\t<Name Value=\"{}\" />\n", escape(&sample.name)));
        xml.push_str("\t\t\t\t<Type Value=\"1\" />\n");
        xml.push_str("\t\t\t\t<SearchHint>\n\t\t\t\t\t<PathHint>\n");
        for dir in &sample.hint {
            xml.push_str(&format!(
                "\t\t\t\t\t\t<RelativePathElement Id=\"{}\" Dir=\"{}\" />\n",
                id,
                escape(dir)
            ));
            id += 1;
        }
        xml.push_str("\t\t\t\t\t</PathHint>\n");
        xml.push_str(&format!("\t\t\t\t\t<FileSize Value=\"{}\" />\n", sample.size));
        xml.push_str("\t\t\t\t\t<Crc Value=\"48879\" />\n");
        xml.push_str("\t\t\t\t\t<MaxCrcSize Value=\"16384\" />\n");
        xml.push_str("\t\t\t\t\t<HasExtendedInfo Value=\"true\" />\n");
        xml.push_str("\t\t\t\t</SearchHint>\n\t\t\t</FileRef>\n\t\t</SampleRef>\n");
    }
    xml.push_str("\t</LiveSet>\n</Ableton>\n");
    xml
}

/// Write a gzip-compressed Live set at `path`.
pub fn write_project(path: &Path, samples: &[SampleSpec]) {
    write_project_xml(path, &live_set(samples));
}

/// Write arbitrary document content as a gzip-compressed archive.
pub fn write_project_xml(path: &Path, xml: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let packed = archive::pack(xml.as_bytes()).unwrap();
    fs::write(path, packed).unwrap();
}

/// Decompressed archive content as text.
pub fn read_project_xml(path: &Path) -> String {
    String::from_utf8(archive::unpack(path).unwrap()).unwrap()
}

/// Write `len` bytes of `fill` and return the path.
pub fn write_sample(path: &Path, len: usize, fill: u8) -> PathBuf {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, vec![fill; len]).unwrap();
    path.to_path_buf()
}

pub fn read_project(path: &Path) -> XmlDocument {
    let bytes = archive::unpack(path).unwrap();
    XmlDocument::parse(&bytes).unwrap()
}

pub fn read_refs(doc: &XmlDocument) -> Vec<SampleReference> {
    sample_refs(doc)
        .into_iter()
        .map(|node| SampleReference::read(doc, node).unwrap())
        .collect()
}

/// Search service answering from a fixed script and recording every query.
#[derive(Default)]
pub struct ScriptedSearch {
    results: HashMap<String, Vec<RecoveryCandidate>>,
    calls: Mutex<Vec<String>>,
    fail: bool,
}

impl ScriptedSearch {
    pub fn with<P: AsRef<Path>>(mut self, name: &str, candidates: &[(P, u64)]) -> Self {
        let candidates = candidates
            .iter()
            .map(|(path, size)| RecoveryCandidate {
                path: path.as_ref().to_path_buf(),
                size: *size,
            })
            .collect();
        self.results.insert(name.to_string(), candidates);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CandidateSearch for ScriptedSearch {
    fn search(&self, name: &str) -> Result<Vec<RecoveryCandidate>, Error> {
        self.calls.lock().unwrap().push(name.to_string());
        if self.fail {
            return Err(Error::Search("scripted failure".to_string()));
        }
        Ok(self.results.get(name).cloned().unwrap_or_default())
    }
}

pub fn options() -> EngineOptions {
    EngineOptions {
        recovery_dir: RECOVERY_DIR.to_string(),
        in_place: true,
        debug: false,
    }
}

pub fn engine_with(search: &Arc<ScriptedSearch>, options: EngineOptions) -> ResolveEngine {
    let search: Arc<dyn CandidateSearch> = search.clone();
    ResolveEngine::new(
        options,
        search,
        Arc::new(FsMaterializer::new(MaterializeMode::Copy)),
    )
}

pub fn engine(search: &Arc<ScriptedSearch>) -> ResolveEngine {
    engine_with(search, options())
}

/// Sorted names of the entries directly inside `dir`.
pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
