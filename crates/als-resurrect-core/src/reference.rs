use crate::classify::PathType;
use crate::document::{NodeId, XmlDocument};
use crate::error::Error;

// Element and attribute names of the Live set schema.
pub const SAMPLE_REF: &str = "SampleRef";
pub const RELATIVE_PATH_TYPE: &str = "RelativePathType";
pub const NAME: &str = "Name";
pub const SEARCH_HINT: &str = "SearchHint";
pub const FILE_SIZE: &str = "FileSize";
pub const CRC: &str = "Crc";
pub const MAX_CRC_SIZE: &str = "MaxCrcSize";
pub const RELATIVE_PATH: &str = "RelativePath";
pub const HAS_RELATIVE_PATH: &str = "HasRelativePath";
pub const RELATIVE_PATH_ELEMENT: &str = "RelativePathElement";
pub const VALUE_ATTR: &str = "Value";
pub const ID_ATTR: &str = "Id";
pub const DIR_ATTR: &str = "Dir";

/// One `SampleRef` read out of a document, with handles to the nodes a
/// recovery rewrites.
#[derive(Debug, Clone)]
pub struct SampleReference {
    pub node: NodeId,
    pub name: String,
    pub expected_size: u64,
    pub checksum: Option<String>,
    pub checksum_scope: Option<String>,
    pub path_type: PathType,
    pub relative_path: Vec<String>,
    pub search_hint_path: Vec<String>,
    pub has_relative_path: bool,
    pub path_type_node: NodeId,
    pub relative_path_node: NodeId,
    pub has_relative_path_node: NodeId,
}

impl SampleReference {
    pub fn read(doc: &XmlDocument, node: NodeId) -> Result<Self, Error> {
        let path_type_node = required_child(doc, node, RELATIVE_PATH_TYPE)?;
        let raw_type = required_value(doc, path_type_node, RELATIVE_PATH_TYPE)?;
        let path_type = raw_type
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(PathType::from_code)
            .ok_or_else(|| {
                Error::MalformedReference(format!("unknown RelativePathType '{}'", raw_type))
            })?;

        let name_node = required_child(doc, node, NAME)?;
        let name = required_value(doc, name_node, NAME)?.to_string();

        let search_hint = required_child(doc, node, SEARCH_HINT)?;
        let size_node = required_child(doc, search_hint, FILE_SIZE)?;
        let raw_size = required_value(doc, size_node, FILE_SIZE)?;
        let expected_size = raw_size.trim().parse::<u64>().map_err(|_| {
            Error::MalformedReference(format!("FileSize '{}' for '{}' is not a size", raw_size, name))
        })?;

        let checksum = optional_value(doc, search_hint, CRC);
        let checksum_scope = optional_value(doc, search_hint, MAX_CRC_SIZE);

        let relative_path_node = required_child(doc, node, RELATIVE_PATH)?;
        let has_relative_path_node = required_child(doc, node, HAS_RELATIVE_PATH)?;
        let has_relative_path = doc
            .attr(has_relative_path_node, VALUE_ATTR)
            .map(|value| value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(SampleReference {
            node,
            name,
            expected_size,
            checksum,
            checksum_scope,
            path_type,
            relative_path: segment_dirs(doc, relative_path_node),
            search_hint_path: segment_dirs(doc, search_hint),
            has_relative_path,
            path_type_node,
            relative_path_node,
            has_relative_path_node,
        })
    }
}

/// Every `SampleRef` in the document, in document order.
pub fn sample_refs(doc: &XmlDocument) -> Vec<NodeId> {
    doc.find_all(SAMPLE_REF)
}

fn segment_dirs(doc: &XmlDocument, scope: NodeId) -> Vec<String> {
    doc.find_all_in(scope, RELATIVE_PATH_ELEMENT)
        .into_iter()
        .map(|segment| doc.attr(segment, DIR_ATTR).unwrap_or_default().to_string())
        .collect()
}

fn required_child(doc: &XmlDocument, scope: NodeId, tag: &str) -> Result<NodeId, Error> {
    doc.find_first_in(scope, tag)
        .ok_or_else(|| Error::MalformedReference(format!("SampleRef has no <{}>", tag)))
}

fn required_value<'a>(doc: &'a XmlDocument, node: NodeId, tag: &str) -> Result<&'a str, Error> {
    doc.attr(node, VALUE_ATTR)
        .ok_or_else(|| Error::MalformedReference(format!("<{}> has no Value", tag)))
}

fn optional_value(doc: &XmlDocument, scope: NodeId, tag: &str) -> Option<String> {
    doc.find_first_in(scope, tag)
        .and_then(|node| doc.attr(node, VALUE_ATTR))
        .map(str::to_owned)
}
