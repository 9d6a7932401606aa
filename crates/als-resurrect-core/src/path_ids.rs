use crate::document::XmlDocument;
use crate::error::Error;
use crate::reference::{ID_ATTR, RELATIVE_PATH_ELEMENT};

/// Largest numeric `Id` on any attached `RelativePathElement`, or 0.
/// Ids that are not integers cannot collide with allocated ones and are skipped.
pub fn max_path_id(doc: &XmlDocument) -> u64 {
    doc.find_all(RELATIVE_PATH_ELEMENT)
        .into_iter()
        .filter_map(|node| doc.attr(node, ID_ATTR))
        .filter_map(|id| id.trim().parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}

/// Hands out path segment ids for one document.
///
/// Every allocation rescans the document, so nodes inserted since the last
/// call (by this allocator or anything else) are accounted for.
#[derive(Debug)]
pub struct PathIdAllocator {
    high_water: u64,
}

impl PathIdAllocator {
    pub fn scan(doc: &XmlDocument) -> Self {
        Self {
            high_water: max_path_id(doc),
        }
    }

    pub fn high_water(&self) -> u64 {
        self.high_water
    }

    /// Fails when the document already uses the largest representable id.
    pub fn allocate(&mut self, doc: &XmlDocument) -> Result<u64, Error> {
        let current = max_path_id(doc).max(self.high_water);
        self.high_water = current.checked_add(1).ok_or_else(|| {
            Error::MalformedReference(format!(
                "{} Id {} leaves no room for a new path element",
                RELATIVE_PATH_ELEMENT, current
            ))
        })?;
        Ok(self.high_water)
    }
}
