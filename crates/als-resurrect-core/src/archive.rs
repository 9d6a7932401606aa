use crate::error::Error;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Leading bytes of every gzip stream.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Read a project archive and return the XML document bytes.
/// Plain (uncompressed) archives are returned as-is.
pub fn unpack(archive_path: &Path) -> Result<Vec<u8>, Error> {
    let raw = fs::read(archive_path)?;
    unpack_bytes(&raw).map_err(|err| match err {
        Error::Decode(reason) => {
            Error::Decode(format!("{}: {}", archive_path.display(), reason))
        }
        other => other,
    })
}

pub fn unpack_bytes(raw: &[u8]) -> Result<Vec<u8>, Error> {
    if !is_gzip(raw) {
        return Ok(raw.to_vec());
    }

    let mut decoder = GzDecoder::new(raw);
    let mut document = Vec::new();
    decoder
        .read_to_end(&mut document)
        .map_err(|e| Error::Decode(format!("gzip stream is corrupt: {}", e)))?;
    Ok(document)
}

/// Compress document bytes. Output is always gzip, whatever the input archive was.
pub fn pack(document: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(document)?;
    Ok(encoder.finish()?)
}

/// Write `bytes` to `dest` through a temp file in the same directory, so the
/// destination is either the old content or the complete new content.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<(), Error> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
