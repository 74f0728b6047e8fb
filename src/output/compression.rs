//! Gzip wrapping of oversized output files. The original file name is kept
//! in the gzip header so consumers can restore it.
use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("gzip target {0:?} is the same as the origin")]
    SameFile(String),
    #[error("gzip failed: {0}")]
    Io(#[from] io::Error),
}

/// Compresses the `origin` file into a new `gz` file, recording the origin's
/// base name in the gzip header. Returns the number of source bytes read.
pub fn gzip_file(origin: &Path, gz: &Path) -> Result<u64, CompressionError> {
    if origin == gz {
        return Err(CompressionError::SameFile(origin.display().to_string()));
    }
    let mut source = File::open(origin)?;
    let target = File::create(gz)?;
    let name = origin
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut encoder = GzBuilder::new()
        .filename(name)
        .write(target, Compression::default());
    let read = io::copy(&mut source, &mut encoder)?;
    encoder.finish()?;
    Ok(read)
}

/// Decompresses the `gz` file into `origin`. Returns the number of bytes
/// written.
pub fn ungzip_file(gz: &Path, origin: &mut impl Write) -> Result<u64, CompressionError> {
    let source = File::open(gz)?;
    let mut decoder = GzDecoder::new(source);
    let mut buffer = Vec::new();
    decoder.read_to_end(&mut buffer)?;
    origin.write_all(&buffer)?;
    Ok(buffer.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn gzip_then_ungzip_restores_original_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("sitemap.xml");
        let gz = dir.path().join("sitemap.xml.gzip");
        let content = "<urlset>".repeat(200);
        fs::write(&origin, &content).unwrap();

        let read = gzip_file(&origin, &gz).unwrap();
        assert_eq!(read, content.len() as u64);
        assert!(gz.exists());

        let mut restored = Vec::new();
        let written = ungzip_file(&gz, &mut restored).unwrap();
        assert_eq!(written, content.len() as u64);
        assert_eq!(restored, content.as_bytes());
    }

    #[test]
    fn refuses_identical_origin_and_target() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("sitemap.xml");
        fs::write(&origin, "data").unwrap();
        let err = gzip_file(&origin, &origin).unwrap_err();
        assert!(matches!(err, CompressionError::SameFile(_)));
    }

    #[test]
    fn gzip_missing_origin_fails() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("nope.xml");
        let gz = dir.path().join("nope.xml.gzip");
        assert!(gzip_file(&origin, &gz).is_err());
    }
}
