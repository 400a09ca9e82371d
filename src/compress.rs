use crate::error::{Error, Result};
use flate2::{Compression, write::GzEncoder};
use std::{
    ffi::OsString,
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Suffix appended to the converted file's name.
pub const GZIP_SUFFIX: &str = ".gz";

/// Returns the path of the compressed sibling of `path`.
#[must_use]
pub fn compressed_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(GZIP_SUFFIX);
    PathBuf::from(name)
}

/// Writes a gzip copy of `path` next to it, replacing any previous copy.
///
/// The original is left in place.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the compressed copy
/// cannot be written.
pub(crate) fn gzip_sibling(path: &Path) -> Result<PathBuf> {
    let data = fs::read(path).map_err(|e| Error::io(path, e))?;
    let target = compressed_path(path);

    let file = fs::File::create(&target).map_err(|e| Error::io(&target, e))?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder
        .write_all(&data)
        .map_err(|e| Error::io(&target, e))?;
    let file = encoder.finish().map_err(|e| Error::io(&target, e))?;
    file.sync_all().map_err(|e| Error::io(&target, e))?;

    debug!(
        "Compressed {} ({} bytes) to {}",
        path.display(),
        data.len(),
        target.display()
    );
    Ok(target)
}
