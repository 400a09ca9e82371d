use crate::error::{Error, Result};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};
use tracing::trace;

/// Resolves the directory an input's output belongs in and makes sure it exists.
///
/// The input's parent directory, taken relative to `source_root`, is joined
/// onto `dest_root`. Inputs sitting directly in `source_root` map to
/// `dest_root` itself. Creation is idempotent and tolerates other workers
/// creating the same directory concurrently.
///
/// # Errors
///
/// Returns an error if `input` does not live under `source_root` or the
/// directory cannot be created.
pub(crate) fn resolve_output_dir(
    source_root: &Path,
    dest_root: &Path,
    input: &Path,
) -> Result<PathBuf> {
    let output_dir = mirrored_dir(source_root, dest_root, input)?;

    // create_dir_all treats an already-existing directory as success,
    // including one created by another thread mid-call.
    fs::create_dir_all(&output_dir).map_err(|e| Error::io(&output_dir, e))?;
    trace!("Output directory ready: {}", output_dir.display());

    Ok(output_dir)
}

/// Computes the mirrored output directory without touching the filesystem.
///
/// # Errors
///
/// Returns an error if `input` does not live under `source_root`.
pub(crate) fn mirrored_dir(source_root: &Path, dest_root: &Path, input: &Path) -> Result<PathBuf> {
    let relative = relative_parent(source_root, input)?;
    if relative.as_os_str().is_empty() {
        Ok(dest_root.to_path_buf())
    } else {
        Ok(dest_root.join(relative))
    }
}

/// Returns the input's parent directory relative to `source_root`.
fn relative_parent(source_root: &Path, input: &Path) -> Result<PathBuf> {
    let parent = input.parent().unwrap_or_else(|| Path::new(""));
    let relative = pathdiff::diff_paths(parent, source_root)
        .ok_or_else(|| Error::outside_source_root(input, source_root))?;

    let escapes = relative
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(Error::outside_source_root(input, source_root));
    }

    // diff_paths yields "." when both sides are equal after normalisation
    if relative == Path::new(".") {
        return Ok(PathBuf::new());
    }

    Ok(relative)
}
