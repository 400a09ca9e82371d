use crate::error::{Error, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

/// Enumerates input files under a source root.
pub(crate) struct Scanner {
    source_root: PathBuf,
    exclude: Option<PathBuf>,
    matcher: GlobSet,
}

impl Scanner {
    /// Creates a scanner matching file names against `patterns`.
    ///
    /// Patterns are case-insensitive, so `*.shp` also picks up `ROADS.SHP`.
    /// Anything under `exclude` (typically the destination root when it is
    /// nested inside the source) is never visited.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is not a valid glob.
    pub(crate) fn new(
        source_root: &Path,
        patterns: &[String],
        exclude: Option<&Path>,
    ) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .literal_separator(true)
                .build()?;
            builder.add(glob);
        }
        let matcher = builder
            .build()
            .map_err(|e| Error::invalid_pattern(patterns.join(","), e.to_string()))?;

        Ok(Self {
            source_root: source_root.to_path_buf(),
            exclude: exclude.map(Path::to_path_buf),
            matcher,
        })
    }

    /// Walks the source root once and returns every matching file, sorted by path.
    ///
    /// Unreadable entries are logged and skipped.
    pub(crate) fn scan(&self) -> Vec<PathBuf> {
        debug!("Scanning {}", self.source_root.display());

        let walker = WalkDir::new(&self.source_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_excluded(entry));

        let mut files = Vec::new();
        for result in walker {
            match result {
                Ok(entry) if entry.file_type().is_file() => {
                    if self.matcher.is_match(entry.file_name()) {
                        trace!("Found input: {}", entry.path().display());
                        files.push(entry.into_path());
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Walk error: {}", e),
            }
        }

        files.sort();
        debug!("Scan complete: {} input files", files.len());
        files
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        self.exclude
            .as_deref()
            .is_some_and(|excluded| entry.depth() > 0 && entry.path() == excluded)
    }
}
