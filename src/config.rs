use crate::error::{Error, Result};
use std::path::PathBuf;

const DEFAULT_TARGET_CRS: u32 = 4326;
const DEFAULT_PRECISION: u8 = 6;
const DEFAULT_CONVERTER: &str = "ogr2ogr";
const DEFAULT_PATTERN: &str = "*.shp";

/// Highest coordinate precision the converter accepts.
pub const MAX_PRECISION: u8 = 15;

/// Largest worker pool a run may request.
pub const MAX_WORKERS: usize = 256;

/// Smallest worker pool used when the size is derived automatically.
const MIN_AUTO_WORKERS: usize = 2;

/// Output shaping requested from the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum OutputFormat {
    /// One aggregated GeoJSON document per input
    GeoJson,
    /// Newline-delimited GeoJSON feature sequence
    GeoJsonSeq,
}

impl OutputFormat {
    /// Returns the file extension for this format (without the dot).
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::GeoJson => "geojson",
            Self::GeoJsonSeq => "geojsonl",
        }
    }

    /// Returns the driver name passed to the converter's `-f` flag.
    #[must_use]
    pub const fn driver(self) -> &'static str {
        match self {
            Self::GeoJson => "GeoJSON",
            Self::GeoJsonSeq => "GeoJSONSeq",
        }
    }
}

/// Per-file conversion settings.
///
/// Constructed once per run and handed by value to every task, so workers
/// never share mutable state through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ConversionOptions {
    /// Target EPSG code, 0 disables reprojection
    pub target_crs: u32,

    /// Replace existing outputs instead of skipping them
    pub overwrite: bool,

    /// Decimal places kept in single-document output (0..=15)
    pub precision: u8,

    /// Emit newline-delimited sequences instead of one document
    pub sequence: bool,

    /// Write a gzip sibling next to each single-document output
    pub compress: bool,
}

impl ConversionOptions {
    /// Returns the output format implied by the sequence flag.
    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        if self.sequence {
            OutputFormat::GeoJsonSeq
        } else {
            OutputFormat::GeoJson
        }
    }

    /// Whether a successful conversion should be followed by compression.
    ///
    /// Sequence output is never compressed.
    #[must_use]
    pub const fn should_compress(&self) -> bool {
        self.compress && !self.sequence
    }
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            target_crs: DEFAULT_TARGET_CRS,
            overwrite: false,
            precision: DEFAULT_PRECISION,
            sequence: false,
            compress: false,
        }
    }
}

/// Derives the worker pool size.
///
/// A `requested` value of 0 means "auto": half of the available hardware
/// threads, but never fewer than two.
#[must_use]
pub fn resolve_workers(requested: usize, available: usize) -> usize {
    if requested == 0 {
        (available / 2).max(MIN_AUTO_WORKERS)
    } else {
        requested
    }
}

/// Configuration for one batch run.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Root directory scanned for input files
    pub source_dir: PathBuf,

    /// Root directory the source tree is mirrored into
    pub dest_dir: PathBuf,

    /// Per-file conversion settings
    pub options: ConversionOptions,

    /// Dispatch tasks to a bounded worker pool
    pub parallel: bool,

    /// Requested pool size, 0 for auto
    pub max_workers: usize,

    /// Directory searched for the converter before the regular search path
    pub tool_dir: Option<PathBuf>,

    /// Converter program name
    pub converter: String,

    /// File name globs selecting input files
    pub patterns: Vec<String>,

    /// Optional path for a JSON copy of the run summary
    pub summary_json: Option<PathBuf>,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vecbatch::Config;
    ///
    /// let config = Config::builder()
    ///     .source_dir("./shapes")
    ///     .dest_dir("./geojson")
    ///     .precision(7)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Source directory doesn't exist or is not a directory
    /// - Precision is above 15
    /// - Worker count is above 256
    /// - No input pattern or converter name is given
    pub fn validate(&self) -> Result<()> {
        if !self.source_dir.exists() {
            return Err(Error::config(format!(
                "Source directory does not exist: {}",
                self.source_dir.display()
            )));
        }

        if !self.source_dir.is_dir() {
            return Err(Error::config(format!(
                "Source path is not a directory: {}",
                self.source_dir.display()
            )));
        }

        if self.dest_dir.as_os_str().is_empty() {
            return Err(Error::config("Destination directory must not be empty"));
        }

        if self.options.precision > MAX_PRECISION {
            return Err(Error::config(format!(
                "precision ({}) must be between 0 and {MAX_PRECISION}",
                self.options.precision
            )));
        }

        if self.max_workers > MAX_WORKERS {
            return Err(Error::config(format!(
                "max_workers ({}) must be between 1 and {MAX_WORKERS} (0 for auto)",
                self.max_workers
            )));
        }

        if self.converter.trim().is_empty() {
            return Err(Error::config("converter program name must not be empty"));
        }

        if self.patterns.is_empty() {
            return Err(Error::config("at least one input pattern is required"));
        }

        if self.options.compress && self.options.sequence {
            tracing::warn!("Compression is ignored in sequence-output mode");
        }

        if !self.parallel && self.max_workers != 0 {
            tracing::debug!("max_workers has no effect without parallel mode");
        }

        Ok(())
    }

    /// Returns the pool size used when running in parallel mode.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        resolve_workers(self.max_workers, num_cpus::get())
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    source_dir: Option<PathBuf>,
    dest_dir: Option<PathBuf>,
    target_crs: Option<u32>,
    overwrite: bool,
    precision: Option<u8>,
    sequence: bool,
    compress: bool,
    parallel: bool,
    max_workers: usize,
    tool_dir: Option<PathBuf>,
    converter: Option<String>,
    patterns: Vec<String>,
    summary_json: Option<PathBuf>,
}

impl ConfigBuilder {
    /// Sets the directory to scan for inputs.
    #[must_use]
    pub fn source_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_dir = Some(path.into());
        self
    }

    /// Sets the directory outputs are mirrored into.
    #[must_use]
    pub fn dest_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.dest_dir = Some(path.into());
        self
    }

    /// Sets the target EPSG code (0 disables reprojection).
    #[must_use]
    pub fn target_crs(mut self, code: u32) -> Self {
        self.target_crs = Some(code);
        self
    }

    /// Replace existing outputs instead of skipping them.
    #[must_use]
    pub fn overwrite(mut self, enabled: bool) -> Self {
        self.overwrite = enabled;
        self
    }

    /// Sets the coordinate precision for single-document output.
    #[must_use]
    pub fn precision(mut self, digits: u8) -> Self {
        self.precision = Some(digits);
        self
    }

    /// Enables newline-delimited sequence output.
    #[must_use]
    pub fn sequence(mut self, enabled: bool) -> Self {
        self.sequence = enabled;
        self
    }

    /// Enables gzip siblings for single-document output.
    #[must_use]
    pub fn compress(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    /// Enables the bounded worker pool.
    #[must_use]
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Sets the worker pool size (0 derives it from the CPU count).
    #[must_use]
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    /// Sets a directory searched for the converter first.
    ///
    /// An empty path is treated as unset.
    #[must_use]
    pub fn tool_dir(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.tool_dir = (!path.as_os_str().is_empty()).then_some(path);
        self
    }

    /// Overrides the converter program name.
    #[must_use]
    pub fn converter(mut self, program: impl Into<String>) -> Self {
        self.converter = Some(program.into());
        self
    }

    /// Adds a file name glob selecting input files.
    ///
    /// When no pattern is added, `*.shp` is used.
    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    /// Writes a JSON copy of the run summary to `path`.
    #[must_use]
    pub fn summary_json(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_json = Some(path.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let patterns = if self.patterns.is_empty() {
            vec![DEFAULT_PATTERN.to_string()]
        } else {
            self.patterns
        };

        let config = Config {
            source_dir: self.source_dir.unwrap_or_else(|| PathBuf::from(".")),
            dest_dir: self.dest_dir.unwrap_or_else(|| PathBuf::from("out")),
            options: ConversionOptions {
                target_crs: self.target_crs.unwrap_or(DEFAULT_TARGET_CRS),
                overwrite: self.overwrite,
                precision: self.precision.unwrap_or(DEFAULT_PRECISION),
                sequence: self.sequence,
                compress: self.compress,
            },
            parallel: self.parallel,
            max_workers: self.max_workers,
            tool_dir: self.tool_dir,
            converter: self
                .converter
                .unwrap_or_else(|| DEFAULT_CONVERTER.to_string()),
            patterns,
            summary_json: self.summary_json,
        };

        config.validate()?;
        Ok(config)
    }
}
