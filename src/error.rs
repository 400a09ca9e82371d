use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the vecbatch library.
///
/// Only setup-phase errors escape a run. Anything that goes wrong while
/// processing a single file is folded into that file's
/// [`TaskOutcome`](crate::TaskOutcome) instead.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// The external converter could not be located on the search path.
    #[error("Converter '{program}' not found on the search path. {hint}")]
    ConverterNotFound {
        /// Program name that was looked up
        program: String,
        /// Guidance for the user
        hint: String,
    },

    /// Invalid input glob pattern.
    #[error("Invalid input pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The invalid pattern
        pattern: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// An input file does not live under the source root.
    #[error("'{path}' is not located under source root '{root}'")]
    OutsideSourceRoot {
        /// Offending input path
        path: PathBuf,
        /// Source root it was resolved against
        root: PathBuf,
    },

    /// The worker pool could not be started.
    #[error("Failed to start worker pool: {message}")]
    WorkerPool {
        /// Error message
        message: String,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a converter-not-found error.
    #[must_use]
    pub fn converter_not_found(program: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::ConverterNotFound {
            program: program.into(),
            hint: hint.into(),
        }
    }

    /// Creates an invalid pattern error.
    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Creates an outside-source-root error.
    #[must_use]
    pub fn outside_source_root(path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self::OutsideSourceRoot {
            path: path.into(),
            root: root.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        Self::WorkerPool {
            message: e.to_string(),
        }
    }
}

impl From<globset::Error> for Error {
    fn from(e: globset::Error) -> Self {
        Self::InvalidPattern {
            pattern: e.glob().unwrap_or("<unknown>").to_string(),
            reason: e.kind().to_string(),
        }
    }
}
