// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, LsaError>;

/// Failures of the LSA pipeline stages.
///
/// Every variant is unrecoverable for the run that produced it: no partial
/// output file is ever left behind.
#[derive(Error, Debug)]
pub enum LsaError {
    /// Malformed header, odd-length data row or unparsable token.
    #[error("format error in {path:?} at line {line}: {message}")]
    Format {
        path: PathBuf,
        /// 1-based line number in the offending file.
        line: usize,
        message: String,
    },

    /// Requested rank or matrix shape is inconsistent with the data.
    #[error("dimension error: {0}")]
    Dimension(String),

    /// The rescaler could not derive its output path from the input path.
    #[error("cannot derive output path from {0:?}: expected a '.<digits>.LSA' suffix")]
    PathFormat(PathBuf),

    /// More entries were requested than singular values are available.
    #[error("requested {requested} entries but only {available} singular values are stored")]
    Index { requested: usize, available: usize },

    /// Raising a singular value to the requested power has no finite result.
    #[error("singular value {value} at index {index} cannot be raised to the power {power}")]
    Divergence { index: usize, value: f64, power: f64 },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure reported by the dense linear algebra backend.
    #[error("linear algebra backend error: {0}")]
    Linalg(String),
}

impl LsaError {
    pub(crate) fn format<P: Into<PathBuf>, S: Into<String>>(path: P, line: usize, message: S) -> Self {
        LsaError::Format {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    pub(crate) fn dimension<S: Into<String>>(message: S) -> Self {
        LsaError::Dimension(message.into())
    }

    pub(crate) fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        LsaError::Io {
            path: path.into(),
            source,
        }
    }
}
