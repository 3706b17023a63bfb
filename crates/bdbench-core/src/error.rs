//! Error types for record parsing and blob decoding.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding and parsing a blob.
#[derive(Error, Debug)]
pub enum Error {
    /// A tabular line could not be mapped onto its dataset schema.
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord {
        /// 1-based line number within the inflated blob.
        line: usize,
        /// Description of what's wrong.
        reason: String,
    },

    /// Dataset name not recognized.
    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),

    /// Size tier not recognized.
    #[error("unknown size tier '{0}' (expected tiny, 1node/mid or 5nodes/large)")]
    UnknownSizeTier(String),

    /// Deflate stream could not be inflated.
    #[error("inflate error: {0}")]
    Inflate(#[source] std::io::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }
}
