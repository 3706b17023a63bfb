//! Error types for the import pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during an import.
#[derive(Error, Debug)]
pub enum Error {
    /// The local cache has no blobs for a dataset. Fatal: the download step
    /// has not been run.
    #[error("no data found at {}", .path.display())]
    NoDataFound {
        /// The `<root>/<size>/<dataset>` directory that was listed.
        path: PathBuf,
    },

    /// A visited URL has no rank in the rankings collection.
    #[error("no page rank for '{url}' in the rankings collection")]
    JoinKeyNotFound {
        /// The `destURL` being joined.
        url: String,
    },

    /// A bulk insert hit an existing `_id`. Documents before the offending one
    /// were written.
    #[error("duplicate key in '{collection}' after {inserted} inserted: {message}")]
    DuplicateKey {
        /// Destination collection.
        collection: String,
        /// Documents of the batch written before the duplicate.
        inserted: usize,
        /// Store-provided detail.
        message: String,
    },

    /// Record parsing or inflation error.
    #[error(transparent)]
    Record(#[from] bdbench_core::Error),

    /// MongoDB error.
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// S3 error.
    #[error("S3 error: {0}")]
    S3(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A work queue was used after it was closed.
    #[error("work queue closed")]
    QueueClosed,

    /// A worker panicked while processing an item.
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error means the enclosing import cannot proceed at all,
    /// as opposed to one item failing.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::NoDataFound { .. } | Self::Config(_))
    }
}
