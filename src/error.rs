//! Unified error handling for the track-atlas library.
//!
//! One error type covers the whole pipeline: opening and parsing the index
//! ledger, decoding record blobs, key lookups and FIT ingestion. Projection
//! of an invalid sample is deliberately not an error anywhere - it is a
//! per-sample skip signal expressed as `Option`.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for track-atlas operations.
#[derive(Debug, Error)]
pub enum AtlasError {
    /// Underlying file I/O failure (missing ledger, unreadable blob, ...).
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A line of a text ledger did not parse. Carries the file and the
    /// 1-based line number so the message reads `path:line: reason`.
    #[error("{}:{}: {}", .file.display(), .line, .message)]
    Parse {
        file: PathBuf,
        line: usize,
        message: String,
    },

    /// A record blob does not match the binary layout it promises.
    #[error("decode: {message}")]
    Decode { message: String },

    /// `add` was called with a start timestamp already present in the index.
    #[error("{start}: activity already exists in index")]
    Duplicate { start: i64 },

    /// No activity with the given start timestamp, or no blob for a
    /// zero-sample activity.
    #[error("id not found: {start}")]
    NotFound { start: i64 },

    /// A FIT activity file could not be turned into a record.
    #[error("fit: {message}")]
    Ingest { message: String },
}

impl AtlasError {
    pub(crate) fn decode(message: impl Into<String>) -> Self {
        AtlasError::Decode {
            message: message.into(),
        }
    }
}

/// Result type alias for track-atlas operations.
pub type Result<T> = std::result::Result<T, AtlasError>;
