//! Library Error Types
//!
//! File-level failures are raised as a child of [`ErrorKind::Import`],
//! [`ErrorKind::Unindexed`] or [`ErrorKind::Reindex`] carrying the offending
//! path; the streams yield them as `Err` items and keep going. Any other kind
//! ends the pass.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A scratch file could not be filed into the library; it was left in place.
    #[display("unable to import file: {}", _0.display())]
    Import(#[error(not(source))] PathBuf),
    /// A file was moved into the library but its index record was not written.
    /// A reindex of the library recovers it.
    #[display("file filed but not indexed: {}", _0.display())]
    Unindexed(#[error(not(source))] PathBuf),
    /// A library file could not be recorded in the index.
    #[display("unable to index library file: {}", _0.display())]
    Reindex(#[error(not(source))] PathBuf),
    /// A directory below the walk root could not be listed.
    #[display("unable to list directory: {}", _0.display())]
    Walk(#[error(not(source))] PathBuf),
    /// The scratch root exists but could not be listed.
    #[display("unable to list scratch directories: {}", _0.display())]
    Scratch(#[error(not(source))] PathBuf),
    #[display("unable to hash file contents")]
    Hash,
    #[display("unable to move file")]
    Move,
    #[display("index read or write failed")]
    Index,
    #[display("unable to resolve capture timestamp")]
    Metadata,
    #[display("archive extraction pass failed")]
    Extract,
}

impl ErrorKind {
    /// Whether the error only affects a single file (the pass carries on).
    pub fn is_per_file(&self) -> bool {
        matches!(self, Self::Import(_) | Self::Unindexed(_) | Self::Reindex(_) | Self::Walk(_))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Hash | Self::Move | Self::Index)
    }
}
