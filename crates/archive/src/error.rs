//! Archive Error Types
//!
//! Archive-level failures are raised as a child of [`ErrorKind::Archive`] so
//! the offending archive path is always at the root of the error tree.
//! Member-level problems never become errors; they are counted in the
//! [`ArchiveReport`](crate::ArchiveReport).

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The archive could not be extracted; it has been left in place.
    #[display("archive not extracted: {}", _0.display())]
    Archive(#[error(not(source))] PathBuf),
    /// The input directory exists but could not be listed.
    #[display("unable to list input directory: {}", _0.display())]
    Discovery(#[error(not(source))] PathBuf),
    #[display("unable to open archive")]
    Open,
    #[display("archive is corrupt or truncated")]
    Corrupt,
    #[display("unsupported archive format: {_0}")]
    Unsupported(#[error(not(source))] String),
    /// Nothing was extracted (and nothing had been extracted by a previous run).
    #[display("archive contains no media or sidecar files")]
    Empty,
    #[display("I/O error")]
    Io,
    /// An extraction thread panicked or its task was cancelled.
    #[display("extraction worker failed")]
    Worker,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Open | Self::Io | Self::Worker)
    }
}
