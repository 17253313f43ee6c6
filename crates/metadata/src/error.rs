//! Metadata Error Types
//!
//! Broken sidecars are never errors (they simply yield no timestamp); the only
//! failure is not being able to inspect the media file itself.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A metadata error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for metadata operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The media file's own filesystem metadata could not be read.
    #[display("unable to read file metadata: {}", _0.display())]
    Metadata(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
