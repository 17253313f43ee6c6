//! Capture timestamp resolution from JSON sidecar files.
//!
//! Photo exports ship capture metadata next to each media file in a JSON
//! "sidecar" whose name follows one of several conventions (see
//! [`sidecar::candidates`]). [`resolve_timestamp`] walks those conventions in
//! priority order and falls back to the media file's modification time, which
//! is flagged as unreliable so the caller can file it into an undated bucket.

pub mod error;
pub mod sidecar;
mod timestamp;

pub use crate::timestamp::{CaptureTimestamp, parse_sidecar, resolve_timestamp};
