//! Placement of extracted media into the library.
//!
//! Every media file in a scratch directory is hashed and looked up in the
//! dedup index. Known content is discarded; new content is moved to
//! `<library>/YYYY/MM/` (from its sidecar capture time) or to the undated
//! bucket, under a collision-free name, and recorded in the index.
//!
//! The primary entry point is [`sort`], which streams one [`Placement`] per
//! file; [`sort_media`] drives it to completion and returns the counters.

mod cleanup;
mod destination;
mod file;
mod stream;

pub use self::cleanup::{prune_empty_dirs, remove_leftover_sidecars};
pub use self::destination::{move_file, unique_destination};
pub use self::file::{Placement, place_file};
pub use self::stream::{SortEvent, SortSummary, scratch_directories, sort, sort_media};
