//! Dedup-aware library management.
//!
//! Files extracted by [`trove_archive`] are hashed, checked against the
//! [`trove_index`] dedup index and filed into a date-partitioned library
//! ([`sort`]). [`reindex`] rebuilds index records from the library itself and
//! is the recovery path whenever the index and the files on disk disagree.
//! [`Pipeline`] ties the stages together.

pub mod error;
mod hash;
mod pipeline;
pub mod reindex;
pub mod sort;
mod walk;

pub use crate::hash::{HASH_BUFFER, HashedFile, hash_file};
pub use crate::pipeline::{Pipeline, RunSummary};
pub use crate::reindex::{ReindexEvent, ReindexSummary, reindex_from_directory};
pub use crate::sort::{Placement, SortEvent, SortSummary, sort_media};
pub use crate::walk::{sort_paths, walk};
