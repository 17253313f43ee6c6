//! Archive discovery and extraction.
//!
//! Archives found in the input directory are extracted into one persistent
//! scratch directory each (`<input>/.tmp_extracted/extract_<name>`). Zip and
//! tar (plain or gzip) archives are supported. Only media files and their JSON
//! sidecars are written; everything else in an export (album manifests, HTML
//! browsers, resource forks, hidden files) is skipped.
//!
//! Extraction is resumable: members whose target already exists are left
//! alone, and bytes land in a hidden `.partial` file that is renamed into
//! place once complete. An archive is deleted only after it yields at least
//! one file, and is otherwise retained for inspection.
//!
//! Member names are untrusted. See [`path`] for the checks that keep every
//! write inside the archive's scratch directory.

mod archive;
pub mod error;
mod member;
pub mod path;
mod stream;
mod unpack;

pub use crate::archive::{Archive, ArchiveFormat, SCRATCH_PREFIX, discover, fingerprint, scratch_dir_name};
pub use crate::member::{MemberKind, classify};
pub use crate::stream::{ExtractEvent, ExtractSummary, extract, extract_all};
pub use crate::unpack::ArchiveReport;
