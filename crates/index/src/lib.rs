//! SQLite dedup index for the trove library.
//!
//! The index maps a content hash (BLAKE3 of the file bytes) to the single
//! location that content was filed under. It answers one question quickly:
//! "has this exact content already been filed?"
//!
//! The index is **not** the source of truth; the library directory is. Records
//! are never validated against the filesystem, so a record can point at a file
//! that was moved or deleted behind the pipeline's back, and a file can be
//! filed without a record if the process dies between moving it and committing
//! its record. Both are repaired by a full reindex of the library, which is
//! idempotent.
//!
//! # Sessions
//! The connection pool holds exactly one connection, so the index behaves as a
//! single logical session and writers never contend for the database lock.
//! Bulk imports go through a [`Batch`], which owns that session for its whole
//! lifetime; do not call [`Repository`] methods while a batch is open.

mod batch;
mod db;
pub mod error;
mod models;
mod repo;

pub use crate::batch::Batch;
pub use crate::db::Database;
pub use crate::models::DedupRecord;
pub use crate::repo::Repository;
