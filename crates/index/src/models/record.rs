use crate::error::{Error, ErrorKind};
use exn::{OptionExt, ResultExt};
use std::path::PathBuf;
use time::UtcDateTime;

/// The canonical location of one piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupRecord {
    /// Hex-encoded BLAKE3 hash of the file bytes; the unique key.
    pub hash: String,
    /// File size in bytes.
    pub size: u64,
    /// Path relative to the library root.
    pub path: PathBuf,
    /// Modification time of the filed copy (second precision).
    pub mtime: UtcDateTime,
}

#[derive(sqlx::FromRow)]
pub(crate) struct RecordRow {
    pub(crate) hash: String,
    pub(crate) size: i64,
    pub(crate) path: String,
    pub(crate) mtime: i64,
}
impl TryFrom<&DedupRecord> for RecordRow {
    type Error = Error;
    fn try_from(record: &DedupRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            hash: record.hash.clone(),
            size: i64::try_from(record.size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            // sqlx hates paths.
            path: record.path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string(),
            mtime: record.mtime.unix_timestamp(),
        })
    }
}
impl TryFrom<RecordRow> for DedupRecord {
    type Error = Error;
    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        Ok(Self {
            hash: row.hash,
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            path: PathBuf::from(row.path),
            mtime: UtcDateTime::from_unix_timestamp(row.mtime).or_raise(|| ErrorKind::InvalidData("mtime"))?,
        })
    }
}
