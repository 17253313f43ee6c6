//! Repository for dedup records.

use crate::error::{ErrorKind, Result};
use crate::models::{DedupRecord, RecordRow};
use crate::{Batch, Database};
use exn::ResultExt;
use sqlx::{Executor, Sqlite, SqlitePool};

/// Fetch the record for `hash` using any executor (pool or open transaction).
pub(crate) async fn fetch<'e, E>(executor: E, hash: &str) -> Result<Option<DedupRecord>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<RecordRow> = sqlx::query_as(include_str!("../queries/lookup.sql"))
        .bind(hash)
        .fetch_optional(executor)
        .await
        .or_raise(|| ErrorKind::Database)?;
    row.map(DedupRecord::try_from).transpose()
}

/// Insert or replace the record for `record.hash` using any executor.
pub(crate) async fn store<'e, E>(executor: E, record: &DedupRecord) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = RecordRow::try_from(record)?;
    sqlx::query(include_str!("../queries/upsert.sql"))
        .bind(row.hash)
        .bind(row.size)
        .bind(row.path)
        .bind(row.mtime)
        .execute(executor)
        .await
        .or_raise(|| ErrorKind::Database)?;
    Ok(())
}

/// Repository for the hash → canonical location mapping.
///
/// Keyed by content hash: at most one record exists per hash, and writing a
/// record for a known hash silently replaces the previous location. The index
/// therefore reflects "last known location", not provenance history.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up the record filed under `hash`, if any.
    pub async fn lookup(&self, hash: impl AsRef<str>) -> Result<Option<DedupRecord>> {
        fetch(&self.pool, hash.as_ref()).await
    }

    /// Insert-or-replace a single record in its own implicit transaction.
    pub async fn upsert(&self, record: &DedupRecord) -> Result<()> {
        store(&self.pool, record).await
    }

    /// Number of records in the index.
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("record count"))
    }

    /// Every record, ordered by path then hash.
    pub async fn list(&self) -> Result<Vec<DedupRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(include_str!("../queries/list.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(DedupRecord::try_from).collect()
    }

    /// Open a bulk-load session committing every `size` records.
    ///
    /// The batch owns the index's only connection until it is finished or
    /// dropped; see [`Batch`].
    pub async fn batch(&self, size: usize) -> Result<Batch> {
        Batch::begin(self.pool.clone(), size).await
    }
}
