//! Bulk-load session.

use crate::db::{BULK_PRAGMAS, DEFAULT_PRAGMAS};
use crate::error::{ErrorKind, Result};
use crate::models::DedupRecord;
use crate::repo::{fetch, store};
use exn::{OptionExt, ResultExt};
use sqlx::{Sqlite, SqlitePool, Transaction};

/// A bulk-load session over the index.
///
/// Durability is relaxed for the lifetime of the batch (`synchronous = OFF`,
/// larger page cache) and writes are grouped into transactions that are
/// committed every `size` records, which bounds both memory use and the amount
/// of work lost if the process dies mid-import.
///
/// Reads go through the open transaction, so a record upserted earlier in the
/// same batch is visible to later lookups even before it is committed.
///
/// **Crash window:** records written since the last commit are lost if the
/// process dies. Callers that move files before recording them must treat a
/// full reindex of the library as the recovery path.
///
/// Call [`finish`](Self::finish) to commit the tail and restore normal
/// durability. Dropping a batch rolls back the uncommitted window only.
pub struct Batch {
    pool: SqlitePool,
    tx: Option<Transaction<'static, Sqlite>>,
    size: usize,
    pending: usize,
    committed: u64,
}
impl Batch {
    pub(crate) async fn begin(pool: SqlitePool, size: usize) -> Result<Self> {
        // Must happen outside of a transaction (SQLite refuses to change the
        // safety level inside one). The pool has a single connection, so the
        // transaction below runs on the same connection.
        sqlx::query(BULK_PRAGMAS).execute(&pool).await.or_raise(|| ErrorKind::Database)?;
        let tx = pool.begin().await.or_raise(|| ErrorKind::Database)?;
        tracing::debug!(size, "bulk index session started");
        Ok(Self {
            pool,
            tx: Some(tx),
            size: size.max(1),
            pending: 0,
            committed: 0,
        })
    }

    fn tx(&mut self) -> Result<&mut Transaction<'static, Sqlite>> {
        self.tx.as_mut().ok_or_raise(|| ErrorKind::Database)
    }

    /// Look up `hash`, including records written earlier in this batch.
    pub async fn lookup(&mut self, hash: impl AsRef<str>) -> Result<Option<DedupRecord>> {
        let tx = self.tx()?;
        fetch(&mut **tx, hash.as_ref()).await
    }

    /// Insert-or-replace a record, committing when the window is full.
    pub async fn upsert(&mut self, record: &DedupRecord) -> Result<()> {
        let tx = self.tx()?;
        store(&mut **tx, record).await?;
        self.pending += 1;
        if self.pending >= self.size {
            self.commit().await?;
            self.tx = Some(self.pool.begin().await.or_raise(|| ErrorKind::Database)?);
        }
        Ok(())
    }

    /// Records written but not yet committed.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Records committed so far.
    pub fn committed(&self) -> u64 {
        self.committed
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await.or_raise(|| ErrorKind::Database)?;
            self.committed += self.pending as u64;
            tracing::debug!(records = self.pending, total = self.committed, "committed index batch");
            self.pending = 0;
        }
        Ok(())
    }

    /// Commit outstanding records and restore normal durability settings.
    ///
    /// Returns the total number of records committed by this batch.
    pub async fn finish(mut self) -> Result<u64> {
        self.commit().await?;
        sqlx::query(DEFAULT_PRAGMAS).execute(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        Ok(self.committed)
    }
}
