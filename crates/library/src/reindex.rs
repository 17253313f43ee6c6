//! Rebuild index records from the library directory.
//!
//! This is the repair path for every way the index can drift from the files on
//! disk: a crash between moving a file and committing its record, a lost batch
//! window, or files added to the library by hand.

use crate::error::{ErrorKind, Result};
use crate::hash::{HashedFile, hash_file};
use crate::walk::{sort_paths, walk};
use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use std::path::Path;
use std::pin::pin;
use trove_config::Config;
use trove_index::{DedupRecord, Repository};

/// Progress events emitted by [`reindex`], in the same order as the other
/// pipeline streams: `Started`, `DiscoveryComplete`, one `Indexed` per file,
/// `Complete`.
#[derive(Debug)]
pub enum ReindexEvent {
    Started,
    DiscoveryComplete(u64),
    Indexed(DedupRecord),
    Complete,
}

/// Counters for one reindex pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReindexSummary {
    pub indexed: u64,
    pub errors: u64,
}

/// Streams a record for every media file under `library_root`, upserting each
/// one through a single batch.
///
/// Files are hashed concurrently but consumed in walk order, so when two
/// library files share content the record always ends up pointing at the
/// later one, and repeated passes over an unchanged library write identical
/// records.
pub fn reindex<'a>(
    library_root: &'a Path,
    config: &'a Config,
    repository: &'a Repository,
) -> impl Stream<Item = Result<ReindexEvent>> + 'a {
    stream!({
        yield Ok(ReindexEvent::Started);

        let mut files = Vec::new();
        for await entry in walk(library_root) {
            match entry {
                Ok(path) if config.extensions.is_media(&path) => files.push(path),
                Ok(_) => {},
                Err(e) => yield Err(e),
            }
        }
        sort_paths(&mut files);
        yield Ok(ReindexEvent::DiscoveryComplete(u64::try_from(files.len()).unwrap_or(u64::MAX)));

        let mut batch = match repository.batch(config.index.batch_size).await.or_raise(|| ErrorKind::Index) {
            Ok(batch) => batch,
            Err(e) => {
                yield Err(e);
                return;
            },
        };

        let mut hashed = futures::stream::iter(files)
            .map(|path| async move {
                let source = path.clone();
                hash_file(path).await.or_raise(|| ErrorKind::Reindex(source))
            })
            .buffered(config.workers.hashing);
        while let Some(result) = hashed.next().await {
            let file = match result {
                Ok(file) => file,
                Err(e) => {
                    yield Err(e);
                    continue;
                },
            };
            let source = file.path.clone();
            let Some(record) = to_record(library_root, file) else {
                yield Err(exn::Exn::from(ErrorKind::Reindex(source)));
                continue;
            };
            match batch.upsert(&record).await.or_raise(|| ErrorKind::Index) {
                Ok(()) => yield Ok(ReindexEvent::Indexed(record)),
                Err(e) => yield Err(e).or_raise(|| ErrorKind::Reindex(source)),
            }
        }

        match batch.finish().await.or_raise(|| ErrorKind::Index) {
            Ok(committed) => tracing::debug!(committed, "index batch finished"),
            Err(e) => {
                yield Err(e);
                return;
            },
        }
        yield Ok(ReindexEvent::Complete);
    })
}

fn to_record(library_root: &Path, file: HashedFile) -> Option<DedupRecord> {
    let relative = file.path.strip_prefix(library_root).ok()?.to_path_buf();
    Some(DedupRecord {
        hash: file.hash,
        size: file.size,
        path: relative,
        mtime: file.modified,
    })
}

/// Run a full reindex of `library_root`, logging per-file failures.
pub async fn reindex_from_directory(
    library_root: impl AsRef<Path>,
    config: &Config,
    repository: &Repository,
) -> Result<ReindexSummary> {
    let library_root = library_root.as_ref();
    tracing::info!(library = %library_root.display(), "reindexing library");
    let mut summary = ReindexSummary::default();
    let mut events = pin!(reindex(library_root, config, repository));
    while let Some(event) = events.next().await {
        match event {
            Ok(ReindexEvent::DiscoveryComplete(count)) => tracing::info!(files = count, "library walk complete"),
            Ok(ReindexEvent::Indexed(record)) => {
                summary.indexed += 1;
                tracing::trace!(path = %record.path.display(), hash = %record.hash, "indexed");
            },
            Ok(ReindexEvent::Started | ReindexEvent::Complete) => {},
            Err(err) if err.is_per_file() => {
                summary.errors += 1;
                tracing::error!(error = ?err, "library file not indexed");
            },
            Err(err) => return Err(err),
        }
    }
    tracing::info!(indexed = summary.indexed, errors = summary.errors, "reindex complete");
    Ok(summary)
}
