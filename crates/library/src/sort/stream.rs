use crate::error::{ErrorKind, Result};
use crate::hash::hash_file;
use crate::sort::cleanup::{prune_empty_dirs, remove_leftover_sidecars};
use crate::sort::file::{Placement, place_file};
use crate::walk::{sort_paths, walk};
use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::pin;
use tokio::fs;
use trove_archive::SCRATCH_PREFIX;
use trove_config::Config;
use trove_index::Repository;

/// Progress events emitted by [`sort`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started): exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete): exactly once, with the
///    number of scratch directories found.
/// 3. For each scratch directory, zero or more [`Placed`](Self::Placed)
///    followed by one [`DirectoryComplete`](Self::DirectoryComplete).
/// 4. [`Complete`](Self::Complete): exactly once.
///
/// Per-file failures are yielded as `Err` items ([`ErrorKind::is_per_file`])
/// without ending the stream; any other error is the last item.
#[derive(Debug)]
pub enum SortEvent {
    Started,
    DiscoveryComplete(u64),
    Placed(Placement),
    DirectoryComplete(PathBuf),
    Complete,
}

/// Counters for one sort pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortSummary {
    pub directories: u64,
    pub added: u64,
    pub duplicates: u64,
    pub errors: u64,
}

/// `extract_*` directories directly below `scratch_root`, case-insensitive order.
pub async fn scratch_directories(scratch_root: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(scratch_root).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err).or_raise(|| ErrorKind::Scratch(scratch_root.to_path_buf())),
    };
    let mut directories = Vec::new();
    while let Some(entry) = entries.next_entry().await.or_raise(|| ErrorKind::Scratch(scratch_root.to_path_buf()))? {
        let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
        if is_dir && entry.file_name().to_string_lossy().starts_with(SCRATCH_PREFIX) {
            directories.push(entry.path());
        }
    }
    directories.sort_by_cached_key(|dir| (dir.file_name().map(|n| n.to_string_lossy().to_lowercase()), dir.clone()));
    Ok(directories)
}

/// Streams [`SortEvent`]s while filing the media of every scratch directory
/// into the library.
///
/// Within a directory files are hashed concurrently (`workers.hashing` at a
/// time) and placed one by one as their hashes arrive, all through a single
/// index [`Batch`](trove_index::Batch). After each directory, leftover JSON is
/// deleted and empty directories are pruned.
pub fn sort<'a>(config: &'a Config, repository: &'a Repository) -> impl Stream<Item = Result<SortEvent>> + 'a {
    stream!({
        yield Ok(SortEvent::Started);

        let directories = match scratch_directories(&config.scratch_root()).await {
            Ok(directories) => directories,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        yield Ok(SortEvent::DiscoveryComplete(u64::try_from(directories.len()).unwrap_or(u64::MAX)));

        let mut batch = match repository.batch(config.index.batch_size).await.or_raise(|| ErrorKind::Index) {
            Ok(batch) => batch,
            Err(e) => {
                yield Err(e);
                return;
            },
        };

        for directory in directories {
            tracing::info!(directory = %directory.display(), "sorting scratch directory");
            let mut files = Vec::new();
            for await entry in walk(&directory) {
                match entry {
                    Ok(path) if config.extensions.is_media(&path) => files.push(path),
                    Ok(_) => {},
                    Err(e) => yield Err(e),
                }
            }
            sort_paths(&mut files);

            let mut hashed = futures::stream::iter(files)
                .map(|path| async move {
                    let source = path.clone();
                    hash_file(path).await.or_raise(|| ErrorKind::Import(source))
                })
                .buffer_unordered(config.workers.hashing);
            while let Some(result) = hashed.next().await {
                match result {
                    Ok(file) => yield place_file(config, &mut batch, file).await.map(SortEvent::Placed),
                    Err(e) => yield Err(e),
                }
            }

            let sidecars = remove_leftover_sidecars(&directory).await;
            match prune_empty_dirs(&directory, false).await {
                Ok(pruned) => tracing::debug!(directory = %directory.display(), sidecars, pruned, "scratch directory cleaned"),
                Err(err) => tracing::warn!(directory = %directory.display(), error = %err, "unable to prune scratch directory"),
            }
            yield Ok(SortEvent::DirectoryComplete(directory));
        }

        match batch.finish().await.or_raise(|| ErrorKind::Index) {
            Ok(committed) => tracing::debug!(committed, "index batch finished"),
            Err(e) => {
                yield Err(e);
                return;
            },
        }
        yield Ok(SortEvent::Complete);
    })
}

/// Run a full sort pass, logging per-file failures.
///
/// Returns an error only when the pass itself cannot continue (scratch root
/// unreadable, index unavailable).
pub async fn sort_media(config: &Config, repository: &Repository) -> Result<SortSummary> {
    let mut summary = SortSummary::default();
    let mut events = pin!(sort(config, repository));
    while let Some(event) = events.next().await {
        match event {
            Ok(SortEvent::DiscoveryComplete(count)) => tracing::info!(directories = count, "scratch discovery complete"),
            Ok(SortEvent::Placed(Placement::Filed { .. })) => summary.added += 1,
            Ok(SortEvent::Placed(Placement::Duplicate { .. })) => summary.duplicates += 1,
            Ok(SortEvent::DirectoryComplete(_)) => summary.directories += 1,
            Ok(SortEvent::Started | SortEvent::Complete) => {},
            Err(err) if matches!(&*err, ErrorKind::Unindexed(_)) => {
                summary.errors += 1;
                tracing::error!(error = ?err, "file is in the library but not indexed, reindex to recover");
            },
            Err(err) if err.is_per_file() => {
                summary.errors += 1;
                tracing::error!(error = ?err, "file left in scratch");
            },
            Err(err) => return Err(err),
        }
    }
    Ok(summary)
}
