use crate::error::{ErrorKind, Result};
use crate::hash::HashedFile;
use crate::sort::destination::{move_file, unique_destination};
use exn::{OptionExt, ResultExt};
use filetime::FileTime;
use std::path::{Path, PathBuf};
use tokio::fs;
use trove_config::Config;
use trove_index::{Batch, DedupRecord};
use trove_metadata::{resolve_timestamp, sidecar};

/// The outcome of (successfully) sorting a single scratch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// New content, moved into the library and recorded in the index.
    Filed {
        source: PathBuf,
        /// Library-relative destination, as recorded in the index.
        destination: PathBuf,
        /// Whether the destination directory came from a sidecar timestamp.
        dated: bool,
        sidecars: usize,
    },
    /// Content already filed; the scratch copy and its sidecars were deleted.
    Duplicate {
        source: PathBuf,
        /// Library-relative path of the copy that is already filed.
        existing: PathBuf,
    },
}

/// Sidecar candidates of `media` that exist as regular files.
async fn existing_sidecars(media: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for candidate in sidecar::candidates(media) {
        if fs::metadata(&candidate).await.is_ok_and(|m| m.is_file()) {
            found.push(candidate);
        }
    }
    found
}

async fn remove_quietly(path: &Path) {
    if let Err(err) = fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %err, "unable to remove scratch file");
    }
}

/// File one hashed scratch file into the library.
///
/// Duplicates (content already in the index, including records written earlier
/// in the same batch) are deleted together with their sidecars. New content is
/// moved into `YYYY/MM` (or the undated bucket), its sidecars follow it under
/// matching names, and a record is written through `batch`.
///
/// Failures before the move are raised as [`ErrorKind::Import`] and leave the
/// source in scratch. A failed index write after the move is raised as
/// [`ErrorKind::Unindexed`]. The batch also commits lazily, so a crash can
/// leave filed files without records; a reindex of the library restores them.
pub async fn place_file(config: &Config, batch: &mut Batch, file: HashedFile) -> Result<Placement> {
    let source = file.path.clone();
    let (placement, record) = place_file_inner(config, batch, file)
        .await
        .or_raise(|| ErrorKind::Import(source))?;
    if let Some(record) = record {
        batch
            .upsert(&record)
            .await
            .or_raise(|| ErrorKind::Index)
            .or_raise(|| ErrorKind::Unindexed(config.library.join(&record.path)))?;
        tracing::debug!(destination = %record.path.display(), hash = %record.hash, "filed");
    }
    Ok(placement)
}

/// Everything up to and including the move. Returns the record to write for
/// new content.
async fn place_file_inner(
    config: &Config,
    batch: &mut Batch,
    file: HashedFile,
) -> Result<(Placement, Option<DedupRecord>)> {
    let sidecars = existing_sidecars(&file.path).await;

    if let Some(existing) = batch.lookup(&file.hash).await.or_raise(|| ErrorKind::Index)? {
        for sidecar in &sidecars {
            remove_quietly(sidecar).await;
        }
        fs::remove_file(&file.path).await.or_raise(|| ErrorKind::Move)?;
        tracing::debug!(source = %file.path.display(), existing = %existing.path.display(), hash = %file.hash, "duplicate removed");
        return Ok((Placement::Duplicate { source: file.path, existing: existing.path }, None));
    }

    let timestamp = resolve_timestamp(&file.path).await.or_raise(|| ErrorKind::Metadata)?;
    let bucket = timestamp.bucket(&config.undated);
    let directory = config.library.join(&bucket);
    fs::create_dir_all(&directory).await.or_raise(|| ErrorKind::Move)?;

    let original_name = file.path.file_name().ok_or_raise(|| ErrorKind::Move)?.to_string_lossy().into_owned();
    let destination = unique_destination(&directory, &original_name).await.or_raise(|| ErrorKind::Move)?;
    move_file(&file.path, &destination).await.or_raise(|| ErrorKind::Move)?;
    let final_name = destination.file_name().ok_or_raise(|| ErrorKind::Move)?.to_string_lossy().into_owned();

    if timestamp.reliable {
        let capture = FileTime::from_unix_time(timestamp.datetime.unix_timestamp(), 0);
        if let Err(err) = filetime::set_file_mtime(&destination, capture) {
            tracing::warn!(destination = %destination.display(), error = %err, "unable to set capture time as mtime");
        }
    }

    let moved = move_sidecars(&sidecars, &directory, &original_name, &final_name).await;

    let relative = bucket.join(&final_name);
    let record = DedupRecord {
        hash: file.hash,
        size: file.size,
        path: relative.clone(),
        mtime: timestamp.datetime,
    };
    let placement = Placement::Filed {
        source: file.path,
        destination: relative,
        dated: timestamp.reliable,
        sidecars: moved,
    };
    Ok((placement, Some(record)))
}

/// Move sidecars next to the filed media under names that track its final
/// name. Sidecars that cannot be moved are deleted. Returns the number moved.
async fn move_sidecars(sidecars: &[PathBuf], directory: &Path, original_name: &str, final_name: &str) -> usize {
    let mut moved = 0;
    for sidecar in sidecars {
        let Some(sidecar_name) = sidecar.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let renamed = sidecar::renamed(&sidecar_name, original_name, final_name);
        let result = match unique_destination(directory, &renamed).await {
            Ok(target) => move_file(sidecar, &target).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => moved += 1,
            Err(err) => {
                tracing::warn!(sidecar = %sidecar.display(), error = %err, "unable to move sidecar, discarding");
                remove_quietly(sidecar).await;
            },
        }
    }
    moved
}
