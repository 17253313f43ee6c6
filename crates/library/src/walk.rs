//! Recursive directory listing.

use crate::error::{ErrorKind, Result};
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    File(PathBuf),
    Descend(PathBuf),
    Skip,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().as_encoded_bytes().starts_with(b".")
}

async fn process_entry(entry: DirEntry) -> io::Result<WalkEntry> {
    if is_hidden(&entry) {
        return Ok(WalkEntry::Skip);
    }
    // Does not follow symlinks, so linked files and directories are skipped.
    let file_type = entry.file_type().await?;
    if file_type.is_dir() {
        return Ok(WalkEntry::Descend(entry.path()));
    }
    if file_type.is_file() {
        return Ok(WalkEntry::File(entry.path()));
    }
    Ok(WalkEntry::Skip)
}

/// Stream every regular file below `root`, skipping hidden entries (names
/// starting with `.`, which covers index files, logs and partial writes).
///
/// A missing `root` yields nothing. Directories that cannot be listed are
/// yielded as [`ErrorKind::Walk`] errors and the walk carries on. Order is
/// unspecified; see [`sort_paths`].
pub fn walk(root: impl Into<PathBuf>) -> impl Stream<Item = Result<PathBuf>> {
    let mut stack = vec![root.into()];
    stream! {
        'dirs: while let Some(current) = stack.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => {
                    yield Err(err).or_raise(|| ErrorKind::Walk(current.clone()));
                    continue 'dirs;
                }
            };
            'entries: loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break 'entries,
                    Err(err) => {
                        yield Err(err).or_raise(|| ErrorKind::Walk(current.clone()));
                        continue 'dirs;
                    }
                };
                match process_entry(entry).await {
                    Ok(WalkEntry::File(path)) => yield Ok(path),
                    Ok(WalkEntry::Descend(path)) => stack.push(path),
                    Ok(WalkEntry::Skip) => {},
                    Err(err) => yield Err(err).or_raise(|| ErrorKind::Walk(current.clone())),
                }
            }
        }
    }
}

/// Sort by parent directory, then by lower-cased file name.
pub fn sort_paths(paths: &mut [PathBuf]) {
    paths.sort_by_cached_key(|path| {
        let name = path.file_name().map(|n| n.to_string_lossy().to_lowercase()).unwrap_or_default();
        (path.parent().map(Path::to_path_buf).unwrap_or_default(), name, path.clone())
    });
}
