use crate::walk::walk;
use futures::StreamExt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use trove_metadata::sidecar;

/// Delete every `.json` file left below `directory` (orphaned sidecars and
/// anything that was never claimed by a media file). Returns the number removed.
pub async fn remove_leftover_sidecars(directory: &Path) -> u64 {
    let mut removed = 0;
    let mut files = std::pin::pin!(walk(directory));
    while let Some(entry) = files.next().await {
        let path = match entry {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(error = ?err, "unable to scan scratch directory for leftovers");
                continue;
            },
        };
        if !path.file_name().is_some_and(|name| sidecar::is_json(&name.to_string_lossy())) {
            continue;
        }
        match fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(err) => tracing::warn!(path = %path.display(), error = %err, "unable to remove leftover sidecar"),
        }
    }
    removed
}

/// Remove empty directories below `root`, deepest first, so that directories
/// which only contained empty directories go too. `root` itself is removed
/// when it ends up empty unless `keep_root` is set. Returns the number removed.
pub async fn prune_empty_dirs(root: &Path, keep_root: bool) -> io::Result<u64> {
    let mut directories = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(current) = stack.pop() {
        let mut entries = match fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                stack.push(entry.path());
            }
        }
        directories.push(current);
    }
    if keep_root {
        directories.retain(|dir| dir != root);
    }
    directories.sort_by_key(|dir: &PathBuf| std::cmp::Reverse(dir.components().count()));

    let mut removed = 0;
    for directory in directories {
        // Fails for directories that still hold files; those stay.
        if fs::remove_dir(&directory).await.is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;

    #[tokio::test]
    async fn test_remove_leftover_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        std_fs::create_dir_all(dir.path().join("Takeout/Trip")).unwrap();
        std_fs::write(dir.path().join("Takeout/Trip/IMG_0009.jpg.json"), b"{}").unwrap();
        std_fs::write(dir.path().join("Takeout/orphan.JSON"), b"{}").unwrap();
        std_fs::write(dir.path().join("Takeout/Trip/IMG_0010.jpg"), b"kept").unwrap();

        assert_eq!(remove_leftover_sidecars(dir.path()).await, 2);
        assert!(dir.path().join("Takeout/Trip/IMG_0010.jpg").exists());
        assert!(!dir.path().join("Takeout/orphan.JSON").exists());
    }

    #[tokio::test]
    async fn test_prune_empty_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("extract_a_zip");
        std_fs::create_dir_all(root.join("Takeout/Photos/Trip")).unwrap();
        std_fs::create_dir_all(root.join("Takeout/Other")).unwrap();
        std_fs::write(root.join("Takeout/Other/failed.jpg"), b"left behind").unwrap();

        assert_eq!(prune_empty_dirs(&root, false).await.unwrap(), 2);
        assert!(!root.join("Takeout/Photos").exists());
        assert!(root.join("Takeout/Other/failed.jpg").exists());

        std_fs::remove_file(root.join("Takeout/Other/failed.jpg")).unwrap();
        assert_eq!(prune_empty_dirs(&root, false).await.unwrap(), 3);
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_prune_keeps_root() {
        let dir = tempfile::tempdir().unwrap();
        std_fs::create_dir_all(dir.path().join("a/b")).unwrap();
        assert_eq!(prune_empty_dirs(dir.path(), true).await.unwrap(), 2);
        assert!(dir.path().exists());
        assert_eq!(prune_empty_dirs(&dir.path().join("missing"), true).await.unwrap(), 0);
    }
}
