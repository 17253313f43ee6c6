use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use time::UtcDateTime;

/// Read size used while hashing.
pub const HASH_BUFFER: usize = 1024 * 1024;

/// A file with its content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedFile {
    pub path: PathBuf,
    /// Hex-encoded BLAKE3 of the file bytes.
    pub hash: String,
    pub size: u64,
    pub modified: UtcDateTime,
}

/// Hash `path` on the blocking pool.
pub async fn hash_file(path: PathBuf) -> Result<HashedFile> {
    tokio::task::spawn_blocking(move || {
        let (hash, size, modified) = hash_blocking(&path)?;
        Ok::<_, io::Error>(HashedFile { path, hash, size, modified })
    })
    .await
    .or_raise(|| ErrorKind::Hash)?
    .or_raise(|| ErrorKind::Hash)
}

fn hash_blocking(path: &Path) -> io::Result<(String, u64, UtcDateTime)> {
    let mut file = File::open(path)?;
    let modified = file.metadata()?.modified()?.into();
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0; HASH_BUFFER];
    let mut size = 0u64;
    loop {
        let read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&buffer[..read]);
        size += read as u64;
    }
    Ok((hasher.finalize().to_string(), size, modified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_hash_matches_blake3() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IMG_0001.jpg");
        // Larger than one read to exercise the loop.
        let bytes: Vec<u8> = (0..(HASH_BUFFER + 4096)).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &bytes).unwrap();

        let hashed = hash_file(path.clone()).await.unwrap();
        assert_eq!(hashed.path, path);
        assert_eq!(hashed.size, bytes.len() as u64);
        assert_eq!(hashed.hash, blake3::hash(&bytes).to_string());
        assert_eq!(hashed.hash.len(), 64);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = hash_file(dir.path().join("gone.jpg")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Hash));
    }
}
