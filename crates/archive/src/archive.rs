use crate::error::{ErrorKind, Result};
use derive_more::Display;
use exn::ResultExt;
use std::io;
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tokio::fs;
use trove_config::Extensions;

/// Prefix of every per-archive scratch directory.
pub const SCRATCH_PREFIX: &str = "extract_";

/// Archive formats that can actually be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ArchiveFormat {
    #[display("zip")]
    Zip,
    #[display("tar")]
    Tar,
    /// `.tar.gz` or `.tgz`.
    #[display("tar.gz")]
    TarGz,
}
impl ArchiveFormat {
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let name = path.as_ref().file_name()?.to_string_lossy().to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// An archive found in the input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: UtcDateTime,
    /// Identity for logs only; never used for dedup.
    pub fingerprint: String,
    /// `None` when the suffix was configured but cannot be extracted.
    pub format: Option<ArchiveFormat>,
}
impl Archive {
    /// Scratch directory that this archive extracts into.
    pub fn scratch_dir(&self, scratch_root: impl AsRef<Path>) -> PathBuf {
        scratch_root.as_ref().join(scratch_dir_name(&self.name))
    }
}

/// `Takeout-001.zip` -> `extract_Takeout-001_zip`
pub fn scratch_dir_name(archive_name: &str) -> String {
    format!("{SCRATCH_PREFIX}{}", archive_name.replace('.', "_"))
}

/// BLAKE3 of `"{name}:{size}:{mtime}"`.
pub fn fingerprint(name: &str, size: u64, modified: UtcDateTime) -> String {
    blake3::hash(format!("{name}:{size}:{}", modified.unix_timestamp()).as_bytes()).to_string()
}

/// List archives directly inside `input`, sorted by case-insensitive name.
///
/// A missing input directory is not an error (there is simply nothing to do).
pub async fn discover(input: impl AsRef<Path>, extensions: &Extensions) -> Result<Vec<Archive>> {
    let input = input.as_ref();
    let mut entries = match fs::read_dir(input).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(input = %input.display(), "input directory does not exist");
            return Ok(Vec::new());
        },
        Err(err) => return Err(err).or_raise(|| ErrorKind::Discovery(input.to_path_buf())),
    };

    let mut archives = Vec::new();
    while let Some(entry) = entries.next_entry().await.or_raise(|| ErrorKind::Discovery(input.to_path_buf()))? {
        let path = entry.path();
        if !extensions.is_archive(&path) {
            continue;
        }
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => continue,
            Err(err) => {
                tracing::warn!(archive = %path.display(), error = %err, "unable to stat archive, skipping");
                continue;
            },
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        let modified = metadata.modified().map(UtcDateTime::from).unwrap_or(UtcDateTime::UNIX_EPOCH);
        archives.push(Archive {
            fingerprint: fingerprint(&name, metadata.len(), modified),
            format: ArchiveFormat::from_path(&path),
            size: metadata.len(),
            path,
            name,
            modified,
        });
    }
    archives.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()).then_with(|| a.name.cmp(&b.name)));
    Ok(archives)
}
