use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// `IMG_0001.jpg` -> (`IMG_0001`, `.jpg`); names without an extension, and
/// dotfiles, have an empty suffix.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    }
}

/// First free path in `directory` for `name`, suffixing `_1`, `_2`, ... before
/// the extension while the name is taken.
pub async fn unique_destination(directory: &Path, name: &str) -> io::Result<PathBuf> {
    let candidate = directory.join(name);
    if !fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }
    let (base, extension) = split_extension(name);
    let mut counter = 1u64;
    loop {
        let candidate = directory.join(format!("{base}_{counter}{extension}"));
        if !fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        counter += 1;
    }
}

/// Rename `source` to `destination`, falling back to copy-then-delete when they
/// are on different filesystems. The fallback preserves the modification time.
pub async fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            let modified = fs::metadata(source).await?.modified()?;
            fs::copy(source, destination).await?;
            filetime::set_file_mtime(destination, filetime::FileTime::from_system_time(modified))?;
            fs::remove_file(source).await
        },
        Err(err) => Err(err),
    }
}
