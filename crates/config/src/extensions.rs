use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "heic", "gif", "tif", "tiff", "webp", "bmp", "dng", "cr2", "nef", "arw", "raf", "orf", "rw2",
];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "avi", "wmv", "mkv", "3gp", "mts", "m2ts"];
const ARCHIVE_SUFFIXES: &[&str] = &[".zip", ".tar", ".tgz", ".tar.gz"];

/// Recognized file types.
///
/// Media extensions are stored lower-case without the leading dot. Archive
/// suffixes are stored lower-case *with* the leading dot, because some of them
/// (`.tar.gz`) span more than one extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Extensions {
    pub media: BTreeSet<String>,
    pub archives: Vec<String>,
}
impl Default for Extensions {
    fn default() -> Self {
        Self {
            media: IMAGE_EXTENSIONS.iter().chain(VIDEO_EXTENSIONS).map(|e| e.to_string()).collect(),
            archives: ARCHIVE_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}
impl Extensions {
    /// Lower-case everything and fix up leading dots of user-supplied values.
    pub fn normalize(&mut self) {
        self.media = self
            .media
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        let mut archives = Vec::with_capacity(self.archives.len());
        for suffix in &self.archives {
            let suffix = suffix.trim().trim_start_matches('.').to_ascii_lowercase();
            if suffix.is_empty() {
                continue;
            }
            let suffix = format!(".{suffix}");
            if !archives.contains(&suffix) {
                archives.push(suffix);
            }
        }
        self.archives = archives;
    }

    /// Whether the path has a recognized media extension (case-insensitive).
    pub fn is_media(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.media.contains(&e.to_ascii_lowercase()))
    }

    /// Whether the file name ends with one of the configured archive suffixes.
    pub fn is_archive(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref()
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_ascii_lowercase)
            .is_some_and(|name| self.archives.iter().any(|suffix| name.len() > suffix.len() && name.ends_with(suffix)))
    }
}
