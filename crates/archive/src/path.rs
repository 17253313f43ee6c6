//! Member path validation.
//!
//! Two layers keep archive members inside their scratch directory: a lexical
//! pass over the member name ([`normalize`]) and a filesystem pass over the
//! final target ([`is_contained`]) that resolves symlinks already on disk.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Normalize an archive member name into a relative path.
///
/// Returns `None` for names that are absolute, carry a platform prefix,
/// contain NUL bytes, climb above their root with `..`, or are empty after
/// normalization. Backslashes are treated as separators since archives built
/// on Windows frequently use them.
pub fn normalize(name: &str) -> Option<PathBuf> {
    let name = name.replace('\\', "/");
    let mut components = Vec::new();
    for component in Path::new(&name).components() {
        match component {
            Component::Normal(s) => {
                if s.as_encoded_bytes().contains(&0) {
                    return None;
                }
                components.push(s);
            },
            Component::CurDir => {},
            Component::RootDir | Component::Prefix(_) => return None,
            Component::ParentDir => {
                components.pop()?;
            },
        }
    }
    match components.is_empty() {
        true => None,
        false => Some(components.into_iter().collect()),
    }
}

/// Whether `target` would be written inside `root`.
///
/// `root` must already be canonical. The deepest ancestor of `target` that
/// exists on disk is canonicalized, so a symlinked directory (or file) that
/// points elsewhere is caught even when the member name itself is clean.
pub fn is_contained(root: &Path, target: &Path) -> io::Result<bool> {
    let mut candidate = target;
    loop {
        match candidate.canonicalize() {
            Ok(resolved) => return Ok(resolved.starts_with(root)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => match candidate.parent() {
                Some(parent) => candidate = parent,
                None => return Ok(false),
            },
            Err(err) => return Err(err),
        }
    }
}
