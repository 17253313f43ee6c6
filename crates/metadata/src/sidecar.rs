//! Sidecar naming conventions.
//!
//! For a media file `IMG_0001(2).jpg` the following names are tried, most
//! specific first:
//!
//! | Priority | Candidate                                    |
//! |----------|----------------------------------------------|
//! | 1        | `IMG_0001(2).jpg.supplemental-metadata.json` |
//! | 2        | `IMG_0001(2).jpg.suppl.json`                 |
//! | 3        | `IMG_0001.jpg(2).json`                       |
//! | 4        | `IMG_0001.jpg.supplemental-metadata(2).json` |
//! | 5        | `IMG_0001(2).jpg.json`                       |
//! | 6        | `IMG_0001(2).json`                           |
//!
//! Rows 3 and 4 only apply to names carrying a `(N)` duplicate counter.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const SIDECAR_EXTENSION: &str = "json";
const VENDOR_SUFFIXES: &[&str] = &[".supplemental-metadata.json", ".suppl.json"];

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// `IMG_0001(2)` -> base `IMG_0001`, counter `2`.
regex!(COUNTER_REGEX, r"^(?P<base>.+)\((?P<n>\d+)\)$");
// `<name>.<ext>[.supplemental-metadata|.suppl|truncated variants][(N)].json`
regex!(SIDECAR_REGEX, r"(?i)^.+\.[a-z0-9]{2,5}(?:\.supp[a-z-]*)?(?:\(\d+\))?\.json$");
// Album and account level manifests that carry no per-file capture time.
regex!(
    NOISE_REGEX,
    r"(?i)^(?:metadata(?:\(\d+\))?|print-subscriptions|shared_album_comments|user-generated-memory-titles)\.json$"
);

/// Split a file name into `(stem, extension)`; dotfiles have no extension.
fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

/// Whether `name` has the `.json` extension (case-insensitive).
pub fn is_json(name: &str) -> bool {
    split_name(name).1.is_some_and(|ext| ext.eq_ignore_ascii_case(SIDECAR_EXTENSION))
}

/// Whether a JSON file name is an album/library manifest rather than a sidecar.
pub fn is_noise_manifest(name: &str) -> bool {
    NOISE_REGEX.is_match(name)
}

/// Whether a JSON file name follows one of the `<name>.<ext>...json` sidecar
/// conventions. Generic `<stem>.json` sidecars cannot be told apart from other
/// JSON without knowing the media file, so they do not match.
pub fn matches_known_pattern(name: &str) -> bool {
    SIDECAR_REGEX.is_match(name) || VENDOR_SUFFIXES.iter().any(|suffix| name.to_ascii_lowercase().ends_with(suffix))
}

/// Ordered, de-duplicated sidecar candidates for a media file.
pub fn candidates(media: impl AsRef<Path>) -> Vec<PathBuf> {
    let media = media.as_ref();
    let Some(name) = media.file_name().and_then(|n| n.to_str()) else {
        return Vec::new();
    };
    let parent = media.parent().unwrap_or_else(|| Path::new(""));
    let (stem, ext) = split_name(name);

    let mut names: Vec<String> = VENDOR_SUFFIXES.iter().map(|suffix| format!("{name}{suffix}")).collect();
    if let Some(ext) = ext
        && let Some(captures) = COUNTER_REGEX.captures(stem)
    {
        let (base, n) = (&captures["base"], &captures["n"]);
        names.push(format!("{base}.{ext}({n}).json"));
        names.push(format!("{base}.{ext}.supplemental-metadata({n}).json"));
    }
    names.push(format!("{name}.json"));
    names.push(format!("{stem}.json"));

    let mut unique: Vec<String> = Vec::with_capacity(names.len());
    for candidate in names {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique.into_iter().map(|n| parent.join(n)).collect()
}

/// The name a sidecar should take when its media file is renamed from
/// `old_media` to `new_media`.
///
/// The full media name is replaced when the sidecar starts with it, otherwise
/// the stem is. Sidecars that share neither (e.g. `IMG.jpg(1).json` belonging
/// to `IMG(1).jpg`) become `<new_media>.json`.
pub fn renamed(sidecar: &str, old_media: &str, new_media: &str) -> String {
    if let Some(rest) = sidecar.strip_prefix(old_media) {
        return format!("{new_media}{rest}");
    }
    let (old_stem, _) = split_name(old_media);
    let (new_stem, _) = split_name(new_media);
    if let Some(rest) = sidecar.strip_prefix(old_stem) {
        return format!("{new_stem}{rest}");
    }
    format!("{new_media}.{SIDECAR_EXTENSION}")
}
