use std::path::Path;
use trove_config::Extensions;
use trove_metadata::sidecar;

const RESOURCE_FORK_DIR: &str = "__MACOSX";

/// What an archive member is, for the purpose of extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// A photo or video with a recognized extension.
    Media,
    /// A JSON file that may carry capture metadata for a media file.
    Sidecar,
    /// Directories, resource forks, manifests and anything unrecognized.
    Noise,
}
impl MemberKind {
    pub fn is_extracted(&self) -> bool {
        !matches!(self, Self::Noise)
    }
}

/// Dotfiles and dot-directories; `.` and `..` are left to path normalization.
fn is_hidden(segment: &str) -> bool {
    segment.starts_with('.') && segment != "." && segment != ".."
}

/// Classify an archive member by its (archive-internal) name.
pub fn classify(name: &str, extensions: &Extensions) -> MemberKind {
    let name = name.replace('\\', "/");
    if name.ends_with('/') || name.split('/').any(|segment| segment == RESOURCE_FORK_DIR || is_hidden(segment)) {
        return MemberKind::Noise;
    }
    let file_name = name.rsplit('/').next().unwrap_or(&name);
    if file_name.is_empty() {
        return MemberKind::Noise;
    }
    if extensions.is_media(Path::new(file_name)) {
        return MemberKind::Media;
    }
    if sidecar::is_json(file_name) {
        if sidecar::is_noise_manifest(file_name) {
            return MemberKind::Noise;
        }
        if !sidecar::matches_known_pattern(file_name) {
            tracing::debug!(member = %name, "extracting sidecar candidate with an unrecognized name");
        }
        return MemberKind::Sidecar;
    }
    MemberKind::Noise
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Takeout/Google Photos/Trip/IMG_0001.jpg", MemberKind::Media)]
    #[case("Takeout/Google Photos/Trip/VID_0001.MP4", MemberKind::Media)]
    #[case("IMG_0001.HEIC", MemberKind::Media)]
    #[case("Takeout/Google Photos/Trip/IMG_0001.jpg.json", MemberKind::Sidecar)]
    #[case("Takeout/Google Photos/Trip/IMG_0001.jpg.supplemental-metadata.json", MemberKind::Sidecar)]
    #[case("Takeout/Google Photos/Trip/IMG_0001.json", MemberKind::Sidecar)]
    #[case("Takeout/Google Photos/Trip/metadata.json", MemberKind::Noise)]
    #[case("Takeout/Google Photos/Trip/metadata(1).json", MemberKind::Noise)]
    #[case("Takeout/Google Photos/print-subscriptions.json", MemberKind::Noise)]
    #[case("Takeout/Google Photos/shared_album_comments.json", MemberKind::Noise)]
    #[case("Takeout/Google Photos/user-generated-memory-titles.json", MemberKind::Noise)]
    #[case("Takeout/Google Photos/Trip/", MemberKind::Noise)]
    #[case("__MACOSX/Trip/._IMG_0001.jpg", MemberKind::Noise)]
    #[case("Trip/__MACOSX/IMG_0001.jpg", MemberKind::Noise)]
    #[case("Takeout/archive_browser.html", MemberKind::Noise)]
    #[case("Takeout/notes.txt", MemberKind::Noise)]
    #[case("Photos/.IMG_0005.jpg", MemberKind::Noise)]
    #[case("Photos/.album/IMG_0006.jpg", MemberKind::Noise)]
    #[case("Photos/.IMG_0005.jpg.json", MemberKind::Noise)]
    #[case("./Photos/IMG_0007.jpg", MemberKind::Media)]
    #[case("Photos/../IMG_0008.jpg", MemberKind::Media)]
    fn test_classify(#[case] name: &str, #[case] expected: MemberKind) {
        assert_eq!(classify(name, &Extensions::default()), expected);
    }

    #[test]
    fn test_only_noise_is_skipped() {
        assert!(MemberKind::Media.is_extracted());
        assert!(MemberKind::Sidecar.is_extracted());
        assert!(!MemberKind::Noise.is_extracted());
    }
}
