//! Configuration for the trove ingestion pipeline.
//!
//! A [`Config`] is built exactly once (defaults, then configuration files, then
//! `TROVE_*` environment variables, then command-line overrides) and handed to
//! every component as an immutable value. Nothing in the workspace reads
//! ambient global state after that point.
//!
//! # Sources
//!
//! | Priority | Source                                                  |
//! |----------|---------------------------------------------------------|
//! | lowest   | [`Config::default()`]                                   |
//! |          | `<user config dir>/trove/config.toml` (if it exists)    |
//! |          | explicit file passed to [`Config::load`] (TOML/YAML/JSON)|
//! | highest  | environment, e.g. `TROVE_WORKERS__HASHING=8`            |

pub mod error;
mod extensions;

pub use crate::extensions::Extensions;
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the persistent extraction root, created inside the input directory.
pub const SCRATCH_DIR_NAME: &str = ".tmp_extracted";
/// File name of the dedup index, created inside the library directory.
pub const INDEX_FILE_NAME: &str = ".trove.sqlite";
/// Directory (inside the library) that receives the rolling log files.
pub const LOG_DIR_NAME: &str = ".logs";
const ENV_PREFIX: &str = "TROVE_";

/// Worker limits for each parallel stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workers {
    /// Archives extracted concurrently (further capped by the number of archives).
    pub archives: usize,
    /// Threads (each with its own archive handle) used inside one large archive.
    pub members: usize,
    /// Minimum number of members before a single archive is extracted in parallel.
    pub member_threshold: usize,
    /// Concurrent hashing jobs during import and reindex.
    pub hashing: usize,
}
impl Default for Workers {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self {
            archives: 4.min(cpus),
            members: 4.min(cpus),
            member_threshold: 256,
            hashing: cpus,
        }
    }
}

/// Dedup index tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Number of records written per bulk-load transaction.
    pub batch_size: usize,
}
impl Default for IndexSettings {
    fn default() -> Self {
        Self { batch_size: 1000 }
    }
}

/// Archive extraction tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractSettings {
    /// Buffer size (in bytes) used when copying member bytes to disk.
    pub copy_buffer: usize,
}
impl Default for ExtractSettings {
    fn default() -> Self {
        Self { copy_buffer: 8 * 1024 * 1024 }
    }
}

/// The complete, immutable pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory that archives are dropped into.
    pub input: PathBuf,
    /// Root of the date-partitioned library.
    pub library: PathBuf,
    /// Library subdirectory for files without a reliable capture timestamp.
    pub undated: String,
    pub extensions: Extensions,
    pub workers: Workers,
    pub index: IndexSettings,
    pub extract: ExtractSettings,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data"),
            library: PathBuf::from("photos"),
            undated: "undated".to_string(),
            extensions: Extensions::default(),
            workers: Workers::default(),
            index: IndexSettings::default(),
            extract: ExtractSettings::default(),
        }
    }
}

impl Config {
    /// Build the layered [`Figment`] without extracting it.
    ///
    /// An explicit file that does not exist is an error; the per-user file is
    /// optional and silently skipped when absent.
    pub fn figment(explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(dirs) = ProjectDirs::from("", "", "trove") {
            let user = dirs.config_dir().join("config.toml");
            if user.is_file() {
                tracing::debug!(path = %user.display(), "merging user configuration");
                figment = figment.merge(Toml::file(user));
            }
        }
        if let Some(path) = explicit {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
            }
            let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
            figment = match extension.as_deref() {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load, normalize and validate the configuration.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(explicit)?)
    }

    /// Extract a configuration from an already-assembled [`Figment`].
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let mut config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.extensions.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides, which take precedence over every other source.
    pub fn with_overrides(mut self, input: Option<PathBuf>, library: Option<PathBuf>) -> Self {
        if let Some(input) = input {
            self.input = input;
        }
        if let Some(library) = library {
            self.library = library;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.input.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("input directory must not be empty"));
        }
        if self.library.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("library directory must not be empty"));
        }
        if self.undated.is_empty() || self.undated.contains(['/', '\\']) || self.undated.starts_with('.') {
            exn::bail!(ErrorKind::Invalid("undated bucket must be a plain, non-hidden directory name"));
        }
        if self.workers.archives == 0 || self.workers.members == 0 || self.workers.hashing == 0 {
            exn::bail!(ErrorKind::Invalid("worker counts must be at least 1"));
        }
        if self.index.batch_size == 0 {
            exn::bail!(ErrorKind::Invalid("index batch size must be at least 1"));
        }
        if self.extract.copy_buffer == 0 {
            exn::bail!(ErrorKind::Invalid("copy buffer must be at least 1 byte"));
        }
        if self.extensions.media.is_empty() {
            exn::bail!(ErrorKind::Invalid("at least one media extension is required"));
        }
        if self.extensions.archives.is_empty() {
            exn::bail!(ErrorKind::Invalid("at least one archive suffix is required"));
        }
        Ok(())
    }

    /// Persistent extraction root (never deleted automatically).
    pub fn scratch_root(&self) -> PathBuf {
        self.input.join(SCRATCH_DIR_NAME)
    }

    /// Location of the dedup index database.
    pub fn index_path(&self) -> PathBuf {
        self.library.join(INDEX_FILE_NAME)
    }

    /// Directory for the rolling log files.
    pub fn log_dir(&self) -> PathBuf {
        self.library.join(LOG_DIR_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.index.batch_size, 1000);
        assert_eq!(config.undated, "undated");
    }

    #[test]
    fn test_derived_paths() {
        let config = Config::default().with_overrides(Some("/srv/in".into()), Some("/srv/lib".into()));
        assert_eq!(config.scratch_root(), Path::new("/srv/in/.tmp_extracted"));
        assert_eq!(config.index_path(), Path::new("/srv/lib/.trove.sqlite"));
        assert_eq!(config.log_dir(), Path::new("/srv/lib/.logs"));
    }

    #[test]
    fn test_load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trove.toml");
        fs::write(
            &path,
            r#"
                input = "/takeout"
                undated = "unknown"

                [workers]
                hashing = 3

                [extensions]
                media = [".JPG", "mp4"]
            "#,
        )
        .unwrap();
        let figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(&path));
        let config = Config::from_figment(figment).unwrap();
        assert_eq!(config.input, Path::new("/takeout"));
        assert_eq!(config.undated, "unknown");
        assert_eq!(config.workers.hashing, 3);
        // Untouched values keep their defaults.
        assert_eq!(config.workers.member_threshold, Workers::default().member_threshold);
        // Extensions are normalized on load.
        assert!(config.extensions.media.contains("jpg"));
        assert!(config.extensions.is_media(Path::new("a/b/IMG_0001.JPG")));
        assert!(!config.extensions.is_media(Path::new("a/b/IMG_0001.png")));
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::figment(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_explicit_file_format_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trove.ini");
        fs::write(&path, "input = x").unwrap();
        let err = Config::figment(Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = Config::default();
        config.workers.hashing = 0;
        assert!(matches!(&*config.validate().unwrap_err(), ErrorKind::Invalid(_)));

        let mut config = Config::default();
        config.index.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.undated = "../escape".to_string();
        assert!(config.validate().is_err());
    }
}
