use crate::error::{ErrorKind, Result};
use crate::reindex::{ReindexSummary, reindex_from_directory};
use crate::sort::{prune_empty_dirs, sort_media};
use exn::ResultExt;
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;
use trove_config::Config;
use trove_index::Repository;

/// Counters for one full ingestion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub archives_extracted: u64,
    pub archives_failed: u64,
    pub files_added: u64,
    pub duplicates: u64,
    pub errors: u64,
}

/// Sequences extraction, sorting and scratch pruning.
///
/// Holds no state between runs; every counter lives in the returned summary.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    repository: Repository,
}
impl Pipeline {
    pub fn new(config: Arc<Config>, repository: Repository) -> Self {
        Self { config, repository }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Extract every archive in the input directory, file the results into the
    /// library, then prune empty directories under the scratch root (which is
    /// itself kept).
    #[instrument(skip_all, fields(input = %self.config.input.display(), library = %self.config.library.display()))]
    pub async fn run(&self) -> Result<RunSummary> {
        let extracted = trove_archive::extract_all(Arc::clone(&self.config)).await.or_raise(|| ErrorKind::Extract)?;
        let sorted = sort_media(&self.config, &self.repository).await?;

        let scratch_root = self.config.scratch_root();
        match prune_empty_dirs(&scratch_root, true).await {
            Ok(pruned) => tracing::debug!(scratch = %scratch_root.display(), pruned, "scratch root pruned"),
            Err(err) => tracing::warn!(scratch = %scratch_root.display(), error = %err, "unable to prune scratch root"),
        }

        let summary = RunSummary {
            archives_extracted: extracted.extracted,
            archives_failed: extracted.failed,
            files_added: sorted.added,
            duplicates: sorted.duplicates,
            errors: sorted.errors,
        };
        tracing::info!(
            archives_extracted = summary.archives_extracted,
            archives_failed = summary.archives_failed,
            files_added = summary.files_added,
            duplicates = summary.duplicates,
            errors = summary.errors,
            "run complete"
        );
        Ok(summary)
    }

    /// Rebuild index records from `library_root` without touching the input.
    #[instrument(skip_all, fields(library = %library_root.as_ref().display()))]
    pub async fn run_reindex(&self, library_root: impl AsRef<Path>) -> Result<ReindexSummary> {
        reindex_from_directory(library_root, &self.config, &self.repository).await
    }
}
