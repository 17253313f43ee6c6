use crate::archive::{Archive, discover};
use crate::error::{ErrorKind, Result};
use crate::unpack::{ArchiveReport, extract_archive};
use async_stream::stream;
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use std::pin::pin;
use std::sync::Arc;
use trove_config::Config;

/// Progress events emitted by [`extract`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started): exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete): exactly once, with the
///    number of archives found.
/// 3. [`Extracted`](Self::Extracted): once per successfully extracted archive.
/// 4. [`Complete`](Self::Complete): exactly once.
///
/// Failed archives are yielded as `Err` items in place of `Extracted`. Only a
/// discovery failure terminates the stream early.
#[derive(Debug)]
pub enum ExtractEvent {
    Started,
    DiscoveryComplete(u64),
    Extracted(ArchiveReport),
    Complete,
}

/// Archive counts for one extraction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub extracted: u64,
    pub failed: u64,
}

/// Streams [`ExtractEvent`]s while extracting every archive in the input
/// directory.
///
/// Archives run on the blocking pool, at most `workers.archives` at a time;
/// queued archives are started in discovery order as running ones finish.
pub fn extract(config: Arc<Config>) -> impl Stream<Item = Result<ExtractEvent>> {
    stream!({
        yield Ok(ExtractEvent::Started);

        let archives = match discover(&config.input, &config.extensions).await {
            Ok(archives) => archives,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        yield Ok(ExtractEvent::DiscoveryComplete(u64::try_from(archives.len()).unwrap_or(u64::MAX)));

        let limit = config.workers.archives.min(archives.len());
        let mut futures: Vec<_> =
            archives.into_iter().map(|archive| extract_one(archive, Arc::clone(&config))).collect();
        let mut processing = FuturesUnordered::new();
        processing.extend(futures.drain(..limit));
        while let Some(result) = processing.next().await {
            yield result.map(ExtractEvent::Extracted);
            // Pop-n-push, FIFO.
            if !futures.is_empty() {
                processing.push(futures.remove(0));
            }
        }

        yield Ok(ExtractEvent::Complete);
    })
}

async fn extract_one(archive: Archive, config: Arc<Config>) -> Result<ArchiveReport> {
    let path = archive.path.clone();
    tracing::info!(
        archive = %path.display(),
        fingerprint = %archive.fingerprint,
        size = archive.size,
        "extracting archive"
    );
    tokio::task::spawn_blocking(move || extract_archive(&archive, &config))
        .await
        .or_raise(|| ErrorKind::Archive(path))?
}

/// Run a full extraction pass, logging each archive's outcome.
///
/// Per-archive failures are counted, not returned; the archive stays in the
/// input directory for the next run.
pub async fn extract_all(config: Arc<Config>) -> Result<ExtractSummary> {
    let mut summary = ExtractSummary::default();
    let mut events = pin!(extract(config));
    while let Some(event) = events.next().await {
        match event {
            Ok(ExtractEvent::Started) => tracing::debug!("archive discovery started"),
            Ok(ExtractEvent::DiscoveryComplete(count)) => tracing::info!(archives = count, "archive discovery complete"),
            Ok(ExtractEvent::Extracted(report)) => {
                summary.extracted += 1;
                tracing::info!(
                    archive = %report.archive.display(),
                    written = report.written,
                    present = report.present,
                    skipped = report.skipped,
                    rejected = report.rejected,
                    failed = report.failed_members,
                    "archive extracted"
                );
            },
            Ok(ExtractEvent::Complete) => {},
            Err(err) if matches!(&*err, ErrorKind::Discovery(_)) => return Err(err),
            Err(err) => {
                summary.failed += 1;
                tracing::error!(error = ?err, "archive extraction failed, archive retained");
            },
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::Path;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn build_zip(path: &Path, names: &[&str]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for name in names {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(name.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    fn config_for(input: &Path) -> Arc<Config> {
        let mut config = Config::default().with_overrides(Some(input.to_path_buf()), Some(input.join("library")));
        config.workers.archives = 2;
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_event_order() {
        let dir = tempfile::tempdir().unwrap();
        build_zip(&dir.path().join("a.zip"), &["IMG_0001.jpg"]);
        let events: Vec<_> = extract(config_for(dir.path())).collect().await;
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], Ok(ExtractEvent::Started)));
        assert!(matches!(events[1], Ok(ExtractEvent::DiscoveryComplete(1))));
        assert!(matches!(events[2], Ok(ExtractEvent::Extracted(_))));
        assert!(matches!(events[3], Ok(ExtractEvent::Complete)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failures_do_not_stop_other_archives() {
        let dir = tempfile::tempdir().unwrap();
        build_zip(&dir.path().join("a.zip"), &["IMG_0001.jpg"]);
        fs::write(dir.path().join("b.zip"), b"garbage").unwrap();
        build_zip(&dir.path().join("c.zip"), &["IMG_0002.jpg", "IMG_0002.jpg.json"]);
        fs::write(dir.path().join("d.tar"), vec![b'x'; 1024]).unwrap();
        build_zip(&dir.path().join("e.zip"), &["readme.txt"]);

        let config = config_for(dir.path());
        let summary = extract_all(Arc::clone(&config)).await.unwrap();
        assert_eq!(summary, ExtractSummary { extracted: 2, failed: 3 });

        assert!(!dir.path().join("a.zip").exists());
        assert!(dir.path().join("b.zip").exists());
        assert!(!dir.path().join("c.zip").exists());
        assert!(dir.path().join("d.tar").exists());
        assert!(dir.path().join("e.zip").exists());
        let scratch = config.scratch_root();
        assert!(scratch.join("extract_a_zip/IMG_0001.jpg").is_file());
        assert!(scratch.join("extract_c_zip/IMG_0002.jpg.json").is_file());
    }

    #[tokio::test]
    async fn test_missing_input_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let summary = extract_all(config_for(&dir.path().join("missing"))).await.unwrap();
        assert_eq!(summary, ExtractSummary::default());
    }
}
