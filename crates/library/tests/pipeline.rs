use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use trove_config::Config;
use trove_index::{Database, Repository};
use trove_library::{Pipeline, RunSummary};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

struct Workspace {
    _dir: TempDir,
    config: Arc<Config>,
    db: Database,
}
impl Workspace {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config =
            Config::default().with_overrides(Some(dir.path().join("data")), Some(dir.path().join("photos")));
        config.workers.hashing = 4;
        fs::create_dir_all(&config.input).unwrap();
        fs::create_dir_all(&config.library).unwrap();
        let db = Database::connect(config.index_path()).await.unwrap();
        Self { _dir: dir, config: Arc::new(config), db }
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline::new(Arc::clone(&self.config), Repository::from(&self.db))
    }

    fn repository(&self) -> Repository {
        Repository::from(&self.db)
    }

    fn library(&self, relative: &str) -> PathBuf {
        self.config.library.join(relative)
    }

    fn archive(&self, name: &str, members: &[(&str, &[u8])]) -> PathBuf {
        let path = self.config.input.join(name);
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        for (member, bytes) in members {
            writer.start_file(*member, SimpleFileOptions::default()).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    /// Relative paths of every record, ordered by path.
    async fn indexed_paths(&self) -> Vec<PathBuf> {
        self.repository().list().await.unwrap().into_iter().map(|r| r.path).collect()
    }
}

fn taken(seconds: i64) -> Vec<u8> {
    format!(r#"{{"title": "x", "photoTakenTime": {{"timestamp": "{seconds}", "formatted": "whenever"}}}}"#).into_bytes()
}

fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let entry = entry.unwrap();
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            if entry.file_type().unwrap().is_dir() {
                stack.push(entry.path());
            } else {
                found.push(entry.path().strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }
    found.sort();
    found
}

#[tokio::test]
async fn test_end_to_end_run() {
    let ws = Workspace::new().await;
    let sidecar = taken(1609459200);
    let archive = ws.archive(
        "takeout-001.zip",
        &[
            ("Takeout/Google Photos/Trip/IMG_0001.jpg", b"first photo"),
            ("Takeout/Google Photos/Trip/IMG_0001.jpg.supplemental-metadata.json", sidecar.as_slice()),
            ("Takeout/Google Photos/Trip/VID_0002.mp4", b"a video"),
            ("Takeout/Google Photos/Trip/metadata.json", b"{}"),
            ("Takeout/archive_browser.html", b"<html>"),
        ],
    );

    let summary = ws.pipeline().run().await.unwrap();
    assert_eq!(
        summary,
        RunSummary { archives_extracted: 1, archives_failed: 0, files_added: 2, duplicates: 0, errors: 0 }
    );
    assert!(!archive.exists());
    assert_eq!(
        files_under(&ws.config.library),
        vec![
            PathBuf::from("2021/01/IMG_0001.jpg"),
            PathBuf::from("2021/01/IMG_0001.jpg.supplemental-metadata.json"),
            PathBuf::from("undated/VID_0002.mp4"),
        ]
    );
    assert_eq!(ws.indexed_paths().await, vec![PathBuf::from("2021/01/IMG_0001.jpg"), PathBuf::from("undated/VID_0002.mp4")]);

    // Scratch subdirectories are consumed; the scratch root itself stays.
    let scratch = ws.config.scratch_root();
    assert!(scratch.is_dir());
    assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
}

#[tokio::test]
async fn test_identical_content_is_filed_once() {
    let ws = Workspace::new().await;
    ws.archive("a.zip", &[("Photos/IMG_0001.jpg", b"same bytes")]);
    ws.archive("b.zip", &[("Other/IMG_9999.jpg", b"same bytes"), ("Other/IMG_1000.jpg", b"unique")]);
    ws.archive("c.zip", &[("More/IMG_0001(1).jpg", b"same bytes")]);

    let summary = ws.pipeline().run().await.unwrap();
    assert_eq!(summary.archives_extracted, 3);
    assert_eq!(summary.files_added, 2);
    assert_eq!(summary.duplicates, 2);
    assert_eq!(ws.repository().count().await.unwrap(), 2);
    assert_eq!(
        files_under(&ws.config.library),
        vec![PathBuf::from("undated/IMG_0001.jpg"), PathBuf::from("undated/IMG_1000.jpg")]
    );

    // Content that is already filed stays a duplicate on later runs too.
    ws.archive("d.zip", &[("Again/IMG_0001.jpg", b"same bytes")]);
    let again = ws.pipeline().run().await.unwrap();
    assert_eq!((again.files_added, again.duplicates), (0, 1));
    assert_eq!(ws.repository().count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_timestamp_priority() {
    let ws = Workspace::new().await;
    let sidecar = taken(1609459200);
    ws.archive(
        "takeout.zip",
        &[
            ("Trip/dated.jpg", b"dated"),
            ("Trip/dated.jpg.json", sidecar.as_slice()),
            ("Trip/undated.jpg", b"no sidecar"),
            ("Trip/broken.jpg", b"broken sidecar"),
            ("Trip/broken.jpg.json", b"{ not json"),
        ],
    );

    ws.pipeline().run().await.unwrap();
    assert_eq!(
        ws.indexed_paths().await,
        vec![PathBuf::from("2021/01/dated.jpg"), PathBuf::from("undated/broken.jpg"), PathBuf::from("undated/undated.jpg")]
    );
    let dated = ws.repository().lookup(blake3::hash(b"dated").to_string()).await.unwrap().unwrap();
    assert_eq!(dated.mtime.unix_timestamp(), 1609459200);

    let undated = ws.repository().lookup(blake3::hash(b"no sidecar").to_string()).await.unwrap().unwrap();
    let on_disk = fs::metadata(ws.library("undated/undated.jpg")).unwrap().modified().unwrap();
    let on_disk = on_disk.duration_since(std::time::UNIX_EPOCH).unwrap().as_secs() as i64;
    assert_eq!(undated.mtime.unix_timestamp(), on_disk);
}

#[tokio::test]
async fn test_collisions_get_numbered_names() {
    let ws = Workspace::new().await;
    ws.archive("a.zip", &[("One/IMG_0001.jpg", b"first")]);
    ws.archive("b.zip", &[("Two/IMG_0001.jpg", b"second")]);
    ws.archive("c.zip", &[("Three/IMG_0001.jpg", b"third")]);

    let summary = ws.pipeline().run().await.unwrap();
    assert_eq!(summary.files_added, 3);
    assert_eq!(fs::read(ws.library("undated/IMG_0001.jpg")).unwrap(), b"first");
    assert_eq!(fs::read(ws.library("undated/IMG_0001_1.jpg")).unwrap(), b"second");
    assert_eq!(fs::read(ws.library("undated/IMG_0001_2.jpg")).unwrap(), b"third");
    assert_eq!(ws.indexed_paths().await.len(), 3);
}

#[tokio::test]
async fn test_failed_archives_are_retained() {
    let ws = Workspace::new().await;
    ws.archive("good.zip", &[("IMG_0001.jpg", b"good")]);
    let corrupt = ws.config.input.join("corrupt.zip");
    fs::write(&corrupt, b"PK but not really").unwrap();
    let empty = ws.archive("empty.zip", &[("readme.txt", b"nothing to see")]);

    let summary = ws.pipeline().run().await.unwrap();
    assert_eq!((summary.archives_extracted, summary.archives_failed), (1, 2));
    assert_eq!(summary.files_added, 1);
    assert!(corrupt.exists());
    assert!(empty.exists());
}

#[tokio::test]
async fn test_reindex_is_idempotent() {
    let ws = Workspace::new().await;
    fs::create_dir_all(ws.library("2020/05")).unwrap();
    fs::create_dir_all(ws.library("undated")).unwrap();
    fs::write(ws.library("2020/05/IMG_0001.jpg"), b"one").unwrap();
    fs::write(ws.library("2020/05/IMG_0001.jpg.json"), b"{}").unwrap();
    fs::write(ws.library("undated/IMG_0002.jpg"), b"two").unwrap();
    // Same content filed twice by hand: the later path in walk order wins.
    fs::write(ws.library("undated/IMG_0003.jpg"), b"one").unwrap();

    let pipeline = ws.pipeline();
    let first = pipeline.run_reindex(&ws.config.library).await.unwrap();
    assert_eq!((first.indexed, first.errors), (3, 0));
    let after_first = ws.repository().list().await.unwrap();

    let second = pipeline.run_reindex(&ws.config.library).await.unwrap();
    assert_eq!(second.indexed, 3);
    assert_eq!(ws.repository().list().await.unwrap(), after_first);

    assert_eq!(
        after_first.iter().map(|r| r.path.clone()).collect::<Vec<_>>(),
        vec![PathBuf::from("undated/IMG_0002.jpg"), PathBuf::from("undated/IMG_0003.jpg")]
    );
}

#[tokio::test]
async fn test_reindex_recovers_unindexed_files() {
    let ws = Workspace::new().await;
    ws.archive("a.zip", &[("IMG_0001.jpg", b"indexed"), ("IMG_0002.jpg", b"also indexed")]);
    ws.pipeline().run().await.unwrap();
    let before = ws.repository().list().await.unwrap();
    assert_eq!(before.len(), 2);

    // A file that reached the library without its record (crash between the
    // move and the batch commit).
    fs::write(ws.library("undated/IMG_0003.jpg"), b"orphan").unwrap();
    assert!(ws.repository().lookup(blake3::hash(b"orphan").to_string()).await.unwrap().is_none());

    let summary = ws.pipeline().run_reindex(&ws.config.library).await.unwrap();
    assert_eq!(summary.indexed, 3);
    let recovered = ws.repository().lookup(blake3::hash(b"orphan").to_string()).await.unwrap().unwrap();
    assert_eq!(recovered.path, PathBuf::from("undated/IMG_0003.jpg"));
    for record in before {
        let current = ws.repository().lookup(&record.hash).await.unwrap().unwrap();
        assert_eq!(current.path, record.path);
    }

    // The recovered content is now deduplicated like everything else.
    ws.archive("b.zip", &[("IMG_0003.jpg", b"orphan")]);
    let summary = ws.pipeline().run().await.unwrap();
    assert_eq!((summary.files_added, summary.duplicates), (0, 1));
}

#[tokio::test]
async fn test_interrupted_extraction_resumes() {
    let ws = Workspace::new().await;
    // Leftovers of a previous run that died after extracting one member.
    let scratch = ws.config.scratch_root().join("extract_takeout_zip/Trip");
    fs::create_dir_all(&scratch).unwrap();
    fs::write(scratch.join("IMG_0001.jpg"), b"one").unwrap();
    fs::write(scratch.join(".IMG_0002.jpg.7.partial"), b"tw").unwrap();
    ws.archive("takeout.zip", &[("Trip/IMG_0001.jpg", b"one"), ("Trip/IMG_0002.jpg", b"two")]);

    let summary = ws.pipeline().run().await.unwrap();
    assert_eq!(summary.archives_extracted, 1);
    assert_eq!(summary.files_added, 2);
    assert_eq!(fs::read(ws.library("undated/IMG_0002.jpg")).unwrap(), b"two");
    assert_eq!(fs::read_dir(ws.config.scratch_root()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_hidden_members_do_not_strand_files() {
    let ws = Workspace::new().await;
    let archive = ws.archive(
        "takeout.zip",
        &[
            ("Photos/.IMG_0005.jpg", b"hidden"),
            ("Photos/.album/IMG_0006.jpg", b"in hidden dir"),
            ("Photos/IMG_0007.jpg", b"visible"),
        ],
    );
    let hidden_only = ws.archive("hidden.zip", &[("Photos/.IMG_0008.jpg", b"hidden")]);

    let summary = ws.pipeline().run().await.unwrap();
    assert_eq!((summary.archives_extracted, summary.archives_failed), (1, 1));
    assert_eq!((summary.files_added, summary.errors), (1, 0));
    assert!(!archive.exists());
    assert!(hidden_only.exists());
    assert_eq!(files_under(&ws.config.library), vec![PathBuf::from("undated/IMG_0007.jpg")]);
    assert_eq!(fs::read_dir(ws.config.scratch_root()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_tar_archives_are_filed() {
    let ws = Workspace::new().await;
    let path = ws.config.input.join("photos.tar.gz");
    let mut builder = tar::Builder::new(GzEncoder::new(File::create(&path).unwrap(), Compression::default()));
    for (name, bytes) in [("Trip/IMG_0001.jpg", b"tar one".to_vec()), ("Trip/IMG_0001.jpg.json", taken(1_609_459_200))] {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_500_000_000);
        builder.append_data(&mut header, name, bytes.as_slice()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();

    let summary = ws.pipeline().run().await.unwrap();
    assert_eq!((summary.archives_extracted, summary.files_added), (1, 1));
    assert!(!path.exists());
    assert_eq!(fs::read(ws.library("2021/01/IMG_0001.jpg")).unwrap(), b"tar one");
    assert!(ws.library("2021/01/IMG_0001.jpg.json").is_file());
}
