//! Blocking archive extraction.
//!
//! Everything in here runs on the blocking pool (or on scoped threads spawned
//! from it); the async side only schedules whole archives. Zip and tar share
//! the per-member path: containment check, existence skip, then a `.partial`
//! write renamed into place.

use crate::archive::{Archive, ArchiveFormat};
use crate::error::{ErrorKind, Result};
use crate::member::classify;
use crate::path;
use exn::{OptionExt, ResultExt};
use filetime::FileTime;
use flate2::read::GzDecoder;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use time::{Date, Month, PrimitiveDateTime, Time};
use trove_config::{Config, Extensions};
use zip::ZipArchive;

const PARTIAL_SUFFIX: &str = ".partial";

/// Outcome of extracting a single archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    pub archive: PathBuf,
    pub scratch: PathBuf,
    /// Members written by this run.
    pub written: u64,
    /// Members whose target already existed (extracted by an earlier run).
    pub present: u64,
    /// Noise members that were not extracted.
    pub skipped: u64,
    /// Members whose path would escape the scratch directory.
    pub rejected: u64,
    /// Members that failed with an I/O or decompression error.
    pub failed_members: u64,
    /// Whether the archive file was removed after extraction.
    pub deleted: bool,
}
impl ArchiveReport {
    fn new(archive: &Archive, scratch: &Path) -> Self {
        Self {
            archive: archive.path.clone(),
            scratch: scratch.to_path_buf(),
            ..Default::default()
        }
    }

    /// Members available in the scratch directory after this run.
    pub fn yielded(&self) -> u64 {
        self.written + self.present
    }
}

struct Planned {
    index: usize,
    relative: PathBuf,
}

enum Outcome {
    Written,
    Present,
    Rejected,
}

enum Target {
    Ready(PathBuf),
    Present,
    Rejected,
}

#[derive(Debug, Default)]
struct Tally {
    written: u64,
    present: u64,
    rejected: u64,
    failed: u64,
}
impl Tally {
    fn record(&mut self, relative: &Path, outcome: Result<Outcome>) {
        match outcome {
            Ok(Outcome::Written) => self.written += 1,
            Ok(Outcome::Present) => self.present += 1,
            Ok(Outcome::Rejected) => self.rejected += 1,
            Err(err) => {
                tracing::warn!(member = %relative.display(), error = ?err, "failed to extract member");
                self.failed += 1;
            },
        }
    }

    fn merge(&mut self, other: Tally) {
        self.written += other.written;
        self.present += other.present;
        self.rejected += other.rejected;
        self.failed += other.failed;
    }
}

/// Extract `archive` into its scratch directory and delete it on success.
pub(crate) fn extract_archive(archive: &Archive, config: &Config) -> Result<ArchiveReport> {
    let scratch = archive.scratch_dir(config.scratch_root());
    let result = match archive.format {
        Some(ArchiveFormat::Zip) => extract_zip(archive, &scratch, config),
        Some(format @ (ArchiveFormat::Tar | ArchiveFormat::TarGz)) => extract_tar(archive, format, &scratch, config),
        None => unsupported(archive),
    };
    result.or_raise(|| ErrorKind::Archive(archive.path.clone()))
}

fn unsupported(archive: &Archive) -> Result<ArchiveReport> {
    let suffix = archive.name.split_once('.').map_or(archive.name.as_str(), |(_, suffix)| suffix);
    exn::bail!(ErrorKind::Unsupported(suffix.to_ascii_lowercase()))
}

/// Create the scratch directory and return its canonical path.
fn scratch_root(scratch: &Path) -> Result<PathBuf> {
    fs::create_dir_all(scratch).or_raise(|| ErrorKind::Io)?;
    scratch.canonicalize().or_raise(|| ErrorKind::Io)
}

/// Fold `tally` into `report`, sweep stale partials and delete the archive if
/// anything is available in scratch.
fn conclude(archive: &Archive, root: &Path, mut report: ArchiveReport, tally: Tally) -> Result<ArchiveReport> {
    report.written = tally.written;
    report.present = tally.present;
    report.rejected += tally.rejected;
    report.failed_members = tally.failed;

    let swept = sweep_partials(root);
    if swept > 0 {
        tracing::debug!(scratch = %root.display(), swept, "removed stale partial files");
    }
    if report.yielded() == 0 {
        exn::bail!(ErrorKind::Empty);
    }
    match fs::remove_file(&archive.path) {
        Ok(()) => report.deleted = true,
        Err(err) => tracing::warn!(archive = %archive.path.display(), error = %err, "unable to delete extracted archive"),
    }
    Ok(report)
}

fn extract_zip(archive: &Archive, scratch: &Path, config: &Config) -> Result<ArchiveReport> {
    let file = File::open(&archive.path).or_raise(|| ErrorKind::Open)?;
    let mut zip = ZipArchive::new(file).or_raise(|| ErrorKind::Corrupt)?;
    let mut report = ArchiveReport::new(archive, scratch);

    let planned = plan(&mut zip, &config.extensions, &mut report)?;
    if planned.is_empty() {
        exn::bail!(ErrorKind::Empty);
    }
    let root = scratch_root(scratch)?;

    let buffer = config.extract.copy_buffer;
    let tally = if planned.len() > config.workers.member_threshold && config.workers.members > 1 {
        tracing::debug!(members = planned.len(), workers = config.workers.members, "extracting members in parallel");
        extract_parallel(&archive.path, &root, &planned, config.workers.members, buffer)?
    } else {
        extract_members(&mut zip, &root, &planned, buffer)
    };
    conclude(archive, &root, report, tally)
}

/// Classify every member and normalize the names of those worth extracting.
fn plan(zip: &mut ZipArchive<File>, extensions: &Extensions, report: &mut ArchiveReport) -> Result<Vec<Planned>> {
    let mut planned = Vec::new();
    for index in 0..zip.len() {
        let entry = zip.by_index_raw(index).or_raise(|| ErrorKind::Corrupt)?;
        let name = entry.name();
        if !classify(name, extensions).is_extracted() {
            report.skipped += 1;
            continue;
        }
        let Some(relative) = path::normalize(name) else {
            tracing::warn!(member = %name, "rejected member escaping the scratch directory");
            report.rejected += 1;
            continue;
        };
        planned.push(Planned { index, relative });
    }
    Ok(planned)
}

/// Split members across `workers` threads, each with its own archive handle.
fn extract_parallel(path: &Path, root: &Path, members: &[Planned], workers: usize, buffer: usize) -> Result<Tally> {
    let per_worker = members.len().div_ceil(workers.max(1));
    std::thread::scope(|scope| {
        let handles: Vec<_> = members
            .chunks(per_worker)
            .map(|chunk| {
                scope.spawn(move || -> Result<Tally> {
                    let file = File::open(path).or_raise(|| ErrorKind::Open)?;
                    let mut zip = ZipArchive::new(file).or_raise(|| ErrorKind::Corrupt)?;
                    Ok(extract_members(&mut zip, root, chunk, buffer))
                })
            })
            .collect();
        let mut tally = Tally::default();
        for handle in handles {
            match handle.join() {
                Ok(part) => tally.merge(part?),
                Err(_) => exn::bail!(ErrorKind::Worker),
            }
        }
        Ok(tally)
    })
}

fn extract_members(zip: &mut ZipArchive<File>, root: &Path, members: &[Planned], buffer: usize) -> Tally {
    let mut tally = Tally::default();
    for member in members {
        tally.record(&member.relative, extract_zip_member(zip, root, member, buffer));
    }
    tally
}

fn extract_zip_member(zip: &mut ZipArchive<File>, root: &Path, member: &Planned, buffer: usize) -> Result<Outcome> {
    let target = match prepare_target(root, &member.relative)? {
        Target::Ready(target) => target,
        Target::Present => return Ok(Outcome::Present),
        Target::Rejected => return Ok(Outcome::Rejected),
    };
    let mut entry = zip.by_index(member.index).or_raise(|| ErrorKind::Corrupt)?;
    let modified = entry.last_modified().and_then(zip_time_to_unix);
    write_target(&mut entry, &target, member.index, buffer, modified)?;
    Ok(Outcome::Written)
}

/// Stream a tar (optionally gzip-compressed) archive into scratch.
///
/// Entries are read in order, so there is no planning pass and no member
/// parallelism. Only regular files are considered. A broken entry stream fails
/// the whole archive; members written before the break stay in scratch and are
/// counted as present by the next attempt.
fn extract_tar(archive: &Archive, format: ArchiveFormat, scratch: &Path, config: &Config) -> Result<ArchiveReport> {
    let file = File::open(&archive.path).or_raise(|| ErrorKind::Open)?;
    let reader: Box<dyn Read> = match format {
        ArchiveFormat::TarGz => Box::new(GzDecoder::new(BufReader::new(file))),
        _ => Box::new(BufReader::new(file)),
    };
    let mut tarball = tar::Archive::new(reader);
    let mut report = ArchiveReport::new(archive, scratch);
    let mut tally = Tally::default();
    let mut root: Option<PathBuf> = None;

    let entries = tarball.entries().or_raise(|| ErrorKind::Corrupt)?;
    for (index, entry) in entries.enumerate() {
        let mut entry = entry.or_raise(|| ErrorKind::Corrupt)?;
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        if !entry.header().entry_type().is_file() || !classify(&name, &config.extensions).is_extracted() {
            report.skipped += 1;
            continue;
        }
        let Some(relative) = path::normalize(&name) else {
            tracing::warn!(member = %name, "rejected member escaping the scratch directory");
            report.rejected += 1;
            continue;
        };
        if root.is_none() {
            root = Some(scratch_root(scratch)?);
        }
        let Some(canonical) = root.as_deref() else {
            continue;
        };
        let modified = entry.header().mtime().ok().and_then(|seconds| i64::try_from(seconds).ok()).filter(|s| *s > 0);
        let outcome = match prepare_target(canonical, &relative) {
            Ok(Target::Ready(target)) => {
                write_target(&mut entry, &target, index, config.extract.copy_buffer, modified).map(|()| Outcome::Written)
            },
            Ok(Target::Present) => Ok(Outcome::Present),
            Ok(Target::Rejected) => Ok(Outcome::Rejected),
            Err(err) => Err(err),
        };
        tally.record(&relative, outcome);
    }

    let Some(root) = root else {
        exn::bail!(ErrorKind::Empty);
    };
    conclude(archive, &root, report, tally)
}

/// Resolve where `relative` lands below `root`, creating its parent.
fn prepare_target(root: &Path, relative: &Path) -> Result<Target> {
    let target = root.join(relative);
    if !path::is_contained(root, &target).or_raise(|| ErrorKind::Io)? {
        tracing::warn!(member = %relative.display(), "rejected member resolving outside the scratch directory");
        return Ok(Target::Rejected);
    }
    if target.try_exists().or_raise(|| ErrorKind::Io)? {
        return Ok(Target::Present);
    }
    let parent = target.parent().ok_or_raise(|| ErrorKind::Io)?;
    fs::create_dir_all(parent).or_raise(|| ErrorKind::Io)?;
    Ok(Target::Ready(target))
}

/// Write `reader` to a sibling `.partial` file and rename it onto `target`.
fn write_target(reader: &mut impl Read, target: &Path, index: usize, buffer: usize, modified: Option<i64>) -> Result<()> {
    let parent = target.parent().ok_or_raise(|| ErrorKind::Io)?;
    let file_name = target.file_name().ok_or_raise(|| ErrorKind::Io)?;
    let partial = parent.join(format!(".{}.{index}{PARTIAL_SUFFIX}", file_name.to_string_lossy()));
    if let Err(err) = write_partial(reader, &partial, buffer).and_then(|()| fs::rename(&partial, target)) {
        let _ = fs::remove_file(&partial);
        return Err(err).or_raise(|| ErrorKind::Io);
    }
    if let Some(seconds) = modified
        && let Err(err) = filetime::set_file_mtime(target, FileTime::from_unix_time(seconds, 0))
    {
        tracing::debug!(target = %target.display(), error = %err, "unable to apply member modification time");
    }
    Ok(())
}

fn write_partial(reader: &mut impl Read, partial: &Path, buffer: usize) -> io::Result<()> {
    let mut writer = BufWriter::with_capacity(buffer, File::create(partial)?);
    io::copy(reader, &mut writer)?;
    writer.flush()
}

fn is_partial(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX)
}

/// Remove `.partial` files below `root` left by an interrupted run, whatever
/// member index they were written for. Returns the number removed.
fn sweep_partials(root: &Path) -> u64 {
    let mut removed = 0;
    let mut stack = vec![root.to_path_buf()];
    while let Some(directory) = stack.pop() {
        let Ok(entries) = fs::read_dir(&directory) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() && is_partial(&entry.file_name()) && fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }
    }
    removed
}

/// DOS date/time of a zip entry as epoch seconds.
///
/// The format carries no time zone (writers store local time); it is read as
/// UTC, so entries can be off by the writer's UTC offset.
fn zip_time_to_unix(datetime: zip::DateTime) -> Option<i64> {
    let month = Month::try_from(datetime.month()).ok()?;
    let date = Date::from_calendar_date(i32::from(datetime.year()), month, datetime.day()).ok()?;
    let time = Time::from_hms(datetime.hour(), datetime.minute(), datetime.second()).ok()?;
    Some(PrimitiveDateTime::new(date, time).assume_utc().unix_timestamp())
}
