use crate::error::{ErrorKind, Result};
use crate::sidecar;
use exn::ResultExt;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tokio::fs;
use tracing::instrument;

/// When a media file was captured, and whether that came from a sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTimestamp {
    pub datetime: UtcDateTime,
    /// `false` when the value is only the file's modification time.
    pub reliable: bool,
}
impl CaptureTimestamp {
    /// Library-relative directory for this timestamp: `YYYY/MM` when reliable,
    /// otherwise the undated bucket.
    pub fn bucket(&self, undated: impl AsRef<Path>) -> PathBuf {
        if self.reliable {
            PathBuf::from(format!("{:04}", self.datetime.year())).join(format!("{:02}", u8::from(self.datetime.month())))
        } else {
            undated.as_ref().to_path_buf()
        }
    }
}

/// Extract a capture time from sidecar JSON.
///
/// Checked in order: `photoTakenTime.timestamp`, `creationTime.timestamp`,
/// then a top-level `timestamp`. Values may be integers or numeric strings
/// (exports use strings) and are epoch seconds; zero or negative values are
/// treated as absent. Anything unparseable yields `None`.
pub fn parse_sidecar(bytes: &[u8]) -> Option<UtcDateTime> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    let object = value.as_object()?;
    [
        object.get("photoTakenTime").and_then(|v| v.get("timestamp")),
        object.get("creationTime").and_then(|v| v.get("timestamp")),
        object.get("timestamp"),
    ]
    .into_iter()
    .flatten()
    .find_map(epoch_seconds)
}

fn epoch_seconds(value: &Value) -> Option<UtcDateTime> {
    let seconds = match value {
        Value::Number(number) => number.as_i64().or_else(|| number.as_f64().map(|f| f.trunc() as i64))?,
        Value::String(text) => text.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    if seconds <= 0 {
        return None;
    }
    UtcDateTime::from_unix_timestamp(seconds).ok()
}

/// Resolve the capture time of `media` from the first sidecar candidate that
/// yields one, falling back to the file's modification time.
///
/// Unreadable or malformed sidecars are skipped. Fails only when the fallback
/// is needed and the media file's own metadata cannot be read.
#[instrument(skip_all, fields(media = %media.as_ref().display()))]
pub async fn resolve_timestamp(media: impl AsRef<Path>) -> Result<CaptureTimestamp> {
    let media = media.as_ref();
    for candidate in sidecar::candidates(media) {
        let bytes = match fs::read(&candidate).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                tracing::debug!(sidecar = %candidate.display(), error = %err, "skipping unreadable sidecar");
                continue;
            },
        };
        match parse_sidecar(&bytes) {
            Some(datetime) => {
                tracing::trace!(sidecar = %candidate.display(), %datetime, "timestamp from sidecar");
                return Ok(CaptureTimestamp { datetime, reliable: true });
            },
            None => tracing::debug!(sidecar = %candidate.display(), "sidecar has no usable timestamp"),
        }
    }

    let metadata = fs::metadata(media).await.or_raise(|| ErrorKind::Metadata(media.to_path_buf()))?;
    let modified = metadata.modified().or_raise(|| ErrorKind::Metadata(media.to_path_buf()))?;
    Ok(CaptureTimestamp {
        datetime: modified.into(),
        reliable: false,
    })
}
