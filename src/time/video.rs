//! Video capture time extraction via FFprobe

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, trace};

/// Metadata keys to try for creation date
const CREATION_DATE_KEYS: &[&str] = &[
    "creation_time",
    "com.apple.quicktime.creationdate",
    "date",
];

/// Cached FFprobe availability check
static FFPROBE_AVAILABLE: OnceLock<bool> = OnceLock::new();

/// Check if ffprobe is available (cached)
fn is_ffprobe_available() -> bool {
    *FFPROBE_AVAILABLE.get_or_init(|| Command::new("ffprobe").arg("-version").output().is_ok())
}

/// Extract creation time from video container metadata using FFprobe
///
/// The returned timestamp is timezone-naive: any offset in the metadata is
/// dropped and the wall-clock fields are kept, so video times compare
/// directly with EXIF times from the same camera.
pub fn extract_video_time(path: &Path) -> Result<NaiveDateTime> {
    if !is_ffprobe_available() {
        return Err(Error::FfprobeNotFound);
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| Error::MetadataMissing {
            path: path.to_path_buf(),
            message: format!("Failed to execute ffprobe: {}", e),
        })?;

    if !output.status.success() {
        return Err(Error::MetadataMissing {
            path: path.to_path_buf(),
            message: format!(
                "FFprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    trace!(?path, "FFprobe output: {}", json_str);

    let json: Value = serde_json::from_str(&json_str).map_err(|e| Error::MetadataMissing {
        path: path.to_path_buf(),
        message: format!("Failed to parse FFprobe JSON: {}", e),
    })?;

    let datetime = creation_time_from_probe(&json).ok_or_else(|| Error::MetadataMissing {
        path: path.to_path_buf(),
        message: "No creation time found in video metadata".to_string(),
    })?;

    debug!(?path, %datetime, "Found video creation time");
    Ok(datetime)
}

/// Find the creation time in FFprobe JSON, format tags first, then stream tags
pub(crate) fn creation_time_from_probe(json: &Value) -> Option<NaiveDateTime> {
    if let Some(tags) = json.get("format").and_then(|f| f.get("tags"))
        && let Some(dt) = creation_time_from_tags(tags)
    {
        return Some(dt);
    }

    json.get("streams")
        .and_then(|s| s.as_array())?
        .iter()
        .filter_map(|stream| stream.get("tags"))
        .find_map(creation_time_from_tags)
}

fn creation_time_from_tags(tags: &Value) -> Option<NaiveDateTime> {
    CREATION_DATE_KEYS.iter().find_map(|key| {
        [key.to_string(), key.to_uppercase()]
            .iter()
            .filter_map(|k| tags.get(k.as_str()).and_then(|v| v.as_str()))
            .find_map(parse_video_datetime)
    })
}

/// Parse a container timestamp, dropping any offset
pub(crate) fn parse_video_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }

    let formats = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.fZ",
    ];

    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    // QuickTime style offsets without a colon, e.g. 2024-01-15T14:30:00+0800
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z")
        .ok()
        .map(|dt| dt.naive_local())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn test_parse_video_datetime() {
        let dt = parse_video_datetime("2024-01-15T14:30:00Z").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 14);

        let dt = parse_video_datetime("2024-01-15T14:30:00.000000Z").unwrap();
        assert_eq!(dt.minute(), 30);

        // Offset is dropped, wall clock kept
        let dt = parse_video_datetime("2024-01-15T14:30:00+08:00").unwrap();
        assert_eq!(dt.hour(), 14);
        assert_eq!(dt.minute(), 30);

        let dt = parse_video_datetime("2024-01-15T14:30:00+0800").unwrap();
        assert_eq!(dt.hour(), 14);

        let dt = parse_video_datetime("2024-01-15 14:30:00").unwrap();
        assert_eq!(dt.hour(), 14);

        assert!(parse_video_datetime("invalid").is_none());
    }

    #[test]
    fn test_probe_prefers_format_tags() {
        let probe = json!({
            "format": { "tags": { "creation_time": "2024-03-02T06:00:00.000000Z" } },
            "streams": [ { "tags": { "creation_time": "2024-03-02T07:00:00.000000Z" } } ]
        });
        let dt = creation_time_from_probe(&probe).unwrap();
        assert_eq!(dt.hour(), 6);
    }

    #[test]
    fn test_probe_falls_back_to_streams() {
        let probe = json!({
            "format": { "tags": { "encoder": "Lavf" } },
            "streams": [
                { "codec_type": "audio" },
                { "tags": { "CREATION_TIME": "2024-03-02 07:15:00" } }
            ]
        });
        let dt = creation_time_from_probe(&probe).unwrap();
        assert_eq!(dt.to_string(), "2024-03-02 07:15:00");
    }

    #[test]
    fn test_probe_without_creation_time() {
        let probe = json!({ "format": {}, "streams": [ { "tags": { "language": "und" } } ] });
        assert!(creation_time_from_probe(&probe).is_none());
    }
}
