//! A single photo or video belonging to a section

use crate::config::MediaKind;
use crate::error::Result;
use crate::manifest::MediumSummary;
use crate::parameters::DATETIME_FORMAT;
use crate::time::CaptureTimeSource;
use chrono::{NaiveDateTime, TimeDelta};
use std::path::{Path, PathBuf};
use tracing::trace;
use uuid::Uuid;

/// Length of the id fragment embedded in destination file names
pub const SHORT_ID_LEN: usize = 8;

/// Time format embedded in destination file names
const FILENAME_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone)]
pub struct Medium {
    id: String,
    kind: MediaKind,
    original_path: PathBuf,
    capture_time: NaiveDateTime,
    destination_path: Option<PathBuf>,
}

impl Medium {
    /// Build a medium, reading its capture time from `source`
    ///
    /// Fails with `MetadataMissing` when no capture time can be extracted.
    pub fn create(path: &Path, kind: MediaKind, source: &dyn CaptureTimeSource) -> Result<Self> {
        let capture_time = source.capture_time(kind, path)?;
        Ok(Self::with_capture_time(path, kind, capture_time))
    }

    /// Build a medium whose capture time is already known
    pub fn with_capture_time(path: &Path, kind: MediaKind, capture_time: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            kind,
            original_path: path.to_path_buf(),
            capture_time,
            destination_path: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// First characters of the id, used in file names
    pub fn short_id(&self) -> &str {
        &self.id[..SHORT_ID_LEN]
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn original_path(&self) -> &Path {
        &self.original_path
    }

    pub fn capture_time(&self) -> NaiveDateTime {
        self.capture_time
    }

    pub fn destination_path(&self) -> Option<&Path> {
        self.destination_path.as_deref()
    }

    /// Move the capture time by a fixed amount (clock drift correction)
    pub fn shift_capture_time(&mut self, delta: TimeDelta) {
        self.capture_time += delta;
    }

    /// `{mount id}_{YYYYMMDD_HHMMSS}_{short id}{.ext}`
    pub fn destination_name(&self, perch_mount_id: &str) -> String {
        let ext = self
            .original_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        format!(
            "{}_{}_{}{}",
            perch_mount_id,
            self.capture_time.format(FILENAME_TIME_FORMAT),
            self.short_id(),
            ext
        )
    }

    /// Assign the destination path under `parent_dir`
    ///
    /// The path is set once; later calls keep the first assignment.
    pub fn init_destination_path(&mut self, parent_dir: &Path, perch_mount_id: &str) -> &Path {
        let name = self.destination_name(perch_mount_id);
        let source = &self.original_path;
        self.destination_path.get_or_insert_with(|| {
            let path = parent_dir.join(name);
            trace!(?source, destination = ?path, "Assigned destination");
            path
        })
    }

    pub fn to_manifest(&self) -> MediumSummary {
        MediumSummary {
            medium_id: self.id.clone(),
            medium_datetime: self.capture_time.format(DATETIME_FORMAT).to_string(),
            path: self.destination_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).unwrap()
    }

    #[test]
    fn test_destination_name_layout() {
        let medium = Medium::with_capture_time(
            Path::new("/cards/a/IMG_0001.JPG"),
            MediaKind::Image,
            at("2024-01-01 07:45:09"),
        );

        let name = medium.destination_name("12");
        assert_eq!(name, format!("12_20240101_074509_{}.JPG", medium.short_id()));
        assert_eq!(medium.short_id().len(), SHORT_ID_LEN);
    }

    #[test]
    fn test_same_time_distinct_paths() {
        let time = at("2024-01-01 07:45:00");
        let mut a = Medium::with_capture_time(Path::new("a.jpg"), MediaKind::Image, time);
        let mut b = Medium::with_capture_time(Path::new("b.jpg"), MediaKind::Image, time);
        assert_ne!(a.id(), b.id());

        let parent = Path::new("/media/p/m/2024-01-10");
        let pa = a.init_destination_path(parent, "12").to_path_buf();
        let pb = b.init_destination_path(parent, "12").to_path_buf();
        assert_ne!(pa, pb);
    }

    #[test]
    fn test_destination_is_set_once() {
        let mut medium =
            Medium::with_capture_time(Path::new("clip.mp4"), MediaKind::Video, at("2024-01-01 07:45:00"));
        let expected = Path::new("/media").join(medium.destination_name("12"));
        let first = medium.init_destination_path(Path::new("/media"), "12").to_path_buf();
        assert_eq!(first, expected);

        medium.shift_capture_time(TimeDelta::hours(1));
        let second = medium.init_destination_path(Path::new("/other"), "99").to_path_buf();
        assert_eq!(first, second);
        assert_eq!(medium.destination_name("12").len(), first.file_name().unwrap().len());
    }

    #[test]
    fn test_shift_and_manifest() {
        let mut medium =
            Medium::with_capture_time(Path::new("x.jpg"), MediaKind::Image, at("2024-01-01 07:45:00"));
        medium.shift_capture_time(TimeDelta::minutes(15));
        assert_eq!(medium.capture_time(), at("2024-01-01 08:00:00"));

        let summary = medium.to_manifest();
        assert_eq!(summary.medium_datetime, "2024-01-01 08:00:00");
        assert_eq!(summary.medium_id, medium.id());
        assert!(summary.path.is_none());
    }
}
