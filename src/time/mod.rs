//! Capture time extraction
//!
//! Images carry their capture time in EXIF, videos in container metadata
//! read through FFprobe. Which extractor runs is decided by [`MediaKind`],
//! itself derived from the file extension by [`Config::media_kind`].
//!
//! [`Config::media_kind`]: crate::config::Config::media_kind

pub mod exif;
pub mod video;

use crate::config::MediaKind;
use crate::error::Result;
use chrono::NaiveDateTime;
use std::path::Path;

/// Anything able to tell when a medium was captured
///
/// Implementations must be shareable across the metadata worker threads.
pub trait CaptureTimeSource: Sync {
    fn capture_time(&self, kind: MediaKind, path: &Path) -> Result<NaiveDateTime>;
}

/// Reads capture times from the files' embedded metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedMetadata;

impl CaptureTimeSource for EmbeddedMetadata {
    fn capture_time(&self, kind: MediaKind, path: &Path) -> Result<NaiveDateTime> {
        match kind {
            MediaKind::Image => exif::extract_exif_time(path),
            MediaKind::Video => video::extract_video_time(path),
        }
    }
}
