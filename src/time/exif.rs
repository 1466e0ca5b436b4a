//! EXIF capture time extraction for images

use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use exif::{In, Reader, Tag};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::trace;

/// Extract the original capture time from EXIF metadata
pub fn extract_exif_time(path: &Path) -> Result<NaiveDateTime> {
    let file = File::open(path).map_err(|e| Error::MetadataMissing {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut reader = BufReader::new(file);

    let exif = Reader::new()
        .read_from_container(&mut reader)
        .map_err(|e| Error::MetadataMissing {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let field = exif
        .get_field(Tag::DateTimeOriginal, In::PRIMARY)
        .ok_or_else(|| Error::MetadataMissing {
            path: path.to_path_buf(),
            message: "No DateTimeOriginal tag in EXIF data".to_string(),
        })?;

    let text = field.display_value().to_string();
    let datetime = parse_exif_datetime(&text).ok_or_else(|| Error::MetadataMissing {
        path: path.to_path_buf(),
        message: format!("Unreadable DateTimeOriginal value {text:?}"),
    })?;

    trace!(?path, %datetime, "Found EXIF capture time");
    Ok(datetime)
}

/// Parse EXIF datetime string format: "YYYY:MM:DD HH:MM:SS"
pub(crate) fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim().trim_matches('"');

    let formats = [
        "%Y:%m:%d %H:%M:%S",
        "%Y:%m:%d %H:%M:%S%.f",
        // display_value renders datetimes with dashes
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
    ];

    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    None
}

/// Minimal JPEG carrying only an EXIF `DateTimeOriginal` tag
#[cfg(test)]
pub(crate) fn jpeg_with_capture_time(datetime: &str) -> Vec<u8> {
    assert_eq!(datetime.len(), 19, "EXIF datetimes are 19 characters");

    // Little-endian TIFF: header, IFD0 with an Exif pointer, Exif IFD, value
    let mut tiff: Vec<u8> = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());

    // IFD0 at 8: one entry, ExifIFDPointer -> 26
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&0x8769u16.to_le_bytes());
    tiff.extend_from_slice(&4u16.to_le_bytes());
    tiff.extend_from_slice(&1u32.to_le_bytes());
    tiff.extend_from_slice(&26u32.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());

    // Exif IFD at 26: DateTimeOriginal, ASCII[20] at 44
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&0x9003u16.to_le_bytes());
    tiff.extend_from_slice(&2u16.to_le_bytes());
    tiff.extend_from_slice(&20u32.to_le_bytes());
    tiff.extend_from_slice(&44u32.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());

    tiff.extend_from_slice(datetime.replace('-', ":").as_bytes());
    tiff.push(0);

    let mut app1 = b"Exif\0\0".to_vec();
    app1.extend_from_slice(&tiff);

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    jpeg.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
    jpeg.extend_from_slice(&app1);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}
