//! Error types for the perch uploader

use crate::parameters::ParameterError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for uploader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the perch uploader
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error at {path}: {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error("Capture time missing in {path}: {message}")]
    MetadataMissing { path: PathBuf, message: String },

    #[error("FFprobe not found. Please install FFmpeg and ensure ffprobe is in PATH")]
    FfprobeNotFound,

    #[error("Section {dir} has no recognized media")]
    EmptySection { dir: PathBuf },

    #[error("Section {dir} has no parameter record")]
    MissingParameters { dir: PathBuf },

    #[error("Section {dir} has not been staged")]
    NotStaged { dir: PathBuf },

    #[error("Section {dir} already has destination paths")]
    AlreadyStaged { dir: PathBuf },

    #[error("Upload rejected:\n{}", .0.join("\n"))]
    BatchRejected(Vec<String>),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Attach the path an I/O operation was working on
    pub fn at(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Error {
        let path = path.into();
        move |source| Error::PathIo { path, source }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Publish(e.to_string())
    }
}
