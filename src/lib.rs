//! Perch Upload - staging and upload of perch-mount camera sections
//!
//! A section is one field visit to a perch mount: a directory holding the
//! camera's photos and videos plus a parameter file describing the visit.
//! This library provides:
//! - Batch validation of section directories before anything is modified
//! - EXIF and FFprobe-based capture time extraction
//! - Camera clock drift correction against a recorded start time
//! - Deterministic, collision-free destination naming
//! - Copy, catalog registration and manifest output for staged sections

pub mod cli;
pub mod config;
pub mod error;
pub mod manifest;
pub mod media;
pub mod parameters;
pub mod publish;
pub mod reader;
pub mod section;
pub mod time;
pub mod upload;

pub use cli::Cli;
pub use config::{Config, ConfigError, MediaKind};
pub use error::{Error, Result};
pub use manifest::Manifest;
pub use media::Medium;
pub use parameters::{ParameterError, ParameterRecord};
pub use publish::{HttpPublisher, SectionPublisher};
pub use reader::{SectionReader, ValidationIssue};
pub use section::Section;
pub use time::{CaptureTimeSource, EmbeddedMetadata};
pub use upload::{UploadOutcome, Uploader};
