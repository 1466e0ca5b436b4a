//! Batch reading and validation of section directories
//!
//! A batch is the set of immediate subdirectories of one parent directory.
//! The batch is validated as a whole before anything is touched: if any
//! section lacks a usable parameter file or was uploaded before, every
//! problem is reported together and no section proceeds.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::parameters::ParameterError;
use crate::section::Section;
use crate::time::CaptureTimeSource;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, info, span, warn};

/// A reason a section may not be uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// No parameter file in the section directory
    ConfigMissing { dir: PathBuf },
    /// A parameter file exists but could not be used
    ConfigInvalid { dir: PathBuf, message: String },
    /// The parameter file is already flagged as uploaded
    AlreadyUploaded { name: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::ConfigMissing { dir } => {
                write!(f, "config not found in {}", dir.display())
            }
            ValidationIssue::ConfigInvalid { message, .. } => f.write_str(message),
            ValidationIssue::AlreadyUploaded { name } => write!(f, "{} already uploaded", name),
        }
    }
}

/// Sections read from one parent directory, validated and staged
#[derive(Debug)]
pub struct SectionReader {
    sections: Vec<Section>,
}

impl SectionReader {
    /// Build one section per immediate subdirectory of `parent`, in name order
    ///
    /// Plain files in `parent` are ignored.
    pub fn scan(parent: &Path, config: &Config) -> Result<Vec<Section>> {
        let mut dirs: Vec<PathBuf> = fs::read_dir(parent)
            .map_err(Error::at(parent))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        debug!(?parent, count = dirs.len(), "Found section directories");
        Ok(dirs.iter().map(|d| Section::build(d, config)).collect())
    }

    /// Check every section for a usable parameter record and for a previous
    /// upload
    ///
    /// Both checks always run over the whole batch. An empty result means the
    /// batch may proceed.
    pub fn validate_batch(sections: &[Section]) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for section in sections {
            match section.parameter_error() {
                None => {}
                Some(ParameterError::Missing { dir }) => {
                    issues.push(ValidationIssue::ConfigMissing { dir: dir.clone() });
                }
                Some(e) => issues.push(ValidationIssue::ConfigInvalid {
                    dir: section.directory().to_path_buf(),
                    message: e.to_string(),
                }),
            }
        }

        for parameters in sections.iter().filter_map(Section::parameters) {
            if parameters.uploaded() {
                issues.push(ValidationIssue::AlreadyUploaded {
                    name: parameters.display_name(),
                });
            }
        }

        for issue in &issues {
            warn!(%issue, "Section failed validation");
        }
        issues
    }

    /// Scan, validate and stage every section under `parent`
    ///
    /// Staging first reads media and corrects clock drift for every section,
    /// then creates destination directories and assigns destination paths.
    /// Nothing is read or created when validation fails.
    pub fn load(parent: &Path, config: &Config, source: &dyn CaptureTimeSource) -> Result<Self> {
        let _span = span!(Level::INFO, "reader_load", ?parent).entered();

        // Configure Rayon thread pool
        if config.threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .build_global()
                .ok(); // Ignore if already initialized
        }

        let mut sections = Self::scan(parent, config)?;

        let issues = Self::validate_batch(&sections);
        if !issues.is_empty() {
            return Err(Error::BatchRejected(
                issues.iter().map(ToString::to_string).collect(),
            ));
        }

        for section in &mut sections {
            section.read_media(config, source)?;
            if section.media().is_empty() {
                return Err(Error::EmptySection {
                    dir: section.directory().to_path_buf(),
                });
            }
            section.shift_media_datetime()?;
        }

        for section in &mut sections {
            section.init_destination_dir(config)?;
            section.init_destination_paths()?;
        }

        info!(sections = sections.len(), "Staged sections");
        Ok(Self { sections })
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn sections_mut(&mut self) -> &mut [Section] {
        &mut self.sections
    }

    pub fn into_sections(self) -> Vec<Section> {
        self.sections
    }
}
