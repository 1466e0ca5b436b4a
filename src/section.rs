//! One field visit: a parameter record plus the media captured during it

use crate::config::Config;
use crate::error::{Error, Result};
use crate::manifest::{Manifest, SectionSummary};
use crate::media::Medium;
use crate::parameters::{DATETIME_FORMAT, ParameterError, ParameterRecord};
use crate::time::CaptureTimeSource;
use chrono::{NaiveDateTime, TimeDelta};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug)]
pub struct Section {
    directory: PathBuf,
    parameters: std::result::Result<ParameterRecord, ParameterError>,
    media: Vec<Medium>,
    destination_dirs: Vec<PathBuf>,
}

impl Section {
    /// Build a section from its directory
    ///
    /// A missing or invalid parameter file does not fail here; it is kept on
    /// the section and reported when the whole batch is validated.
    pub fn build(directory: &Path, config: &Config) -> Self {
        let parameters = ParameterRecord::find_in(directory, &config.parameter_extension);
        if let Err(ref e) = parameters {
            debug!(?directory, error = %e, "Section has no usable parameter record");
        }

        Self {
            directory: directory.to_path_buf(),
            parameters,
            media: Vec::new(),
            destination_dirs: Vec::new(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn parameters(&self) -> Option<&ParameterRecord> {
        self.parameters.as_ref().ok()
    }

    /// Why the parameter record could not be loaded, if it could not
    pub fn parameter_error(&self) -> Option<&ParameterError> {
        self.parameters.as_ref().err()
    }

    pub fn media(&self) -> &[Medium] {
        &self.media
    }

    /// Destination directories created by [`Section::init_destination_dir`],
    /// the media root first and the mirror second
    pub fn destination_dirs(&self) -> &[PathBuf] {
        &self.destination_dirs
    }

    fn require_parameters(&self) -> Result<&ParameterRecord> {
        self.parameters().ok_or_else(|| Error::MissingParameters {
            dir: self.directory.clone(),
        })
    }

    /// `"{mount name} {check date}"`, or the directory when unnamed
    pub fn display_name(&self) -> String {
        match self.parameters() {
            Some(p) => p.display_name(),
            None => self.directory.display().to_string(),
        }
    }

    /// Walk the directory and collect every medium with a readable capture time
    ///
    /// Symlinks are followed. Files whose capture time cannot be extracted are
    /// logged and left out, as are entries the walk cannot read. Calling this
    /// again replaces the media read before. Returns the paths that were
    /// skipped.
    pub fn read_media(
        &mut self,
        config: &Config,
        source: &dyn CaptureTimeSource,
    ) -> Result<Vec<PathBuf>> {
        info!(section = %self.display_name(), "Reading media");
        self.media.clear();

        let candidates: Vec<_> = WalkDir::new(&self.directory)
            .sort_by_file_name()
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e.into_path()),
                Err(e) => {
                    warn!(path = ?e.path(), error = %e, "Skipping unreadable entry");
                    None
                }
            })
            .filter(|p| p.is_file())
            .filter(|p| !config.is_parameter_file(p))
            .filter_map(|p| config.media_kind(&p).map(|kind| (p, kind)))
            .collect();

        // Extraction runs in parallel; collect keeps walk order
        let results: Vec<_> = candidates
            .par_iter()
            .map(|(path, kind)| Medium::create(path, *kind, source))
            .collect();

        let mut skipped = Vec::new();
        for ((path, _), result) in candidates.into_iter().zip(results) {
            match result {
                Ok(medium) => self.media.push(medium),
                Err(e) => {
                    warn!(?path, error = %e, "Skipping medium without capture time");
                    skipped.push(path);
                }
            }
        }

        info!(
            section = %self.display_name(),
            media = self.media.len(),
            skipped = skipped.len(),
            "Finished reading media"
        );
        Ok(skipped)
    }

    /// Earliest capture time among the media
    pub fn start_time(&self) -> Result<NaiveDateTime> {
        self.media
            .iter()
            .map(Medium::capture_time)
            .min()
            .ok_or_else(|| Error::EmptySection {
                dir: self.directory.clone(),
            })
    }

    /// Latest capture time among the media
    pub fn end_time(&self) -> Result<NaiveDateTime> {
        self.media
            .iter()
            .map(Medium::capture_time)
            .max()
            .ok_or_else(|| Error::EmptySection {
                dir: self.directory.clone(),
            })
    }

    /// Align the camera clock with the recorded deployment start
    ///
    /// Every medium is moved by `parameters.start_time - start_time`, so the
    /// earliest medium lands exactly on the recorded start. Does nothing when
    /// no start time was recorded. Returns the applied shift.
    ///
    /// Fails once destination paths are assigned.
    pub fn shift_media_datetime(&mut self) -> Result<Option<TimeDelta>> {
        if self.media.iter().any(|m| m.destination_path().is_some()) {
            return Err(Error::AlreadyStaged {
                dir: self.directory.clone(),
            });
        }

        let Some(declared) = self.require_parameters()?.start_time() else {
            return Ok(None);
        };

        let delta = declared - self.start_time()?;
        for medium in &mut self.media {
            medium.shift_capture_time(delta);
        }

        info!(
            section = %self.display_name(),
            shift_seconds = delta.num_seconds(),
            "Shifted media capture times"
        );
        Ok(Some(delta))
    }

    /// `project/mount name/check date`
    fn relative_destination(&self) -> Result<PathBuf> {
        let p = self.require_parameters()?;
        Ok(PathBuf::from(p.project())
            .join(p.perch_mount_name())
            .join(p.check_date_str()))
    }

    /// Create the destination directory under the media root, and under the
    /// mirror root when one is configured
    ///
    /// Existing directories are accepted.
    pub fn init_destination_dir(&mut self, config: &Config) -> Result<&Path> {
        let relative = self.relative_destination()?;

        let roots = std::iter::once(&config.media_root).chain(config.mirror_root.as_ref());
        let mut dirs = Vec::new();
        for root in roots {
            let dir = root.join(&relative);
            fs::create_dir_all(&dir).map_err(Error::at(&dir))?;
            debug!(?dir, "Destination directory ready");
            dirs.push(dir);
        }

        self.destination_dirs = dirs;
        Ok(&self.destination_dirs[0])
    }

    /// Assign every medium its destination path under the primary destination
    pub fn init_destination_paths(&mut self) -> Result<()> {
        let parent = self
            .destination_dirs
            .first()
            .cloned()
            .ok_or_else(|| Error::NotStaged {
                dir: self.directory.clone(),
            })?;
        let mount_id = self.require_parameters()?.perch_mount_id().to_string();

        for medium in &mut self.media {
            medium.init_destination_path(&parent, &mount_id);
        }
        Ok(())
    }

    /// Manifest for this section, optionally carrying the catalog's section id
    pub fn to_manifest(&self, section_id: Option<i64>) -> Result<Manifest> {
        let parameters = self.require_parameters()?;

        Ok(Manifest {
            section: SectionSummary {
                section_id,
                parameters: parameters.to_manifest(),
                start_time: self.start_time()?.format(DATETIME_FORMAT).to_string(),
                end_time: self.end_time()?.format(DATETIME_FORMAT).to_string(),
            },
            media: self.media.iter().map(Medium::to_manifest).collect(),
        })
    }

    /// Flag the section's parameter file as uploaded
    pub fn mark_uploaded(&mut self) -> Result<()> {
        match self.parameters.as_mut() {
            Ok(p) => Ok(p.mark_uploaded()?),
            Err(_) => Err(Error::MissingParameters {
                dir: self.directory.clone(),
            }),
        }
    }
}
