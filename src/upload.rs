//! Upload of staged sections
//!
//! For each section, in order:
//! 1. copy every medium to its destination (and mirror)
//! 2. register the section with the catalog
//! 3. write the manifest into the task directory
//! 4. flag the parameter file as uploaded
//!
//! A failure stops the run where it happened. Nothing is rolled back, and the
//! failing section is left unflagged so it can be inspected and retried.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::publish::SectionPublisher;
use crate::section::Section;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{Level, debug, info, span};

/// What one uploaded section produced
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub name: String,
    pub media: usize,
    pub section_id: Option<i64>,
    pub manifest: PathBuf,
}

pub struct Uploader<'a> {
    config: &'a Config,
    publisher: Option<&'a dyn SectionPublisher>,
}

impl<'a> Uploader<'a> {
    /// Without a publisher, sections are copied and written out but not registered
    pub fn new(config: &'a Config, publisher: Option<&'a dyn SectionPublisher>) -> Self {
        Self { config, publisher }
    }

    /// Upload every staged section, stopping at the first failure
    pub fn run(&self, sections: &mut [Section]) -> Result<Vec<UploadOutcome>> {
        let mut outcomes = Vec::with_capacity(sections.len());
        for section in sections.iter_mut() {
            outcomes.push(self.upload_section(section)?);
        }
        info!(sections = outcomes.len(), "All uploads finished");
        Ok(outcomes)
    }

    pub fn upload_section(&self, section: &mut Section) -> Result<UploadOutcome> {
        let name = section.display_name();
        let _span = span!(Level::INFO, "upload_section", section = %name).entered();

        info!(media = section.media().len(), "Copying media");
        copy_media(section)?;

        let section_id = match self.publisher {
            Some(publisher) => Some(publisher.publish(section)?),
            None => {
                info!("Publishing skipped");
                None
            }
        };

        let manifest = section.to_manifest(section_id)?.save(&self.config.task_dir)?;

        // Last step: the section only counts as uploaded once everything above succeeded
        section.mark_uploaded()?;
        info!("Upload complete");

        Ok(UploadOutcome {
            name,
            media: section.media().len(),
            section_id,
            manifest,
        })
    }
}

/// Copy every medium to its destination and to the same name in each mirror
fn copy_media(section: &Section) -> Result<()> {
    let mirrors = section.destination_dirs().get(1..).unwrap_or_default();

    for medium in section.media() {
        let dest = medium
            .destination_path()
            .ok_or_else(|| Error::NotStaged {
                dir: section.directory().to_path_buf(),
            })?;

        copy_preserving_mtime(medium.original_path(), dest)?;

        if let Some(file_name) = dest.file_name() {
            for mirror in mirrors {
                copy_preserving_mtime(medium.original_path(), &mirror.join(file_name))?;
            }
        }
    }
    Ok(())
}

/// Copy a file and carry over its modification time
fn copy_preserving_mtime(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(Error::at(parent))?;
    }

    copy_file(source, dest)?;

    if let Ok(metadata) = fs::metadata(source)
        && let Ok(mtime) = metadata.modified()
    {
        let _ = filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(mtime));
    }

    debug!(?source, ?dest, "Copied");
    Ok(())
}

/// Copy file with buffered I/O for efficiency
fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    let src_file = File::open(source).map_err(Error::at(source))?;
    let dest_file = File::create(dest).map_err(Error::at(dest))?;

    let mut reader = BufReader::with_capacity(256 * 1024, src_file);
    let mut writer = BufWriter::with_capacity(256 * 1024, dest_file);

    let mut buffer = vec![0u8; 256 * 1024];
    loop {
        let bytes_read = reader.read(&mut buffer).map_err(Error::at(source))?;
        if bytes_read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..bytes_read])
            .map_err(Error::at(dest))?;
    }

    writer.flush().map_err(Error::at(dest))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    #[test]
    fn test_copy_preserves_content_and_mtime() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.jpg");
        fs::write(&source, b"pixels").unwrap();
        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        filetime::set_file_mtime(&source, filetime::FileTime::from_system_time(old)).unwrap();

        let dest = dir.path().join("out/nested/b.jpg");
        copy_preserving_mtime(&source, &dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"pixels");
        assert_eq!(fs::metadata(&dest).unwrap().modified().unwrap(), old);
    }

    #[test]
    fn test_copy_reports_path() {
        let dir = tempdir().unwrap();
        let err = copy_preserving_mtime(&dir.path().join("missing.jpg"), &dir.path().join("x.jpg"))
            .unwrap_err();
        assert!(err.to_string().contains("missing.jpg"));
        assert!(!dir.path().join("x.jpg").exists());
    }
}
