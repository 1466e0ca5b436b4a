//! Section manifests handed to the downstream detector

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Parameter fields copied into every manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    pub perch_mount: String,
    pub perch_mount_name: String,
    pub project: String,
    pub mount_type: String,
    pub camera: String,
    pub check_date: String,
    pub operators: Vec<String>,
    pub valid: bool,
    pub note: Option<String>,
}

/// Section block of a manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSummary {
    /// Identifier assigned by the remote catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<i64>,

    #[serde(flatten)]
    pub parameters: ParameterSummary,

    pub start_time: String,
    pub end_time: String,
}

/// One medium as listed in a manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediumSummary {
    pub medium_id: String,
    pub medium_datetime: String,
    /// Destination path
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub section: SectionSummary,
    pub media: Vec<MediumSummary>,
}

impl Manifest {
    /// File name used in the task directory: `{mount name}_{check date}.json`
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.json",
            self.section.parameters.perch_mount_name, self.section.parameters.check_date
        )
    }

    /// Write the manifest into `task_dir`, returning the file path
    pub fn save(&self, task_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(task_dir).map_err(Error::at(task_dir))?;

        let path = task_dir.join(self.file_name());
        let file = File::create(&path).map_err(Error::at(&path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush().map_err(Error::at(&path))?;

        info!(?path, media = self.media.len(), "Saved manifest");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(section_id: Option<i64>) -> Manifest {
        Manifest {
            section: SectionSummary {
                section_id,
                parameters: ParameterSummary {
                    perch_mount: "12".into(),
                    perch_mount_name: "關渡-03".into(),
                    project: "Wetland".into(),
                    mount_type: "pole".into(),
                    camera: "Browning".into(),
                    check_date: "2024-01-10".into(),
                    operators: vec!["Lin".into()],
                    valid: true,
                    note: None,
                },
                start_time: "2024-01-01 08:00:00".into(),
                end_time: "2024-01-09 17:30:00".into(),
            },
            media: vec![MediumSummary {
                medium_id: "0f3c2a9e7b5d4c1a8e6f2b3c4d5e6f70".into(),
                medium_datetime: "2024-01-01 08:00:00".into(),
                path: Some(PathBuf::from("media/x.jpg")),
            }],
        }
    }

    #[test]
    fn test_section_id_is_optional() {
        let without = serde_json::to_value(sample(None)).unwrap();
        assert!(without["section"].get("section_id").is_none());
        assert_eq!(without["section"]["perch_mount"], "12");

        let with = serde_json::to_value(sample(Some(42))).unwrap();
        assert_eq!(with["section"]["section_id"], 42);
        assert_eq!(with["media"][0]["medium_datetime"], "2024-01-01 08:00:00");
    }

    #[test]
    fn test_save_keeps_unicode_name() {
        let dir = tempdir().unwrap();
        let manifest = sample(Some(7));

        let path = manifest.save(&dir.path().join("tasks")).unwrap();
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "關渡-03_2024-01-10.json");

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("關渡-03"));
        let back: Manifest = serde_json::from_str(&text).unwrap();
        assert_eq!(back, manifest);
    }
}
