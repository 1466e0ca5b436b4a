//! Registration of uploaded sections with the remote catalog

use crate::error::{Error, Result};
use crate::parameters::DATETIME_FORMAT;
use crate::section::Section;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Registers a section and returns the identifier the catalog assigned
pub trait SectionPublisher {
    fn publish(&self, section: &Section) -> Result<i64>;
}

/// Body of `POST /api/section`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSection {
    pub perch_mount: String,
    pub mount_type: String,
    pub camera: String,
    pub start_time: String,
    pub end_time: String,
    pub check_date: String,
    pub valid: bool,
    pub note: Option<String>,
}

impl NewSection {
    pub fn from_section(section: &Section) -> Result<Self> {
        let p = section.parameters().ok_or_else(|| Error::MissingParameters {
            dir: section.directory().to_path_buf(),
        })?;

        Ok(Self {
            perch_mount: p.perch_mount_id().to_string(),
            mount_type: p.mount_type().to_string(),
            camera: p.camera().to_string(),
            start_time: section.start_time()?.format(DATETIME_FORMAT).to_string(),
            end_time: section.end_time()?.format(DATETIME_FORMAT).to_string(),
            check_date: p.check_date_str(),
            valid: p.valid(),
            note: p.note().map(str::to_string),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CreatedSection {
    section_id: i64,
}

#[derive(Debug, Serialize)]
struct Operators<'a> {
    operators: &'a [String],
}

/// Publishes over the catalog's JSON HTTP API
pub struct HttpPublisher {
    host: String,
    client: reqwest::blocking::Client,
}

impl HttpPublisher {
    pub fn new(host: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }
}

impl SectionPublisher for HttpPublisher {
    fn publish(&self, section: &Section) -> Result<i64> {
        let body = NewSection::from_section(section)?;
        debug!(?body, "Posting section");

        let created: CreatedSection = self
            .client
            .post(self.url("/api/section"))
            .json(&body)
            .send()?
            .error_for_status()?
            .json()?;

        let operators = section
            .parameters()
            .map(|p| p.operators())
            .unwrap_or_default();
        self.client
            .post(self.url(&format!("/api/section/{}/operators", created.section_id)))
            .json(&Operators { operators })
            .send()?
            .error_for_status()?;

        info!(
            section = %section.display_name(),
            section_id = created.section_id,
            "Registered section with catalog"
        );
        Ok(created.section_id)
    }
}
