//! Per-section parameter record
//!
//! Every section directory carries one parameter file describing the field
//! visit (mount, project, camera, check date, operators...). The file is
//! parsed into a generic TOML table first and then checked key by key, so a
//! malformed file reports every problem at once instead of the first one.
//!
//! The record is read-only apart from the `uploaded` flag, which is flipped
//! exactly once by [`ParameterRecord::mark_uploaded`] at the end of a
//! successful upload.

use crate::manifest::ParameterSummary;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::{Table, Value};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Date format used for `check_date` and in manifests
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Datetime format used for `start_time` and in manifests
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors raised while locating, parsing or rewriting a parameter file
#[derive(Error, Debug)]
pub enum ParameterError {
    #[error("config not found in {}", dir.display())]
    Missing { dir: PathBuf },

    #[error("Failed to read parameter file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse parameter file '{}': {source}", path.display())]
    Syntax {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid parameter file '{}': {}", path.display(), problems.join("; "))]
    Schema { path: PathBuf, problems: Vec<String> },

    #[error("Failed to write parameter file '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize parameter file: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Typed view over a section parameter file
#[derive(Debug, Clone)]
pub struct ParameterRecord {
    path: PathBuf,
    raw: Table,
    perch_mount_id: String,
    perch_mount_name: String,
    project: String,
    mount_type: String,
    camera: String,
    check_date: NaiveDate,
    operators: Vec<String>,
    valid: bool,
    note: Option<String>,
    uploaded: bool,
    start_time: Option<NaiveDateTime>,
}

impl ParameterRecord {
    /// Locate the parameter file in `dir` and load it
    ///
    /// The first file (in file-name order, recursively) whose extension
    /// matches `extension` is used.
    pub fn find_in(dir: &Path, extension: &str) -> Result<Self, ParameterError> {
        let found = WalkDir::new(dir)
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
            .find(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(extension))
            });

        match found {
            Some(path) => Self::load(&path),
            None => Err(ParameterError::Missing {
                dir: dir.to_path_buf(),
            }),
        }
    }

    /// Load and validate a parameter file
    pub fn load(path: &Path) -> Result<Self, ParameterError> {
        let content = fs::read_to_string(path).map_err(|e| ParameterError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let raw: Table = toml::from_str(&content).map_err(|e| ParameterError::Syntax {
            path: path.to_path_buf(),
            source: e,
        })?;

        let record = Self::from_table(path, raw)?;
        debug!(?path, mount = %record.perch_mount_name, "Loaded parameter record");
        Ok(record)
    }

    fn from_table(path: &Path, raw: Table) -> Result<Self, ParameterError> {
        let mut schema = Schema::new(&raw);

        let perch_mount_id = schema.identifier("perch_mount_id");
        let perch_mount_name = schema.string("perch_mount_name");
        let project = schema.string("project");
        let mount_type = schema.string("mount_type");
        let camera = schema.string("camera");
        let check_date = schema.date("check_date");
        let operators = schema.string_list("operators");
        let valid = schema.boolean("valid");
        let note = schema.optional_string("note");
        let uploaded = schema.optional_boolean("uploaded").unwrap_or(false);
        let start_time = schema.optional_datetime("start_time");

        if !schema.problems.is_empty() {
            return Err(ParameterError::Schema {
                path: path.to_path_buf(),
                problems: schema.problems,
            });
        }

        // Every required getter pushed a problem when it returned None
        match (
            perch_mount_id,
            perch_mount_name,
            project,
            mount_type,
            camera,
            check_date,
            operators,
            valid,
        ) {
            (
                Some(perch_mount_id),
                Some(perch_mount_name),
                Some(project),
                Some(mount_type),
                Some(camera),
                Some(check_date),
                Some(operators),
                Some(valid),
            ) => Ok(Self {
                path: path.to_path_buf(),
                raw,
                perch_mount_id,
                perch_mount_name,
                project,
                mount_type,
                camera,
                check_date,
                operators,
                valid,
                note,
                uploaded,
                start_time,
            }),
            _ => Err(ParameterError::Schema {
                path: path.to_path_buf(),
                problems: vec!["incomplete record".to_string()],
            }),
        }
    }

    /// Flag the record as uploaded and write it back to its file
    ///
    /// Keys not known to the record are preserved.
    pub fn mark_uploaded(&mut self) -> Result<(), ParameterError> {
        let mut raw = self.raw.clone();
        raw.insert("uploaded".to_string(), Value::Boolean(true));

        let content = toml::to_string_pretty(&raw)?;

        // Write to a temporary file first, then rename over the original
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, content).map_err(|e| ParameterError::Write {
            path: temp_path.clone(),
            source: e,
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| ParameterError::Write {
            path: self.path.clone(),
            source: e,
        })?;

        self.raw = raw;
        self.uploaded = true;
        info!(path = ?self.path, "Marked parameter record as uploaded");
        Ok(())
    }

    /// Stable field set written into manifests
    pub fn to_manifest(&self) -> ParameterSummary {
        ParameterSummary {
            perch_mount: self.perch_mount_id.clone(),
            perch_mount_name: self.perch_mount_name.clone(),
            project: self.project.clone(),
            mount_type: self.mount_type.clone(),
            camera: self.camera.clone(),
            check_date: self.check_date_str(),
            operators: self.operators.clone(),
            valid: self.valid,
            note: self.note.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn perch_mount_id(&self) -> &str {
        &self.perch_mount_id
    }

    pub fn perch_mount_name(&self) -> &str {
        &self.perch_mount_name
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn mount_type(&self) -> &str {
        &self.mount_type
    }

    pub fn camera(&self) -> &str {
        &self.camera
    }

    pub fn check_date(&self) -> NaiveDate {
        self.check_date
    }

    /// `check_date` as `YYYY-MM-DD`
    pub fn check_date_str(&self) -> String {
        self.check_date.format(DATE_FORMAT).to_string()
    }

    pub fn operators(&self) -> &[String] {
        &self.operators
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn uploaded(&self) -> bool {
        self.uploaded
    }

    /// Externally recorded true start of the deployment, if any
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.start_time
    }

    /// Human-readable `"{mount name} {check date}"`
    pub fn display_name(&self) -> String {
        format!("{} {}", self.perch_mount_name, self.check_date_str())
    }
}

/// Key-by-key reader that records every problem instead of stopping early
struct Schema<'a> {
    table: &'a Table,
    problems: Vec<String>,
}

impl<'a> Schema<'a> {
    fn new(table: &'a Table) -> Self {
        Self {
            table,
            problems: Vec::new(),
        }
    }

    fn required(&mut self, key: &str) -> Option<&'a Value> {
        let value = self.table.get(key);
        if value.is_none() {
            self.problems.push(format!("missing key `{key}`"));
        }
        value
    }

    fn invalid(&mut self, key: &str, expected: &str) {
        self.problems.push(format!("`{key}` must be {expected}"));
    }

    fn string(&mut self, key: &str) -> Option<String> {
        match self.required(key)? {
            Value::String(s) => Some(s.clone()),
            _ => {
                self.invalid(key, "a string");
                None
            }
        }
    }

    /// Mount identifiers are often written as bare numbers
    fn identifier(&mut self, key: &str) -> Option<String> {
        match self.required(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            _ => {
                self.invalid(key, "a string or an integer");
                None
            }
        }
    }

    fn boolean(&mut self, key: &str) -> Option<bool> {
        match self.required(key)? {
            Value::Boolean(b) => Some(*b),
            _ => {
                self.invalid(key, "a boolean");
                None
            }
        }
    }

    fn string_list(&mut self, key: &str) -> Option<Vec<String>> {
        match self.required(key)? {
            Value::Array(items) => {
                let strings: Option<Vec<String>> = items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string))
                    .collect();
                if strings.is_none() {
                    self.invalid(key, "a list of strings");
                }
                strings
            }
            _ => {
                self.invalid(key, "a list of strings");
                None
            }
        }
    }

    fn date(&mut self, key: &str) -> Option<NaiveDate> {
        let value = self.required(key)?;
        let parsed = datetime_text(value).and_then(|s| parse_date(&s));
        if parsed.is_none() {
            self.invalid(key, "a date (YYYY-MM-DD)");
        }
        parsed
    }

    fn optional_string(&mut self, key: &str) -> Option<String> {
        match self.table.get(key)? {
            Value::String(s) => Some(s.clone()),
            _ => {
                self.invalid(key, "a string");
                None
            }
        }
    }

    fn optional_boolean(&mut self, key: &str) -> Option<bool> {
        match self.table.get(key)? {
            Value::Boolean(b) => Some(*b),
            _ => {
                self.invalid(key, "a boolean");
                None
            }
        }
    }

    fn optional_datetime(&mut self, key: &str) -> Option<NaiveDateTime> {
        let value = self.table.get(key)?;
        let parsed = datetime_text(value).and_then(|s| parse_datetime(&s));
        if parsed.is_none() {
            self.invalid(key, "a datetime (YYYY-MM-DD HH:MM:SS)");
        }
        parsed
    }
}

/// Native TOML dates and quoted strings are both accepted
fn datetime_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Datetime(dt) => Some(dt.to_string()),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// Parse a local datetime; an explicit offset is dropped, keeping wall-clock time
fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let formats = [
        DATETIME_FORMAT,
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];

    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local())
}
