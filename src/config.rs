//! Configuration types for the perch uploader

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Kind of medium, decided by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Still images, timestamped from EXIF
    Image,
    /// Video clips, timestamped from container metadata
    Video,
}

/// Configuration for the perch uploader
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory media are copied into (`project/mount/check_date/...`)
    pub media_root: PathBuf,

    /// Optional second destination mirroring `media_root` (e.g. a NAS share)
    pub mirror_root: Option<PathBuf>,

    /// Directory receiving one manifest JSON per uploaded section
    pub task_dir: PathBuf,

    /// Base URL of the remote catalog API
    pub api_host: Option<String>,

    /// Extension of the per-section parameter file
    pub parameter_extension: String,

    /// Number of threads for metadata extraction (0 = auto)
    pub threads: usize,

    /// Verbose output
    pub verbose: bool,

    /// Recognized image extensions
    pub image_extensions: Vec<String>,

    /// Recognized video extensions
    pub video_extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            mirror_root: None,
            task_dir: PathBuf::from("tasks"),
            api_host: None,
            parameter_extension: "toml".into(),
            threads: 0, // Auto-detect
            verbose: false,
            image_extensions: vec!["jpg".into(), "jpeg".into(), "png".into(), "tif".into(), "tiff".into()],
            video_extensions: vec!["mp4".into(), "mov".into(), "avi".into()],
        }
    }
}

impl Config {
    /// Check if a file extension is a recognized image format
    pub fn is_image(&self, ext: &str) -> bool {
        let ext_lower = ext.to_lowercase();
        self.image_extensions.iter().any(|e| e == &ext_lower)
    }

    /// Check if a file extension is a recognized video format
    pub fn is_video(&self, ext: &str) -> bool {
        let ext_lower = ext.to_lowercase();
        self.video_extensions.iter().any(|e| e == &ext_lower)
    }

    /// Classify a path by its extension; `None` means the file is ignored
    pub fn media_kind(&self, path: &Path) -> Option<MediaKind> {
        let ext = path.extension().and_then(|e| e.to_str())?;
        if self.is_image(ext) {
            Some(MediaKind::Image)
        } else if self.is_video(ext) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    /// Check if a path is a parameter file
    pub fn is_parameter_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.parameter_extension))
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            source: e,
        })?;

        fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# Perch Upload Configuration File
# This file uses TOML format (https://toml.io)

# Media are copied to media_root/<project>/<mount name>/<check date>/
media_root = "Z:/perch-mount/media"

# Optional mirror of media_root, receives an identical copy
# mirror_root = "//nas/perch-mount/media"

# One manifest JSON per uploaded section is written here
task_dir = "Z:/perch-mount/tasks"

# Remote catalog API
api_host = "http://localhost:5000"

# Extension of the parameter file inside every section directory
parameter_extension = "toml"

# Number of threads for metadata extraction (0 = auto-detect)
threads = 0

verbose = false

image_extensions = ["jpg", "jpeg", "png", "tif", "tiff"]
video_extensions = ["mp4", "mov", "avi"]
"#
        .to_string()
    }
}

/// Errors that can occur when loading or saving configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to write configuration file
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to serialize configuration
    SerializeError {
        source: toml::ser::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
            ConfigError::WriteError { path, source } => {
                write!(f, "Failed to write config file '{}': {}", path.display(), source)
            }
            ConfigError::SerializeError { source } => {
                write!(f, "Failed to serialize config: {}", source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::WriteError { source, .. } => Some(source),
            ConfigError::SerializeError { source } => Some(source),
        }
    }
}
