//! CLI argument parsing with clap

use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

/// Perch Upload - stage and upload perch-mount camera sections
///
/// Every subdirectory of the input directory is one section: the media of a
/// single field visit plus its parameter file. The whole batch is validated
/// first; nothing is copied unless every section passes.
#[derive(Parser, Debug)]
#[command(name = "perch-upload")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file (TOML format)
    ///
    /// When specified, settings from the config file are used as defaults.
    /// CLI arguments will override config file settings.
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Directory whose subdirectories are the sections to upload
    #[arg(short, long)]
    pub input: PathBuf,

    /// Root directory media are copied into
    #[arg(short, long, env = "PERCH_MEDIA_ROOT")]
    pub media_root: Option<PathBuf>,

    /// Second destination mirroring the media root
    #[arg(long)]
    pub mirror_root: Option<PathBuf>,

    /// Directory receiving the section manifests
    #[arg(short, long, env = "PERCH_TASK_DIR")]
    pub task_dir: Option<PathBuf>,

    /// Base URL of the remote catalog API
    #[arg(long, env = "PERCH_API_HOST")]
    pub host: Option<String>,

    /// Copy and write manifests without registering sections in the catalog
    #[arg(long)]
    pub skip_publish: bool,

    /// Number of threads for metadata extraction (0 = auto)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Directory for log files (defaults to Log/ next to the executable)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output log format as JSON
    #[arg(long)]
    pub json_log: bool,
}

impl Cli {
    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some(ref media_root) = self.media_root {
            config.media_root = media_root.clone();
        }
        if let Some(ref mirror_root) = self.mirror_root {
            config.mirror_root = Some(mirror_root.clone());
        }
        if let Some(ref task_dir) = self.task_dir {
            config.task_dir = task_dir.clone();
        }
        if let Some(ref host) = self.host {
            config.api_host = Some(host.clone());
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if self.verbose {
            config.verbose = true;
        }

        config
    }

    /// Convert CLI arguments to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_file_config() {
        let cli = Cli::parse_from([
            "perch-upload",
            "--input",
            "/cards",
            "--media-root",
            "/srv/media",
            "--host",
            "http://catalog:5000",
            "-j",
            "4",
        ]);

        let mut file_config = Config::default();
        file_config.task_dir = PathBuf::from("/srv/tasks");
        file_config.media_root = PathBuf::from("/old");

        let config = cli.merge_with_config(file_config);
        assert_eq!(config.media_root, PathBuf::from("/srv/media"));
        assert_eq!(config.task_dir, PathBuf::from("/srv/tasks"));
        assert_eq!(config.api_host.as_deref(), Some("http://catalog:5000"));
        assert_eq!(config.threads, 4);
        assert!(!cli.skip_publish);
    }

    #[test]
    fn test_to_config_uses_defaults() {
        let cli = Cli::parse_from(["perch-upload", "-i", "/cards", "--skip-publish"]);
        let config = cli.to_config();
        assert_eq!(config.parameter_extension, "toml");
        assert!(cli.skip_publish);
    }
}
