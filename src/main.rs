//! Perch Upload - stage and upload perch-mount camera sections
//!
//! Validates a batch of section directories, corrects camera clock drift,
//! copies media to the media root, registers each section with the catalog
//! and writes a manifest for the downstream detector.

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use perch_upload::{
    Cli, Config, EmbeddedMetadata, Error, HttpPublisher, SectionPublisher, SectionReader, Uploader,
};
use std::path::{Path, PathBuf};
use tracing::{Level, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli_output {
    //! Colored terminal summary

    use crossterm::{
        ExecutableCommand,
        style::{Color, Print, Stylize, style},
    };
    use std::io::stdout;

    pub struct CliTheme;

    impl CliTheme {
        pub const SUCCESS: Color = Color::Green;
        pub const ERROR: Color = Color::Red;
        pub const HINT: Color = Color::DarkGrey;
        pub const ACCENT: Color = Color::Cyan;
    }

    pub fn print_separator() {
        let _ = stdout().execute(Print(format!("{}\n", "─".repeat(60))));
    }

    pub fn print_error(msg: &str) {
        let _ = stdout().execute(Print(style("✗ ").with(CliTheme::ERROR).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    /// One line per section: icon, name, detail
    pub fn print_result(status_icon: &str, status_color: Color, name: &str, detail: &str) {
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(style(status_icon).with(status_color).bold()));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(style(name).bold()));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(style(detail).with(CliTheme::HINT)));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_log_path(path: &str) {
        let _ = stdout().execute(Print("\n"));
        let _ = stdout().execute(Print(style("  Log file: ").with(CliTheme::ACCENT)));
        let _ = stdout().execute(Print(format!("{}\n", path)));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let exe_dir = get_executable_dir()?;
    let log_path = get_log_path(&exe_dir, &cli);
    let guard = setup_logging(&cli, &log_path)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Perch Upload starting");

    let config = load_config(&cli, &exe_dir)?;
    if config.verbose {
        info!(?config, "Configuration loaded");
    }
    info!(log_file = %log_path.display(), "Log file location");

    if let Err(e) = run(&cli, &config) {
        use cli_output::*;

        error!(error = %e, "Upload failed");
        print_separator();
        for line in e.to_string().lines() {
            print_error(line);
        }
        print_log_path(&log_path.display().to_string());
        drop(guard);
        std::process::exit(1);
    }

    cli_output::print_log_path(&log_path.display().to_string());
    drop(guard);
    Ok(())
}

fn run(cli: &Cli, config: &Config) -> perch_upload::Result<()> {
    use cli_output::*;

    let reader = SectionReader::load(&cli.input, config, &EmbeddedMetadata)?;
    let mut sections = reader.into_sections();

    let http;
    let publisher: Option<&dyn SectionPublisher> = if cli.skip_publish {
        None
    } else {
        let host = config
            .api_host
            .as_deref()
            .ok_or_else(|| Error::Publish("no catalog host configured".into()))?;
        http = HttpPublisher::new(host)?;
        Some(&http)
    };

    let outcomes = Uploader::new(config, publisher).run(&mut sections)?;

    print_separator();
    for outcome in &outcomes {
        let id = outcome
            .section_id
            .map(|id| format!("section {}", id))
            .unwrap_or_else(|| "not published".to_string());
        print_result(
            "✓",
            CliTheme::SUCCESS,
            &outcome.name,
            &format!("{} media, {} → {}", outcome.media, id, outcome.manifest.display()),
        );
    }
    print_separator();
    Ok(())
}

/// Get the directory where the executable is located
fn get_executable_dir() -> Result<PathBuf> {
    let exe_path = std::env::current_exe()?;
    Ok(exe_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".")))
}

fn get_log_path(exe_dir: &Path, cli: &Cli) -> PathBuf {
    let log_dir = cli.log_dir.clone().unwrap_or_else(|| exe_dir.join("Log"));
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    log_dir.join(format!("Upload_{}.log", timestamp))
}

/// Resolve config path - supports shorthand syntax
fn resolve_config_path(exe_dir: &Path, config_path: &Path) -> PathBuf {
    if config_path.exists() {
        return config_path.to_path_buf();
    }

    let with_extension = if config_path.extension().is_none() {
        config_path.with_extension("toml")
    } else {
        config_path.to_path_buf()
    };

    if with_extension.exists() {
        return with_extension;
    }

    let config_dir = exe_dir.join("Config");
    let filename = config_path.file_name().unwrap_or(config_path.as_os_str());

    let mut in_config_dir = config_dir.join(filename);
    if in_config_dir.extension().is_none() {
        in_config_dir = in_config_dir.with_extension("toml");
    }

    if in_config_dir.exists() {
        return in_config_dir;
    }

    config_path.to_path_buf()
}

/// Load configuration from file or CLI arguments
fn load_config(cli: &Cli, exe_dir: &Path) -> Result<Config> {
    let config = if let Some(ref config_path) = cli.config {
        let resolved_path = resolve_config_path(exe_dir, config_path);
        info!(config_file = %resolved_path.display(), "Loading configuration from file");
        let file_config = Config::load_from_file(&resolved_path)?;
        cli.merge_with_config(file_config)
    } else {
        cli.to_config()
    };

    if !cli.input.is_dir() {
        anyhow::bail!("Input directory {} does not exist", cli.input.display());
    }

    Ok(config)
}

/// Setup logging (file + console)
fn setup_logging(cli: &Cli, log_path: &Path) -> Result<WorkerGuard> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if cli.json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(guard)
}
