//! End-to-end staging and upload against a recording catalog

use chrono::NaiveDateTime;
use perch_upload::{
    CaptureTimeSource, Config, Error, Manifest, MediaKind, ParameterRecord, Result, Section,
    SectionPublisher, SectionReader, Uploader,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Capture times keyed by file name
struct KnownTimes(HashMap<String, NaiveDateTime>);

impl CaptureTimeSource for KnownTimes {
    fn capture_time(&self, _kind: MediaKind, path: &Path) -> Result<NaiveDateTime> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        self.0.get(name).copied().ok_or_else(|| Error::MetadataMissing {
            path: path.to_path_buf(),
            message: "unknown file".into(),
        })
    }
}

#[derive(Default)]
struct RecordingPublisher {
    published: RefCell<Vec<String>>,
    fail: bool,
}

impl SectionPublisher for RecordingPublisher {
    fn publish(&self, section: &Section) -> Result<i64> {
        if self.fail {
            return Err(Error::Publish("catalog unavailable".into()));
        }
        let mut published = self.published.borrow_mut();
        published.push(section.display_name());
        Ok(100 + published.len() as i64)
    }
}

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn write_section(dir: &Path, name: &str, extra: &str, files: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("parameters.toml"),
        format!(
            r#"perch_mount_id = "PM-7"
perch_mount_name = "{name}"
project = "Coast"
mount_type = "tower"
camera = "Reconyx"
check_date = 2024-02-01
operators = ["Wu", "Tsai"]
valid = true
{extra}
"#
        ),
    )
    .unwrap();
    for file in files {
        fs::write(dir.join(file), file.as_bytes()).unwrap();
    }
}

struct Fixture {
    _input: tempfile::TempDir,
    _output: tempfile::TempDir,
    parent: PathBuf,
    config: Config,
    source: KnownTimes,
}

fn fixture() -> Fixture {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    let parent = input.path().to_path_buf();

    write_section(
        &parent.join("north"),
        "North",
        "start_time = \"2024-01-01 08:00:00\"",
        &["n1.jpg", "n2.jpg", "n3.mp4", "n4.jpg", "readme.txt"],
    );
    write_section(&parent.join("south"), "South", "", &["s1.jpg", "s2.jpg"]);

    let source = KnownTimes(HashMap::from([
        ("n1.jpg".to_string(), at("2024-01-01 07:45:00")),
        ("n2.jpg".to_string(), at("2024-01-01 07:45:00")),
        ("n3.mp4".to_string(), at("2024-01-03 12:00:00")),
        // n4.jpg has no capture time
        ("s1.jpg".to_string(), at("2024-01-20 06:30:00")),
        ("s2.jpg".to_string(), at("2024-01-21 17:10:00")),
    ]));

    let mut config = Config::default();
    config.media_root = output.path().join("media");
    config.mirror_root = Some(output.path().join("nas"));
    config.task_dir = output.path().join("tasks");

    Fixture {
        _input: input,
        _output: output,
        parent,
        config,
        source,
    }
}

#[test]
fn test_full_upload() {
    let fx = fixture();

    let reader = SectionReader::load(&fx.parent, &fx.config, &fx.source).unwrap();
    let mut sections = reader.into_sections();
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0].media().len(), 3);

    let publisher = RecordingPublisher::default();
    let outcomes = Uploader::new(&fx.config, Some(&publisher))
        .run(&mut sections)
        .unwrap();

    assert_eq!(
        *publisher.published.borrow(),
        vec!["North 2024-02-01".to_string(), "South 2024-02-01".to_string()]
    );
    assert_eq!(outcomes[0].section_id, Some(101));
    assert_eq!(outcomes[1].section_id, Some(102));

    // Media copied to both roots under project/mount/check_date
    let north_dir = Path::new("Coast/North/2024-02-01");
    for medium in sections[0].media() {
        let dest = medium.destination_path().unwrap();
        assert!(dest.starts_with(fx.config.media_root.join(north_dir)));
        assert_eq!(fs::read(dest).unwrap(), fs::read(medium.original_path()).unwrap());

        let mirrored = fx
            .config
            .mirror_root
            .as_ref()
            .unwrap()
            .join(north_dir)
            .join(dest.file_name().unwrap());
        assert!(mirrored.is_file());
    }

    // Same capture time, different names
    let names: Vec<_> = sections[0]
        .media()
        .iter()
        .map(|m| m.destination_path().unwrap().file_name().unwrap().to_owned())
        .collect();
    assert_ne!(names[0], names[1]);
    assert!(names[0].to_str().unwrap().starts_with("PM-7_20240101_080000_"));

    // Manifest reflects the corrected clock
    let text = fs::read_to_string(fx.config.task_dir.join("North_2024-02-01.json")).unwrap();
    let manifest: Manifest = serde_json::from_str(&text).unwrap();
    assert_eq!(manifest.section.section_id, Some(101));
    assert_eq!(manifest.section.start_time, "2024-01-01 08:00:00");
    assert_eq!(manifest.section.end_time, "2024-01-03 12:15:00");
    assert_eq!(manifest.section.parameters.operators, vec!["Wu", "Tsai"]);
    assert_eq!(manifest.media.len(), 3);

    // Parameter files are flagged and a second run is refused
    let record = ParameterRecord::load(&fx.parent.join("north/parameters.toml")).unwrap();
    assert!(record.uploaded());

    let err = SectionReader::load(&fx.parent, &fx.config, &fx.source).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("North 2024-02-01 already uploaded"));
    assert!(message.contains("South 2024-02-01 already uploaded"));
}

#[test]
fn test_failed_publish_leaves_section_unflagged() {
    let fx = fixture();

    let mut sections = SectionReader::load(&fx.parent, &fx.config, &fx.source)
        .unwrap()
        .into_sections();

    let publisher = RecordingPublisher {
        fail: true,
        ..Default::default()
    };
    let err = Uploader::new(&fx.config, Some(&publisher))
        .run(&mut sections)
        .unwrap_err();
    assert!(matches!(err, Error::Publish(_)));

    // Copies stay in place, nothing else happened
    assert!(sections[0].media()[0].destination_path().unwrap().is_file());
    assert!(!fx.config.task_dir.join("North_2024-02-01.json").exists());
    for dir in ["north", "south"] {
        let record = ParameterRecord::load(&fx.parent.join(dir).join("parameters.toml")).unwrap();
        assert!(!record.uploaded());
    }
}

#[test]
fn test_upload_without_publisher() {
    let fx = fixture();

    let mut sections = SectionReader::load(&fx.parent, &fx.config, &fx.source)
        .unwrap()
        .into_sections();
    let outcomes = Uploader::new(&fx.config, None).run(&mut sections).unwrap();

    assert!(outcomes.iter().all(|o| o.section_id.is_none()));
    let text = fs::read_to_string(&outcomes[1].manifest).unwrap();
    assert!(!text.contains("section_id"));
    assert!(sections.iter().all(|s| s.parameters().unwrap().uploaded()));
}
