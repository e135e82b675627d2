// tests/config_errors.rs

mod common;

use std::io::Write;
use std::path::PathBuf;

use common::builders::ConfigFileBuilder;
use envlane::config::{ConfigFile, load_and_validate, load_or_default};
use envlane::errors::EnvlaneError;
use envlane::manager::ManagerOptions;
use envlane::parse_env_pairs;
use envlane::task::{CommandSpec, RunCommand};
use envlane::types::TaskStatus;
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_full_config_is_parsed() {
    let file = config_file(
        r#"
[manager]
queue_length = 3
run_dir = "/tmp/envlane-run"
out_dir = "/tmp/envlane-out"

[sequence]
shared = true
store_dir = "/mnt/shared"
table = "seq"
base = 1000
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.manager.queue_length, 3);
    assert_eq!(cfg.sequence_path(), PathBuf::from("/tmp/envlane-run/sequence"));
    assert_eq!(cfg.manager.out_dir, Some(PathBuf::from("/tmp/envlane-out")));
    assert!(cfg.sequence.shared);
    assert_eq!(cfg.sequence.store_dir, Some(PathBuf::from("/mnt/shared")));
    assert_eq!(cfg.sequence.table, "seq");
    assert_eq!(cfg.sequence.base, 1000);

    let options = ManagerOptions::from(&cfg);
    assert_eq!(options.queue_length, 3);
}

#[test]
fn test_empty_file_uses_defaults() {
    let file = config_file("");
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.manager.queue_length, 10);
    assert_eq!(cfg.sequence_path(), PathBuf::from("/var/run/envlane/sequence"));
    assert_eq!(cfg.manager.out_dir, None);
    assert!(!cfg.sequence.shared);
    assert_eq!(cfg.sequence.table, "envlane-sequence");
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_or_default(dir.path().join("Envlane.toml")).unwrap();
    assert_eq!(cfg.manager.queue_length, ConfigFile::default().manager.queue_length);
}

#[test]
fn test_missing_file_is_an_io_error_when_required() {
    let dir = tempfile::tempdir().unwrap();
    match load_and_validate(dir.path().join("absent.toml")) {
        Err(EnvlaneError::IoError(_)) => {}
        other => panic!("Expected IoError, got: {:?}", other),
    }
}

#[test]
fn test_zero_queue_length_returns_config_error() {
    let file = config_file("[manager]\nqueue_length = 0\n");

    match load_and_validate(file.path()) {
        Err(EnvlaneError::ConfigError(msg)) => assert!(msg.contains("queue_length")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_shared_without_store_dir_returns_config_error() {
    let file = config_file("[sequence]\nshared = true\n");

    match load_and_validate(file.path()) {
        Err(EnvlaneError::ConfigError(msg)) => assert!(msg.contains("store_dir")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_sequence_file_must_be_a_plain_name() {
    let file = config_file("[manager]\nsequence_file = \"../escape\"\n");

    match load_and_validate(file.path()) {
        Err(EnvlaneError::ConfigError(msg)) => assert!(msg.contains("sequence_file")),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn test_invalid_toml_returns_toml_error() {
    let file = config_file("[manager\nqueue_length = ");

    match load_or_default(file.path()) {
        Err(EnvlaneError::TomlError(_)) => {}
        other => panic!("Expected TomlError, got: {:?}", other),
    }
}

#[test]
fn test_raw_builder_config_is_still_validated() {
    let dir = tempfile::tempdir().unwrap();
    let raw = ConfigFileBuilder::new()
        .run_dir(dir.path())
        .queue_length(0)
        .raw();
    assert!(matches!(ConfigFile::try_from(raw), Err(EnvlaneError::ConfigError(_))));
}

#[test]
fn test_status_names_round_trip() {
    for status in [
        TaskStatus::Open,
        TaskStatus::Scheduled,
        TaskStatus::Started,
        TaskStatus::Done,
        TaskStatus::Failed,
        TaskStatus::Timeout,
    ] {
        assert_eq!(status.to_string().parse::<TaskStatus>(), Ok(status));
    }
    assert_eq!(" DONE ".parse::<TaskStatus>(), Ok(TaskStatus::Done));
    assert!("finished".parse::<TaskStatus>().is_err());
    assert!(TaskStatus::Timeout.is_terminal());
    assert!(!TaskStatus::Scheduled.is_terminal());
}

#[test]
fn test_run_command_resolves_program_and_key() {
    let spec = RunCommand::new("prod", "layerA", ["terraform", "apply", "-auto-approve"]);
    let (program, args) = spec.command_args().unwrap();
    assert_eq!(program, "terraform");
    assert_eq!(args, vec!["apply", "-auto-approve"]);
    assert_eq!(spec.sync_key(), "prod/layerA");
    assert!(spec.env().is_none());
    assert!(CommandSpec::dedup_hash(&spec).is_none());
}

#[test]
fn test_content_hash_ignores_variable_order() {
    let a = RunCommand::new("prod", "layerA", ["make"])
        .with_env_var("X", "1")
        .with_env_var("Y", "2");
    let b = RunCommand::new("prod", "layerA", ["make"])
        .with_env_var("Y", "2")
        .with_env_var("X", "1");
    assert_eq!(a.content_hash(), b.content_hash());

    // Argument boundaries are part of the hash.
    let joined = RunCommand::new("prod", "layerA", ["make deploy"]);
    let split = RunCommand::new("prod", "layerA", ["make", "deploy"]);
    assert_ne!(joined.content_hash(), split.content_hash());
}

#[test]
fn test_env_pairs_are_parsed() {
    let env = parse_env_pairs(["A=1", "B=x=y", "C="]).unwrap();
    assert_eq!(env.get("A").map(String::as_str), Some("1"));
    assert_eq!(env.get("B").map(String::as_str), Some("x=y"));
    assert_eq!(env.get("C").map(String::as_str), Some(""));

    assert!(parse_env_pairs(["novalue"]).is_err());
    assert!(parse_env_pairs(["=1"]).is_err());
}
