// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [manager]
/// queue_length = 10
/// run_dir = "/var/run/envlane"
/// out_dir = "/var/envlane/out"
///
/// [sequence]
/// shared = true
/// store_dir = "/mnt/shared/envlane"
/// table = "envlane-sequence"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub manager: ManagerSection,

    #[serde(default)]
    pub sequence: SequenceSection,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub manager: ManagerSection,
    pub sequence: SequenceSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(manager: ManagerSection, sequence: SequenceSection) -> Self {
        Self { manager, sequence }
    }

    /// Full path of the local sequence file.
    pub fn sequence_path(&self) -> PathBuf {
        self.manager.run_dir.join(&self.manager.sequence_file)
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(ManagerSection::default(), SequenceSection::default())
    }
}

/// `[manager]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerSection {
    /// Capacity of each resource queue. A full queue blocks `launch` for
    /// that resource.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,

    /// Directory holding the local sequence file.
    #[serde(default = "default_run_dir")]
    pub run_dir: PathBuf,

    /// File name of the sequence file inside `run_dir`.
    #[serde(default = "default_sequence_file")]
    pub sequence_file: String,

    /// If set, every task's stdout is also saved to `<out_dir>/task-<id>`.
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
}

fn default_queue_length() -> usize {
    10
}

fn default_run_dir() -> PathBuf {
    PathBuf::from("/var/run/envlane")
}

fn default_sequence_file() -> String {
    "sequence".to_string()
}

impl Default for ManagerSection {
    fn default() -> Self {
        Self {
            queue_length: default_queue_length(),
            run_dir: default_run_dir(),
            sequence_file: default_sequence_file(),
            out_dir: None,
        }
    }
}

/// `[sequence]` section: shared counter store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SequenceSection {
    /// Mirror the counter to a store shared by cooperating instances.
    #[serde(default)]
    pub shared: bool,

    /// Directory holding the shared table. Required when `shared = true`.
    #[serde(default)]
    pub store_dir: Option<PathBuf>,

    #[serde(default = "default_table")]
    pub table: String,

    /// Floor for the counter; the first issued ID is `base + 1`.
    #[serde(default)]
    pub base: u64,
}

fn default_table() -> String {
    "envlane-sequence".to_string()
}

impl Default for SequenceSection {
    fn default() -> Self {
        Self {
            shared: false,
            store_dir: None,
            table: default_table(),
            base: 0,
        }
    }
}
