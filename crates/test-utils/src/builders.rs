#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use envlane::config::{ConfigFile, ManagerSection, RawConfigFile, SequenceSection};
use envlane::fs::{FileSystem, MockFileSystem, RealFileSystem};
use envlane::manager::{ManagerOptions, TaskManager};
use envlane::sequence::{SequenceAllocator, SequenceStore};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                manager: ManagerSection::default(),
                sequence: SequenceSection::default(),
            },
        }
    }

    pub fn run_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.manager.run_dir = dir.into();
        self
    }

    pub fn queue_length(mut self, len: usize) -> Self {
        self.config.manager.queue_length = len;
        self
    }

    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.manager.out_dir = Some(dir.into());
        self
    }

    pub fn shared_store(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.sequence.shared = true;
        self.config.sequence.store_dir = Some(dir.into());
        self
    }

    pub fn base(mut self, base: u64) -> Self {
        self.config.sequence.base = base;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Sequence file path used by in-memory allocators.
pub const MOCK_SEQUENCE_PATH: &str = "/run/envlane/sequence";

/// Allocator over a mock filesystem at [`MOCK_SEQUENCE_PATH`].
pub fn mock_allocator(fs: &MockFileSystem) -> SequenceAllocator {
    let fs: Arc<dyn FileSystem> = Arc::new(fs.clone());
    SequenceAllocator::new(fs, MOCK_SEQUENCE_PATH)
}

/// Mock allocator mirrored to `store`.
pub fn shared_mock_allocator(
    fs: &MockFileSystem,
    store: Arc<dyn SequenceStore>,
) -> SequenceAllocator {
    mock_allocator(fs).with_shared_store(store)
}

/// Allocator persisting to `<dir>/sequence` on the real filesystem.
pub fn file_allocator(dir: &Path) -> SequenceAllocator {
    SequenceAllocator::new(Arc::new(RealFileSystem), dir.join("sequence"))
}

/// Manager with an in-memory sequence and the given queue length.
pub fn mock_manager(queue_length: usize) -> TaskManager {
    let options = ManagerOptions {
        queue_length,
        out_dir: None,
    };
    TaskManager::new(options, mock_allocator(&MockFileSystem::new()))
}

/// Manager persisting its sequence under `dir`.
pub fn file_manager(dir: &Path, queue_length: usize) -> TaskManager {
    let options = ManagerOptions {
        queue_length,
        out_dir: None,
    };
    TaskManager::new(options, file_allocator(dir))
}
