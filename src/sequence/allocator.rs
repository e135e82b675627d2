// src/sequence/allocator.rs

//! Persistent, monotonically increasing task ID allocation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::store::SequenceStore;
use super::table::TableSequenceStore;
use crate::config::ConfigFile;
use crate::errors::{EnvlaneError, Result, StoreError};
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::TaskId;

/// Hands out task IDs backed by a local sequence file, optionally mirrored to
/// a shared store.
///
/// The allocator itself is not synchronized: callers must serialize
/// `current`/`persist` pairs (the task manager does so with its
/// identity-assignment mutex).
#[derive(Debug, Clone)]
pub struct SequenceAllocator {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    base: u64,
    shared: Option<Arc<dyn SequenceStore>>,
}

impl SequenceAllocator {
    /// Local-only allocator persisting to `path`.
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
            base: 0,
            shared: None,
        }
    }

    /// Floor applied to every value read; the first ID issued from an empty
    /// run directory is `base + 1`.
    pub fn with_base(mut self, base: u64) -> Self {
        self.base = base;
        self
    }

    pub fn with_shared_store(mut self, store: Arc<dyn SequenceStore>) -> Self {
        self.shared = Some(store);
        self
    }

    /// Build the production allocator described by `cfg`.
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut allocator = Self::new(Arc::new(RealFileSystem), cfg.sequence_path())
            .with_base(cfg.sequence.base);

        if cfg.sequence.shared {
            if let Some(dir) = &cfg.sequence.store_dir {
                let store = TableSequenceStore::new(dir, &cfg.sequence.table);
                allocator = allocator.with_shared_store(Arc::new(store));
            }
        }

        allocator
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_shared(&self) -> bool {
        self.shared.is_some()
    }

    /// Read the last issued value.
    ///
    /// In shared mode the store is consulted first. A missing table is
    /// provisioned and the local value used; any other store failure falls
    /// back to the local value for this call only. The result never drops
    /// below the local file, so an instance never reissues IDs it handed out
    /// while the store was unreachable.
    pub async fn current(&self) -> TaskId {
        let local = self.read_local();

        let value = match &self.shared {
            None => local,
            Some(store) => match store.get_sequence().await {
                Ok(shared) => {
                    if shared < local {
                        debug!(shared, local, "shared sequence behind local file; using local");
                    }
                    shared.max(local)
                }
                Err(StoreError::NotFound) => {
                    info!("shared sequence table not found; provisioning it");
                    match store.ensure_sequence_table().await {
                        Ok(()) => info!("shared sequence table has been created"),
                        Err(e) => warn!(error = %e, "cannot provision shared sequence table"),
                    }
                    local
                }
                Err(e) => {
                    warn!(error = %e, local, "cannot read shared sequence; falling back to local file");
                    local
                }
            },
        };

        value.max(self.base)
    }

    /// Persist `value` locally and, in shared mode, to the store.
    ///
    /// Failures are logged and absorbed.
    pub async fn persist(&self, value: TaskId) {
        if let Some(store) = &self.shared {
            if let Err(e) = store.update_sequence(value).await {
                warn!(error = %e, sequence = value, "cannot update shared sequence");
            }
        }
        self.write_local(value);
    }

    /// Read, increment and persist. Returns the newly issued value.
    ///
    /// Fails without persisting anything once the counter sits at
    /// `u64::MAX`.
    pub async fn next(&self) -> Result<TaskId> {
        let current = self.current().await;
        let value = current
            .checked_add(1)
            .ok_or(EnvlaneError::SequenceExhausted(current))?;
        self.persist(value).await;
        Ok(value)
    }

    /// Last issued value, read without provisioning the shared table or
    /// creating the run directory.
    ///
    /// An unreachable or missing shared store contributes nothing.
    pub async fn last_issued(&self) -> TaskId {
        let local = self.load_local();
        let shared = match &self.shared {
            None => 0,
            Some(store) => store.get_sequence().await.unwrap_or_else(|e| {
                debug!(error = %e, "shared sequence not readable; reporting local value");
                0
            }),
        };
        local.max(shared).max(self.base)
    }

    /// Value stored in the local sequence file, `0` if absent or unparsable.
    pub fn read_local(&self) -> TaskId {
        self.ensure_run_dir();
        self.load_local()
    }

    fn load_local(&self) -> TaskId {
        if !self.fs.exists(&self.path) {
            debug!(path = ?self.path, "sequence file absent; starting from 0");
            return 0;
        }

        let contents = match self.fs.read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "cannot read sequence file");
                return 0;
            }
        };

        match contents.trim().parse::<TaskId>() {
            Ok(seq) => {
                debug!(sequence = seq, "task counter value");
                seq
            }
            Err(e) => {
                warn!(path = ?self.path, contents = %contents, error = %e, "cannot parse sequence file");
                0
            }
        }
    }

    fn write_local(&self, value: TaskId) {
        self.ensure_run_dir();
        if let Err(e) = self.fs.write(&self.path, value.to_string().as_bytes()) {
            warn!(path = ?self.path, sequence = value, error = %e, "cannot save sequence");
        }
    }

    fn ensure_run_dir(&self) {
        let Some(dir) = self.path.parent() else {
            return;
        };
        if dir.as_os_str().is_empty() || self.fs.exists(dir) {
            return;
        }
        info!(dir = ?dir, "run directory does not exist; creating it");
        if let Err(e) = self.fs.create_dir_all(dir) {
            warn!(dir = ?dir, error = %e, "cannot create run directory");
        }
    }
}
