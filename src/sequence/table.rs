// src/sequence/table.rs

//! File-backed implementation of the shared sequence store.
//!
//! The table lives at `<store_dir>/<table>.toml`, typically on a mount that
//! every cooperating instance can reach:
//!
//! ```toml
//! [[item]]
//! key = "envlane-global"
//! sequence = 42
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::store::{SEQUENCE_NAME, SequenceStore, StoreFuture};
use crate::errors::StoreError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct TableFile {
    #[serde(default)]
    item: Vec<TableItem>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TableItem {
    key: String,
    sequence: u64,
}

#[derive(Debug, Clone)]
pub struct TableSequenceStore {
    dir: PathBuf,
    path: PathBuf,
}

impl TableSequenceStore {
    pub fn new(store_dir: impl Into<PathBuf>, table: &str) -> Self {
        let dir = store_dir.into();
        let path = dir.join(format!("{table}.toml"));
        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_table(&self) -> Result<TableFile, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => {
                return Err(StoreError::Unavailable(format!(
                    "reading {:?}: {e}",
                    self.path
                )));
            }
        };

        toml::from_str(&contents)
            .map_err(|e| StoreError::Corrupt(format!("parsing {:?}: {e}", self.path)))
    }

    async fn write_table(&self, table: &TableFile) -> Result<(), StoreError> {
        let contents = toml::to_string(table)
            .map_err(|e| StoreError::Unavailable(format!("encoding table: {e}")))?;
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|e| StoreError::Unavailable(format!("writing {:?}: {e}", self.path)))
    }
}

impl SequenceStore for TableSequenceStore {
    fn get_sequence(&self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let table = self.read_table().await?;
            table
                .item
                .iter()
                .find(|item| item.key == SEQUENCE_NAME)
                .map(|item| item.sequence)
                .ok_or_else(|| StoreError::Corrupt("sequence item is absent".to_string()))
        })
    }

    fn update_sequence(&self, value: u64) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut table = self.read_table().await?;
            match table.item.iter_mut().find(|item| item.key == SEQUENCE_NAME) {
                Some(item) => item.sequence = value,
                None => table.item.push(TableItem {
                    key: SEQUENCE_NAME.to_string(),
                    sequence: value,
                }),
            }
            self.write_table(&table).await?;
            debug!(path = ?self.path, sequence = value, "shared sequence updated");
            Ok(())
        })
    }

    fn ensure_sequence_table(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
                return Ok(());
            }
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| StoreError::Unavailable(format!("creating {:?}: {e}", self.dir)))?;
            self.write_table(&TableFile::default()).await?;
            info!(path = ?self.path, "created shared sequence table");
            Ok(())
        })
    }
}
