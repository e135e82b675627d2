// src/errors.rs

//! Crate-wide error types.

use thiserror::Error;

use crate::types::{TaskId, TaskStatus};

/// Failures reported by a shared sequence store.
///
/// `NotFound` is the "resource not found" condition: the backing table does
/// not exist yet and may be provisioned on demand. Everything else is treated
/// as an outage by the allocator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("sequence table not found")]
    NotFound,

    #[error("sequence store unavailable: {0}")]
    Unavailable(String),

    #[error("sequence store holds a corrupt value: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum EnvlaneError {
    #[error("Invalid command spec: {0}")]
    InvalidSpec(String),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("No task registered with hash {0}")]
    HashNotFound(String),

    #[error("Cannot launch task {id} in status {status}")]
    InvalidState { id: TaskId, status: TaskStatus },

    #[error("Task {0} has no registered cancel handle")]
    NoCancelHandle(TaskId),

    #[error("Task manager has already been started")]
    AlreadyStarted,

    #[error("Task manager is shutting down")]
    ShuttingDown,

    #[error("Task ID sequence exhausted at {0}")]
    SequenceExhausted(TaskId),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, EnvlaneError>;
