// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] holds the serde types for the TOML file.
//! - [`validate`] turns a `RawConfigFile` into a checked `ConfigFile`.
//! - [`loader`] reads files from disk.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{ConfigFile, ManagerSection, RawConfigFile, SequenceSection};
