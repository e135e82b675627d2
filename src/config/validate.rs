// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{EnvlaneError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::EnvlaneError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.manager, raw.sequence))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_manager(cfg)?;
    validate_sequence(cfg)?;
    Ok(())
}

fn validate_manager(cfg: &RawConfigFile) -> Result<()> {
    if cfg.manager.queue_length == 0 {
        return Err(EnvlaneError::ConfigError(
            "[manager].queue_length must be >= 1 (got 0)".to_string(),
        ));
    }

    let file = cfg.manager.sequence_file.trim();
    if file.is_empty() || file.contains('/') || file.contains('\\') {
        return Err(EnvlaneError::ConfigError(format!(
            "[manager].sequence_file must be a plain file name (got '{}')",
            cfg.manager.sequence_file
        )));
    }

    Ok(())
}

fn validate_sequence(cfg: &RawConfigFile) -> Result<()> {
    if cfg.sequence.shared && cfg.sequence.store_dir.is_none() {
        return Err(EnvlaneError::ConfigError(
            "[sequence].store_dir is required when shared = true".to_string(),
        ));
    }

    if cfg.sequence.table.trim().is_empty() {
        return Err(EnvlaneError::ConfigError(
            "[sequence].table must not be empty".to_string(),
        ));
    }

    Ok(())
}
