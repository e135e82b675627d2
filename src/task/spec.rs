// src/task/spec.rs

//! Command specs consumed at admission time.

use std::collections::{BTreeMap, HashMap};

use blake3::Hasher;

use crate::errors::{EnvlaneError, Result};
use crate::types::sync_key;

/// Source of the command a task runs.
///
/// Implementations come from whatever parses the trigger (webhook payload,
/// API call, CLI). The manager only needs the resolved program and
/// arguments plus the resource key.
pub trait CommandSpec: Send + Sync {
    /// Resolve the program and its arguments.
    fn command_args(&self) -> Result<(String, Vec<String>)>;

    /// Concurrency-domain key; tasks sharing it never overlap.
    fn sync_key(&self) -> String;

    fn env(&self) -> Option<&HashMap<String, String>> {
        None
    }

    fn dedup_hash(&self) -> Option<&str> {
        None
    }
}

/// A single process to run against an environment/layer checkout.
#[derive(Debug, Clone, Default)]
pub struct RunCommand {
    pub env_name: String,
    pub layer: String,
    /// Program followed by its arguments.
    pub command: Vec<String>,
    pub env_vars: HashMap<String, String>,
    pub hash: Option<String>,
}

impl RunCommand {
    pub fn new<I, S>(env_name: impl Into<String>, layer: impl Into<String>, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            env_name: env_name.into(),
            layer: layer.into(),
            command: command.into_iter().map(Into::into).collect(),
            env_vars: HashMap::new(),
            hash: None,
        }
    }

    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Use [`content_hash`](Self::content_hash) as the dedup hash.
    pub fn with_content_hash(mut self) -> Self {
        self.hash = Some(self.content_hash());
        self
    }

    /// Deterministic fingerprint of environment, layer, command and
    /// variables. Variable order does not matter.
    pub fn content_hash(&self) -> String {
        let mut hasher = Hasher::new();
        for part in [&self.env_name, &self.layer] {
            hasher.update(part.as_bytes());
            hasher.update(&[0]);
        }
        for arg in &self.command {
            hasher.update(arg.as_bytes());
            hasher.update(&[0]);
        }
        let sorted: BTreeMap<_, _> = self.env_vars.iter().collect();
        for (k, v) in sorted {
            hasher.update(k.as_bytes());
            hasher.update(b"=");
            hasher.update(v.as_bytes());
            hasher.update(&[0]);
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl CommandSpec for RunCommand {
    fn command_args(&self) -> Result<(String, Vec<String>)> {
        if self.env_name.trim().is_empty() || self.layer.trim().is_empty() {
            return Err(EnvlaneError::InvalidSpec(
                "environment and layer must both be set".to_string(),
            ));
        }

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| EnvlaneError::InvalidSpec("empty command".to_string()))?;

        if program.trim().is_empty() {
            return Err(EnvlaneError::InvalidSpec("blank program name".to_string()));
        }

        Ok((program.clone(), args.to_vec()))
    }

    fn sync_key(&self) -> String {
        sync_key(&self.env_name, &self.layer)
    }

    fn env(&self) -> Option<&HashMap<String, String>> {
        if self.env_vars.is_empty() {
            None
        } else {
            Some(&self.env_vars)
        }
    }

    fn dedup_hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }
}
