// src/task/context.rs

//! Admission context and cancellation handles.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Per-admission execution settings passed alongside a task.
///
/// - `workdir`: run the process here instead of the current directory.
/// - `env`: variables layered over the inherited environment.
/// - `timeout`: kill the process and report `Timeout` once it expires.
/// - `cancel`: token whose cancellation kills the process.
#[derive(Debug, Clone)]
pub struct ExecContext {
    pub workdir: Option<PathBuf>,
    pub env: Option<HashMap<String, String>>,
    pub timeout: Option<Duration>,
    pub cancel: CancellationToken,
}

impl ExecContext {
    pub fn new() -> Self {
        Self {
            workdir: None,
            env: None,
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle that cancels this context's token.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::from(self.cancel.clone())
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller-supplied cancellation capability.
///
/// The task manager invokes it on `cancel` and on shutdown, but does not own
/// whatever it cancels.
#[derive(Clone)]
pub struct CancelHandle(Arc<dyn Fn() + Send + Sync>);

impl CancelHandle {
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn cancel(&self) {
        (self.0)()
    }
}

impl From<CancellationToken> for CancelHandle {
    fn from(token: CancellationToken) -> Self {
        Self::new(move || token.cancel())
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle").finish_non_exhaustive()
    }
}
