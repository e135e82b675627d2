// src/task/mod.rs

//! Task model.
//!
//! A task is anything that is [`Identifiable`], [`Runnable`] and a
//! [`StreamSource`]. The manager stores tasks as [`TaskRef`] so new variants
//! can be scheduled without touching it. The shell-command variant lives in
//! [`crate::exec`].

pub mod context;
pub mod spec;
pub mod status;

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::DuplexStream;

use crate::errors::Result;
use crate::types::{TaskId, TaskStatus};

pub use context::{CancelHandle, ExecContext};
pub use spec::{CommandSpec, RunCommand};
pub use status::StatusCell;

/// How a run ended, as seen by the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process exited by itself. `None` when killed by a signal.
    Exited(Option<i32>),
    /// The admission context was cancelled.
    Cancelled,
    /// The admission context timeout expired.
    TimedOut,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        matches!(self, RunOutcome::Exited(Some(0)))
    }

    /// Terminal status the worker records for this outcome.
    pub fn status(&self) -> TaskStatus {
        match self {
            RunOutcome::Exited(Some(0)) => TaskStatus::Done,
            RunOutcome::Exited(_) | RunOutcome::Cancelled => TaskStatus::Failed,
            RunOutcome::TimedOut => TaskStatus::Timeout,
        }
    }
}

pub type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<RunOutcome>> + Send + 'a>>;

pub trait Identifiable {
    fn id(&self) -> TaskId;
    fn sync_key(&self) -> &str;
    fn dedup_hash(&self) -> Option<&str>;
    fn status_cell(&self) -> &StatusCell;

    fn status(&self) -> TaskStatus {
        self.status_cell().get()
    }
}

pub trait Runnable {
    /// Execute to completion. Called once, by the resource worker.
    fn run(&self) -> RunFuture<'_>;

    /// Outcome of the finished run, if any.
    fn last_outcome(&self) -> Option<RunOutcome>;
}

/// Live byte streams of a running task.
///
/// Each endpoint can be taken once, and only before the run starts.
pub trait StreamSource {
    fn take_stdout(&self) -> Option<DuplexStream> {
        None
    }

    fn take_stderr(&self) -> Option<DuplexStream> {
        None
    }

    fn take_stdin(&self) -> Option<DuplexStream> {
        None
    }
}

pub trait Task: Identifiable + Runnable + StreamSource + Send + Sync + Debug {}

impl<T> Task for T where T: Identifiable + Runnable + StreamSource + Send + Sync + Debug {}

pub type TaskRef = Arc<dyn Task>;
