// src/task/status.rs

use tokio::sync::watch;

use crate::types::TaskStatus;

/// Observable status of a single task.
///
/// Backed by a `watch` channel so consumers can await transitions instead of
/// polling. Every task starts in `Open`.
#[derive(Debug)]
pub struct StatusCell {
    tx: watch::Sender<TaskStatus>,
}

impl StatusCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(TaskStatus::Open);
        Self { tx }
    }

    pub fn get(&self) -> TaskStatus {
        *self.tx.borrow()
    }

    pub fn set(&self, status: TaskStatus) {
        self.tx.send_replace(status);
    }

    /// Atomically move from `from` to `to`.
    ///
    /// On mismatch nothing changes and the actual current status is returned.
    pub fn transition(&self, from: TaskStatus, to: TaskStatus) -> Result<(), TaskStatus> {
        let mut actual = from;
        let changed = self.tx.send_if_modified(|current| {
            if *current == from {
                *current = to;
                true
            } else {
                actual = *current;
                false
            }
        });
        if changed { Ok(()) } else { Err(actual) }
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskStatus> {
        self.tx.subscribe()
    }

    /// Wait until the task reaches `Done`, `Failed` or `Timeout`.
    pub async fn wait_terminal(&self) -> TaskStatus {
        let mut rx = self.subscribe();
        match rx.wait_for(|status| status.is_terminal()).await {
            Ok(status) => *status,
            Err(_) => self.get(),
        }
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}
