// src/manager/worker.rs

//! Resource worker loop: drains one queue, one task at a time.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::manager::cancel::CancelRegistry;
use crate::task::TaskRef;
use crate::types::TaskStatus;

/// Spawn the worker for `sync_key`.
///
/// The worker runs until every sender of the queue is gone and the queue is
/// drained.
pub(crate) fn spawn_worker(
    sync_key: String,
    rx: mpsc::Receiver<TaskRef>,
    cancels: Arc<CancelRegistry>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run_worker(sync_key, rx, cancels))
}

async fn run_worker(
    sync_key: String,
    mut rx: mpsc::Receiver<TaskRef>,
    cancels: Arc<CancelRegistry>,
) {
    info!(sync_key = %sync_key, "resource worker started");

    while let Some(task) = rx.recv().await {
        execute_task(&sync_key, task, &cancels).await;
    }

    info!(sync_key = %sync_key, "resource worker finished (queue closed)");
}

/// Run one task and record its terminal status.
///
/// Execution errors are logged, never propagated: callers observe the outcome
/// through the task's status.
async fn execute_task(sync_key: &str, task: TaskRef, cancels: &CancelRegistry) {
    let id = task.id();
    task.status_cell().set(TaskStatus::Started);
    info!(task_id = id, sync_key, "task started");

    // Run on its own Tokio task so a panicking variant only fails itself.
    let runner = Arc::clone(&task);
    let joined = tokio::spawn(async move { runner.run().await }).await;

    let status = match joined {
        Ok(Ok(outcome)) => {
            let status = outcome.status();
            if outcome.success() {
                info!(task_id = id, sync_key, ?outcome, "task finished");
            } else {
                warn!(task_id = id, sync_key, ?outcome, %status, "task did not succeed");
            }
            status
        }
        Ok(Err(err)) => {
            error!(task_id = id, sync_key, error = %err, "task failed");
            TaskStatus::Failed
        }
        Err(join_err) => {
            error!(task_id = id, sync_key, error = %join_err, "task runner panicked");
            TaskStatus::Failed
        }
    };

    // No longer cancelable once finished.
    cancels.clear(id);
    task.status_cell().set(status);
}
