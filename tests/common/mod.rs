#![allow(dead_code)]

pub use envlane_test_utils::builders;
pub use envlane_test_utils::fake_task;
pub use envlane_test_utils::{init_tracing, with_timeout};

use envlane::task::TaskRef;
use envlane::types::TaskStatus;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Wait (bounded) for `task` to reach a terminal status.
pub async fn wait_done(task: &TaskRef) -> TaskStatus {
    with_timeout(task.status_cell().wait_terminal()).await
}

/// Wait (bounded) for `task` to leave `Scheduled`.
pub async fn wait_started(task: &TaskRef) {
    let mut rx = task.status_cell().subscribe();
    with_timeout(rx.wait_for(|s| *s != TaskStatus::Open && *s != TaskStatus::Scheduled))
        .await
        .expect("status channel closed");
}
