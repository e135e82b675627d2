// src/exec/process.rs

//! Process-group termination for task processes.

use tokio::process::{Child, Command};

use crate::types::TaskId;

/// Put the spawned process at the head of its own process group, so the
/// whole tree it forks can be signalled as one.
#[cfg(unix)]
pub(crate) fn isolate_group(cmd: &mut Command) {
    cmd.process_group(0);
}

#[cfg(not(unix))]
pub(crate) fn isolate_group(_cmd: &mut Command) {}

/// SIGKILL every process left in the group led by `pgid`.
///
/// The group outlives its leader while any member remains, so this still
/// reaches background processes after the leader has been reaped.
#[cfg(unix)]
pub(crate) fn kill_group(task_id: TaskId, pgid: Option<u32>) {
    let Some(pgid) = pgid
        .and_then(|p| libc::pid_t::try_from(p).ok())
        .filter(|&p| p > 0)
    else {
        return;
    };
    // SAFETY: killpg only takes plain integers and reports failure via errno.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        tracing::debug!(task_id, pgid, error = %err, "process group already gone");
    }
}

#[cfg(not(unix))]
pub(crate) fn kill_group(_task_id: TaskId, _pgid: Option<u32>) {}

/// Kill the child's whole process group, then the child itself.
pub(crate) async fn kill_tree(
    task_id: TaskId,
    child: &mut Child,
    pgid: Option<u32>,
) -> std::io::Result<()> {
    kill_group(task_id, pgid);
    child.kill().await
}
