use std::fmt;
use std::str::FromStr;

/// Globally unique, strictly increasing task identifier.
pub type TaskId = u64;

/// Lifecycle status of a task.
///
/// `Open -> Scheduled -> Started -> {Done | Failed | Timeout}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Admitted and identified, not yet routed to a queue.
    Open,
    /// Sitting in its resource queue.
    Scheduled,
    /// Picked up by the queue worker.
    Started,
    Done,
    Failed,
    /// The admission context deadline expired while running.
    Timeout,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed | TaskStatus::Timeout)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Started => "started",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
            TaskStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(TaskStatus::Open),
            "scheduled" => Ok(TaskStatus::Scheduled),
            "started" => Ok(TaskStatus::Started),
            "done" => Ok(TaskStatus::Done),
            "failed" => Ok(TaskStatus::Failed),
            "timeout" => Ok(TaskStatus::Timeout),
            other => Err(format!("invalid task status: {other}")),
        }
    }
}

/// Build the concurrency-domain key for an environment/layer pair.
pub fn sync_key(env: &str, layer: &str) -> String {
    format!("{env}/{layer}")
}
