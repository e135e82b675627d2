use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use envlane::errors::{EnvlaneError, Result};
use envlane::manager::TaskManager;
use envlane::task::{
    Identifiable, RunFuture, RunOutcome, Runnable, StatusCell, StreamSource, TaskRef,
};
use envlane::types::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Started(TaskId),
    Finished(TaskId),
}

#[derive(Debug, Default)]
struct LogState {
    events: Vec<(String, Event)>,
    running: HashMap<String, usize>,
    max_running: HashMap<String, usize>,
    overall_running: usize,
    overall_max: usize,
}

/// Shared record of what fake tasks did, in order.
#[derive(Debug, Default)]
pub struct ExecutionLog {
    state: Mutex<LogState>,
    changed: Notify,
}

impl ExecutionLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn started(&self, key: &str, id: TaskId) {
        {
            let mut state = self.state.lock().unwrap();
            state.events.push((key.to_string(), Event::Started(id)));
            let running = state.running.entry(key.to_string()).or_insert(0);
            *running += 1;
            let now = *running;
            let max = state.max_running.entry(key.to_string()).or_insert(0);
            *max = (*max).max(now);
            state.overall_running += 1;
            state.overall_max = state.overall_max.max(state.overall_running);
        }
        self.changed.notify_waiters();
    }

    fn finished(&self, key: &str, id: TaskId) {
        {
            let mut state = self.state.lock().unwrap();
            state.events.push((key.to_string(), Event::Finished(id)));
            if let Some(running) = state.running.get_mut(key) {
                *running -= 1;
            }
            state.overall_running -= 1;
        }
        self.changed.notify_waiters();
    }

    pub fn events(&self) -> Vec<(String, Event)> {
        self.state.lock().unwrap().events.clone()
    }

    /// IDs in the order they started, for one sync key.
    pub fn started_order(&self, key: &str) -> Vec<TaskId> {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter_map(|(k, e)| match e {
                Event::Started(id) if k == key => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn start_count(&self, id: TaskId) -> usize {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|(_, e)| *e == Event::Started(id))
            .count()
    }

    pub fn max_concurrency(&self, key: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .max_running
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub fn max_overall_concurrency(&self) -> usize {
        self.state.lock().unwrap().overall_max
    }

    pub fn has_started(&self, id: TaskId) -> bool {
        self.start_count(id) > 0
    }

    /// Wait until `id` has started.
    pub async fn wait_started(&self, id: TaskId) {
        loop {
            let notified = self.changed.notified();
            if self.has_started(id) {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Clone)]
enum Behaviour {
    Immediate,
    Sleep(Duration),
    Gated(Arc<Notify>),
    Error(String),
    Panic,
}

/// Task variant that runs no process.
///
/// It records start/finish in an [`ExecutionLog`] and either returns at once,
/// sleeps, or waits on a gate; cancellation of its token ends it early with
/// `RunOutcome::Cancelled`.
#[derive(Debug)]
pub struct FakeTask {
    id: TaskId,
    sync_key: String,
    hash: Option<String>,
    status: StatusCell,
    log: Arc<ExecutionLog>,
    behaviour: Behaviour,
    outcome: RunOutcome,
    cancel: CancellationToken,
    last: Mutex<Option<RunOutcome>>,
}

impl FakeTask {
    pub fn new(id: TaskId, sync_key: &str, log: Arc<ExecutionLog>) -> Self {
        Self {
            id,
            sync_key: sync_key.to_string(),
            hash: None,
            status: StatusCell::new(),
            log,
            behaviour: Behaviour::Immediate,
            outcome: RunOutcome::Exited(Some(0)),
            cancel: CancellationToken::new(),
            last: Mutex::new(None),
        }
    }

    pub fn sleeping(mut self, d: Duration) -> Self {
        self.behaviour = Behaviour::Sleep(d);
        self
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.behaviour = Behaviour::Gated(gate);
        self
    }

    pub fn erroring(mut self, msg: &str) -> Self {
        self.behaviour = Behaviour::Error(msg.to_string());
        self
    }

    pub fn panicking(mut self) -> Self {
        self.behaviour = Behaviour::Panic;
        self
    }

    pub fn with_outcome(mut self, outcome: RunOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_hash(mut self, hash: &str) -> Self {
        self.hash = Some(hash.to_string());
        self
    }

    async fn execute(&self) -> Result<RunOutcome> {
        self.log.started(&self.sync_key, self.id);

        let result = match &self.behaviour {
            Behaviour::Immediate => Ok(self.outcome),
            Behaviour::Sleep(d) => tokio::select! {
                _ = tokio::time::sleep(*d) => Ok(self.outcome),
                _ = self.cancel.cancelled() => Ok(RunOutcome::Cancelled),
            },
            Behaviour::Gated(gate) => tokio::select! {
                _ = gate.notified() => Ok(self.outcome),
                _ = self.cancel.cancelled() => Ok(RunOutcome::Cancelled),
            },
            Behaviour::Error(msg) => Err(EnvlaneError::Other(anyhow::anyhow!(msg.clone()))),
            Behaviour::Panic => panic!("fake task {} panicked", self.id),
        };

        self.log.finished(&self.sync_key, self.id);
        result
    }
}

impl Identifiable for FakeTask {
    fn id(&self) -> TaskId {
        self.id
    }

    fn sync_key(&self) -> &str {
        &self.sync_key
    }

    fn dedup_hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    fn status_cell(&self) -> &StatusCell {
        &self.status
    }
}

impl Runnable for FakeTask {
    fn run(&self) -> RunFuture<'_> {
        Box::pin(async move {
            let result = self.execute().await;
            if let Ok(outcome) = &result {
                *self.last.lock().unwrap() = Some(*outcome);
            }
            result
        })
    }

    fn last_outcome(&self) -> Option<RunOutcome> {
        *self.last.lock().unwrap()
    }
}

impl StreamSource for FakeTask {}

/// Admit a fake task on `sync_key` that finishes immediately with success.
pub async fn admit_fake(
    manager: &TaskManager,
    sync_key: &str,
    log: &Arc<ExecutionLog>,
) -> Result<TaskRef> {
    admit_fake_with(manager, None, sync_key, log, |t| t).await
}

/// Admit a fake task, letting `customize` adjust it after the ID is known.
pub async fn admit_fake_with<F>(
    manager: &TaskManager,
    hash: Option<&str>,
    sync_key: &str,
    log: &Arc<ExecutionLog>,
    customize: F,
) -> Result<TaskRef>
where
    F: FnOnce(FakeTask) -> FakeTask + Send,
{
    let log = Arc::clone(log);
    let key = sync_key.to_string();
    let hash_owned = hash.map(str::to_string);
    manager
        .admit(hash, move |id| {
            let mut task = FakeTask::new(id, &key, log);
            if let Some(h) = &hash_owned {
                task = task.with_hash(h);
            }
            Arc::new(customize(task)) as TaskRef
        })
        .await
}
