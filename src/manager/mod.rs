// src/manager/mod.rs

//! Task manager: identity, per-resource queues, cancellation and lifecycle.
//!
//! - [`queue`] holds the bounded per-sync-key queues.
//! - [`worker`] drains one queue, one task at a time.
//! - [`cancel`] keeps the cancel handles by task ID.
//!
//! Locking:
//! - the identity-assignment mutex wraps the sequence allocator and is held
//!   for the whole read/increment/persist cycle plus registration, so
//!   admissions are serialized process-wide;
//! - the queue map has its own lock, never held across an `.await`, so a
//!   slow sequence store never stalls enqueueing for other resources.

pub(crate) mod cancel;
pub(crate) mod queue;
pub(crate) mod worker;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::errors::{EnvlaneError, Result};
use crate::exec::{ShellTask, ShellTaskParts};
use crate::sequence::SequenceAllocator;
use crate::task::{CancelHandle, CommandSpec, ExecContext, TaskRef};
use crate::types::{TaskId, TaskStatus};

use cancel::CancelRegistry;
use queue::{QueueHandle, ResourceQueue};
use worker::spawn_worker;

/// Tunables for a [`TaskManager`].
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Capacity of each resource queue.
    pub queue_length: usize,
    /// Where shell tasks save a copy of their stdout.
    pub out_dir: Option<PathBuf>,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            queue_length: 10,
            out_dir: None,
        }
    }
}

impl From<&ConfigFile> for ManagerOptions {
    fn from(cfg: &ConfigFile) -> Self {
        Self {
            queue_length: cfg.manager.queue_length,
            out_dir: cfg.manager.out_dir.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Registry {
    tasks: HashMap<TaskId, TaskRef>,
    hashes: HashMap<String, TaskId>,
}

/// Schedules tasks so that tasks sharing a sync key run one at a time, in
/// launch order, while different keys run in parallel.
///
/// Methods take `&self`; share the manager behind an `Arc`. `start`,
/// `launch` and `close` must be called from within a Tokio runtime.
#[derive(Debug)]
pub struct TaskManager {
    options: ManagerOptions,
    sequence: tokio::sync::Mutex<SequenceAllocator>,
    registry: RwLock<Registry>,
    cancels: Arc<CancelRegistry>,
    queues: RwLock<HashMap<String, ResourceQueue>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl TaskManager {
    pub fn new(options: ManagerOptions, allocator: SequenceAllocator) -> Self {
        Self {
            options,
            sequence: tokio::sync::Mutex::new(allocator),
            registry: RwLock::new(Registry::default()),
            cancels: Arc::new(CancelRegistry::default()),
            queues: RwLock::new(HashMap::new()),
            workers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(ManagerOptions::from(cfg), SequenceAllocator::from_config(cfg))
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// Admit a shell-command task.
    ///
    /// Resolves the command first; a resolution failure is returned unchanged
    /// and nothing is created. A repeated dedup hash resolves to the task
    /// already registered under it.
    pub async fn add(&self, spec: &dyn CommandSpec, ctx: ExecContext) -> Result<TaskRef> {
        let (command, args) = spec.command_args()?;
        let parts = ShellTaskParts {
            sync_key: spec.sync_key(),
            dedup_hash: spec.dedup_hash().map(str::to_string),
            command,
            args,
            env: spec.env().cloned().unwrap_or_default(),
            context: ctx,
            out_dir: self.options.out_dir.clone(),
        };

        self.admit(spec.dedup_hash(), move |id| {
            Arc::new(ShellTask::new(id, parts)) as TaskRef
        })
        .await
    }

    /// Admit any task variant.
    ///
    /// `build` receives the freshly allocated ID and must return a task in
    /// `Open` status carrying that ID. It is not called when `dedup_hash`
    /// already maps to a task.
    pub async fn admit<F>(&self, dedup_hash: Option<&str>, build: F) -> Result<TaskRef>
    where
        F: FnOnce(TaskId) -> TaskRef + Send,
    {
        let sequence = self.sequence.lock().await;

        if let Some(hash) = dedup_hash {
            if let Some(existing) = self.find_by_hash(hash) {
                debug!(task_id = existing.id(), hash, "dedup hash already registered; reusing task");
                return Ok(existing);
            }
        }

        let id = sequence.next().await?;
        let task = build(id);
        debug_assert_eq!(task.id(), id, "task built with a foreign id");

        {
            let mut registry = self.registry.write().unwrap();
            registry.tasks.insert(id, Arc::clone(&task));
            if let Some(hash) = dedup_hash {
                registry.hashes.insert(hash.to_string(), id);
            }
        }
        drop(sequence);

        info!(task_id = id, sync_key = %task.sync_key(), "task admitted");
        Ok(task)
    }

    /// Route an `Open` task to its resource queue.
    ///
    /// A task already `Scheduled` is accepted as a no-op, so duplicate
    /// triggers are harmless. Waits while the target queue is full.
    pub async fn launch(&self, task: TaskRef) -> Result<()> {
        let id = task.id();
        if self.closed.load(Ordering::SeqCst) {
            return Err(EnvlaneError::ShuttingDown);
        }

        match task.status_cell().transition(TaskStatus::Open, TaskStatus::Scheduled) {
            Ok(()) => {}
            Err(TaskStatus::Scheduled) => {
                debug!(task_id = id, "task has already been scheduled; perhaps a duplicate trigger");
                return Ok(());
            }
            Err(status) => return Err(EnvlaneError::InvalidState { id, status }),
        }

        let queue = match self.queue_for(task.sync_key()) {
            Ok(q) => q,
            Err(e) => {
                task.status_cell().set(TaskStatus::Open);
                return Err(e);
            }
        };

        debug!(task_id = id, sync_key = %task.sync_key(), "task has been scheduled");
        if let Err(task) = queue.enqueue(task).await {
            task.status_cell().set(TaskStatus::Open);
            return Err(EnvlaneError::ShuttingDown);
        }
        Ok(())
    }

    pub async fn launch_by_id(&self, id: TaskId) -> Result<()> {
        let task = self.get(id).ok_or(EnvlaneError::TaskNotFound(id))?;
        self.launch(task).await
    }

    pub fn get(&self, id: TaskId) -> Option<TaskRef> {
        self.registry.read().unwrap().tasks.get(&id).cloned()
    }

    pub fn get_id(&self, hash: &str) -> Result<TaskId> {
        self.registry
            .read()
            .unwrap()
            .hashes
            .get(hash)
            .copied()
            .ok_or_else(|| EnvlaneError::HashNotFound(hash.to_string()))
    }

    /// Store the cancel handle for `id`, replacing any previous one.
    pub fn register_cancel(&self, id: TaskId, handle: CancelHandle) -> Result<()> {
        if self.get(id).is_none() {
            return Err(EnvlaneError::TaskNotFound(id));
        }
        self.cancels.register(id, handle);
        Ok(())
    }

    /// Invoke the cancel handle registered for `id`.
    ///
    /// The status change, if any, comes from the execution reacting to it.
    pub fn cancel(&self, id: TaskId) -> Result<()> {
        let handle = self.cancels.get(id).ok_or(EnvlaneError::NoCancelHandle(id))?;
        info!(task_id = id, "task is set to be cancelled");
        handle.cancel();
        Ok(())
    }

    /// Start workers for every queue; queues created later get theirs at
    /// creation.
    pub fn start(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EnvlaneError::ShuttingDown);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(EnvlaneError::AlreadyStarted);
        }

        let keys: Vec<String> = self.queues.read().unwrap().keys().cloned().collect();
        info!(queues = keys.len(), "task manager started");
        for key in keys {
            self.spawn_worker_for(&key);
        }
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Shut down: refuse new launches, cancel every registered task, close
    /// every queue and wait for the workers to drain.
    ///
    /// Queues that never had a worker (manager not started) are closed and
    /// the tasks they held are marked `Failed`. Calling it again is a no-op.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("task manager closing");

        for (id, handle) in self.cancels.drain() {
            info!(task_id = id, "cancelling task");
            handle.cancel();
        }

        let queues = std::mem::take(&mut *self.queues.write().unwrap());
        debug!(queues = queues.len(), "closing resource queues");
        for (sync_key, mut queue) in queues {
            for task in queue.drain_unclaimed() {
                warn!(task_id = task.id(), sync_key = %sync_key, "queue closed before the task could run");
                task.status_cell().set(TaskStatus::Failed);
            }
        }

        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        for handle in workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "resource worker ended abnormally");
            }
        }

        info!("task manager closed");
        Ok(())
    }

    /// Number of tasks waiting in the queue for `sync_key`.
    pub fn queue_len(&self, sync_key: &str) -> usize {
        self.queues
            .read()
            .unwrap()
            .get(sync_key)
            .map(ResourceQueue::len)
            .unwrap_or(0)
    }

    pub fn queue_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.queues.read().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn find_by_hash(&self, hash: &str) -> Option<TaskRef> {
        let registry = self.registry.read().unwrap();
        let id = registry.hashes.get(hash)?;
        registry.tasks.get(id).cloned()
    }

    /// Queue for `sync_key`, created on first use.
    fn queue_for(&self, sync_key: &str) -> Result<QueueHandle> {
        if let Some(queue) = self.queues.read().unwrap().get(sync_key) {
            return Ok(queue.handle());
        }

        let handle = {
            let mut queues = self.queues.write().unwrap();
            // Closing takes the map under this lock; re-check here so no queue
            // is created after shutdown began.
            if self.closed.load(Ordering::SeqCst) {
                return Err(EnvlaneError::ShuttingDown);
            }
            if let Some(queue) = queues.get(sync_key) {
                return Ok(queue.handle());
            }
            let queue = ResourceQueue::new(self.options.queue_length);
            let handle = queue.handle();
            queues.insert(sync_key.to_string(), queue);
            debug!(sync_key, capacity = self.options.queue_length, "resource queue created");
            handle
        };

        if self.is_started() {
            self.spawn_worker_for(sync_key);
        }
        Ok(handle)
    }

    /// Spawn the worker for `sync_key` unless one already claimed the queue.
    fn spawn_worker_for(&self, sync_key: &str) {
        // Held across claim and push so `close` never misses a worker.
        let mut workers = self.workers.lock().unwrap();
        let claimed = self
            .queues
            .write()
            .unwrap()
            .get_mut(sync_key)
            .and_then(ResourceQueue::claim_receiver);

        if let Some(rx) = claimed {
            let handle = spawn_worker(sync_key.to_string(), rx, Arc::clone(&self.cancels));
            workers.push(handle);
        }
    }
}
