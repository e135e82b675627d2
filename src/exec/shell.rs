// src/exec/shell.rs

//! Shell-command task: one process, one working directory, one environment.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use tokio::fs::File;
use tokio::io::DuplexStream;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{EnvlaneError, Result};
use crate::exec::process::{isolate_group, kill_group, kill_tree};
use crate::exec::streams::{ConsumerEnds, EngineEnds, pump, stream_pairs};
use crate::task::{
    ExecContext, Identifiable, RunFuture, RunOutcome, Runnable, StatusCell, StreamSource,
};
use crate::types::TaskId;

/// How long output pumps may keep running once the process is gone.
///
/// Background processes inherit the pipes, so EOF can arrive much later
/// than the exit of the process itself.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Everything resolved at admission time for a [`ShellTask`].
#[derive(Debug, Clone)]
pub struct ShellTaskParts {
    pub sync_key: String,
    pub dedup_hash: Option<String>,
    pub command: String,
    pub args: Vec<String>,
    /// Spec variables; the context's `env` is layered over these.
    pub env: HashMap<String, String>,
    pub context: ExecContext,
    /// Directory receiving a copy of stdout as `task-<id>`.
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug)]
pub struct ShellTask {
    id: TaskId,
    parts: ShellTaskParts,
    status: StatusCell,
    outcome: Mutex<Option<RunOutcome>>,
    consumer: Mutex<ConsumerEnds>,
    engine: Mutex<Option<EngineEnds>>,
}

impl ShellTask {
    pub fn new(id: TaskId, parts: ShellTaskParts) -> Self {
        let (consumer, engine) = stream_pairs();
        Self {
            id,
            parts,
            status: StatusCell::new(),
            outcome: Mutex::new(None),
            consumer: Mutex::new(consumer),
            engine: Mutex::new(Some(engine)),
        }
    }

    pub fn command(&self) -> &str {
        &self.parts.command
    }

    pub fn args(&self) -> &[String] {
        &self.parts.args
    }

    pub fn context(&self) -> &ExecContext {
        &self.parts.context
    }

    /// Effective variables added on top of the inherited environment.
    pub fn effective_env(&self) -> HashMap<String, String> {
        let mut env = self.parts.env.clone();
        if let Some(overrides) = &self.parts.context.env {
            env.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        env
    }

    fn working_dir(&self) -> Result<PathBuf> {
        match &self.parts.context.workdir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    async fn open_tee(&self) -> Option<File> {
        let dir = self.parts.out_dir.as_ref()?;
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!(task_id = self.id, dir = ?dir, error = %e, "cannot create output directory");
            return None;
        }
        let path = dir.join(format!("task-{}", self.id));
        match File::create(&path).await {
            Ok(file) => {
                debug!(task_id = self.id, path = ?path, "saving task output");
                Some(file)
            }
            Err(e) => {
                warn!(task_id = self.id, path = ?path, error = %e, "cannot create output file");
                None
            }
        }
    }

    /// Drop endpoints nobody claimed so the pumps see closed consumers.
    fn release_unclaimed(&self) {
        let mut consumer = self.consumer.lock().unwrap();
        let unclaimed = [
            ("stdout", consumer.stdout.take().is_some()),
            ("stderr", consumer.stderr.take().is_some()),
            ("stdin", consumer.stdin.take().is_some()),
        ];
        for (stream, dropped) in unclaimed {
            if dropped {
                debug!(task_id = self.id, stream, "stream not claimed before start; detached");
            }
        }
    }

    async fn execute(&self) -> Result<RunOutcome> {
        let engine = self
            .engine
            .lock()
            .unwrap()
            .take()
            .ok_or(EnvlaneError::InvalidState {
                id: self.id,
                status: self.status.get(),
            })?;
        self.release_unclaimed();

        let cancel = self.parts.context.cancel.clone();
        if cancel.is_cancelled() {
            info!(task_id = self.id, "context cancelled before start; not spawning");
            return Ok(RunOutcome::Cancelled);
        }

        let cwd = self.working_dir()?;
        let env = self.effective_env();
        info!(
            task_id = self.id,
            sync_key = %self.parts.sync_key,
            command = %self.parts.command,
            args = ?self.parts.args,
            cwd = ?cwd,
            "starting task process"
        );
        debug!(task_id = self.id, env = ?env, "environment overrides");

        let mut cmd = Command::new(&self.parts.command);
        cmd.args(&self.parts.args)
            .current_dir(&cwd)
            .envs(&env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        isolate_group(&mut cmd);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning '{}' for task {}", self.parts.command, self.id))?;
        // Also the process group ID; still valid after the leader is reaped.
        let pgid = child.id();

        let EngineEnds {
            stdout: out_writer,
            stderr: err_writer,
            stdin: in_reader,
        } = engine;

        let tee = self.open_tee().await;
        let id = self.id;

        let stdout_pump = child
            .stdout
            .take()
            .map(|out| tokio::spawn(pump(out, Some(out_writer), tee, id, "stdout")));
        let stderr_pump = child
            .stderr
            .take()
            .map(|err| tokio::spawn(pump(err, Some(err_writer), None, id, "stderr")));
        let stdin_pump = child
            .stdin
            .take()
            .map(|stdin| tokio::spawn(pump(in_reader, Some(stdin), None, id, "stdin")));

        let deadline = self.parts.context.timeout;
        let expired = async move {
            match deadline {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        let outcome = tokio::select! {
            status = child.wait() => {
                let status = status
                    .with_context(|| format!("waiting for process of task {}", id))?;
                info!(task_id = id, exit_code = ?status.code(), success = status.success(), "task process exited");
                RunOutcome::Exited(status.code())
            }
            _ = cancel.cancelled() => {
                info!(task_id = id, "cancellation requested; killing process group");
                if let Err(e) = kill_tree(id, &mut child, pgid).await {
                    warn!(task_id = id, error = %e, "failed to kill child process on cancellation");
                }
                RunOutcome::Cancelled
            }
            _ = expired => {
                warn!(task_id = id, timeout = ?deadline, "task timed out; killing process group");
                if let Err(e) = kill_tree(id, &mut child, pgid).await {
                    warn!(task_id = id, error = %e, "failed to kill child process on timeout");
                }
                RunOutcome::TimedOut
            }
        };

        if let Some(handle) = stdin_pump {
            handle.abort();
        }
        let mut output_pumps: Vec<_> = [stdout_pump, stderr_pump].into_iter().flatten().collect();
        if !drain_pumps(id, &mut output_pumps).await {
            warn!(
                task_id = id,
                grace = ?DRAIN_GRACE,
                "output still open after the process ended; killing its process group"
            );
            kill_group(id, pgid);
            if !drain_pumps(id, &mut output_pumps).await {
                for handle in &output_pumps {
                    handle.abort();
                }
            }
        }

        Ok(outcome)
    }
}

/// Wait up to [`DRAIN_GRACE`] for every pump; `false` if any is still running.
async fn drain_pumps(task_id: TaskId, pumps: &mut [JoinHandle<u64>]) -> bool {
    let all = async {
        for handle in pumps.iter_mut().filter(|h| !h.is_finished()) {
            if let Err(e) = handle.await {
                warn!(task_id, error = %e, "output pump ended abnormally");
            }
        }
    };
    tokio::time::timeout(DRAIN_GRACE, all).await.is_ok()
}

impl Identifiable for ShellTask {
    fn id(&self) -> TaskId {
        self.id
    }

    fn sync_key(&self) -> &str {
        &self.parts.sync_key
    }

    fn dedup_hash(&self) -> Option<&str> {
        self.parts.dedup_hash.as_deref()
    }

    fn status_cell(&self) -> &StatusCell {
        &self.status
    }
}

impl Runnable for ShellTask {
    fn run(&self) -> RunFuture<'_> {
        Box::pin(async move {
            let result = self.execute().await;
            if let Ok(outcome) = &result {
                *self.outcome.lock().unwrap() = Some(*outcome);
            }
            result
        })
    }

    fn last_outcome(&self) -> Option<RunOutcome> {
        *self.outcome.lock().unwrap()
    }
}

impl StreamSource for ShellTask {
    fn take_stdout(&self) -> Option<DuplexStream> {
        self.consumer.lock().unwrap().stdout.take()
    }

    fn take_stderr(&self) -> Option<DuplexStream> {
        self.consumer.lock().unwrap().stderr.take()
    }

    fn take_stdin(&self) -> Option<DuplexStream> {
        self.consumer.lock().unwrap().stdin.take()
    }
}
