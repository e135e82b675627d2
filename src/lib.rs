// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod manager;
pub mod sequence;
pub mod task;
pub mod types;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, CliCommand, SubmitArgs};
use crate::config::{ConfigFile, load_or_default};
use crate::manager::TaskManager;
use crate::sequence::SequenceAllocator;
use crate::task::{ExecContext, RunCommand};
use crate::types::TaskStatus;

pub use crate::manager::ManagerOptions;
pub use crate::task::{Task, TaskRef};
pub use crate::types::TaskId;

/// High-level entry point used by `main.rs`.
///
/// Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_or_default(&config_path)?;

    match args.command {
        CliCommand::Check => {
            print_config(&cfg);
            Ok(0)
        }
        CliCommand::Sequence => {
            let allocator = SequenceAllocator::from_config(&cfg);
            println!("{}", allocator.last_issued().await);
            Ok(0)
        }
        CliCommand::Submit(submit) => run_submit(&cfg, submit).await,
    }
}

/// Admit one command, stream its output to our stdout/stderr and wait for it.
///
/// - Ctrl-C cancels the task through its registered cancel handle.
/// - Exit code: 0 for `done`, 2 for `timeout`, 1 otherwise.
async fn run_submit(cfg: &ConfigFile, args: SubmitArgs) -> Result<i32> {
    let mut spec = RunCommand::new(&args.env, &args.layer, args.command.iter().cloned());
    for (key, value) in parse_env_pairs(args.set_env.iter().map(String::as_str))? {
        spec = spec.with_env_var(key, value);
    }
    spec = match (&args.hash, args.dedup) {
        (Some(hash), _) => spec.with_hash(hash.clone()),
        (None, true) => spec.with_content_hash(),
        (None, false) => spec,
    };

    let mut ctx = ExecContext::new();
    if let Some(dir) = &args.workdir {
        ctx = ctx.with_workdir(dir);
    }
    if let Some(secs) = args.timeout {
        ctx = ctx.with_timeout(Duration::from_secs(secs));
    }

    let manager = Arc::new(TaskManager::from_config(cfg));
    manager.start()?;

    let task = manager.add(&spec, ctx.clone()).await?;
    let id = task.id();
    manager.register_cancel(id, ctx.cancel_handle())?;
    info!(task_id = id, sync_key = %task.sync_key(), "task admitted from CLI");

    let mut forwarders = Vec::new();
    if let Some(mut out) = task.take_stdout() {
        forwarders.push(tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            let _ = tokio::io::copy(&mut out, &mut stdout).await;
            let _ = stdout.flush().await;
        }));
    }
    if let Some(mut err) = task.take_stderr() {
        forwarders.push(tokio::spawn(async move {
            let mut stderr = tokio::io::stderr();
            let _ = tokio::io::copy(&mut err, &mut stderr).await;
            let _ = stderr.flush().await;
        }));
    }

    {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            if let Err(e) = manager.cancel(id) {
                debug!(task_id = id, error = %e, "nothing to cancel on Ctrl+C");
            }
        });
    }

    manager.launch(Arc::clone(&task)).await?;
    let status = task.status_cell().wait_terminal().await;

    for handle in forwarders {
        let _ = handle.await;
    }
    manager.close().await?;

    info!(task_id = id, %status, outcome = ?task.last_outcome(), "task finished");
    Ok(match status {
        TaskStatus::Done => 0,
        TaskStatus::Timeout => 2,
        _ => 1,
    })
}

fn parse_env_pair(pair: &str) -> Result<(String, String)> {
    let Some((key, value)) = pair.split_once('=') else {
        bail!("invalid --set-env '{pair}' (expected KEY=VALUE)");
    };
    if key.is_empty() {
        bail!("invalid --set-env '{pair}' (empty key)");
    }
    Ok((key.to_string(), value.to_string()))
}

/// Print the effective settings.
fn print_config(cfg: &ConfigFile) {
    println!("envlane configuration");
    println!("  manager.queue_length = {}", cfg.manager.queue_length);
    println!("  manager.run_dir = {}", cfg.manager.run_dir.display());
    println!("  sequence file = {}", cfg.sequence_path().display());
    match &cfg.manager.out_dir {
        Some(dir) => println!("  manager.out_dir = {}", dir.display()),
        None => println!("  manager.out_dir = (disabled)"),
    }
    println!("  sequence.shared = {}", cfg.sequence.shared);
    if let Some(dir) = &cfg.sequence.store_dir {
        println!("  sequence.store_dir = {}", dir.display());
    }
    println!("  sequence.table = {}", cfg.sequence.table);
    println!("  sequence.base = {}", cfg.sequence.base);

    debug!("check complete (no execution)");
}

/// Parse repeated `KEY=VALUE` flags into a map.
pub fn parse_env_pairs<'a, I>(pairs: I) -> Result<HashMap<String, String>>
where
    I: IntoIterator<Item = &'a str>,
{
    pairs
        .into_iter()
        .map(|pair| parse_env_pair(pair).with_context(|| format!("parsing '{pair}'")))
        .collect()
}
