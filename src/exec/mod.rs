// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`shell`] holds `ShellTask`, the task variant that runs one process
//!   with `tokio::process::Command` and reports a `RunOutcome`.
//! - [`streams`] wires the child's stdout/stderr/stdin to the in-memory
//!   endpoints consumers take before the run starts.
//! - `process` spawns each task in its own process group and tears the
//!   group down on cancel and timeout.

mod process;
pub mod shell;
pub mod streams;

pub use shell::{ShellTask, ShellTaskParts};
pub use streams::STREAM_CAPACITY;
