//! Process-isolated strategy: one child process per task

use super::{Engine, ResultSlots};
use crate::task::{Task, TaskResult};
use crate::workers::{Worker, WorkerDescriptor, WorkerRequest};
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// Subcommand that turns the binary into a single-task worker
pub const WORKER_SUBCOMMAND: &str = "worker";

/// Environment variable naming the worker binary explicitly
pub const WORKER_BIN_ENV: &str = "NUMBREACHER_WORKER_BIN";

const WORKER_BIN_NAME: &str = "numbreacher";

/// Spawns the worker binary once per task, at most `max_workers` at a time.
///
/// The child receives a [`WorkerRequest`] as JSON on stdin and answers with a
/// [`TaskResult`] as JSON on stdout. Every child rebuilds its worker from the
/// descriptor, so nothing (including the owner cache) is shared between tasks.
#[derive(Debug, Clone, Default)]
pub struct ParallelEngine {
    program: Option<PathBuf>,
}

impl ParallelEngine {
    /// Engine that locates the numbreacher binary at run time: `NUMBREACHER_WORKER_BIN`,
    /// then the running executable if it is numbreacher, then a numbreacher
    /// binary beside it or one directory up
    pub fn new() -> Self {
        Self { program: None }
    }

    /// Engine that invokes a specific worker binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    fn program(&self) -> Result<PathBuf> {
        match &self.program {
            Some(program) => check_worker_binary(program),
            None => {
                let current = std::env::current_exe().context("Failed to locate the current executable")?;
                let configured = std::env::var_os(WORKER_BIN_ENV).map(PathBuf::from);
                locate_worker_binary(configured, &current)
            }
        }
    }
}

/// Resolve the worker binary without ever falling back to an arbitrary host executable
fn locate_worker_binary(configured: Option<PathBuf>, current_exe: &Path) -> Result<PathBuf> {
    if let Some(path) = configured {
        return check_worker_binary(&path);
    }

    let file_name = format!("{}{}", WORKER_BIN_NAME, std::env::consts::EXE_SUFFIX);
    if current_exe.file_name().is_some_and(|name| name == file_name.as_str()) {
        return Ok(current_exe.to_path_buf());
    }

    // cargo keeps test executables in deps/, one level below the binaries
    let dir = current_exe.parent();
    dir.into_iter()
        .chain(dir.and_then(Path::parent))
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            anyhow!(
                "worker binary not found: no {} beside {} (set {})",
                file_name,
                current_exe.display(),
                WORKER_BIN_ENV
            )
        })
}

fn check_worker_binary(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(anyhow!("worker binary not found: {}", path.display()))
    }
}

impl Engine for ParallelEngine {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn run(&self, worker: Arc<dyn Worker>, tasks: &[Task], max_workers: usize) -> Vec<TaskResult> {
        if tasks.is_empty() {
            return Vec::new();
        }

        let setup = worker
            .descriptor()
            .ok_or_else(|| anyhow!("worker cannot run in an isolated process"))
            .and_then(|descriptor| Ok((self.program()?, descriptor)));
        let (program, descriptor) = match setup {
            Ok(setup) => setup,
            Err(e) => {
                warn!("Parallel engine cannot start: {:#}", e);
                return tasks
                    .iter()
                    .map(|task| TaskResult::failure(task.number.clone(), format!("Parallel engine error: {:#}", e)))
                    .collect();
            }
        };

        let drivers = max_workers.max(1).min(tasks.len());
        debug!("Parallel engine: {} tasks, {} concurrent processes via {:?}", tasks.len(), drivers, program);

        let slots = ResultSlots::new(tasks.len());
        let cursor = AtomicUsize::new(0);

        thread::scope(|scope| {
            for id in 0..drivers {
                let (program, descriptor) = (&program, &descriptor);
                let (slots, cursor) = (&slots, &cursor);

                let spawned = thread::Builder::new()
                    .name(format!("numbreacher-driver-{}", id))
                    .spawn_scoped(scope, move || loop {
                        let index = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(task) = tasks.get(index) else { break };

                        let result = run_in_child(program, descriptor, task).unwrap_or_else(|e| {
                            TaskResult::failure(task.number.clone(), format!("Parallel engine error: {:#}", e))
                        });
                        slots.fill(index, result);
                    });

                if let Err(e) = spawned {
                    warn!("Failed to spawn driver thread {}: {}", id, e);
                }
            }
        });

        slots.into_results(tasks, "Parallel")
    }
}

/// Run one task in a fresh worker process
fn run_in_child(program: &Path, descriptor: &WorkerDescriptor, task: &Task) -> Result<TaskResult> {
    let request = WorkerRequest {
        worker: descriptor.clone(),
        task: task.clone(),
    };
    let payload = serde_json::to_vec(&request).context("Failed to encode worker request")?;

    let mut child = Command::new(program)
        .arg(WORKER_SUBCOMMAND)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to spawn worker process {:?}", program))?;

    {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("Failed to capture worker stdin"))?;
        stdin.write_all(&payload).context("Failed to send task to worker process")?;
    }

    let output = child
        .wait_with_output()
        .context("Failed to collect worker process output")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.lines().last().unwrap_or("").trim();
        return Err(anyhow!("worker process exited with {}: {}", output.status, detail));
    }

    serde_json::from_slice(&output.stdout).context("Failed to decode worker process output")
}
