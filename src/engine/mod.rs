//! Bulk dispatch strategies.
//!
//! Every engine fans a batch of tasks out over a bounded pool and returns one
//! [`TaskResult`] per task, in task order. A worker failure of any kind is
//! captured as a `Failure` tagged with the engine that observed it; siblings
//! keep running and nothing propagates to the caller.

pub mod cooperative;
pub mod parallel;
pub mod threading;

pub use cooperative::AsyncEngine;
pub use parallel::ParallelEngine;
pub use threading::ThreadingEngine;

use crate::config::ConfigError;
use crate::task::{Task, TaskResult};
use crate::workers::Worker;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::warn;

/// Runs a batch of tasks against one worker
pub trait Engine: Send + Sync {
    /// Registry name ("threading", "parallel" or "async")
    fn name(&self) -> &'static str;

    /// Execute every task with at most `max_workers` in flight.
    ///
    /// `result[i]` always answers `tasks[i]`. `max_workers` below 1 is treated
    /// as 1 and an empty batch returns immediately.
    fn run(&self, worker: Arc<dyn Worker>, tasks: &[Task], max_workers: usize) -> Vec<TaskResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Threading,
    Parallel,
    Async,
}

impl EngineKind {
    pub const ALL: [EngineKind; 3] = [EngineKind::Async, EngineKind::Parallel, EngineKind::Threading];

    /// Resolve a user-supplied engine name. Blank selects threading.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_lowercase().as_str() {
            "" | "threading" => Ok(EngineKind::Threading),
            "parallel" => Ok(EngineKind::Parallel),
            "async" => Ok(EngineKind::Async),
            _ => Err(ConfigError::UnknownEngine {
                name: name.to_string(),
                available: available_engines().join(", "),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Threading => "threading",
            EngineKind::Parallel => "parallel",
            EngineKind::Async => "async",
        }
    }

    /// One-line description for `engines` output
    pub fn describe(&self) -> &'static str {
        match self {
            EngineKind::Threading => "OS threads in one process; shares the owner cache",
            EngineKind::Parallel => "one isolated child process per task; no shared cache",
            EngineKind::Async => "semaphore-gated tasks on a tokio runtime with blocking offload",
        }
    }

    pub fn build(&self) -> Box<dyn Engine> {
        match self {
            EngineKind::Threading => Box::new(ThreadingEngine::new()),
            EngineKind::Parallel => Box::new(ParallelEngine::new()),
            EngineKind::Async => Box::new(AsyncEngine::new()),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build an engine by name; fails closed on unknown names
pub fn create_engine(name: &str) -> Result<Box<dyn Engine>, ConfigError> {
    Ok(EngineKind::parse(name)?.build())
}

/// Sorted names accepted by [`create_engine`]
pub fn available_engines() -> Vec<&'static str> {
    EngineKind::ALL.iter().map(EngineKind::as_str).collect()
}

/// Pre-sized result table written by index from any thread
pub(crate) struct ResultSlots {
    slots: Vec<OnceLock<TaskResult>>,
}

impl ResultSlots {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| OnceLock::new()).collect(),
        }
    }

    pub(crate) fn fill(&self, index: usize, result: TaskResult) {
        match self.slots.get(index) {
            Some(slot) => {
                if slot.set(result).is_err() {
                    warn!("Result slot {} written twice; keeping the first outcome", index);
                }
            }
            None => warn!("Result index {} out of range ({} slots)", index, self.slots.len()),
        }
    }

    /// Collect results in task order. Unfilled slots become engine failures.
    pub(crate) fn into_results(self, tasks: &[Task], engine_label: &str) -> Vec<TaskResult> {
        self.slots
            .into_iter()
            .zip(tasks)
            .map(|(slot, task)| {
                slot.into_inner().unwrap_or_else(|| {
                    TaskResult::failure(
                        task.number.clone(),
                        format!("{} engine error: worker never produced a result", engine_label),
                    )
                })
            })
            .collect()
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::owner::OwnerProfile;
    use crate::task::{Task, TaskPayload, TaskResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    /// Echoes the number back, sleeping longer for earlier tasks so completion
    /// order is the reverse of submission order
    pub fn echo_worker(task: &Task) -> TaskResult {
        let delay: u64 = task.number.trim_start_matches('n').parse().unwrap_or(0);
        thread::sleep(Duration::from_millis(50u64.saturating_sub(delay * 10)));
        TaskResult::success(
            task.number.clone(),
            TaskPayload::Owner {
                owner: OwnerProfile::disabled(),
            },
        )
    }

    pub fn tasks(count: usize) -> Vec<Task> {
        (0..count).map(|i| Task::new(format!("n{}", i))).collect()
    }

    /// Echo worker that counts how often each `n<index>` task reaches it
    pub fn counting_worker(
        count: usize,
    ) -> (Arc<Vec<AtomicUsize>>, impl Fn(&Task) -> TaskResult + Send + Sync + 'static) {
        let calls: Arc<Vec<AtomicUsize>> = Arc::new((0..count).map(|_| AtomicUsize::new(0)).collect());
        let recorder = calls.clone();
        let worker = move |task: &Task| {
            let index: usize = task.number.trim_start_matches('n').parse().unwrap();
            recorder[index].fetch_add(1, Ordering::SeqCst);
            echo_worker(task)
        };
        (calls, worker)
    }
}
