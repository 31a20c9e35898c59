//! Cooperative strategy: semaphore admission on a tokio runtime

use super::{panic_message, Engine, ResultSlots};
use crate::task::{Task, TaskResult};
use crate::workers::Worker;
use futures::future::join_all;
use std::sync::Arc;
use std::thread;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, error};

/// Runs each task on the blocking pool of a private current-thread runtime.
///
/// A task is only handed to `spawn_blocking` after it holds one of
/// `max_workers` semaphore permits, and keeps that permit until the worker
/// returns. Called from inside another tokio runtime, the batch is driven from
/// a helper thread instead, since a runtime cannot be blocked on from within
/// one.
#[derive(Debug, Default, Clone, Copy)]
pub struct AsyncEngine;

impl AsyncEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for AsyncEngine {
    fn name(&self) -> &'static str {
        "async"
    }

    fn run(&self, worker: Arc<dyn Worker>, tasks: &[Task], max_workers: usize) -> Vec<TaskResult> {
        if tasks.is_empty() {
            return Vec::new();
        }

        let permits = max_workers.max(1);
        if Handle::try_current().is_err() {
            return run_batch(worker, tasks, permits);
        }

        debug!("Async engine invoked inside a tokio runtime; using a helper thread");
        thread::scope(|scope| {
            let spawned = thread::Builder::new()
                .name("numbreacher-async".to_string())
                .spawn_scoped(scope, move || run_batch(worker, tasks, permits));

            match spawned {
                Ok(handle) => handle
                    .join()
                    .unwrap_or_else(|payload| fail_all(tasks, &panic_message(&*payload))),
                Err(e) => {
                    error!("Failed to spawn async engine thread: {}", e);
                    fail_all(tasks, &e.to_string())
                }
            }
        })
    }
}

/// Drive the whole batch on a fresh runtime owned by the calling thread
fn run_batch(worker: Arc<dyn Worker>, tasks: &[Task], permits: usize) -> Vec<TaskResult> {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .max_blocking_threads(permits)
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return fail_all(tasks, &e.to_string());
        }
    };

    debug!("Async engine: {} tasks with {} permits", tasks.len(), permits);
    let slots = ResultSlots::new(tasks.len());
    let semaphore = Arc::new(Semaphore::new(permits));

    runtime.block_on(async {
        let futures = tasks.iter().enumerate().map(|(index, task)| {
            let semaphore = semaphore.clone();
            let worker = worker.clone();
            let slots = &slots;
            async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(permit) => {
                        let owned = task.clone();
                        let handle = tokio::task::spawn_blocking(move || {
                            let _permit = permit;
                            worker.run(&owned)
                        });
                        match handle.await {
                            Ok(result) => result,
                            Err(e) if e.is_panic() => TaskResult::failure(
                                task.number.clone(),
                                format!("Async engine error: {}", panic_message(&*e.into_panic())),
                            ),
                            Err(e) => TaskResult::failure(
                                task.number.clone(),
                                format!("Async engine error: {}", e),
                            ),
                        }
                    }
                    Err(e) => TaskResult::failure(
                        task.number.clone(),
                        format!("Async engine error: {}", e),
                    ),
                };
                slots.fill(index, result);
            }
        });

        join_all(futures).await;
    });

    slots.into_results(tasks, "Async")
}

fn fail_all(tasks: &[Task], message: &str) -> Vec<TaskResult> {
    tasks
        .iter()
        .map(|task| TaskResult::failure(task.number.clone(), format!("Async engine error: {}", message)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{counting_worker, echo_worker, tasks};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_results_follow_task_order() {
        let tasks = tasks(5);
        let results = AsyncEngine::new().run(Arc::new(echo_worker), &tasks, 5);

        let numbers: Vec<&str> = results.iter().map(|r| r.number()).collect();
        assert_eq!(numbers, vec!["n0", "n1", "n2", "n3", "n4"]);
    }

    #[test]
    fn test_empty_batch() {
        assert!(AsyncEngine::new().run(Arc::new(echo_worker), &[], 3).is_empty());
    }

    #[test]
    fn test_panic_is_isolated() {
        let worker = |task: &Task| {
            if task.number == "n0" {
                panic!("async boom");
            }
            echo_worker(task)
        };
        let tasks = tasks(3);
        let results = AsyncEngine::new().run(Arc::new(worker), &tasks, 0);

        assert_eq!(results[0].error(), Some("Async engine error: async boom"));
        assert!(results[1].is_ok());
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_permits_bound_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (active_in, peak_in) = (active.clone(), peak.clone());
        let worker = move |task: &Task| {
            let now = active_in.fetch_add(1, Ordering::SeqCst) + 1;
            peak_in.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            active_in.fetch_sub(1, Ordering::SeqCst);
            echo_worker(task)
        };

        let tasks = tasks(6);
        let results = AsyncEngine::new().run(Arc::new(worker), &tasks, 2);
        assert!(results.iter().all(TaskResult::is_ok));
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_each_index_runs_exactly_once() {
        let (calls, worker) = counting_worker(20);
        let results = AsyncEngine::new().run(Arc::new(worker), &tasks(20), 4);

        assert_eq!(results.len(), 20);
        for (index, count) in calls.iter().enumerate() {
            assert_eq!(count.load(Ordering::SeqCst), 1, "call count for task {}", index);
        }
    }

    #[test]
    fn test_run_from_inside_current_thread_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let tasks = tasks(3);

        let results = runtime.block_on(async { AsyncEngine::new().run(Arc::new(echo_worker), &tasks, 2) });

        let numbers: Vec<&str> = results.iter().map(|r| r.number()).collect();
        assert_eq!(numbers, vec!["n0", "n1", "n2"]);
        assert!(results.iter().all(TaskResult::is_ok));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_from_async_context() {
        let tasks = tasks(4);
        let results = AsyncEngine::new().run(Arc::new(echo_worker), &tasks, 2);
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(TaskResult::is_ok));
    }
}
