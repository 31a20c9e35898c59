//! Shared-memory strategy on scoped OS threads

use super::{panic_message, Engine, ResultSlots};
use crate::task::{Task, TaskResult};
use crate::workers::Worker;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// Fixed pool of threads pulling task indices from a shared cursor.
///
/// All threads call the same worker instance, so a resolver cache inside the
/// worker is shared across the whole batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadingEngine;

impl ThreadingEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for ThreadingEngine {
    fn name(&self) -> &'static str {
        "threading"
    }

    fn run(&self, worker: Arc<dyn Worker>, tasks: &[Task], max_workers: usize) -> Vec<TaskResult> {
        if tasks.is_empty() {
            return Vec::new();
        }

        let threads = max_workers.max(1).min(tasks.len());
        debug!("Threading engine: {} tasks on {} threads", tasks.len(), threads);

        let slots = ResultSlots::new(tasks.len());
        let cursor = AtomicUsize::new(0);

        thread::scope(|scope| {
            for id in 0..threads {
                let worker = &worker;
                let slots = &slots;
                let cursor = &cursor;

                let spawned = thread::Builder::new()
                    .name(format!("numbreacher-worker-{}", id))
                    .spawn_scoped(scope, move || loop {
                        let index = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(task) = tasks.get(index) else { break };

                        let result = panic::catch_unwind(AssertUnwindSafe(|| worker.run(task)))
                            .unwrap_or_else(|payload| {
                                TaskResult::failure(
                                    task.number.clone(),
                                    format!("Threading engine error: {}", panic_message(&*payload)),
                                )
                            });
                        slots.fill(index, result);
                    });

                if let Err(e) = spawned {
                    warn!("Failed to spawn worker thread {}: {}", id, e);
                }
            }
        });

        slots.into_results(tasks, "Threading")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{counting_worker, echo_worker, tasks};
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_results_follow_task_order() {
        let tasks = tasks(5);
        let results = ThreadingEngine::new().run(Arc::new(echo_worker), &tasks, 5);

        let numbers: Vec<&str> = results.iter().map(|r| r.number()).collect();
        assert_eq!(numbers, vec!["n0", "n1", "n2", "n3", "n4"]);
        assert!(results.iter().all(TaskResult::is_ok));
    }

    #[test]
    fn test_empty_batch() {
        let results = ThreadingEngine::new().run(Arc::new(echo_worker), &[], 4);
        assert!(results.is_empty());
    }

    #[test]
    fn test_zero_workers_clamped_to_one() {
        let tasks = tasks(3);
        let results = ThreadingEngine::new().run(Arc::new(echo_worker), &tasks, 0);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(TaskResult::is_ok));
    }

    #[test]
    fn test_panic_is_isolated() {
        let worker = |task: &Task| {
            if task.number == "n1" {
                panic!("exploded on {}", task.number);
            }
            echo_worker(task)
        };
        let tasks = tasks(3);
        let results = ThreadingEngine::new().run(Arc::new(worker), &tasks, 2);

        assert!(results[0].is_ok());
        assert_eq!(results[1].number(), "n1");
        assert_eq!(results[1].error(), Some("Threading engine error: exploded on n1"));
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_concurrency_bounded_by_max_workers() {
        let active = Arc::new(Mutex::new((0usize, 0usize)));
        let tracker = active.clone();
        let worker = move |task: &Task| {
            {
                let mut guard = tracker.lock().unwrap();
                guard.0 += 1;
                guard.1 = guard.1.max(guard.0);
            }
            std::thread::sleep(Duration::from_millis(20));
            tracker.lock().unwrap().0 -= 1;
            echo_worker(task)
        };

        let tasks = tasks(8);
        let results = ThreadingEngine::new().run(Arc::new(worker), &tasks, 3);
        assert_eq!(results.len(), 8);
        let peak = active.lock().unwrap().1;
        assert!(peak <= 3, "peak concurrency was {}", peak);
    }

    #[test]
    fn test_each_index_runs_exactly_once() {
        let (calls, worker) = counting_worker(20);
        let results = ThreadingEngine::new().run(Arc::new(worker), &tasks(20), 4);

        assert!(results.iter().all(TaskResult::is_ok));
        for (index, count) in calls.iter().enumerate() {
            assert_eq!(count.load(Ordering::SeqCst), 1, "call count for task {}", index);
        }
    }
}
