//! Request handlers executed by the dispatcher
//!
//! A worker turns one [`Task`] into one [`TaskResult`]. Invalid input is
//! reported as a failure result, never as a panic or an error value.

use crate::config::OwnerLookupConfig;
use crate::owner::{OwnerProfile, OwnerResolver};
use crate::phone::{self, NumberDescriptor};
use crate::scanner;
use crate::task::{Task, TaskPayload, TaskResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Handles a single task
pub trait Worker: Send + Sync {
    fn run(&self, task: &Task) -> TaskResult;

    /// Recipe for rebuilding this worker inside an isolated process.
    ///
    /// Workers that cannot be rebuilt elsewhere return `None` and cannot be
    /// used with the process-parallel engine.
    fn descriptor(&self) -> Option<WorkerDescriptor> {
        None
    }
}

impl<F> Worker for F
where
    F: Fn(&Task) -> TaskResult + Send + Sync,
{
    fn run(&self, task: &Task) -> TaskResult {
        self(task)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    Scan,
    OwnerLookup,
}

/// Serializable description of a built-in worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    pub kind: WorkerKind,
    pub owner_lookup: OwnerLookupConfig,
}

impl WorkerDescriptor {
    /// Build the worker with a fresh resolver and an empty cache
    pub fn build(&self) -> anyhow::Result<Arc<dyn Worker>> {
        let resolver = Arc::new(OwnerResolver::from_config(&self.owner_lookup)?);
        let worker: Arc<dyn Worker> = match self.kind {
            WorkerKind::Scan => Arc::new(ScanWorker::new(resolver, self.owner_lookup.clone())),
            WorkerKind::OwnerLookup => Arc::new(OwnerLookupWorker::new(resolver, self.owner_lookup.clone())),
        };
        Ok(worker)
    }
}

/// Message sent to an isolated worker process on stdin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub worker: WorkerDescriptor,
    pub task: Task,
}

impl WorkerRequest {
    /// Execute the request in the current process
    pub fn execute(&self) -> anyhow::Result<TaskResult> {
        let worker = self.worker.build()?;
        Ok(worker.run(&self.task))
    }
}

/// Trim and validate a task's number, or produce the failure result for it
fn validate(task: &Task) -> Result<NumberDescriptor, TaskResult> {
    let number = task.number.trim();
    phone::parse_number(number).map_err(|e| TaskResult::failure(number, e.to_string()))
}

/// Full scan: metadata, optional owner lookup, risk and rendered text
pub struct ScanWorker {
    resolver: Arc<OwnerResolver>,
    owner_lookup: OwnerLookupConfig,
}

impl ScanWorker {
    pub fn new(resolver: Arc<OwnerResolver>, owner_lookup: OwnerLookupConfig) -> Self {
        Self { resolver, owner_lookup }
    }
}

impl Worker for ScanWorker {
    fn run(&self, task: &Task) -> TaskResult {
        let number = match validate(task) {
            Ok(number) => number,
            Err(failure) => return failure,
        };

        let lookup = task.enable_owner_lookup && self.owner_lookup.enabled;
        let resolver = lookup.then_some(self.resolver.as_ref());
        let report = scanner::scan_number(&number, resolver);
        let output = if task.render_output { report.render() } else { String::new() };

        TaskResult::success(
            number.raw.clone(),
            TaskPayload::Scan {
                report: Box::new(report),
                output,
            },
        )
    }

    fn descriptor(&self) -> Option<WorkerDescriptor> {
        Some(WorkerDescriptor {
            kind: WorkerKind::Scan,
            owner_lookup: self.owner_lookup.clone(),
        })
    }
}

/// Owner-name lookup only
pub struct OwnerLookupWorker {
    resolver: Arc<OwnerResolver>,
    owner_lookup: OwnerLookupConfig,
}

impl OwnerLookupWorker {
    pub fn new(resolver: Arc<OwnerResolver>, owner_lookup: OwnerLookupConfig) -> Self {
        Self { resolver, owner_lookup }
    }
}

impl Worker for OwnerLookupWorker {
    fn run(&self, task: &Task) -> TaskResult {
        let number = match validate(task) {
            Ok(number) => number,
            Err(failure) => return failure,
        };

        let owner = if self.owner_lookup.enabled {
            self.resolver.lookup_owner_name(&number).as_ref().clone()
        } else {
            OwnerProfile::disabled()
        };
        TaskResult::success(number.raw.clone(), TaskPayload::Owner { owner })
    }

    fn descriptor(&self) -> Option<WorkerDescriptor> {
        Some(WorkerDescriptor {
            kind: WorkerKind::OwnerLookup,
            owner_lookup: self.owner_lookup.clone(),
        })
    }
}
