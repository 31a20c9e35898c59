//! Units of work handed to the dispatcher and the outcomes it returns
//!
//! The JSON shapes here are the contract with isolated worker processes and
//! with whatever consumes bulk results:
//!
//! - task: `{ "number": "...", "enable_owner_lookup": true, "render_output": true }`
//! - success: `{ "ok": true, "number": "...", "result": { "kind": "scan", ... } }`
//! - failure: `{ "ok": false, "number": "...", "error": "Invalid number: ..." }`

use crate::owner::OwnerProfile;
use crate::scanner::ScanReport;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// One phone number plus per-task options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub number: String,
    #[serde(default = "default_true")]
    pub enable_owner_lookup: bool,
    #[serde(default = "default_true")]
    pub render_output: bool,
}

impl Task {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            enable_owner_lookup: true,
            render_output: true,
        }
    }

    pub fn with_owner_lookup(mut self, enabled: bool) -> Self {
        self.enable_owner_lookup = enabled;
        self
    }

    pub fn with_render_output(mut self, enabled: bool) -> Self {
        self.render_output = enabled;
        self
    }
}

/// What a successful worker produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    Scan { report: Box<ScanReport>, output: String },
    Owner { owner: OwnerProfile },
}

/// Outcome of one task; exactly one per task, never partially filled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "TaskResultWire", try_from = "TaskResultWire")]
pub enum TaskResult {
    Success { number: String, payload: TaskPayload },
    Failure { number: String, error: String },
}

impl TaskResult {
    pub fn success(number: impl Into<String>, payload: TaskPayload) -> Self {
        TaskResult::Success {
            number: number.into(),
            payload,
        }
    }

    pub fn failure(number: impl Into<String>, error: impl Into<String>) -> Self {
        TaskResult::Failure {
            number: number.into(),
            error: error.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, TaskResult::Success { .. })
    }

    pub fn number(&self) -> &str {
        match self {
            TaskResult::Success { number, .. } | TaskResult::Failure { number, .. } => number,
        }
    }

    pub fn payload(&self) -> Option<&TaskPayload> {
        match self {
            TaskResult::Success { payload, .. } => Some(payload),
            TaskResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            TaskResult::Success { .. } => None,
            TaskResult::Failure { error, .. } => Some(error),
        }
    }

    /// Scan report, when this is a successful scan
    pub fn report(&self) -> Option<&ScanReport> {
        match self.payload() {
            Some(TaskPayload::Scan { report, .. }) => Some(&**report),
            _ => None,
        }
    }

    /// Owner profile from either payload kind
    pub fn owner(&self) -> Option<&OwnerProfile> {
        match self.payload() {
            Some(TaskPayload::Scan { report, .. }) => Some(&report.owner),
            Some(TaskPayload::Owner { owner }) => Some(owner),
            None => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct TaskResultWire {
    ok: bool,
    number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<TaskPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<TaskResult> for TaskResultWire {
    fn from(value: TaskResult) -> Self {
        match value {
            TaskResult::Success { number, payload } => TaskResultWire {
                ok: true,
                number,
                result: Some(payload),
                error: None,
            },
            TaskResult::Failure { number, error } => TaskResultWire {
                ok: false,
                number,
                result: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<TaskResultWire> for TaskResult {
    type Error = String;

    fn try_from(wire: TaskResultWire) -> Result<Self, Self::Error> {
        match (wire.ok, wire.result, wire.error) {
            (true, Some(payload), _) => Ok(TaskResult::Success { number: wire.number, payload }),
            (true, None, _) => Err(format!("successful result for '{}' has no payload", wire.number)),
            (false, _, error) => Ok(TaskResult::Failure {
                number: wire.number,
                error: error.unwrap_or_else(|| "Unknown error".to_string()),
            }),
        }
    }
}
