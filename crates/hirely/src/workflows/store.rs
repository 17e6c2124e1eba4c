use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::event::WorkflowEvent;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a workflow run currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Waiting for its first attempt or for a retry after a failed step.
    Queued,
    /// Parked on a durable sleep until `wake_at`.
    Sleeping,
    /// Claimed by a worker.
    Running,
    Completed,
    /// Gave up after exhausting retries.
    Failed,
}

impl RunStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Sleeping => "sleeping",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(RunStatus::Queued),
            "sleeping" => Some(RunStatus::Sleeping),
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// One invocation of a workflow function for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: RunId,
    pub function_id: String,
    pub event: WorkflowEvent,
    pub status: RunStatus,
    /// Earliest instant the run may be picked up again.
    pub wake_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub output: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRun {
    pub fn queued(function_id: &str, event: WorkflowEvent, now: DateTime<Utc>) -> Self {
        Self {
            id: RunId::generate(),
            function_id: function_id.to_string(),
            event,
            status: RunStatus::Queued,
            wake_at: now,
            attempts: 0,
            last_error: None,
            output: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Run,
    Sleep,
}

impl StepKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            StepKind::Run => "run",
            StepKind::Sleep => "sleep",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "run" => Some(StepKind::Run),
            "sleep" => Some(StepKind::Sleep),
            _ => None,
        }
    }
}

/// Memoised outcome of a named step within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub key: String,
    pub kind: StepKind,
    pub output: Option<Value>,
    pub wake_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    pub fn completed(key: &str, output: Value, now: DateTime<Utc>) -> Self {
        Self {
            key: key.to_string(),
            kind: StepKind::Run,
            output: Some(output),
            wake_at: None,
            completed_at: Some(now),
        }
    }

    pub fn sleeping(key: &str, wake_at: DateTime<Utc>) -> Self {
        Self {
            key: key.to_string(),
            kind: StepKind::Sleep,
            output: None,
            wake_at: Some(wake_at),
            completed_at: None,
        }
    }

    pub fn woke(key: &str, wake_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            completed_at: Some(now),
            ..Self::sleeping(key, wake_at)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Durable home for runs and their step markers.
pub trait WorkflowStore: Send + Sync {
    fn insert_run(&self, run: &WorkflowRun) -> Result<(), StoreError>;
    fn run(&self, id: &RunId) -> Result<Option<WorkflowRun>, StoreError>;
    /// Queued or sleeping runs whose `wake_at` is not after `now`, oldest first.
    fn due_runs(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<WorkflowRun>, StoreError>;
    /// Moves a due run to `Running` and stamps the claim time in `updated_at`.
    /// Returns `false` when another worker got there first.
    fn claim_run(&self, id: &RunId, now: DateTime<Utc>) -> Result<bool, StoreError>;
    /// Persists status, schedule, attempts, error and output of a run.
    fn update_run(&self, run: &WorkflowRun) -> Result<(), StoreError>;
    /// Returns `Running` runs claimed at or before `claimed_before` to the queue.
    fn requeue_stalled_runs(
        &self,
        claimed_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError>;
    fn runs_with_status(&self, status: RunStatus) -> Result<Vec<WorkflowRun>, StoreError>;

    fn step(&self, run_id: &RunId, key: &str) -> Result<Option<StepRecord>, StoreError>;
    /// Inserts or replaces the step marker identified by `record.key`.
    fn save_step(&self, run_id: &RunId, record: &StepRecord) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("workflow store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt workflow record: {0}")]
    Corrupt(String),
}
