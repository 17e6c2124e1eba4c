use serde_json::Value;

use super::event::WorkflowEvent;
use super::step::{StepContext, StepError};

/// Durable handler subscribed to one event name.
///
/// `execute` is called from a blocking context and may be entered many times for
/// the same run; every side effect must go through [`StepContext::run`] so that it
/// is replayed rather than repeated.
pub trait WorkflowFunction: Send + Sync {
    /// Stable identifier persisted with each run.
    fn id(&self) -> &'static str;

    /// Event name that starts a run of this function.
    fn trigger(&self) -> &'static str;

    fn execute(&self, event: &WorkflowEvent, step: &mut StepContext<'_>) -> Result<Value, StepError>;
}
