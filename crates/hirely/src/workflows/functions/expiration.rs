use std::sync::Arc;

use chrono::Duration;
use serde_json::{json, Value};

use crate::board::lifecycle::expire_listing;
use crate::board::repository::BoardRepository;
use crate::workflows::event::{JobCreatedPayload, WorkflowEvent, JOB_CREATED};
use crate::workflows::function::WorkflowFunction;
use crate::workflows::step::{StepContext, StepError};

/// Sleeps for the paid listing window, then marks the listing expired.
pub struct JobExpiration<R> {
    repository: Arc<R>,
}

impl<R> JobExpiration<R> {
    pub const ID: &'static str = "job-expiration";

    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }
}

impl<R> WorkflowFunction for JobExpiration<R>
where
    R: BoardRepository + 'static,
{
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn trigger(&self) -> &'static str {
        JOB_CREATED
    }

    fn execute(&self, event: &WorkflowEvent, step: &mut StepContext<'_>) -> Result<Value, StepError> {
        let payload: JobCreatedPayload = event
            .payload()
            .map_err(|err| StepError::InvalidPayload(err.to_string()))?;

        step.sleep(
            "wait-for-expiration",
            Duration::days(i64::from(payload.expiration_days)),
        )?;

        let outcome = step.run("update-job-status", || {
            expire_listing(self.repository.as_ref(), &payload.job_id)
        })?;

        Ok(json!({
            "jobId": payload.job_id,
            "outcome": outcome.as_str(),
            "message": "Job marked as expired",
        }))
    }
}
