use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::store::StoreError;
use crate::board::domain::{JobPostId, UserId};

/// Emitted once a listing has been persisted; starts the expiration timer.
pub const JOB_CREATED: &str = "job/created";
/// Emitted once a job seeker finishes onboarding; starts the listing digest.
pub const JOB_SEEKER_CREATED: &str = "jobseeker/created";

/// Named event with a JSON payload, as handed to the step runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub name: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl WorkflowEvent {
    pub fn new(name: impl Into<String>, data: Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            data,
            timestamp,
        }
    }

    pub fn job_created(job_id: &JobPostId, expiration_days: u32, timestamp: DateTime<Utc>) -> Self {
        Self::new(
            JOB_CREATED,
            json!({ "jobId": job_id, "expirationDays": expiration_days }),
            timestamp,
        )
    }

    pub fn job_seeker_created(user_id: &UserId, timestamp: DateTime<Utc>) -> Self {
        Self::new(JOB_SEEKER_CREATED, json!({ "userId": user_id }), timestamp)
    }

    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreatedPayload {
    pub job_id: JobPostId,
    pub expiration_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSeekerCreatedPayload {
    pub user_id: UserId,
}

/// Destination for lifecycle events. Implementations must persist the event before
/// returning `Ok`, otherwise the scheduled follow-up can be lost.
pub trait EventSink: Send + Sync {
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("event rejected: {0}")]
    Rejected(String),
}
