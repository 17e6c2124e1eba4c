//! Durable, event-triggered workflows.
//!
//! Lifecycle events are persisted as runs of every subscribed [`WorkflowFunction`].
//! The [`StepRunner`] re-enters each due run, replaying completed steps from the
//! store, so timers and retries survive process restarts.

pub mod event;
pub mod function;
pub mod functions;
pub mod runner;
pub mod step;
pub mod store;

#[cfg(test)]
mod tests;

pub use event::{
    EventError, EventSink, JobCreatedPayload, JobSeekerCreatedPayload, WorkflowEvent, JOB_CREATED,
    JOB_SEEKER_CREATED,
};
pub use function::WorkflowFunction;
pub use functions::{DigestSchedule, JobExpiration, JobListingDigest};
pub use runner::{RetryPolicy, StepRunner, TickReport};
pub use step::{StepContext, StepError};
pub use store::{RunId, RunStatus, StepKind, StepRecord, StoreError, WorkflowRun, WorkflowStore};
