//! Guarded status transitions for job listings.
//!
//! Every write is conditional on the current status, so repeated webhook deliveries
//! and late timers cannot move a listing backwards or resurrect a deleted one.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{JobPostId, JobPostStatus};
use super::repository::{BoardRepository, RepositoryError};

/// Result of applying a confirmed payment to a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Activated,
    AlreadyActive,
    /// The listing window lapsed before payment arrived; the listing stays expired.
    Expired,
}

/// Result of the scheduled expiration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpireOutcome {
    Expired,
    AlreadyExpired,
    Missing,
}

impl ExpireOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            ExpireOutcome::Expired => "expired",
            ExpireOutcome::AlreadyExpired => "already_expired",
            ExpireOutcome::Missing => "missing",
        }
    }
}

/// DRAFT -> ACTIVE. Ownership must already be verified by the caller.
pub fn activate_listing<R>(
    repository: &R,
    job_id: &JobPostId,
) -> Result<PaymentOutcome, RepositoryError>
where
    R: BoardRepository + ?Sized,
{
    if repository.transition_job(job_id, &[JobPostStatus::Draft], JobPostStatus::Active)? {
        info!(%job_id, "listing activated after payment");
        return Ok(PaymentOutcome::Activated);
    }

    match repository.job(job_id)?.map(|job| job.status) {
        Some(JobPostStatus::Active) => {
            debug!(%job_id, "duplicate payment confirmation ignored");
            Ok(PaymentOutcome::AlreadyActive)
        }
        Some(JobPostStatus::Expired) => {
            warn!(%job_id, "payment confirmed for an expired listing; status left unchanged");
            Ok(PaymentOutcome::Expired)
        }
        Some(JobPostStatus::Draft) => Err(RepositoryError::Conflict),
        None => Err(RepositoryError::NotFound),
    }
}

/// Any live status -> EXPIRED. Missing or already expired listings are left alone.
pub fn expire_listing<R>(
    repository: &R,
    job_id: &JobPostId,
) -> Result<ExpireOutcome, RepositoryError>
where
    R: BoardRepository + ?Sized,
{
    let live = [JobPostStatus::Draft, JobPostStatus::Active];
    if repository.transition_job(job_id, &live, JobPostStatus::Expired)? {
        info!(%job_id, "listing expired");
        return Ok(ExpireOutcome::Expired);
    }

    match repository.job(job_id)?.map(|job| job.status) {
        None => {
            debug!(%job_id, "expiration fired for a deleted listing");
            Ok(ExpireOutcome::Missing)
        }
        Some(JobPostStatus::Expired) => {
            debug!(%job_id, "listing already expired");
            Ok(ExpireOutcome::AlreadyExpired)
        }
        // The conditional write lost a race with another writer; let the step retry.
        Some(_) => Err(RepositoryError::Conflict),
    }
}
