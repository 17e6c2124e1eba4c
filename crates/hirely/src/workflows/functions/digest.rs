use std::sync::Arc;

use chrono::Duration;
use serde_json::{json, Value};
use tracing::debug;

use crate::board::domain::JobFilter;
use crate::board::repository::BoardRepository;
use crate::board::service::job_cards;
use crate::notifications::{digest_email, DigestEntry, DigestRecipient, Mailer};
use crate::workflows::event::{JobSeekerCreatedPayload, WorkflowEvent, JOB_SEEKER_CREATED};
use crate::workflows::function::WorkflowFunction;
use crate::workflows::step::{StepContext, StepError};

/// Cadence of the job listing digest sent to each new job seeker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestSchedule {
    pub total_days: u32,
    pub interval_days: u32,
    pub batch_size: usize,
}

impl DigestSchedule {
    pub fn new(total_days: u32, interval_days: u32, batch_size: usize) -> Self {
        Self {
            total_days,
            interval_days: interval_days.max(1),
            batch_size: batch_size.max(1),
        }
    }
}

impl Default for DigestSchedule {
    fn default() -> Self {
        Self::new(30, 2, 10)
    }
}

/// Periodically emails the newest active listings to a job seeker.
pub struct JobListingDigest<R, M> {
    repository: Arc<R>,
    mailer: Arc<M>,
    public_url: String,
    schedule: DigestSchedule,
}

impl<R, M> JobListingDigest<R, M> {
    pub const ID: &'static str = "send-job-listings";

    pub fn new(repository: Arc<R>, mailer: Arc<M>, public_url: impl Into<String>) -> Self {
        Self {
            repository,
            mailer,
            public_url: public_url.into(),
            schedule: DigestSchedule::default(),
        }
    }

    pub fn with_schedule(mut self, schedule: DigestSchedule) -> Self {
        self.schedule = schedule;
        self
    }
}

impl<R, M> WorkflowFunction for JobListingDigest<R, M>
where
    R: BoardRepository + 'static,
    M: Mailer + 'static,
{
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn trigger(&self) -> &'static str {
        JOB_SEEKER_CREATED
    }

    fn execute(&self, event: &WorkflowEvent, step: &mut StepContext<'_>) -> Result<Value, StepError> {
        let payload: JobSeekerCreatedPayload = event
            .payload()
            .map_err(|err| StepError::InvalidPayload(err.to_string()))?;
        let user_id = payload.user_id;

        let recipient: Option<DigestRecipient> = step.run("load-recipient", || {
            self.repository.user(&user_id).map(|user| {
                user.map(|user| DigestRecipient {
                    email: user.email,
                    name: user.name,
                })
            })
        })?;
        let Some(recipient) = recipient else {
            return Ok(json!({ "userId": user_id, "emailsSent": 0, "message": "recipient no longer exists" }));
        };

        let schedule = self.schedule;
        let mut elapsed_days = 0u32;
        let mut emails_sent = 0u32;
        while elapsed_days < schedule.total_days {
            step.sleep("wait-interval", Duration::days(i64::from(schedule.interval_days)))?;
            elapsed_days += schedule.interval_days;

            let entries: Vec<DigestEntry> = step.run("fetch-recent-jobs", || {
                let (jobs, _) = self.repository.active_jobs(
                    &JobFilter::default(),
                    0,
                    schedule.batch_size as u64,
                )?;
                let cards = job_cards(self.repository.as_ref(), jobs)?;
                Ok::<_, crate::board::repository::RepositoryError>(
                    cards.iter().map(DigestEntry::from).collect(),
                )
            })?;

            if entries.is_empty() {
                debug!(%user_id, elapsed_days, "no active listings for digest");
                continue;
            }

            step.run("send-email", || {
                self.mailer
                    .send(&digest_email(&recipient, &entries, &self.public_url))
            })?;
            emails_sent += 1;
        }

        Ok(json!({
            "userId": user_id,
            "emailsSent": emails_sent,
            "message": format!("Completed {} day job listing notifications", schedule.total_days),
        }))
    }
}
