use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::domain::{
    ActiveJobPage, Company, CompanyId, CompanyInput, CompanyProfile, FavoriteJob, JobCard,
    JobDetail, JobFilter, JobPost, JobPostId, JobPostInput, JobPostStatus, JobSeeker, JobSeekerId,
    JobSeekerInput, SavedJobId, SavedJobPost, User, UserId,
};
use super::lifecycle::{activate_listing, expire_listing, ExpireOutcome, PaymentOutcome};
use super::repository::{BoardRepository, RepositoryError};
use super::validation::{ListingGuard, ValidationError};
use crate::workflows::{EventError, EventSink, WorkflowEvent};

/// Page size used by the public listing.
pub const LISTING_PAGE_SIZE: u32 = 7;

/// Coordinates listing lifecycle writes and the events that schedule follow-up work.
pub struct JobBoardService<R, E> {
    guard: Arc<ListingGuard>,
    repository: Arc<R>,
    events: Arc<E>,
}

impl<R, E> JobBoardService<R, E>
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    pub fn new(repository: Arc<R>, events: Arc<E>) -> Self {
        Self::with_guard(ListingGuard::default(), repository, events)
    }

    pub fn with_guard(guard: ListingGuard, repository: Arc<R>, events: Arc<E>) -> Self {
        Self {
            guard: Arc::new(guard),
            repository,
            events,
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Records the identity-provider user, refreshing email and name on repeat sign-ins.
    pub fn register_user(
        &self,
        user_id: UserId,
        email: &str,
        name: &str,
    ) -> Result<User, JobBoardError> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ValidationError::Required { field: "email" }.into());
        }

        let user = User {
            id: user_id,
            email: email.to_string(),
            name: name.trim().to_string(),
            user_type: None,
            onboarding_completed: false,
            stripe_customer_id: None,
        };
        Ok(self.repository.upsert_user(user)?)
    }

    pub fn onboard_company(
        &self,
        user_id: &UserId,
        input: CompanyInput,
    ) -> Result<Company, JobBoardError> {
        let user = self.onboarding_user(user_id)?;
        let input = self.guard.company(input)?;

        let company = Company {
            id: CompanyId::generate(),
            user_id: user.id,
            name: input.name,
            location: input.location,
            about: input.about,
            logo: input.logo,
            website: input.website,
            x_account: input.x_account,
            created_at: Utc::now(),
        };
        let company = self.repository.insert_company(company)?;
        info!(%user_id, company_id = %company.id, "company onboarded");
        Ok(company)
    }

    /// Creates the seeker profile and starts the listing digest for this user.
    pub fn onboard_job_seeker(
        &self,
        user_id: &UserId,
        input: JobSeekerInput,
    ) -> Result<JobSeeker, JobBoardError> {
        let user = self.onboarding_user(user_id)?;
        let input = self.guard.job_seeker(input)?;

        let now = Utc::now();
        let seeker = JobSeeker {
            id: JobSeekerId::generate(),
            user_id: user.id,
            name: input.name,
            about: input.about,
            resume: input.resume,
            created_at: now,
        };
        let seeker = self.repository.insert_job_seeker(seeker)?;
        info!(%user_id, "job seeker onboarded");

        if let Err(err) = self
            .events
            .send(WorkflowEvent::job_seeker_created(user_id, now))
        {
            // The profile is still usable without the digest.
            warn!(%user_id, error = %err, "failed to schedule job listing digest");
        }
        Ok(seeker)
    }

    /// Persists a DRAFT listing and schedules its expiration. If the event cannot be
    /// recorded the listing is removed again so no listing exists without a timer.
    pub fn create_job(
        &self,
        input: JobPostInput,
        user_id: &UserId,
    ) -> Result<JobPost, JobBoardError> {
        let company = self
            .repository
            .company_for_user(user_id)?
            .ok_or(JobBoardError::NotFound("company"))?;
        let draft = self.guard.job_post(input)?;

        let now = Utc::now();
        let job = JobPost {
            id: JobPostId::generate(),
            company_id: company.id,
            job_title: draft.job_title,
            employment_type: draft.employment_type,
            location: draft.location,
            salary_from: draft.salary_from,
            salary_to: draft.salary_to,
            job_description: draft.job_description,
            listing_duration: draft.listing_duration,
            benefits: draft.benefits,
            status: JobPostStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        let job = self.repository.insert_job(job)?;

        let event = WorkflowEvent::job_created(&job.id, job.listing_duration, now);
        if let Err(err) = self.events.send(event) {
            warn!(job_id = %job.id, error = %err, "expiration not scheduled; removing listing");
            if let Err(cleanup) = self.repository.delete_job(&job.id) {
                warn!(job_id = %job.id, error = %cleanup, "failed to remove unscheduled listing");
            }
            return Err(err.into());
        }

        info!(
            job_id = %job.id,
            company_id = %job.company_id,
            listing_duration = job.listing_duration,
            "listing created"
        );
        Ok(job)
    }

    /// Edits descriptive fields. The listing window is fixed once scheduled.
    pub fn update_job(
        &self,
        job_id: &JobPostId,
        input: JobPostInput,
        user_id: &UserId,
    ) -> Result<JobPost, JobBoardError> {
        let mut job = self.owned_job(job_id, user_id)?;
        if input.listing_duration != job.listing_duration {
            return Err(JobBoardError::Conflict(
                "listing duration cannot change after creation".to_string(),
            ));
        }
        let draft = self.guard.job_post(input)?;

        job.job_title = draft.job_title;
        job.employment_type = draft.employment_type;
        job.location = draft.location;
        job.salary_from = draft.salary_from;
        job.salary_to = draft.salary_to;
        job.job_description = draft.job_description;
        job.benefits = draft.benefits;
        job.updated_at = Utc::now();

        self.repository.update_job_details(&job)?;
        info!(%job_id, "listing updated");
        Ok(job)
    }

    /// Applies a verified payment. The customer must own the company behind the job.
    pub fn confirm_payment(
        &self,
        customer_id: &str,
        job_id: &JobPostId,
    ) -> Result<PaymentOutcome, JobBoardError> {
        let user = self
            .repository
            .user_by_customer(customer_id)?
            .ok_or(JobBoardError::NotFound("user"))?;
        let company = self
            .repository
            .company_for_user(&user.id)?
            .ok_or(JobBoardError::NotFound("company"))?;
        let job = self
            .repository
            .job(job_id)?
            .ok_or(JobBoardError::NotFound("job"))?;
        if job.company_id != company.id {
            warn!(%job_id, customer_id, "payment does not belong to the listing owner");
            return Err(JobBoardError::Forbidden("job"));
        }

        Ok(activate_listing(self.repository.as_ref(), job_id)?)
    }

    pub fn expire_job(&self, job_id: &JobPostId) -> Result<ExpireOutcome, JobBoardError> {
        Ok(expire_listing(self.repository.as_ref(), job_id)?)
    }

    /// Removes a listing and every save referencing it. Any pending expiration for the
    /// listing later resolves as a no-op.
    pub fn delete_job(&self, job_id: &JobPostId, user_id: &UserId) -> Result<(), JobBoardError> {
        self.owned_job(job_id, user_id)?;
        if !self.repository.delete_job(job_id)? {
            return Err(JobBoardError::NotFound("job"));
        }
        info!(%job_id, %user_id, "listing deleted");
        Ok(())
    }

    pub fn save_job(
        &self,
        job_id: &JobPostId,
        user_id: &UserId,
    ) -> Result<SavedJobPost, JobBoardError> {
        let job = self
            .repository
            .job(job_id)?
            .filter(JobPost::is_visible)
            .ok_or(JobBoardError::NotFound("job"))?;
        if self.repository.saved_job_for(user_id, &job.id)?.is_some() {
            return Err(JobBoardError::Conflict("job already saved".to_string()));
        }

        let saved = SavedJobPost {
            id: SavedJobId::generate(),
            user_id: user_id.clone(),
            job_id: job.id,
            created_at: Utc::now(),
        };
        Ok(self.repository.insert_saved_job(saved)?)
    }

    pub fn unsave_job(&self, saved_id: &SavedJobId, user_id: &UserId) -> Result<(), JobBoardError> {
        // A save owned by another user counts as missing.
        let saved = self
            .repository
            .saved_job(saved_id)?
            .filter(|saved| &saved.user_id == user_id)
            .ok_or(JobBoardError::NotFound("saved job"))?;
        if !self.repository.delete_saved_job(&saved.id)? {
            return Err(JobBoardError::NotFound("saved job"));
        }
        Ok(())
    }

    /// Newest-first page of ACTIVE listings. Pages below 1 are treated as page 1.
    pub fn list_active_jobs(
        &self,
        filter: &JobFilter,
        page: u32,
        page_size: u32,
    ) -> Result<ActiveJobPage, JobBoardError> {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let offset = u64::from(page - 1) * u64::from(page_size);

        let (jobs, total) = self
            .repository
            .active_jobs(filter, offset, u64::from(page_size))?;
        let jobs = job_cards(self.repository.as_ref(), jobs)?;
        let total_pages = u32::try_from(total.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX);

        Ok(ActiveJobPage {
            jobs,
            total_pages,
            current_page: page,
        })
    }

    /// Public detail view. Only ACTIVE listings are visible; `viewer` resolves the
    /// caller's save, if any.
    pub fn job_detail(
        &self,
        job_id: &JobPostId,
        viewer: Option<&UserId>,
    ) -> Result<JobDetail, JobBoardError> {
        let job = self
            .repository
            .job(job_id)?
            .filter(JobPost::is_visible)
            .ok_or(JobBoardError::NotFound("job"))?;
        let company = self
            .repository
            .company(&job.company_id)?
            .ok_or(JobBoardError::NotFound("company"))?;
        let saved_job_id = match viewer {
            Some(user_id) => self
                .repository
                .saved_job_for(user_id, job_id)?
                .map(|saved| saved.id),
            None => None,
        };

        Ok(JobDetail {
            job,
            company: company.summary(),
            saved_job_id,
        })
    }

    /// All listings of the caller's company, any status, newest first.
    pub fn company_jobs(&self, user_id: &UserId) -> Result<Vec<JobPost>, JobBoardError> {
        let company = self
            .repository
            .company_for_user(user_id)?
            .ok_or(JobBoardError::NotFound("company"))?;
        Ok(self.repository.jobs_for_company(&company.id)?)
    }

    /// Saved listings that are still visible, newest save first.
    pub fn favorites(&self, user_id: &UserId) -> Result<Vec<FavoriteJob>, JobBoardError> {
        let mut favorites = Vec::new();
        for saved in self.repository.saved_jobs_for_user(user_id)? {
            let Some(job) = self.repository.job(&saved.job_id)?.filter(JobPost::is_visible) else {
                continue;
            };
            let Some(company) = self.repository.company(&job.company_id)? else {
                continue;
            };
            favorites.push(FavoriteJob {
                saved_job_id: saved.id,
                job,
                company: company.summary(),
            });
        }
        Ok(favorites)
    }

    pub fn company_profile(&self, name: &str) -> Result<CompanyProfile, JobBoardError> {
        let company = self
            .repository
            .company_by_name(name.trim())?
            .ok_or(JobBoardError::NotFound("company"))?;
        let active_jobs = self
            .repository
            .jobs_for_company(&company.id)?
            .into_iter()
            .filter(JobPost::is_visible)
            .collect();
        Ok(CompanyProfile {
            company,
            active_jobs,
        })
    }

    fn onboarding_user(&self, user_id: &UserId) -> Result<User, JobBoardError> {
        let user = self
            .repository
            .user(user_id)?
            .ok_or(JobBoardError::NotFound("user"))?;
        if user.onboarding_completed || user.user_type.is_some() {
            return Err(JobBoardError::Conflict(
                "user has already completed onboarding".to_string(),
            ));
        }
        Ok(user)
    }

    fn owned_job(
        &self,
        job_id: &JobPostId,
        user_id: &UserId,
    ) -> Result<JobPost, JobBoardError> {
        let job = self
            .repository
            .job(job_id)?
            .ok_or(JobBoardError::NotFound("job"))?;
        self.repository
            .company_for_user(user_id)?
            .filter(|company| company.id == job.company_id)
            .ok_or(JobBoardError::Forbidden("job"))?;
        Ok(job)
    }
}

/// Pairs listings with their company summaries, dropping listings whose company vanished.
pub(crate) fn job_cards<R>(repository: &R, jobs: Vec<JobPost>) -> Result<Vec<JobCard>, RepositoryError>
where
    R: BoardRepository + ?Sized,
{
    let mut cards = Vec::with_capacity(jobs.len());
    for job in jobs {
        if let Some(company) = repository.company(&job.company_id)? {
            cards.push(JobCard {
                job,
                company: company.summary(),
            });
        }
    }
    Ok(cards)
}

/// Error raised by the job board service.
#[derive(Debug, thiserror::Error)]
pub enum JobBoardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("not permitted to modify this {0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("external service failed: {0}")]
    ExternalService(String),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for JobBoardError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound => JobBoardError::NotFound("record"),
            RepositoryError::Conflict => JobBoardError::Conflict(error.to_string()),
            other => JobBoardError::Repository(other),
        }
    }
}

impl From<EventError> for JobBoardError {
    fn from(error: EventError) -> Self {
        JobBoardError::ExternalService(error.to_string())
    }
}
