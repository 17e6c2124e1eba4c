use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::to_bytes;
use axum::http::StatusCode;
use axum::response::Response;
use chrono::{Duration, Utc};
use serde_json::Value;

use crate::board::domain::{
    Company, CompanyId, CompanyInput, EmploymentType, JobFilter, JobPost, JobPostId,
    JobPostInput, JobPostStatus, JobSeeker, JobSeekerInput, SavedJobId, SavedJobPost, User,
    UserId, UserType,
};
use crate::board::repository::{BoardRepository, RepositoryError};
use crate::board::service::JobBoardService;
use crate::workflows::{EventError, EventSink, WorkflowEvent};

pub(crate) type TestService = JobBoardService<MemoryRepository, RecordingEvents>;

pub(crate) fn build_service() -> (TestService, Arc<MemoryRepository>, Arc<RecordingEvents>) {
    let repository = Arc::new(MemoryRepository::default());
    let events = Arc::new(RecordingEvents::default());
    let service = JobBoardService::new(repository.clone(), events.clone());
    (service, repository, events)
}

pub(crate) fn company_input(name: &str) -> CompanyInput {
    CompanyInput {
        name: name.to_string(),
        location: "Germany".to_string(),
        about: "We build dependable hiring tools.".to_string(),
        logo: "https://cdn.example.com/logo.png".to_string(),
        website: "https://example.com".to_string(),
        x_account: Some("@example".to_string()),
    }
}

pub(crate) fn seeker_input() -> JobSeekerInput {
    JobSeekerInput {
        name: "Sam Seeker".to_string(),
        about: "Backend engineer looking for remote work.".to_string(),
        resume: "https://files.example.com/resume.pdf".to_string(),
    }
}

pub(crate) fn job_input(listing_duration: u32) -> JobPostInput {
    JobPostInput {
        job_title: "Senior Rust Engineer".to_string(),
        employment_type: "full-time".to_string(),
        location: "worldwide".to_string(),
        salary_from: 5_000,
        salary_to: 8_000,
        job_description: "Own the listing lifecycle services.".to_string(),
        listing_duration,
        benefits: vec!["async".to_string(), "pto".to_string()],
    }
}

/// Registers a user and onboards them as a company owner.
pub(crate) fn company_owner<R, E>(
    service: &JobBoardService<R, E>,
    user: &str,
    company: &str,
) -> (UserId, Company)
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    let user_id = UserId::from(user);
    service
        .register_user(user_id.clone(), &format!("{user}@example.com"), user)
        .expect("register user");
    let company = service
        .onboard_company(&user_id, company_input(company))
        .expect("onboard company");
    (user_id, company)
}

/// Registers a plain user without onboarding.
pub(crate) fn seeker<R, E>(service: &JobBoardService<R, E>, user: &str) -> UserId
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    let user_id = UserId::from(user);
    service
        .register_user(user_id.clone(), &format!("{user}@example.com"), user)
        .expect("register user");
    user_id
}

/// Inserts a listing directly, bypassing the service, with a fixed creation time.
pub(crate) fn seed_job(
    repository: &MemoryRepository,
    company: &Company,
    title: &str,
    status: JobPostStatus,
    employment_type: EmploymentType,
    location: &str,
    minutes_ago: i64,
) -> JobPost {
    let created_at = Utc::now() - Duration::minutes(minutes_ago);
    let job = JobPost {
        id: JobPostId::generate(),
        company_id: company.id.clone(),
        job_title: title.to_string(),
        employment_type,
        location: location.to_string(),
        salary_from: 3_000,
        salary_to: 4_000,
        job_description: format!("{title} role"),
        listing_duration: 30,
        benefits: Vec::new(),
        status,
        created_at,
        updated_at: created_at,
    };
    repository.insert_job(job).expect("seed job")
}

pub(crate) fn attach_customer(repository: &MemoryRepository, user_id: &UserId, customer: &str) {
    repository
        .set_customer_id(user_id, customer)
        .expect("attach customer");
}

pub(crate) async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(crate) fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status");
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    companies: HashMap<CompanyId, Company>,
    seekers: Vec<JobSeeker>,
    jobs: HashMap<JobPostId, JobPost>,
    saved: HashMap<SavedJobId, SavedJobPost>,
}

#[derive(Default, Clone)]
pub(crate) struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRepository {
    pub(crate) fn job_count(&self) -> usize {
        self.state.lock().expect("repository mutex poisoned").jobs.len()
    }

    pub(crate) fn saved_count(&self) -> usize {
        self.state.lock().expect("repository mutex poisoned").saved.len()
    }

    pub(crate) fn status_of(&self, id: &JobPostId) -> Option<JobPostStatus> {
        self.state
            .lock()
            .expect("repository mutex poisoned")
            .jobs
            .get(id)
            .map(|job| job.status)
    }
}

fn newest_first(jobs: &mut [JobPost]) {
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

impl BoardRepository for MemoryRepository {
    fn upsert_user(&self, user: User) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        let stored = state
            .users
            .entry(user.id.clone())
            .and_modify(|existing| {
                existing.email = user.email.clone();
                existing.name = user.name.clone();
            })
            .or_insert(user);
        Ok(stored.clone())
    }

    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.users.get(id).cloned())
    }

    fn user_by_customer(&self, customer_id: &str) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .users
            .values()
            .find(|user| user.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    fn set_customer_id(&self, user_id: &UserId, customer_id: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        let user = state.users.get_mut(user_id).ok_or(RepositoryError::NotFound)?;
        user.stripe_customer_id = Some(customer_id.to_string());
        Ok(())
    }

    fn insert_company(&self, company: Company) -> Result<Company, RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        if state
            .companies
            .values()
            .any(|existing| existing.user_id == company.user_id)
        {
            return Err(RepositoryError::Conflict);
        }
        let user = state
            .users
            .get_mut(&company.user_id)
            .ok_or(RepositoryError::NotFound)?;
        user.user_type = Some(UserType::Company);
        user.onboarding_completed = true;
        state.companies.insert(company.id.clone(), company.clone());
        Ok(company)
    }

    fn company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.companies.get(id).cloned())
    }

    fn company_for_user(&self, user_id: &UserId) -> Result<Option<Company>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .companies
            .values()
            .find(|company| &company.user_id == user_id)
            .cloned())
    }

    fn company_by_name(&self, name: &str) -> Result<Option<Company>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .companies
            .values()
            .find(|company| company.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    fn insert_job_seeker(&self, seeker: JobSeeker) -> Result<JobSeeker, RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        if state
            .seekers
            .iter()
            .any(|existing| existing.user_id == seeker.user_id)
        {
            return Err(RepositoryError::Conflict);
        }
        let user = state
            .users
            .get_mut(&seeker.user_id)
            .ok_or(RepositoryError::NotFound)?;
        user.user_type = Some(UserType::JobSeeker);
        user.onboarding_completed = true;
        state.seekers.push(seeker.clone());
        Ok(seeker)
    }

    fn insert_job(&self, job: JobPost) -> Result<JobPost, RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        if state.jobs.contains_key(&job.id) {
            return Err(RepositoryError::Conflict);
        }
        state.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    fn job(&self, id: &JobPostId) -> Result<Option<JobPost>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.jobs.get(id).cloned())
    }

    fn update_job_details(&self, job: &JobPost) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        let stored = state.jobs.get_mut(&job.id).ok_or(RepositoryError::NotFound)?;
        let status = stored.status;
        let created_at = stored.created_at;
        *stored = JobPost {
            status,
            created_at,
            ..job.clone()
        };
        Ok(())
    }

    fn transition_job(
        &self,
        id: &JobPostId,
        from: &[JobPostStatus],
        to: JobPostStatus,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        match state.jobs.get_mut(id) {
            Some(job) if from.contains(&job.status) => {
                job.status = to;
                job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_job(&self, id: &JobPostId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        state.saved.retain(|_, saved| &saved.job_id != id);
        Ok(state.jobs.remove(id).is_some())
    }

    fn active_jobs(
        &self,
        filter: &JobFilter,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<JobPost>, u64), RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        let mut matches: Vec<JobPost> = state
            .jobs
            .values()
            .filter(|job| job.status == JobPostStatus::Active)
            .filter(|job| {
                filter.employment_types.is_empty()
                    || filter.employment_types.contains(&job.employment_type)
            })
            .filter(|job| {
                filter
                    .location
                    .as_deref()
                    .map_or(true, |location| job.location.eq_ignore_ascii_case(location))
            })
            .cloned()
            .collect();
        newest_first(&mut matches);
        let total = matches.len() as u64;
        let page = matches
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    fn jobs_for_company(&self, company_id: &CompanyId) -> Result<Vec<JobPost>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        let mut jobs: Vec<JobPost> = state
            .jobs
            .values()
            .filter(|job| &job.company_id == company_id)
            .cloned()
            .collect();
        newest_first(&mut jobs);
        Ok(jobs)
    }

    fn insert_saved_job(&self, saved: SavedJobPost) -> Result<SavedJobPost, RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        if state
            .saved
            .values()
            .any(|existing| existing.user_id == saved.user_id && existing.job_id == saved.job_id)
        {
            return Err(RepositoryError::Conflict);
        }
        state.saved.insert(saved.id.clone(), saved.clone());
        Ok(saved)
    }

    fn saved_job(&self, id: &SavedJobId) -> Result<Option<SavedJobPost>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.saved.get(id).cloned())
    }

    fn saved_job_for(
        &self,
        user_id: &UserId,
        job_id: &JobPostId,
    ) -> Result<Option<SavedJobPost>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .saved
            .values()
            .find(|saved| &saved.user_id == user_id && &saved.job_id == job_id)
            .cloned())
    }

    fn delete_saved_job(&self, id: &SavedJobId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.saved.remove(id).is_some())
    }

    fn saved_jobs_for_user(&self, user_id: &UserId) -> Result<Vec<SavedJobPost>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        let mut saved: Vec<SavedJobPost> = state
            .saved
            .values()
            .filter(|saved| &saved.user_id == user_id)
            .cloned()
            .collect();
        saved.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(saved)
    }
}

/// Event sink that keeps every event it accepts.
#[derive(Default, Clone)]
pub(crate) struct RecordingEvents {
    events: Arc<Mutex<Vec<WorkflowEvent>>>,
}

impl RecordingEvents {
    pub(crate) fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().expect("event mutex poisoned").clone()
    }
}

impl EventSink for RecordingEvents {
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError> {
        self.events.lock().expect("event mutex poisoned").push(event);
        Ok(())
    }
}

/// Event sink whose backing store is always down.
#[derive(Default, Clone, Copy)]
pub(crate) struct FailingEvents;

impl EventSink for FailingEvents {
    fn send(&self, _event: WorkflowEvent) -> Result<(), EventError> {
        Err(EventError::Rejected("event store offline".to_string()))
    }
}

/// Repository that fails every call, for exercising 500 paths.
#[derive(Default, Clone, Copy)]
pub(crate) struct UnavailableRepository;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl BoardRepository for UnavailableRepository {
    fn upsert_user(&self, _user: User) -> Result<User, RepositoryError> {
        offline()
    }
    fn user(&self, _id: &UserId) -> Result<Option<User>, RepositoryError> {
        offline()
    }
    fn user_by_customer(&self, _customer_id: &str) -> Result<Option<User>, RepositoryError> {
        offline()
    }
    fn set_customer_id(&self, _user_id: &UserId, _customer_id: &str) -> Result<(), RepositoryError> {
        offline()
    }
    fn insert_company(&self, _company: Company) -> Result<Company, RepositoryError> {
        offline()
    }
    fn company(&self, _id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        offline()
    }
    fn company_for_user(&self, _user_id: &UserId) -> Result<Option<Company>, RepositoryError> {
        offline()
    }
    fn company_by_name(&self, _name: &str) -> Result<Option<Company>, RepositoryError> {
        offline()
    }
    fn insert_job_seeker(&self, _seeker: JobSeeker) -> Result<JobSeeker, RepositoryError> {
        offline()
    }
    fn insert_job(&self, _job: JobPost) -> Result<JobPost, RepositoryError> {
        offline()
    }
    fn job(&self, _id: &JobPostId) -> Result<Option<JobPost>, RepositoryError> {
        offline()
    }
    fn update_job_details(&self, _job: &JobPost) -> Result<(), RepositoryError> {
        offline()
    }
    fn transition_job(
        &self,
        _id: &JobPostId,
        _from: &[JobPostStatus],
        _to: JobPostStatus,
    ) -> Result<bool, RepositoryError> {
        offline()
    }
    fn delete_job(&self, _id: &JobPostId) -> Result<bool, RepositoryError> {
        offline()
    }
    fn active_jobs(
        &self,
        _filter: &JobFilter,
        _offset: u64,
        _limit: u64,
    ) -> Result<(Vec<JobPost>, u64), RepositoryError> {
        offline()
    }
    fn jobs_for_company(&self, _company_id: &CompanyId) -> Result<Vec<JobPost>, RepositoryError> {
        offline()
    }
    fn insert_saved_job(&self, _saved: SavedJobPost) -> Result<SavedJobPost, RepositoryError> {
        offline()
    }
    fn saved_job(&self, _id: &SavedJobId) -> Result<Option<SavedJobPost>, RepositoryError> {
        offline()
    }
    fn saved_job_for(
        &self,
        _user_id: &UserId,
        _job_id: &JobPostId,
    ) -> Result<Option<SavedJobPost>, RepositoryError> {
        offline()
    }
    fn delete_saved_job(&self, _id: &SavedJobId) -> Result<bool, RepositoryError> {
        offline()
    }
    fn saved_jobs_for_user(&self, _user_id: &UserId) -> Result<Vec<SavedJobPost>, RepositoryError> {
        offline()
    }
}
