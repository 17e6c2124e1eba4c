use super::domain::{
    Company, CompanyId, JobFilter, JobPost, JobPostId, JobPostStatus, JobSeeker, SavedJobId,
    SavedJobPost, User, UserId,
};

/// Storage abstraction so the coordinator can be exercised in isolation.
///
/// Status changes go through [`BoardRepository::transition_job`], which must be a
/// conditional write: it only applies when the stored status is one of `from`.
pub trait BoardRepository: Send + Sync {
    /// Inserts or refreshes the identity fields of a user, keeping profile state.
    fn upsert_user(&self, user: User) -> Result<User, RepositoryError>;
    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    fn user_by_customer(&self, customer_id: &str) -> Result<Option<User>, RepositoryError>;
    fn set_customer_id(&self, user_id: &UserId, customer_id: &str) -> Result<(), RepositoryError>;
    /// Creates the company and marks the owning user as onboarded in one write.
    fn insert_company(&self, company: Company) -> Result<Company, RepositoryError>;
    fn company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError>;
    fn company_for_user(&self, user_id: &UserId) -> Result<Option<Company>, RepositoryError>;
    fn company_by_name(&self, name: &str) -> Result<Option<Company>, RepositoryError>;
    /// Creates the job seeker profile and marks the owning user as onboarded.
    fn insert_job_seeker(&self, seeker: JobSeeker) -> Result<JobSeeker, RepositoryError>;

    fn insert_job(&self, job: JobPost) -> Result<JobPost, RepositoryError>;
    fn job(&self, id: &JobPostId) -> Result<Option<JobPost>, RepositoryError>;
    /// Overwrites descriptive fields; status and creation time are left untouched.
    fn update_job_details(&self, job: &JobPost) -> Result<(), RepositoryError>;
    fn transition_job(
        &self,
        id: &JobPostId,
        from: &[JobPostStatus],
        to: JobPostStatus,
    ) -> Result<bool, RepositoryError>;
    /// Removes the job and its saves. Returns `false` when nothing was deleted.
    fn delete_job(&self, id: &JobPostId) -> Result<bool, RepositoryError>;
    /// Active jobs matching the filter, newest first, with the total match count.
    fn active_jobs(
        &self,
        filter: &JobFilter,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<JobPost>, u64), RepositoryError>;
    fn jobs_for_company(&self, company_id: &CompanyId) -> Result<Vec<JobPost>, RepositoryError>;

    fn insert_saved_job(&self, saved: SavedJobPost) -> Result<SavedJobPost, RepositoryError>;
    fn saved_job(&self, id: &SavedJobId) -> Result<Option<SavedJobPost>, RepositoryError>;
    fn saved_job_for(
        &self,
        user_id: &UserId,
        job_id: &JobPostId,
    ) -> Result<Option<SavedJobPost>, RepositoryError>;
    fn delete_saved_job(&self, id: &SavedJobId) -> Result<bool, RepositoryError>;
    fn saved_jobs_for_user(&self, user_id: &UserId) -> Result<Vec<SavedJobPost>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
