use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identity-provider subject for a signed-in user.
    UserId
);
string_id!(CompanyId);
string_id!(JobSeekerId);
string_id!(
    /// Identifier of a single job listing.
    JobPostId
);
string_id!(SavedJobId);

/// Profile type chosen during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    Company,
    JobSeeker,
}

impl UserType {
    pub const fn as_str(self) -> &'static str {
        match self {
            UserType::Company => "COMPANY",
            UserType::JobSeeker => "JOB_SEEKER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "COMPANY" => Some(UserType::Company),
            "JOB_SEEKER" => Some(UserType::JobSeeker),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub user_type: Option<UserType>,
    pub onboarding_completed: bool,
    pub stripe_customer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub user_id: UserId,
    pub name: String,
    pub location: String,
    pub about: String,
    pub logo: String,
    pub website: String,
    pub x_account: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn summary(&self) -> CompanySummary {
        CompanySummary {
            id: self.id.clone(),
            name: self.name.clone(),
            logo: self.logo.clone(),
            location: self.location.clone(),
            about: self.about.clone(),
        }
    }
}

/// Company fields shown next to a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySummary {
    pub id: CompanyId,
    pub name: String,
    pub logo: String,
    pub location: String,
    pub about: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSeeker {
    pub id: JobSeekerId,
    pub user_id: UserId,
    pub name: String,
    pub about: String,
    pub resume: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Internship,
}

impl EmploymentType {
    pub const ALL: [EmploymentType; 4] = [
        EmploymentType::FullTime,
        EmploymentType::PartTime,
        EmploymentType::Contract,
        EmploymentType::Internship,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            EmploymentType::FullTime => "full-time",
            EmploymentType::PartTime => "part-time",
            EmploymentType::Contract => "contract",
            EmploymentType::Internship => "internship",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
    }
}

/// Lifecycle status of a listing. Only `Active` listings are visible to seekers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPostStatus {
    Draft,
    Active,
    Expired,
}

impl JobPostStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            JobPostStatus::Draft => "DRAFT",
            JobPostStatus::Active => "ACTIVE",
            JobPostStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DRAFT" => Some(JobPostStatus::Draft),
            "ACTIVE" => Some(JobPostStatus::Active),
            "EXPIRED" => Some(JobPostStatus::Expired),
            _ => None,
        }
    }

    /// Sanctioned edges of the lifecycle graph. Deletion is handled separately.
    pub const fn can_transition_to(self, next: JobPostStatus) -> bool {
        matches!(
            (self, next),
            (JobPostStatus::Draft, JobPostStatus::Active)
                | (JobPostStatus::Draft, JobPostStatus::Expired)
                | (JobPostStatus::Active, JobPostStatus::Expired)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPost {
    pub id: JobPostId,
    pub company_id: CompanyId,
    pub job_title: String,
    pub employment_type: EmploymentType,
    pub location: String,
    pub salary_from: u32,
    pub salary_to: u32,
    pub job_description: String,
    pub listing_duration: u32,
    pub benefits: Vec<String>,
    pub status: JobPostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobPost {
    pub fn is_visible(&self) -> bool {
        self.status == JobPostStatus::Active
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + chrono::Duration::days(i64::from(self.listing_duration))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedJobPost {
    pub id: SavedJobId,
    pub user_id: UserId,
    pub job_id: JobPostId,
    pub created_at: DateTime<Utc>,
}

/// Raw listing form as submitted by a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPostInput {
    pub job_title: String,
    pub employment_type: String,
    pub location: String,
    pub salary_from: u32,
    pub salary_to: u32,
    pub job_description: String,
    pub listing_duration: u32,
    #[serde(default)]
    pub benefits: Vec<String>,
}

/// Listing fields after validation, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPostDraft {
    pub job_title: String,
    pub employment_type: EmploymentType,
    pub location: String,
    pub salary_from: u32,
    pub salary_to: u32,
    pub job_description: String,
    pub listing_duration: u32,
    pub benefits: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInput {
    pub name: String,
    pub location: String,
    pub about: String,
    pub logo: String,
    pub website: String,
    #[serde(default)]
    pub x_account: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSeekerInput {
    pub name: String,
    pub about: String,
    pub resume: String,
}

/// Optional narrowing applied to the public listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub employment_types: Vec<EmploymentType>,
    pub location: Option<String>,
}

impl JobFilter {
    /// Builds a filter from query-string values; unknown types are ignored and
    /// `worldwide` means no location restriction.
    pub fn from_query(job_types: Option<&str>, location: Option<&str>) -> Self {
        let employment_types = job_types
            .unwrap_or_default()
            .split(',')
            .filter_map(EmploymentType::parse)
            .collect();

        let location = location
            .map(str::trim)
            .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("worldwide"))
            .map(str::to_string);

        Self {
            employment_types,
            location,
        }
    }
}

/// Listing plus the owning company, as rendered on cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobCard {
    pub job: JobPost,
    pub company: CompanySummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveJobPage {
    pub jobs: Vec<JobCard>,
    pub total_pages: u32,
    pub current_page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDetail {
    pub job: JobPost,
    pub company: CompanySummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_job_id: Option<SavedJobId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FavoriteJob {
    pub saved_job_id: SavedJobId,
    pub job: JobPost,
    pub company: CompanySummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyProfile {
    pub company: Company,
    pub active_jobs: Vec<JobPost>,
}
