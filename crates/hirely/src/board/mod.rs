//! Job listing lifecycle: creation, payment activation, expiration, deletion, and saves.
//!
//! Status only ever moves DRAFT -> ACTIVE -> EXPIRED (or DRAFT -> EXPIRED when a window
//! lapses unpaid). Every transition is a conditional write through
//! [`BoardRepository::transition_job`], so replays and late timers are harmless.

pub mod catalog;
pub mod domain;
pub mod lifecycle;
pub mod repository;
pub mod router;
pub mod service;
pub(crate) mod validation;

#[cfg(test)]
pub(crate) mod tests;

pub use catalog::{pricing_tier, PricingTier, BENEFITS, PRICING_TIERS, WORLDWIDE};
pub use domain::{
    ActiveJobPage, Company, CompanyId, CompanyInput, CompanyProfile, CompanySummary,
    EmploymentType, FavoriteJob, JobCard, JobDetail, JobFilter, JobPost, JobPostId, JobPostInput,
    JobPostStatus, JobSeeker, JobSeekerId, JobSeekerInput, SavedJobId, SavedJobPost, User, UserId,
    UserType,
};
pub use lifecycle::{ExpireOutcome, PaymentOutcome};
pub use repository::{BoardRepository, RepositoryError};
pub use router::{acting_user, board_router, USER_ID_HEADER};
pub use service::{JobBoardError, JobBoardService, LISTING_PAGE_SIZE};
pub use validation::{ListingGuard, ListingRules, ValidationError};
