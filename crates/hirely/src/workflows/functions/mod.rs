mod digest;
mod expiration;

pub use digest::{DigestSchedule, JobListingDigest};
pub use expiration::JobExpiration;
