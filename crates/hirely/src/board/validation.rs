use super::catalog::{canonical_location, is_known_benefit, pricing_tier};
use super::domain::{
    CompanyInput, EmploymentType, JobPostDraft, JobPostInput, JobSeekerInput,
};

/// Schema violations raised before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },
    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },
    #[error("unknown employment type '{0}'")]
    UnknownEmploymentType(String),
    #[error("unknown location '{0}'")]
    UnknownLocation(String),
    #[error("salary must be between {min} and {max}")]
    SalaryOutOfBounds { min: u32, max: u32 },
    #[error("salary_from ({from}) must not exceed salary_to ({to})")]
    InvertedSalaryRange { from: u32, to: u32 },
    #[error("listing duration of {0} days does not match a pricing tier")]
    UnsupportedListingDuration(u32),
    #[error("unknown benefit '{0}'")]
    UnknownBenefit(String),
    #[error("{field} must be an http(s) URL")]
    InvalidUrl { field: &'static str },
}

const DEFAULT_MIN_TITLE_LENGTH: usize = 2;
const DEFAULT_MIN_SALARY: u32 = 500;
const DEFAULT_MAX_SALARY: u32 = 50_000;

/// Bounds applied to listing and profile forms.
#[derive(Debug, Clone)]
pub struct ListingRules {
    min_title_length: usize,
    min_salary: u32,
    max_salary: u32,
}

impl ListingRules {
    pub fn new(min_title_length: usize, min_salary: u32, max_salary: u32) -> Self {
        if min_salary > max_salary {
            return Self::default();
        }
        Self {
            min_title_length: min_title_length.max(1),
            min_salary,
            max_salary,
        }
    }

    pub fn salary_bounds(&self) -> (u32, u32) {
        (self.min_salary, self.max_salary)
    }
}

impl Default for ListingRules {
    fn default() -> Self {
        Self {
            min_title_length: DEFAULT_MIN_TITLE_LENGTH,
            min_salary: DEFAULT_MIN_SALARY,
            max_salary: DEFAULT_MAX_SALARY,
        }
    }
}

/// Turns raw form submissions into validated drafts.
#[derive(Debug, Clone, Default)]
pub struct ListingGuard {
    rules: ListingRules,
}

impl ListingGuard {
    pub fn with_rules(rules: ListingRules) -> Self {
        Self { rules }
    }

    pub fn job_post(&self, input: JobPostInput) -> Result<JobPostDraft, ValidationError> {
        let job_title = input.job_title.trim().to_string();
        if job_title.is_empty() {
            return Err(ValidationError::Required { field: "job_title" });
        }
        if job_title.chars().count() < self.rules.min_title_length {
            return Err(ValidationError::TooShort {
                field: "job_title",
                min: self.rules.min_title_length,
            });
        }

        let job_description = input.job_description.trim().to_string();
        if job_description.is_empty() {
            return Err(ValidationError::Required {
                field: "job_description",
            });
        }

        let employment_type = EmploymentType::parse(&input.employment_type)
            .ok_or_else(|| ValidationError::UnknownEmploymentType(input.employment_type.clone()))?;

        let location = canonical_location(&input.location)
            .ok_or_else(|| ValidationError::UnknownLocation(input.location.clone()))?
            .to_string();

        let (min, max) = self.rules.salary_bounds();
        for salary in [input.salary_from, input.salary_to] {
            if salary < min || salary > max {
                return Err(ValidationError::SalaryOutOfBounds { min, max });
            }
        }
        if input.salary_from > input.salary_to {
            return Err(ValidationError::InvertedSalaryRange {
                from: input.salary_from,
                to: input.salary_to,
            });
        }

        if pricing_tier(input.listing_duration).is_none() {
            return Err(ValidationError::UnsupportedListingDuration(
                input.listing_duration,
            ));
        }

        let mut benefits: Vec<String> = Vec::with_capacity(input.benefits.len());
        for benefit in input.benefits {
            let benefit = benefit.trim().to_string();
            if !is_known_benefit(&benefit) {
                return Err(ValidationError::UnknownBenefit(benefit));
            }
            if !benefits.contains(&benefit) {
                benefits.push(benefit);
            }
        }

        Ok(JobPostDraft {
            job_title,
            employment_type,
            location,
            salary_from: input.salary_from,
            salary_to: input.salary_to,
            job_description,
            listing_duration: input.listing_duration,
            benefits,
        })
    }

    pub fn company(&self, input: CompanyInput) -> Result<CompanyInput, ValidationError> {
        let name = required(input.name, "name")?;
        let location = canonical_location(&input.location)
            .ok_or_else(|| ValidationError::UnknownLocation(input.location.clone()))?
            .to_string();
        let about = required(input.about, "about")?;
        let about = min_length(about, "about", 10)?;
        let logo = url(input.logo, "logo")?;
        let website = url(input.website, "website")?;
        let x_account = input
            .x_account
            .map(|handle| handle.trim().to_string())
            .filter(|handle| !handle.is_empty());

        Ok(CompanyInput {
            name,
            location,
            about,
            logo,
            website,
            x_account,
        })
    }

    pub fn job_seeker(&self, input: JobSeekerInput) -> Result<JobSeekerInput, ValidationError> {
        let name = required(input.name, "name")?;
        let name = min_length(name, "name", 2)?;
        let about = required(input.about, "about")?;
        let about = min_length(about, "about", 10)?;
        let resume = url(input.resume, "resume")?;

        Ok(JobSeekerInput {
            name,
            about,
            resume,
        })
    }
}

fn required(value: String, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required { field });
    }
    Ok(trimmed.to_string())
}

fn min_length(value: String, field: &'static str, min: usize) -> Result<String, ValidationError> {
    if value.chars().count() < min {
        return Err(ValidationError::TooShort { field, min });
    }
    Ok(value)
}

fn url(value: String, field: &'static str) -> Result<String, ValidationError> {
    let value = required(value, field)?;
    if value.starts_with("https://") || value.starts_with("http://") {
        Ok(value)
    } else {
        Err(ValidationError::InvalidUrl { field })
    }
}
