use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use serde_json::Value;
use tracing::info;

use super::schema;
use crate::board::domain::{
    Company, CompanyId, EmploymentType, JobFilter, JobPost, JobPostId, JobPostStatus, JobSeeker,
    SavedJobId, SavedJobPost, User, UserId, UserType,
};
use crate::board::repository::{BoardRepository, RepositoryError};
use crate::workflows::event::WorkflowEvent;
use crate::workflows::store::{
    RunId, RunStatus, StepKind, StepRecord, StoreError, WorkflowRun, WorkflowStore,
};

const SQLITE_CONSTRAINT_FOREIGNKEY: i32 = 787;

/// Single-connection SQLite store backing both the job board and the workflow runs.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognised stored value '{0}'")]
struct UnknownValue(String);

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");
        let conn = Connection::open(path).map_err(repository_error)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory().map_err(repository_error)?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self, RepositoryError> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(repository_error)?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(repository_error)?;
        schema::migrate(&mut conn).map_err(repository_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|_| RepositoryError::Unavailable("connection mutex poisoned".to_string()))
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection mutex poisoned".to_string()))
    }
}

fn format_time(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn time_column(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| conversion_error(0, err))
}

fn optional_time_column(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|value| value.with_timezone(&Utc))
            .map_err(|err| conversion_error(0, err))
    })
    .transpose()
}

fn json_column(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<Value>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|raw| serde_json::from_str(&raw).map_err(|err| conversion_error(0, err)))
        .transpose()
}

fn is_constraint(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation => {
            Some(failure.extended_code)
        }
        _ => None,
    }
}

fn repository_error(err: rusqlite::Error) -> RepositoryError {
    match is_constraint(&err) {
        Some(SQLITE_CONSTRAINT_FOREIGNKEY) => RepositoryError::NotFound,
        Some(_) => RepositoryError::Conflict,
        None => RepositoryError::Unavailable(err.to_string()),
    }
}

fn store_error(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::FromSqlConversionFailure(..) => StoreError::Corrupt(err.to_string()),
        other => StoreError::Unavailable(other.to_string()),
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let user_type: Option<String> = row.get("user_type")?;
    let user_type = match user_type {
        Some(raw) => Some(UserType::parse(&raw).ok_or_else(|| conversion_error(0, UnknownValue(raw)))?),
        None => None,
    };
    Ok(User {
        id: UserId(row.get("id")?),
        email: row.get("email")?,
        name: row.get("name")?,
        user_type,
        onboarding_completed: row.get("onboarding_completed")?,
        stripe_customer_id: row.get("stripe_customer_id")?,
    })
}

fn row_to_company(row: &Row<'_>) -> rusqlite::Result<Company> {
    Ok(Company {
        id: CompanyId(row.get("id")?),
        user_id: UserId(row.get("user_id")?),
        name: row.get("name")?,
        location: row.get("location")?,
        about: row.get("about")?,
        logo: row.get("logo")?,
        website: row.get("website")?,
        x_account: row.get("x_account")?,
        created_at: time_column(row, "created_at")?,
    })
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<JobPost> {
    let employment_type: String = row.get("employment_type")?;
    let employment_type = EmploymentType::parse(&employment_type)
        .ok_or_else(|| conversion_error(0, UnknownValue(employment_type)))?;
    let status: String = row.get("status")?;
    let status =
        JobPostStatus::parse(&status).ok_or_else(|| conversion_error(0, UnknownValue(status)))?;
    let benefits: String = row.get("benefits")?;
    let benefits: Vec<String> =
        serde_json::from_str(&benefits).map_err(|err| conversion_error(0, err))?;

    Ok(JobPost {
        id: JobPostId(row.get("id")?),
        company_id: CompanyId(row.get("company_id")?),
        job_title: row.get("job_title")?,
        employment_type,
        location: row.get("location")?,
        salary_from: row.get("salary_from")?,
        salary_to: row.get("salary_to")?,
        job_description: row.get("job_description")?,
        listing_duration: row.get("listing_duration")?,
        benefits,
        status,
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}

fn row_to_saved(row: &Row<'_>) -> rusqlite::Result<SavedJobPost> {
    Ok(SavedJobPost {
        id: SavedJobId(row.get("id")?),
        user_id: UserId(row.get("user_id")?),
        job_id: JobPostId(row.get("job_id")?),
        created_at: time_column(row, "created_at")?,
    })
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<WorkflowRun> {
    let status: String = row.get("status")?;
    let status = RunStatus::parse(&status).ok_or_else(|| conversion_error(0, UnknownValue(status)))?;
    let event = WorkflowEvent {
        name: row.get("event_name")?,
        data: json_column(row, "event_data")?.unwrap_or(Value::Null),
        timestamp: time_column(row, "event_timestamp")?,
    };
    Ok(WorkflowRun {
        id: RunId(row.get("id")?),
        function_id: row.get("function_id")?,
        event,
        status,
        wake_at: time_column(row, "wake_at")?,
        attempts: row.get("attempts")?,
        last_error: row.get("last_error")?,
        output: json_column(row, "output")?,
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}

fn row_to_step(row: &Row<'_>) -> rusqlite::Result<StepRecord> {
    let kind: String = row.get("kind")?;
    let kind = StepKind::parse(&kind).ok_or_else(|| conversion_error(0, UnknownValue(kind)))?;
    Ok(StepRecord {
        key: row.get("step_key")?,
        kind,
        output: json_column(row, "output")?,
        wake_at: optional_time_column(row, "wake_at")?,
        completed_at: optional_time_column(row, "completed_at")?,
    })
}

const JOB_COLUMNS: &str = "id, company_id, job_title, employment_type, location, salary_from, \
     salary_to, job_description, listing_duration, benefits, status, created_at, updated_at";

fn benefits_json(benefits: &[String]) -> Result<String, RepositoryError> {
    serde_json::to_string(benefits).map_err(|err| RepositoryError::Unavailable(err.to_string()))
}

impl BoardRepository for SqliteStore {
    fn upsert_user(&self, user: User) -> Result<User, RepositoryError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (id, email, name, user_type, onboarding_completed, stripe_customer_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET email = excluded.email, name = excluded.name",
            params![
                user.id.as_str(),
                user.email,
                user.name,
                user.user_type.map(UserType::as_str),
                user.onboarding_completed,
                user.stripe_customer_id,
            ],
        )
        .map_err(repository_error)?;
        conn.query_row("SELECT * FROM users WHERE id = ?1", [user.id.as_str()], row_to_user)
            .map_err(repository_error)
    }

    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let conn = self.lock()?;
        conn.query_row("SELECT * FROM users WHERE id = ?1", [id.as_str()], row_to_user)
            .optional()
            .map_err(repository_error)
    }

    fn user_by_customer(&self, customer_id: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT * FROM users WHERE stripe_customer_id = ?1",
            [customer_id],
            row_to_user,
        )
        .optional()
        .map_err(repository_error)
    }

    fn set_customer_id(&self, user_id: &UserId, customer_id: &str) -> Result<(), RepositoryError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE users SET stripe_customer_id = ?1 WHERE id = ?2",
                params![customer_id, user_id.as_str()],
            )
            .map_err(repository_error)?;
        if changed == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn insert_company(&self, company: Company) -> Result<Company, RepositoryError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(repository_error)?;
        tx.execute(
            "INSERT INTO companies (id, user_id, name, location, about, logo, website, x_account, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                company.id.as_str(),
                company.user_id.as_str(),
                company.name,
                company.location,
                company.about,
                company.logo,
                company.website,
                company.x_account,
                format_time(&company.created_at),
            ],
        )
        .map_err(repository_error)?;
        tx.execute(
            "UPDATE users SET user_type = ?1, onboarding_completed = 1 WHERE id = ?2",
            params![UserType::Company.as_str(), company.user_id.as_str()],
        )
        .map_err(repository_error)?;
        tx.commit().map_err(repository_error)?;
        Ok(company)
    }

    fn company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        let conn = self.lock()?;
        conn.query_row("SELECT * FROM companies WHERE id = ?1", [id.as_str()], row_to_company)
            .optional()
            .map_err(repository_error)
    }

    fn company_for_user(&self, user_id: &UserId) -> Result<Option<Company>, RepositoryError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT * FROM companies WHERE user_id = ?1",
            [user_id.as_str()],
            row_to_company,
        )
        .optional()
        .map_err(repository_error)
    }

    fn company_by_name(&self, name: &str) -> Result<Option<Company>, RepositoryError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT * FROM companies WHERE name = ?1 COLLATE NOCASE ORDER BY created_at LIMIT 1",
            [name],
            row_to_company,
        )
        .optional()
        .map_err(repository_error)
    }

    fn insert_job_seeker(&self, seeker: JobSeeker) -> Result<JobSeeker, RepositoryError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(repository_error)?;
        tx.execute(
            "INSERT INTO job_seekers (id, user_id, name, about, resume, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                seeker.id.as_str(),
                seeker.user_id.as_str(),
                seeker.name,
                seeker.about,
                seeker.resume,
                format_time(&seeker.created_at),
            ],
        )
        .map_err(repository_error)?;
        tx.execute(
            "UPDATE users SET user_type = ?1, onboarding_completed = 1 WHERE id = ?2",
            params![UserType::JobSeeker.as_str(), seeker.user_id.as_str()],
        )
        .map_err(repository_error)?;
        tx.commit().map_err(repository_error)?;
        Ok(seeker)
    }

    fn insert_job(&self, job: JobPost) -> Result<JobPost, RepositoryError> {
        let benefits = benefits_json(&job.benefits)?;
        let conn = self.lock()?;
        conn.execute(
            &format!("INSERT INTO job_posts ({JOB_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"),
            params![
                job.id.as_str(),
                job.company_id.as_str(),
                job.job_title,
                job.employment_type.as_str(),
                job.location,
                job.salary_from,
                job.salary_to,
                job.job_description,
                job.listing_duration,
                benefits,
                job.status.as_str(),
                format_time(&job.created_at),
                format_time(&job.updated_at),
            ],
        )
        .map_err(repository_error)?;
        Ok(job)
    }

    fn job(&self, id: &JobPostId) -> Result<Option<JobPost>, RepositoryError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM job_posts WHERE id = ?1"),
            [id.as_str()],
            row_to_job,
        )
        .optional()
        .map_err(repository_error)
    }

    fn update_job_details(&self, job: &JobPost) -> Result<(), RepositoryError> {
        let benefits = benefits_json(&job.benefits)?;
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE job_posts SET job_title = ?1, employment_type = ?2, location = ?3,
                    salary_from = ?4, salary_to = ?5, job_description = ?6, benefits = ?7,
                    updated_at = ?8
                 WHERE id = ?9",
                params![
                    job.job_title,
                    job.employment_type.as_str(),
                    job.location,
                    job.salary_from,
                    job.salary_to,
                    job.job_description,
                    benefits,
                    format_time(&job.updated_at),
                    job.id.as_str(),
                ],
            )
            .map_err(repository_error)?;
        if changed == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn transition_job(
        &self,
        id: &JobPostId,
        from: &[JobPostStatus],
        to: JobPostStatus,
    ) -> Result<bool, RepositoryError> {
        if from.is_empty() {
            return Ok(false);
        }
        let allowed = from
            .iter()
            .map(|status| format!("'{}'", status.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        let conn = self.lock()?;
        let changed = conn
            .execute(
                &format!(
                    "UPDATE job_posts SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status IN ({allowed})"
                ),
                params![to.as_str(), format_time(&Utc::now()), id.as_str()],
            )
            .map_err(repository_error)?;
        Ok(changed == 1)
    }

    fn delete_job(&self, id: &JobPostId) -> Result<bool, RepositoryError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(repository_error)?;
        tx.execute("DELETE FROM saved_job_posts WHERE job_id = ?1", [id.as_str()])
            .map_err(repository_error)?;
        let changed = tx
            .execute("DELETE FROM job_posts WHERE id = ?1", [id.as_str()])
            .map_err(repository_error)?;
        tx.commit().map_err(repository_error)?;
        Ok(changed == 1)
    }

    fn active_jobs(
        &self,
        filter: &JobFilter,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<JobPost>, u64), RepositoryError> {
        let mut clauses = vec![format!("status = '{}'", JobPostStatus::Active.as_str())];
        let mut values: Vec<String> = Vec::new();
        if !filter.employment_types.is_empty() {
            let placeholders = vec!["?"; filter.employment_types.len()].join(", ");
            clauses.push(format!("employment_type IN ({placeholders})"));
            values.extend(
                filter
                    .employment_types
                    .iter()
                    .map(|kind| kind.as_str().to_string()),
            );
        }
        if let Some(location) = &filter.location {
            clauses.push("location = ? COLLATE NOCASE".to_string());
            values.push(location.clone());
        }
        let where_clause = clauses.join(" AND ");

        let conn = self.lock()?;
        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM job_posts WHERE {where_clause}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )
            .map_err(repository_error)?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM job_posts WHERE {where_clause}
                 ORDER BY created_at DESC LIMIT {limit} OFFSET {offset}"
            ))
            .map_err(repository_error)?;
        let jobs = stmt
            .query_map(params_from_iter(values.iter()), row_to_job)
            .map_err(repository_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(repository_error)?;

        Ok((jobs, total.max(0) as u64))
    }

    fn jobs_for_company(&self, company_id: &CompanyId) -> Result<Vec<JobPost>, RepositoryError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM job_posts WHERE company_id = ?1 ORDER BY created_at DESC"
            ))
            .map_err(repository_error)?;
        let jobs = stmt
            .query_map([company_id.as_str()], row_to_job)
            .map_err(repository_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(repository_error)?;
        Ok(jobs)
    }

    fn insert_saved_job(&self, saved: SavedJobPost) -> Result<SavedJobPost, RepositoryError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO saved_job_posts (id, user_id, job_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                saved.id.as_str(),
                saved.user_id.as_str(),
                saved.job_id.as_str(),
                format_time(&saved.created_at),
            ],
        )
        .map_err(repository_error)?;
        Ok(saved)
    }

    fn saved_job(&self, id: &SavedJobId) -> Result<Option<SavedJobPost>, RepositoryError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT * FROM saved_job_posts WHERE id = ?1",
            [id.as_str()],
            row_to_saved,
        )
        .optional()
        .map_err(repository_error)
    }

    fn saved_job_for(
        &self,
        user_id: &UserId,
        job_id: &JobPostId,
    ) -> Result<Option<SavedJobPost>, RepositoryError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT * FROM saved_job_posts WHERE user_id = ?1 AND job_id = ?2",
            [user_id.as_str(), job_id.as_str()],
            row_to_saved,
        )
        .optional()
        .map_err(repository_error)
    }

    fn delete_saved_job(&self, id: &SavedJobId) -> Result<bool, RepositoryError> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM saved_job_posts WHERE id = ?1", [id.as_str()])
            .map_err(repository_error)?;
        Ok(changed == 1)
    }

    fn saved_jobs_for_user(&self, user_id: &UserId) -> Result<Vec<SavedJobPost>, RepositoryError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT * FROM saved_job_posts WHERE user_id = ?1 ORDER BY created_at DESC")
            .map_err(repository_error)?;
        let saved = stmt
            .query_map([user_id.as_str()], row_to_saved)
            .map_err(repository_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(repository_error)?;
        Ok(saved)
    }
}

fn json_text(value: &Value) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|err| StoreError::Corrupt(err.to_string()))
}

impl WorkflowStore for SqliteStore {
    fn insert_run(&self, run: &WorkflowRun) -> Result<(), StoreError> {
        let event_data = json_text(&run.event.data)?;
        let output = run.output.as_ref().map(json_text).transpose()?;
        let conn = self.lock_store()?;
        conn.execute(
            "INSERT INTO workflow_runs (id, function_id, event_name, event_data, event_timestamp,
                status, wake_at, attempts, last_error, output, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                run.id.as_str(),
                run.function_id,
                run.event.name,
                event_data,
                format_time(&run.event.timestamp),
                run.status.as_str(),
                format_time(&run.wake_at),
                run.attempts,
                run.last_error,
                output,
                format_time(&run.created_at),
                format_time(&run.updated_at),
            ],
        )
        .map_err(store_error)?;
        Ok(())
    }

    fn run(&self, id: &RunId) -> Result<Option<WorkflowRun>, StoreError> {
        let conn = self.lock_store()?;
        conn.query_row(
            "SELECT * FROM workflow_runs WHERE id = ?1",
            [id.as_str()],
            row_to_run,
        )
        .optional()
        .map_err(store_error)
    }

    fn due_runs(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<WorkflowRun>, StoreError> {
        let conn = self.lock_store()?;
        let mut stmt = conn
            .prepare(
                "SELECT * FROM workflow_runs
                 WHERE status IN ('queued', 'sleeping') AND wake_at <= ?1
                 ORDER BY wake_at, created_at LIMIT ?2",
            )
            .map_err(store_error)?;
        let runs = stmt
            .query_map(params![format_time(&now), limit as i64], row_to_run)
            .map_err(store_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(store_error)?;
        Ok(runs)
    }

    fn claim_run(&self, id: &RunId, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let conn = self.lock_store()?;
        let changed = conn
            .execute(
                "UPDATE workflow_runs SET status = 'running', updated_at = ?1
                 WHERE id = ?2 AND status IN ('queued', 'sleeping')",
                params![format_time(&now), id.as_str()],
            )
            .map_err(store_error)?;
        Ok(changed == 1)
    }

    fn update_run(&self, run: &WorkflowRun) -> Result<(), StoreError> {
        let output = run.output.as_ref().map(json_text).transpose()?;
        let conn = self.lock_store()?;
        conn.execute(
            "UPDATE workflow_runs SET status = ?1, wake_at = ?2, attempts = ?3, last_error = ?4,
                output = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                run.status.as_str(),
                format_time(&run.wake_at),
                run.attempts,
                run.last_error,
                output,
                format_time(&run.updated_at),
                run.id.as_str(),
            ],
        )
        .map_err(store_error)?;
        Ok(())
    }

    fn requeue_stalled_runs(
        &self,
        claimed_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let conn = self.lock_store()?;
        conn.execute(
            "UPDATE workflow_runs SET status = 'queued', wake_at = ?1, updated_at = ?1
             WHERE status = 'running' AND updated_at <= ?2",
            params![format_time(&now), format_time(&claimed_before)],
        )
        .map_err(store_error)
    }

    fn runs_with_status(&self, status: RunStatus) -> Result<Vec<WorkflowRun>, StoreError> {
        let conn = self.lock_store()?;
        let mut stmt = conn
            .prepare("SELECT * FROM workflow_runs WHERE status = ?1 ORDER BY created_at")
            .map_err(store_error)?;
        let runs = stmt
            .query_map([status.as_str()], row_to_run)
            .map_err(store_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(store_error)?;
        Ok(runs)
    }

    fn step(&self, run_id: &RunId, key: &str) -> Result<Option<StepRecord>, StoreError> {
        let conn = self.lock_store()?;
        conn.query_row(
            "SELECT * FROM workflow_steps WHERE run_id = ?1 AND step_key = ?2",
            [run_id.as_str(), key],
            row_to_step,
        )
        .optional()
        .map_err(store_error)
    }

    fn save_step(&self, run_id: &RunId, record: &StepRecord) -> Result<(), StoreError> {
        let output = record.output.as_ref().map(json_text).transpose()?;
        let conn = self.lock_store()?;
        conn.execute(
            "INSERT INTO workflow_steps (run_id, step_key, kind, output, wake_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(run_id, step_key) DO UPDATE SET kind = excluded.kind,
                output = excluded.output, wake_at = excluded.wake_at,
                completed_at = excluded.completed_at",
            params![
                run_id.as_str(),
                record.key,
                record.kind.as_str(),
                output,
                record.wake_at.as_ref().map(format_time),
                record.completed_at.as_ref().map(format_time),
            ],
        )
        .map_err(store_error)?;
        Ok(())
    }
}
