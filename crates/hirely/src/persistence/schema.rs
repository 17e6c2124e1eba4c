use rusqlite::Connection;
use tracing::info;

/// Ordered migrations; entry `n` moves the database from `user_version = n` to `n + 1`.
const MIGRATIONS: &[&str] = &[
    // 1: initial schema
    r#"
    CREATE TABLE users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL,
        name TEXT NOT NULL,
        user_type TEXT,
        onboarding_completed INTEGER NOT NULL DEFAULT 0,
        stripe_customer_id TEXT UNIQUE
    );

    CREATE TABLE companies (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        location TEXT NOT NULL,
        about TEXT NOT NULL,
        logo TEXT NOT NULL,
        website TEXT NOT NULL,
        x_account TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX idx_companies_name ON companies(name COLLATE NOCASE);

    CREATE TABLE job_seekers (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        about TEXT NOT NULL,
        resume TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE job_posts (
        id TEXT PRIMARY KEY,
        company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
        job_title TEXT NOT NULL,
        employment_type TEXT NOT NULL,
        location TEXT NOT NULL,
        salary_from INTEGER NOT NULL,
        salary_to INTEGER NOT NULL,
        job_description TEXT NOT NULL,
        listing_duration INTEGER NOT NULL,
        benefits TEXT NOT NULL DEFAULT '[]',
        status TEXT NOT NULL DEFAULT 'DRAFT',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX idx_job_posts_status_created ON job_posts(status, created_at DESC);
    CREATE INDEX idx_job_posts_company ON job_posts(company_id);

    CREATE TABLE saved_job_posts (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        job_id TEXT NOT NULL REFERENCES job_posts(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        UNIQUE (user_id, job_id)
    );

    CREATE TABLE workflow_runs (
        id TEXT PRIMARY KEY,
        function_id TEXT NOT NULL,
        event_name TEXT NOT NULL,
        event_data TEXT NOT NULL,
        event_timestamp TEXT NOT NULL,
        status TEXT NOT NULL,
        wake_at TEXT NOT NULL,
        attempts INTEGER NOT NULL DEFAULT 0,
        last_error TEXT,
        output TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX idx_workflow_runs_due ON workflow_runs(status, wake_at);

    CREATE TABLE workflow_steps (
        run_id TEXT NOT NULL REFERENCES workflow_runs(id) ON DELETE CASCADE,
        step_key TEXT NOT NULL,
        kind TEXT NOT NULL,
        output TEXT,
        wake_at TEXT,
        completed_at TEXT,
        PRIMARY KEY (run_id, step_key)
    );
    "#,
];

pub const SCHEMA_VERSION: i64 = MIGRATIONS.len() as i64;

/// Applies pending migrations inside one transaction and bumps `user_version`.
pub(crate) fn migrate(conn: &mut Connection) -> rusqlite::Result<()> {
    let current: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if current >= SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (index, migration) in MIGRATIONS.iter().enumerate().skip(current.max(0) as usize) {
        info!(from = index, to = index + 1, "running database migration");
        tx.execute_batch(migration)?;
    }
    tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
    tx.commit()
}
