//! SQLite persistence for listings, profiles, and workflow runs.

mod schema;
mod sqlite;

pub use schema::SCHEMA_VERSION;
pub use sqlite::SqliteStore;
