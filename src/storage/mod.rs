//! Durable persistence for crawled repositories, PRs, reviews, and users.
//!
//! The store is a local `SQLite` database managed with Diesel migrations.
//! Uniqueness of external GitHub identifiers (and of user logins) is
//! enforced by the schema, which is what makes the crawl's upserts
//! idempotent and its concurrent user creation safe to resolve by re-read.

mod error;
mod migrator;
mod records;
mod store;

pub use error::StorageError;
pub use migrator::{CURRENT_SCHEMA_VERSION, SchemaVersion, migrate_database};
pub use records::{
    PullRequestRecord, PullRequestUpsert, RepositoryRecord, RepositoryUpsert, ReviewUpsert,
    UserRecord,
};
pub use store::{CrawlStore, SqliteCrawlStore};
