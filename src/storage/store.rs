//! `SQLite`-backed crawl store.
//!
//! All writes are idempotent upserts keyed by the GitHub node identifier, so
//! re-running a crawl against unchanged upstream data is a no-op update.
//! Uniqueness is enforced by the schema; a violation surfaces as
//! [`StorageError::UniqueViolation`] and is treated by callers as a signal
//! to re-read, not as a failure.
//!
//! Connections are established per operation, which keeps the store trivially
//! `Send + Sync` for concurrent crawl workers; `SQLite` serialises the
//! writes underneath.

use chrono::{DateTime, Utc};
use diesel::Connection;
use diesel::OptionalExtension;
use diesel::QueryableByName;
use diesel::RunQueryDsl;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_query;
use diesel::sql_types::{BigInt, Bool, Nullable, Text};
use diesel::sqlite::SqliteConnection;

use super::error::StorageError;
use super::migrator::enable_foreign_keys;
use super::records::{
    PullRequestRecord, PullRequestUpsert, RepositoryRecord, RepositoryUpsert, ReviewUpsert,
    UserRecord,
};

/// Durable store consumed by the crawl orchestrator.
///
/// Every method is safe under concurrent invocation from multiple workers.
/// Tests exercise the real `SQLite` implementation against a temporary
/// database rather than a mock; upsert semantics are the behaviour under
/// test.
pub trait CrawlStore: Send + Sync {
    /// Creates or refreshes a repository row. Never touches the watermark.
    fn upsert_repository(&self, repository: &RepositoryUpsert<'_>) -> Result<(), StorageError>;

    /// Lists every stored repository.
    fn list_repositories(&self) -> Result<Vec<RepositoryRecord>, StorageError>;

    /// Looks up a repository by its GitHub node identifier.
    fn find_repository(&self, github_id: &str) -> Result<Option<RepositoryRecord>, StorageError>;

    /// Advances a repository's watermark. Only called after a fully
    /// successful crawl.
    fn update_watermark(&self, github_id: &str, at: DateTime<Utc>) -> Result<(), StorageError>;

    /// Creates or refreshes a pull request row, returning its local row id.
    fn upsert_pull_request(&self, pull_request: &PullRequestUpsert<'_>)
    -> Result<i64, StorageError>;

    /// Creates or refreshes a review row.
    fn upsert_review(&self, review: &ReviewUpsert<'_>) -> Result<(), StorageError>;

    /// Looks up a user by login.
    fn find_user(&self, login: &str) -> Result<Option<UserRecord>, StorageError>;

    /// Creates a user. A concurrent creator surfaces as
    /// [`StorageError::UniqueViolation`], which the caller resolves by
    /// re-reading.
    fn create_user(&self, login: &str) -> Result<UserRecord, StorageError>;

    /// Lists a repository's stored pull requests, newest upstream update
    /// first. Used for reporting and verification.
    fn list_pull_requests(&self, repository_id: i64)
    -> Result<Vec<PullRequestRecord>, StorageError>;
}

/// `SQLite` implementation of [`CrawlStore`].
#[derive(Debug, Clone)]
pub struct SqliteCrawlStore {
    database_url: String,
}

impl SqliteCrawlStore {
    /// Creates a store targeting the configured `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BlankDatabaseUrl`] when the URL is blank.
    pub fn new(database_url: impl Into<String>) -> Result<Self, StorageError> {
        let database_url_string = database_url.into();
        if database_url_string.trim().is_empty() {
            return Err(StorageError::BlankDatabaseUrl);
        }
        Ok(Self {
            database_url: database_url_string,
        })
    }

    fn connect(&self) -> Result<SqliteConnection, StorageError> {
        let mut connection = SqliteConnection::establish(&self.database_url).map_err(|error| {
            StorageError::ConnectionFailed {
                message: error.to_string(),
            }
        })?;
        enable_foreign_keys(&mut connection)?;
        Ok(connection)
    }
}

#[derive(Debug, QueryableByName)]
struct RepositoryRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
    #[diesel(sql_type = Text)]
    github_id: String,
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = Text)]
    url: String,
    #[diesel(sql_type = Bool)]
    private: bool,
    #[diesel(sql_type = Bool)]
    archived: bool,
    #[diesel(sql_type = Nullable<Text>)]
    github_last_updated_at: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    last_successful_run: Option<String>,
}

impl RepositoryRow {
    fn into_record(self) -> Result<RepositoryRecord, StorageError> {
        Ok(RepositoryRecord {
            id: self.id,
            github_id: self.github_id,
            name: self.name,
            url: self.url,
            private: self.private,
            archived: self.archived,
            github_last_updated_at: parse_optional_time(self.github_last_updated_at)?,
            last_successful_run: parse_optional_time(self.last_successful_run)?,
        })
    }
}

#[derive(Debug, QueryableByName)]
struct IdRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
}

#[derive(Debug, QueryableByName)]
struct UserRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
    #[diesel(sql_type = Text)]
    login: String,
}

#[derive(Debug, QueryableByName)]
struct PullRequestRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
    #[diesel(sql_type = Text)]
    github_id: String,
    #[diesel(sql_type = BigInt)]
    repository_id: i64,
    #[diesel(sql_type = Nullable<BigInt>)]
    author_id: Option<i64>,
    #[diesel(sql_type = BigInt)]
    number: i64,
    #[diesel(sql_type = Nullable<Text>)]
    title: Option<String>,
    #[diesel(sql_type = Text)]
    updated_at_github: String,
}

const REPOSITORY_COLUMNS: &str = "id, github_id, name, url, private, archived, \
     github_last_updated_at, last_successful_run";

impl CrawlStore for SqliteCrawlStore {
    fn upsert_repository(&self, repository: &RepositoryUpsert<'_>) -> Result<(), StorageError> {
        let mut connection = self.connect()?;
        sql_query(
            "INSERT INTO repositories \
             (github_id, name, url, private, archived, github_last_updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(github_id) DO UPDATE SET \
               name = excluded.name, \
               url = excluded.url, \
               private = excluded.private, \
               archived = excluded.archived, \
               github_last_updated_at = excluded.github_last_updated_at, \
               updated_at = CURRENT_TIMESTAMP;",
        )
        .bind::<Text, _>(repository.github_id)
        .bind::<Text, _>(repository.name)
        .bind::<Text, _>(repository.url)
        .bind::<Bool, _>(repository.private)
        .bind::<Bool, _>(repository.archived)
        .bind::<Nullable<Text>, _>(repository.github_last_updated_at.map(format_time))
        .execute(&mut connection)
        .map(drop)
        .map_err(|error| map_write_error(&error, "repository", repository.github_id))
    }

    fn list_repositories(&self) -> Result<Vec<RepositoryRecord>, StorageError> {
        let mut connection = self.connect()?;
        let rows: Vec<RepositoryRow> = sql_query(format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories ORDER BY name;"
        ))
        .load(&mut connection)
        .map_err(map_query_error)?;

        rows.into_iter().map(RepositoryRow::into_record).collect()
    }

    fn find_repository(&self, github_id: &str) -> Result<Option<RepositoryRecord>, StorageError> {
        let mut connection = self.connect()?;
        let row: Option<RepositoryRow> = sql_query(format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories WHERE github_id = ? LIMIT 1;"
        ))
        .bind::<Text, _>(github_id)
        .get_result(&mut connection)
        .optional()
        .map_err(map_query_error)?;

        row.map(RepositoryRow::into_record).transpose()
    }

    fn update_watermark(&self, github_id: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut connection = self.connect()?;
        let affected = sql_query(
            "UPDATE repositories \
             SET last_successful_run = ?, updated_at = CURRENT_TIMESTAMP \
             WHERE github_id = ?;",
        )
        .bind::<Text, _>(format_time(at))
        .bind::<Text, _>(github_id)
        .execute(&mut connection)
        .map_err(|error| map_write_error(&error, "repository", github_id))?;

        if affected == 0 {
            return Err(StorageError::UnknownRepository {
                github_id: github_id.to_owned(),
            });
        }
        Ok(())
    }

    fn upsert_pull_request(
        &self,
        pull_request: &PullRequestUpsert<'_>,
    ) -> Result<i64, StorageError> {
        let mut connection = self.connect()?;
        sql_query(
            "INSERT INTO pull_requests \
             (github_id, repository_id, author_id, number, title, updated_at_github, \
              closed_at, merged_at, additions, deletions, changed_files, commits_count) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(github_id) DO UPDATE SET \
               repository_id = excluded.repository_id, \
               author_id = excluded.author_id, \
               number = excluded.number, \
               title = excluded.title, \
               updated_at_github = excluded.updated_at_github, \
               closed_at = excluded.closed_at, \
               merged_at = excluded.merged_at, \
               additions = excluded.additions, \
               deletions = excluded.deletions, \
               changed_files = excluded.changed_files, \
               commits_count = excluded.commits_count, \
               updated_at = CURRENT_TIMESTAMP;",
        )
        .bind::<Text, _>(pull_request.github_id)
        .bind::<BigInt, _>(pull_request.repository_id)
        .bind::<Nullable<BigInt>, _>(pull_request.author_id)
        .bind::<BigInt, _>(pull_request.number)
        .bind::<Nullable<Text>, _>(pull_request.title)
        .bind::<Text, _>(format_time(pull_request.updated_at_github))
        .bind::<Nullable<Text>, _>(pull_request.closed_at.map(format_time))
        .bind::<Nullable<Text>, _>(pull_request.merged_at.map(format_time))
        .bind::<BigInt, _>(pull_request.additions)
        .bind::<BigInt, _>(pull_request.deletions)
        .bind::<BigInt, _>(pull_request.changed_files)
        .bind::<BigInt, _>(pull_request.commits_count)
        .execute(&mut connection)
        .map(drop)
        .map_err(|error| map_write_error(&error, "pull request", pull_request.github_id))?;

        let row: IdRow = sql_query("SELECT id FROM pull_requests WHERE github_id = ? LIMIT 1;")
            .bind::<Text, _>(pull_request.github_id)
            .get_result(&mut connection)
            .map_err(map_query_error)?;
        Ok(row.id)
    }

    fn upsert_review(&self, review: &ReviewUpsert<'_>) -> Result<(), StorageError> {
        let mut connection = self.connect()?;
        sql_query(
            "INSERT INTO reviews \
             (github_id, pull_request_id, author_id, state, submitted_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(github_id) DO UPDATE SET \
               pull_request_id = excluded.pull_request_id, \
               author_id = excluded.author_id, \
               state = excluded.state, \
               submitted_at = excluded.submitted_at, \
               updated_at = CURRENT_TIMESTAMP;",
        )
        .bind::<Text, _>(review.github_id)
        .bind::<BigInt, _>(review.pull_request_id)
        .bind::<Nullable<BigInt>, _>(review.author_id)
        .bind::<Nullable<Text>, _>(review.state)
        .bind::<Nullable<Text>, _>(review.submitted_at.map(format_time))
        .execute(&mut connection)
        .map(drop)
        .map_err(|error| map_write_error(&error, "review", review.github_id))
    }

    fn find_user(&self, login: &str) -> Result<Option<UserRecord>, StorageError> {
        let mut connection = self.connect()?;
        let row: Option<UserRow> =
            sql_query("SELECT id, login FROM users WHERE login = ? LIMIT 1;")
                .bind::<Text, _>(login)
                .get_result(&mut connection)
                .optional()
                .map_err(map_query_error)?;

        Ok(row.map(|user| UserRecord {
            id: user.id,
            login: user.login,
        }))
    }

    fn create_user(&self, login: &str) -> Result<UserRecord, StorageError> {
        let mut connection = self.connect()?;
        sql_query("INSERT INTO users (login) VALUES (?);")
            .bind::<Text, _>(login)
            .execute(&mut connection)
            .map(drop)
            .map_err(|error| map_write_error(&error, "user", login))?;

        let row: UserRow = sql_query("SELECT id, login FROM users WHERE login = ? LIMIT 1;")
            .bind::<Text, _>(login)
            .get_result(&mut connection)
            .map_err(map_query_error)?;
        Ok(UserRecord {
            id: row.id,
            login: row.login,
        })
    }

    fn list_pull_requests(
        &self,
        repository_id: i64,
    ) -> Result<Vec<PullRequestRecord>, StorageError> {
        let mut connection = self.connect()?;
        let rows: Vec<PullRequestRow> = sql_query(
            "SELECT id, github_id, repository_id, author_id, number, title, updated_at_github \
             FROM pull_requests WHERE repository_id = ? \
             ORDER BY updated_at_github DESC;",
        )
        .bind::<BigInt, _>(repository_id)
        .load(&mut connection)
        .map_err(map_query_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(PullRequestRecord {
                    id: row.id,
                    github_id: row.github_id,
                    repository_id: row.repository_id,
                    author_id: row.author_id,
                    number: row.number,
                    title: row.title,
                    updated_at_github: parse_time(&row.updated_at_github)?,
                })
            })
            .collect()
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| StorageError::InvalidTimestamp {
            message: format!("{raw}: {error}"),
        })
}

fn parse_optional_time(raw: Option<String>) -> Result<Option<DateTime<Utc>>, StorageError> {
    raw.as_deref().map(parse_time).transpose()
}

fn map_query_error(error: DieselError) -> StorageError {
    StorageError::QueryFailed {
        message: error.to_string(),
    }
}

fn map_write_error(error: &DieselError, entity: &'static str, key: &str) -> StorageError {
    if let DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) = error {
        return StorageError::UniqueViolation {
            entity,
            key: key.to_owned(),
        };
    }
    StorageError::WriteFailed {
        message: error.to_string(),
    }
}
