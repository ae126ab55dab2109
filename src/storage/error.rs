//! Error types for the durable crawl store.

use thiserror::Error;

/// Errors returned while initialising, migrating, or querying the local
/// `SQLite` database.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The database URL/path was present but blank.
    #[error("database URL must not be blank")]
    BlankDatabaseUrl,

    /// Establishing a `SQLite` connection failed.
    #[error("failed to connect to SQLite database: {message}")]
    ConnectionFailed {
        /// Error detail from Diesel.
        message: String,
    },

    /// Running pending migrations failed.
    #[error("failed to run database migrations: {message}")]
    MigrationFailed {
        /// Error detail from Diesel migrations.
        message: String,
    },

    /// Enabling foreign key enforcement failed.
    #[error("failed to enable foreign keys: {message}")]
    ForeignKeysEnableFailed {
        /// Error detail from the PRAGMA execution.
        message: String,
    },

    /// Reading the schema version from the migration table failed.
    #[error("failed to read schema version after migrations: {message}")]
    SchemaVersionQueryFailed {
        /// Error detail from Diesel query execution.
        message: String,
    },

    /// The migrations completed but no schema version could be found.
    #[error("no schema version recorded after migrations ran")]
    MissingSchemaVersion,

    /// A read query failed.
    #[error("storage query failed: {message}")]
    QueryFailed {
        /// Error detail from Diesel.
        message: String,
    },

    /// An insert or update failed for a reason other than uniqueness.
    #[error("storage write failed: {message}")]
    WriteFailed {
        /// Error detail from Diesel.
        message: String,
    },

    /// A unique constraint rejected the write. Benign under concurrent
    /// workers: the caller re-reads the now-existing row.
    #[error("unique constraint violated for {entity} {key}")]
    UniqueViolation {
        /// Table or entity kind.
        entity: &'static str,
        /// The conflicting key value.
        key: String,
    },

    /// A watermark update referenced a repository that is not stored.
    #[error("repository {github_id} is not stored")]
    UnknownRepository {
        /// External identifier that failed to match a row.
        github_id: String,
    },

    /// A stored timestamp failed to parse back out of the database.
    #[error("stored timestamp is invalid: {message}")]
    InvalidTimestamp {
        /// Error detail from chrono.
        message: String,
    },
}
