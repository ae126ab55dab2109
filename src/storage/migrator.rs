//! Diesel-backed migration runner for the crawl database.

use diesel::Connection;
use diesel::OptionalExtension;
use diesel::QueryableByName;
use diesel::RunQueryDsl;
use diesel::sql_query;
use diesel::sql_types::Text;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use crate::telemetry::{TelemetryEvent, TelemetrySink};

use super::error::StorageError;

/// Embedded Diesel migrations shipped with the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Schema version recorded by the crawl-schema migration.
pub const CURRENT_SCHEMA_VERSION: &str = "20260829000000";

/// A Diesel migration version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaVersion(String);

impl SchemaVersion {
    /// Returns the inner version string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Runs pending database migrations, enables foreign keys, and records the
/// resulting schema version in telemetry.
///
/// # Errors
///
/// Returns [`StorageError`] when the database cannot be opened, migrations
/// fail, or the resulting schema version cannot be read.
pub fn migrate_database(
    database_url: &str,
    telemetry: &dyn TelemetrySink,
) -> Result<SchemaVersion, StorageError> {
    let trimmed = database_url.trim();
    if trimmed.is_empty() {
        return Err(StorageError::BlankDatabaseUrl);
    }

    let mut connection =
        SqliteConnection::establish(trimmed).map_err(|error| StorageError::ConnectionFailed {
            message: error.to_string(),
        })?;

    enable_foreign_keys(&mut connection)?;

    connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(|error| StorageError::MigrationFailed {
            message: error.to_string(),
        })?;

    let schema_version = read_schema_version(&mut connection)?;
    telemetry.record(TelemetryEvent::SchemaVersionRecorded {
        schema_version: schema_version.as_str().to_owned(),
    });

    Ok(schema_version)
}

pub(super) fn enable_foreign_keys(connection: &mut SqliteConnection) -> Result<(), StorageError> {
    sql_query("PRAGMA foreign_keys = ON;")
        .execute(connection)
        .map(drop)
        .map_err(|error| StorageError::ForeignKeysEnableFailed {
            message: error.to_string(),
        })
}

fn read_schema_version(connection: &mut SqliteConnection) -> Result<SchemaVersion, StorageError> {
    #[derive(Debug, QueryableByName)]
    struct Row {
        #[diesel(sql_type = Text)]
        version: String,
    }

    let result: Option<Row> =
        sql_query("SELECT version FROM __diesel_schema_migrations ORDER BY version DESC LIMIT 1;")
            .get_result(connection)
            .optional()
            .map_err(|error| StorageError::SchemaVersionQueryFailed {
                message: error.to_string(),
            })?;

    result.map_or(Err(StorageError::MissingSchemaVersion), |row| {
        Ok(SchemaVersion(row.version))
    })
}
