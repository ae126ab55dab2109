//! Application configuration loaded from CLI, environment, and files.
//!
//! Configuration merges values from command-line arguments, environment
//! variables, and configuration files using ortho-config's layered
//! approach.
//!
//! # Precedence
//!
//! Values are loaded with the following precedence (lowest to highest):
//!
//! 1. **Defaults** – Built-in application defaults
//! 2. **Configuration file** – `.magpie.toml` in current directory, home
//!    directory, or XDG config directory
//! 3. **Environment variables** – `MAGPIE_TOKEN` (or legacy `GITHUB_TOKEN`),
//!    `MAGPIE_ORGANIZATION`, `MAGPIE_DATABASE_URL`, ...
//! 4. **Command-line arguments** – `--token`, `--organization`, ...
//!
//! The token and database URL are startup requirements: a crawl refuses to
//! start without them rather than discovering their absence mid-run.

use std::env;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced while loading or validating configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {message}")]
    Load {
        /// Details about the configuration failure.
        message: String,
    },

    /// No authentication token was provided by any source.
    #[error("personal access token is required (use --token, MAGPIE_TOKEN, or GITHUB_TOKEN)")]
    MissingToken,

    /// No organization was provided by any source.
    #[error("organization is required (use --organization or MAGPIE_ORGANIZATION)")]
    MissingOrganization,

    /// No database URL was provided by any source.
    #[error("database URL is required (use --database-url or MAGPIE_DATABASE_URL)")]
    MissingDatabaseUrl,
}

/// Application configuration supporting CLI, environment, and file sources.
///
/// # Example
///
/// ```no_run
/// use magpie::MagpieConfig;
/// use ortho_config::OrthoConfig;
///
/// let config = MagpieConfig::load().expect("failed to load configuration");
/// let token = config.resolve_token().expect("token required");
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig)]
#[serde(default)]
#[ortho_config(
    prefix = "MAGPIE",
    discovery(
        dotfile_name = ".magpie.toml",
        config_file_name = "magpie.toml",
        app_name = "magpie"
    )
)]
pub struct MagpieConfig {
    /// Personal access token for GitHub API authentication.
    ///
    /// Can be provided via:
    /// - CLI: `--token <TOKEN>` or `-t <TOKEN>`
    /// - Environment: `MAGPIE_TOKEN` or `GITHUB_TOKEN` (legacy)
    /// - Config file: `token = "..."`
    #[ortho_config(cli_short = 't')]
    pub token: Option<String>,

    /// Organization whose repositories are mirrored (e.g. "vercel").
    ///
    /// Can be provided via:
    /// - CLI: `--organization <ORG>` or `-o <ORG>`
    /// - Environment: `MAGPIE_ORGANIZATION`
    /// - Config file: `organization = "..."`
    #[ortho_config(cli_short = 'o')]
    pub organization: Option<String>,

    /// Local `SQLite` database URL/path used for the mirror.
    ///
    /// Diesel uses a filesystem path for `SQLite` connections. The same
    /// value is usable by the Diesel CLI via `DATABASE_URL`.
    ///
    /// Can be provided via:
    /// - CLI: `--database-url <PATH>`
    /// - Environment: `MAGPIE_DATABASE_URL`
    /// - Config file: `database_url = "..."`
    #[ortho_config()]
    pub database_url: Option<String>,

    /// Overrides the GraphQL endpoint, e.g. for GitHub Enterprise.
    ///
    /// Defaults to `https://api.github.com/graphql`.
    #[ortho_config()]
    pub endpoint: Option<String>,

    /// Maximum repositories crawled concurrently.
    #[ortho_config()]
    pub workers: usize,

    /// Maximum concurrent in-flight API requests, independent of `workers`.
    #[ortho_config()]
    pub admission_limit: usize,
}

const DEFAULT_WORKERS: usize = 10;
const DEFAULT_ADMISSION_LIMIT: usize = 10;

impl Default for MagpieConfig {
    fn default() -> Self {
        Self {
            token: None,
            organization: None,
            database_url: None,
            endpoint: None,
            workers: DEFAULT_WORKERS,
            admission_limit: DEFAULT_ADMISSION_LIMIT,
        }
    }
}

impl MagpieConfig {
    /// Resolves the token from configuration or the legacy `GITHUB_TOKEN`
    /// environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingToken`] when no token source provides a
    /// value.
    pub fn resolve_token(&self) -> Result<String, ConfigError> {
        self.token
            .clone()
            .or_else(|| env::var("GITHUB_TOKEN").ok())
            .ok_or(ConfigError::MissingToken)
    }

    /// Returns the organization or an error if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingOrganization`] when no source provides
    /// one.
    pub fn require_organization(&self) -> Result<&str, ConfigError> {
        self.organization
            .as_deref()
            .ok_or(ConfigError::MissingOrganization)
    }

    /// Returns the database URL or an error if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingDatabaseUrl`] when no source provides
    /// one.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::MissingDatabaseUrl)
    }
}
