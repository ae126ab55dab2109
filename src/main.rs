//! Magpie CLI entrypoint: validate startup requirements, migrate the
//! database, and run one crawl of the configured organization.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use ortho_config::OrthoConfig;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use magpie::{
    ClientOptions, ConfigError, CrawlError, CrawlOptions, CrawlOrchestrator, CrawlGateway,
    GithubError, GraphqlClient, MagpieConfig, PacerOptions, PersonalAccessToken, RequestPacer,
    SqliteCrawlStore, StderrJsonlTelemetrySink, StorageError, TelemetryEvent, TelemetrySink,
    migrate_database,
};

/// Top-level failure surfaced to the shell.
#[derive(Debug, Error)]
enum AppError {
    /// Configuration loading or startup validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Client construction or the status query failed.
    #[error(transparent)]
    Github(#[from] GithubError),
    /// Database migration or store construction failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The crawl run failed fatally (repository discovery).
    #[error(transparent)]
    Crawl(#[from] CrawlError),
    /// Writing the run summary failed.
    #[error("I/O error: {message}")]
    Io {
        /// Error detail from the underlying I/O operation.
        message: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ignored = writeln!(io::stderr().lock(), "{error}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let config = load_config()?;

    // Startup requirements: fail fast, never mid-crawl.
    let token = PersonalAccessToken::new(config.resolve_token()?)?;
    let organization = config.require_organization()?.to_owned();
    let database_url = config.require_database_url()?.to_owned();

    let telemetry = StderrJsonlTelemetrySink;
    migrate_database(&database_url, &telemetry)?;

    let mut client_options = ClientOptions::default();
    if let Some(endpoint) = config.endpoint.clone() {
        client_options.endpoint = endpoint;
    }
    let gateway = Arc::new(GraphqlClient::new(token, client_options)?);

    let status = gateway.rate_limit_status().await?;
    tracing::info!(
        remaining = status.remaining,
        limit = status.limit,
        reset_at = %status.reset_at,
        "rate-limit status"
    );

    let store = Arc::new(SqliteCrawlStore::new(database_url)?);
    let pacer = Arc::new(RequestPacer::new(PacerOptions {
        admission_limit: config.admission_limit,
        ..PacerOptions::default()
    }));

    let mut crawl_options = CrawlOptions::new(organization);
    crawl_options.worker_limit = config.workers;

    let orchestrator = CrawlOrchestrator::new(gateway, store, pacer, crawl_options);
    let summary = orchestrator.run().await?;

    telemetry.record(TelemetryEvent::CrawlCompleted {
        succeeded: summary.succeeded,
        failed: summary.failed,
    });
    write_summary(&summary)
}

/// Loads configuration from CLI, environment, and files.
///
/// # Errors
///
/// Returns [`ConfigError::Load`] when ortho-config fails to parse arguments
/// or load configuration files.
fn load_config() -> Result<MagpieConfig, ConfigError> {
    MagpieConfig::load().map_err(|error| ConfigError::Load {
        message: error.to_string(),
    })
}

fn write_summary(summary: &magpie::CrawlSummary) -> Result<(), AppError> {
    let mut stdout = io::stdout().lock();
    let message = format!(
        "Crawl finished: {selected} selected, {succeeded} succeeded, {failed} failed",
        selected = summary.selected,
        succeeded = summary.succeeded,
        failed = summary.failed,
    );
    writeln!(stdout, "{message}").map_err(|error| AppError::Io {
        message: error.to_string(),
    })
}
