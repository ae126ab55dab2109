//! Magpie incrementally mirrors an organization's pull-request and review
//! history from the GitHub GraphQL API into a local `SQLite` database.
//!
//! The crate splits into a rate-governed GraphQL client ([`github`]), a
//! durable store ([`storage`]), and a crawl orchestrator ([`crawl`]) that
//! runs many repositories concurrently while respecting GitHub's primary
//! and secondary rate-limit regimes. Re-running a crawl is idempotent:
//! every write is an upsert keyed by GitHub's node identifier, and a
//! per-repository watermark limits each run to what actually changed.

pub mod config;
pub mod crawl;
pub mod github;
pub mod storage;
pub mod telemetry;

pub use config::{ConfigError, MagpieConfig};
pub use crawl::{CrawlError, CrawlOptions, CrawlOrchestrator, CrawlSummary, PacerOptions,
    RequestPacer};
pub use github::{ClientOptions, CrawlGateway, GithubError, GraphqlClient, PageFetch,
    PersonalAccessToken};
pub use storage::{CrawlStore, SqliteCrawlStore, StorageError, migrate_database};
pub use telemetry::{NoopTelemetrySink, StderrJsonlTelemetrySink, TelemetryEvent, TelemetrySink};
