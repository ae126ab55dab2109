//! GitHub GraphQL access: the rate-governed client and its trait seam.
//!
//! This module owns everything between the crawl orchestrator and the wire:
//! the three fixed query documents, the deserialisation models, the primary
//! rate-limit budget tracker, the retry ladder, and the client that ties
//! them together. Errors are mapped into precise variants so callers can
//! distinguish a fatal exhaustion from a "re-issue the same request" signal.

pub mod backoff;
pub mod client;
pub mod error;
pub mod gateway;
pub mod models;
pub mod queries;
pub mod rate_limit;
pub mod token;

pub use client::{ClientOptions, GraphqlClient};
pub use error::GithubError;
pub use gateway::{CrawlGateway, PageFetch};
pub use rate_limit::RateLimitBudget;
pub use token::PersonalAccessToken;

#[cfg(test)]
pub use gateway::MockCrawlGateway;
