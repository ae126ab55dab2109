//! Trait seam between the crawl orchestrator and the GraphQL client.
//!
//! The trait-based design enables mocking in tests while the real client
//! handles HTTP, budget gating, and retry. The orchestrator never sees a
//! rate-limit cooldown directly; it only observes the [`PageFetch`] outcome.

use async_trait::async_trait;

use super::error::GithubError;
use super::models::{PullRequestPage, RateLimitStatus, RepositoryPage};

/// Outcome of one page request after the client's retry and cooldown
/// handling has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageFetch<T> {
    /// A page of results was produced.
    Page(T),
    /// A rate-limit cooldown was served; the caller should re-issue the
    /// identical request.
    RetryLater,
    /// The response stayed malformed through every retry; the caller should
    /// proceed as though the call produced nothing.
    NoData,
}

/// Gateway exposing the three fixed query shapes used by a crawl.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CrawlGateway: Send + Sync {
    /// Fetches one page of an organization's repositories.
    async fn organization_repositories_page(
        &self,
        org: &str,
        after: Option<String>,
    ) -> Result<PageFetch<RepositoryPage>, GithubError>;

    /// Fetches one page of a repository's pull requests, each carrying its
    /// first page of reviews, ordered most-recently-updated first.
    async fn pull_requests_page(
        &self,
        owner: &str,
        repo: &str,
        after: Option<String>,
    ) -> Result<PageFetch<PullRequestPage>, GithubError>;

    /// Fetches the current rate-limit status. Skips the budget gate.
    async fn rate_limit_status(&self) -> Result<RateLimitStatus, GithubError>;
}
