//! Row-level record and upsert types for the crawl store.

use chrono::{DateTime, Utc};

/// A stored repository with its sync watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRecord {
    /// Local row identifier.
    pub id: i64,
    /// GitHub GraphQL node identifier (unique).
    pub github_id: String,
    /// Repository name within the organization.
    pub name: String,
    /// HTML URL of the repository.
    pub url: String,
    /// Whether the repository is private.
    pub private: bool,
    /// Whether the repository is archived.
    pub archived: bool,
    /// When the repository last changed upstream, as last observed.
    pub github_last_updated_at: Option<DateTime<Utc>>,
    /// Watermark: when the last fully successful crawl of this repository
    /// started. Absent until one completes.
    pub last_successful_run: Option<DateTime<Utc>>,
}

/// Fields written when discovering or refreshing a repository.
///
/// Deliberately excludes the watermark, which only
/// [`super::CrawlStore::update_watermark`] may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryUpsert<'a> {
    /// GitHub GraphQL node identifier (unique).
    pub github_id: &'a str,
    /// Repository name within the organization.
    pub name: &'a str,
    /// HTML URL of the repository.
    pub url: &'a str,
    /// Whether the repository is private.
    pub private: bool,
    /// Whether the repository is archived.
    pub archived: bool,
    /// When the repository last changed upstream.
    pub github_last_updated_at: Option<DateTime<Utc>>,
}

/// Fields written when storing a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullRequestUpsert<'a> {
    /// GitHub GraphQL node identifier (unique).
    pub github_id: &'a str,
    /// Local row id of the owning repository.
    pub repository_id: i64,
    /// Local row id of the author, when resolved.
    pub author_id: Option<i64>,
    /// PR number, unique within the repository.
    pub number: i64,
    /// PR title.
    pub title: Option<&'a str>,
    /// When the PR last changed upstream.
    pub updated_at_github: DateTime<Utc>,
    /// When the PR was closed, if it was.
    pub closed_at: Option<DateTime<Utc>>,
    /// When the PR was merged, if it was.
    pub merged_at: Option<DateTime<Utc>>,
    /// Lines added.
    pub additions: i64,
    /// Lines deleted.
    pub deletions: i64,
    /// Files touched.
    pub changed_files: i64,
    /// Commit count.
    pub commits_count: i64,
}

/// Fields written when storing a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewUpsert<'a> {
    /// GitHub GraphQL node identifier (unique).
    pub github_id: &'a str,
    /// Local row id of the owning pull request.
    pub pull_request_id: i64,
    /// Local row id of the author, when resolved.
    pub author_id: Option<i64>,
    /// Review state (APPROVED, CHANGES_REQUESTED, ...).
    pub state: Option<&'a str>,
    /// When the review was submitted.
    pub submitted_at: Option<DateTime<Utc>>,
}

/// A stored user, created lazily on first reference as an author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Local row identifier.
    pub id: i64,
    /// GitHub account login (unique).
    pub login: String,
}

/// A stored pull request, read back for tests and reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRecord {
    /// Local row identifier.
    pub id: i64,
    /// GitHub GraphQL node identifier (unique).
    pub github_id: String,
    /// Local row id of the owning repository.
    pub repository_id: i64,
    /// Local row id of the author, when resolved.
    pub author_id: Option<i64>,
    /// PR number, unique within the repository.
    pub number: i64,
    /// PR title.
    pub title: Option<String>,
    /// When the PR last changed upstream.
    pub updated_at_github: DateTime<Utc>,
}
