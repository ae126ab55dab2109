//! Deserialisation targets for the three GraphQL response shapes.
//!
//! These types mirror the exact field selections issued by
//! [`crate::github::queries`]. Optional author fields stay optional because
//! GitHub returns `null` for deleted accounts and for PRs authored by bots
//! that have since been removed.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Rate-limit envelope attached to every query response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitEnvelope {
    /// Point cost charged for the query that carried this envelope.
    pub cost: u32,
    /// Points remaining in the current window.
    pub remaining: u32,
    /// When the point budget resets.
    pub reset_at: DateTime<Utc>,
}

/// Full rate-limit status returned by the dedicated status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    /// Point cost of the status query itself.
    pub cost: u32,
    /// Points remaining in the current window.
    pub remaining: u32,
    /// When the point budget resets.
    pub reset_at: DateTime<Utc>,
    /// Maximum points available per window.
    pub limit: u32,
}

/// Cursor-based pagination state for a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Whether more results exist after the current page.
    pub has_next_page: bool,
    /// Cursor to resume from, when another page exists.
    pub end_cursor: Option<String>,
}

/// GitHub actor reference carrying only the login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Actor {
    /// Account login.
    pub login: String,
}

/// A repository node from the organization-repositories query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryNode {
    /// GraphQL node identifier, unique across GitHub.
    pub id: String,
    /// Repository name within the organization.
    pub name: String,
    /// HTML URL of the repository.
    pub url: String,
    /// Whether the repository is private.
    pub is_private: bool,
    /// Whether the repository is archived.
    pub is_archived: bool,
    /// When the repository last changed upstream. Drives differential
    /// selection against the stored watermark.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Commit count wrapper on a pull request connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitCount {
    /// Total commits on the pull request.
    pub total_count: i64,
}

/// A review node nested under a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewNode {
    /// GraphQL node identifier.
    pub id: String,
    /// Review author, absent for deleted accounts.
    pub author: Option<Actor>,
    /// Review state (APPROVED, CHANGES_REQUESTED, ...).
    pub state: Option<String>,
    /// When the review was submitted, absent for pending reviews.
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Connection wrapper around the first page of reviews on a PR.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReviewConnection {
    /// Review nodes on this page.
    #[serde(default)]
    pub nodes: Vec<ReviewNode>,
}

/// A pull request node with its first page of reviews.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestNode {
    /// GraphQL node identifier.
    pub id: String,
    /// PR number, unique within the repository.
    pub number: i64,
    /// PR title.
    pub title: Option<String>,
    /// When the PR last changed upstream. Drives early termination.
    pub updated_at: DateTime<Utc>,
    /// When the PR was closed, if it was.
    pub closed_at: Option<DateTime<Utc>>,
    /// When the PR was merged, if it was.
    pub merged_at: Option<DateTime<Utc>>,
    /// PR author, absent for deleted accounts.
    pub author: Option<Actor>,
    /// Lines added.
    pub additions: i64,
    /// Lines deleted.
    pub deletions: i64,
    /// Files touched.
    pub changed_files: i64,
    /// Commit count wrapper.
    pub commits: CommitCount,
    /// First 100 reviews on the PR.
    #[serde(default)]
    pub reviews: ReviewConnection,
}

/// One page of results from a cursor-paginated connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    /// Pagination state.
    pub page_info: PageInfo,
    /// Nodes on this page.
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

/// A page of repository nodes.
pub type RepositoryPage = Connection<RepositoryNode>;

/// A page of pull request nodes.
pub type PullRequestPage = Connection<PullRequestNode>;

#[cfg(test)]
mod tests {
    use super::{PullRequestPage, RepositoryPage};

    #[test]
    fn repository_page_deserialises_from_graphql_shape() {
        let page: RepositoryPage = serde_json::from_value(serde_json::json!({
            "pageInfo": {"hasNextPage": true, "endCursor": "abc"},
            "nodes": [{
                "id": "R_1",
                "name": "next.js",
                "url": "https://github.com/vercel/next.js",
                "isPrivate": false,
                "isArchived": false,
                "updatedAt": "2026-08-01T12:00:00Z"
            }]
        }))
        .expect("repository page should deserialise");

        assert!(page.page_info.has_next_page);
        assert_eq!(page.page_info.end_cursor.as_deref(), Some("abc"));
        let node = page.nodes.first().expect("one node");
        assert_eq!(node.name, "next.js");
        assert!(node.updated_at.is_some());
    }

    #[test]
    fn pull_request_node_tolerates_absent_author_and_reviews() {
        let page: PullRequestPage = serde_json::from_value(serde_json::json!({
            "pageInfo": {"hasNextPage": false, "endCursor": null},
            "nodes": [{
                "id": "PR_1",
                "number": 42,
                "title": "Fix build",
                "updatedAt": "2026-08-02T00:00:00Z",
                "closedAt": null,
                "mergedAt": null,
                "author": null,
                "additions": 10,
                "deletions": 2,
                "changedFiles": 1,
                "commits": {"totalCount": 3}
            }]
        }))
        .expect("pull request page should deserialise");

        let node = page.nodes.first().expect("one node");
        assert!(node.author.is_none());
        assert!(node.reviews.nodes.is_empty());
    }
}
