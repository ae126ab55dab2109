//! The three fixed GraphQL documents issued by the client.
//!
//! Variables are passed through the request body rather than interpolated
//! into the document, so cursors and organization names never need escaping.
//! Each document selects the `rateLimit` envelope alongside its data so the
//! budget tracker can be refreshed from every response.

use serde_json::{Value, json};

/// Organization repositories, 100 per page.
const REPOSITORIES_QUERY: &str = "\
query OrganizationRepositories($org: String!, $after: String) {
  rateLimit {
    cost
    remaining
    resetAt
  }
  organization(login: $org) {
    repositories(first: 100, privacy: PUBLIC, after: $after) {
      pageInfo {
        hasNextPage
        endCursor
      }
      nodes {
        id
        name
        url
        isPrivate
        isArchived
        updatedAt
      }
    }
  }
}";

/// Pull requests with their first 100 reviews, 100 PRs per page, ordered
/// most-recently-updated first. The explicit `orderBy` is load-bearing:
/// early termination during a crawl assumes descending update time.
const PULL_REQUESTS_QUERY: &str = "\
query RepositoryPullRequests($owner: String!, $repo: String!, $after: String) {
  rateLimit {
    cost
    remaining
    resetAt
  }
  repository(owner: $owner, name: $repo) {
    pullRequests(
      first: 100
      states: [OPEN, CLOSED, MERGED]
      orderBy: {field: UPDATED_AT, direction: DESC}
      after: $after
    ) {
      pageInfo {
        hasNextPage
        endCursor
      }
      nodes {
        id
        number
        title
        updatedAt
        closedAt
        mergedAt
        author {
          login
        }
        additions
        deletions
        changedFiles
        commits {
          totalCount
        }
        reviews(first: 100) {
          nodes {
            id
            author {
              login
            }
            state
            submittedAt
          }
        }
      }
    }
  }
}";

/// Current rate-limit status, charged at zero cost by GitHub.
const RATE_LIMIT_QUERY: &str = "\
query RateLimitStatus {
  rateLimit {
    cost
    remaining
    resetAt
    limit
  }
}";

/// Builds the request body for the organization-repositories query.
#[must_use]
pub fn repositories_request(org: &str, after: Option<&str>) -> Value {
    json!({
        "query": REPOSITORIES_QUERY,
        "variables": {"org": org, "after": after},
    })
}

/// Builds the request body for the pull-requests-with-reviews query.
#[must_use]
pub fn pull_requests_request(owner: &str, repo: &str, after: Option<&str>) -> Value {
    json!({
        "query": PULL_REQUESTS_QUERY,
        "variables": {"owner": owner, "repo": repo, "after": after},
    })
}

/// Builds the request body for the rate-limit status query.
#[must_use]
pub fn rate_limit_request() -> Value {
    json!({"query": RATE_LIMIT_QUERY})
}
