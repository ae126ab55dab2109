//! Shared test doubles and fixtures for orchestration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use magpie::github::models::{
    Actor, CommitCount, PageInfo, PullRequestNode, PullRequestPage, RateLimitStatus,
    RepositoryNode, RepositoryPage, ReviewConnection, ReviewNode,
};
use magpie::{CrawlGateway, GithubError, PageFetch};

/// Scripted gateway whose page responses are dequeued in order.
///
/// Repository pages are shared across calls; pull request pages are keyed by
/// repository name. A repository with no script receives a single empty
/// final page. Call counts are recorded so tests can assert that early
/// termination stops issuing page requests.
#[derive(Default)]
pub struct ScriptedGateway {
    repository_pages: Mutex<VecDeque<Result<PageFetch<RepositoryPage>, GithubError>>>,
    pull_request_pages: Mutex<HashMap<String, VecDeque<Result<PageFetch<PullRequestPage>, GithubError>>>>,
    pull_request_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn push_repository_page(&self, page: Result<PageFetch<RepositoryPage>, GithubError>) {
        self.repository_pages
            .lock()
            .expect("repository script lock")
            .push_back(page);
    }

    pub fn push_pull_request_page(
        &self,
        repo: &str,
        page: Result<PageFetch<PullRequestPage>, GithubError>,
    ) {
        self.pull_request_pages
            .lock()
            .expect("pull request script lock")
            .entry(repo.to_owned())
            .or_default()
            .push_back(page);
    }

    pub fn pull_request_calls(&self) -> usize {
        self.pull_request_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CrawlGateway for ScriptedGateway {
    async fn organization_repositories_page(
        &self,
        _org: &str,
        _after: Option<String>,
    ) -> Result<PageFetch<RepositoryPage>, GithubError> {
        self.repository_pages
            .lock()
            .expect("repository script lock")
            .pop_front()
            .unwrap_or_else(|| Ok(PageFetch::Page(empty_page())))
    }

    async fn pull_requests_page(
        &self,
        _owner: &str,
        repo: &str,
        _after: Option<String>,
    ) -> Result<PageFetch<PullRequestPage>, GithubError> {
        self.pull_request_calls.fetch_add(1, Ordering::SeqCst);
        self.pull_request_pages
            .lock()
            .expect("pull request script lock")
            .get_mut(repo)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(PageFetch::Page(empty_page())))
    }

    async fn rate_limit_status(&self) -> Result<RateLimitStatus, GithubError> {
        Ok(RateLimitStatus {
            cost: 0,
            remaining: 5_000,
            reset_at: Utc::now(),
            limit: 5_000,
        })
    }
}

fn empty_page<T>() -> magpie::github::models::Connection<T> {
    magpie::github::models::Connection {
        page_info: PageInfo {
            has_next_page: false,
            end_cursor: None,
        },
        nodes: Vec::new(),
    }
}

/// Builds a repository node for a public, unarchived repository.
pub fn repository_node(id: &str, name: &str, updated_at: DateTime<Utc>) -> RepositoryNode {
    RepositoryNode {
        id: id.to_owned(),
        name: name.to_owned(),
        url: format!("https://github.com/acme/{name}"),
        is_private: false,
        is_archived: false,
        updated_at: Some(updated_at),
    }
}

/// Builds a page wrapping the given nodes.
pub fn page<T>(nodes: Vec<T>, next_cursor: Option<&str>) -> magpie::github::models::Connection<T> {
    magpie::github::models::Connection {
        page_info: PageInfo {
            has_next_page: next_cursor.is_some(),
            end_cursor: next_cursor.map(str::to_owned),
        },
        nodes,
    }
}

/// Builds a pull request node with a single review by the same author.
pub fn pull_request_node(
    id: &str,
    number: i64,
    author: &str,
    updated_at: DateTime<Utc>,
) -> PullRequestNode {
    PullRequestNode {
        id: id.to_owned(),
        number,
        title: Some(format!("change {number}")),
        updated_at,
        closed_at: None,
        merged_at: None,
        author: Some(Actor {
            login: author.to_owned(),
        }),
        additions: 10,
        deletions: 2,
        changed_files: 1,
        commits: CommitCount { total_count: 3 },
        reviews: ReviewConnection {
            nodes: vec![ReviewNode {
                id: format!("{id}-review"),
                author: Some(Actor {
                    login: author.to_owned(),
                }),
                state: Some("APPROVED".to_owned()),
                submitted_at: Some(updated_at),
            }],
        },
    }
}
