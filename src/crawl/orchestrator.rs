//! Crawl orchestration across an organization's repositories.
//!
//! A run proceeds in three phases. Discovery paginates the organization's
//! repositories and upserts every node; it is the only phase whose failure
//! aborts the run. Differential selection then picks the repositories whose
//! upstream update time has moved past their watermark (or that have never
//! been crawled). Finally the selected repositories are crawled
//! concurrently, bounded by a worker semaphore, with each worker paginating
//! pull requests newest-update-first and stopping early once it reaches
//! results older than the watermark.
//!
//! Failure isolation is per repository: a failed crawl is logged, leaves the
//! previous watermark untouched, and never aborts sibling crawls.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::github::models::{Actor, PullRequestNode, RepositoryNode};
use crate::github::{CrawlGateway, PageFetch};
use crate::storage::{
    CrawlStore, PullRequestUpsert, RepositoryRecord, RepositoryUpsert, ReviewUpsert, StorageError,
};

use super::error::CrawlError;
use super::pacing::RequestPacer;

/// Tunable knobs for a crawl run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Organization whose repositories are mirrored.
    pub organization: String,
    /// Maximum repositories crawled concurrently.
    pub worker_limit: usize,
    /// Delay between successive pages of one repository's pull requests.
    pub page_delay: Duration,
    /// Grace period granted to outstanding workers when the run winds down.
    pub shutdown_grace: Duration,
}

impl CrawlOptions {
    /// Creates options for the given organization with default limits.
    #[must_use]
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            worker_limit: 10,
            page_delay: Duration::from_millis(500),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

/// Per-repository outcome counts for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Repositories selected for crawling in phase 2.
    pub selected: u64,
    /// Crawls that completed without error. A crawl that hit a degraded
    /// page completes but leaves its watermark untouched.
    pub succeeded: u64,
    /// Crawls that failed and left their watermark untouched.
    pub failed: u64,
}

/// Decides whether a repository needs crawling.
///
/// A repository is selected when it has never completed a crawl, or when its
/// upstream update time has moved past the watermark. An unknown upstream
/// update time fails open: the repository is selected rather than silently
/// skipped.
#[must_use]
pub fn needs_crawl(repository: &RepositoryRecord) -> bool {
    let Some(watermark) = repository.last_successful_run else {
        return true;
    };
    repository
        .github_last_updated_at
        .map_or(true, |upstream| upstream > watermark)
}

/// Drives discovery, selection, and the bounded concurrent crawl.
pub struct CrawlOrchestrator<G, S> {
    gateway: Arc<G>,
    store: Arc<S>,
    pacer: Arc<RequestPacer>,
    user_creation: Arc<Mutex<()>>,
    options: CrawlOptions,
}

impl<G, S> CrawlOrchestrator<G, S>
where
    G: CrawlGateway + 'static,
    S: CrawlStore + 'static,
{
    /// Creates an orchestrator over the given gateway, store, and pacer.
    ///
    /// The user-creation critical section is constructed here, once, with
    /// orchestrator lifetime.
    #[must_use]
    pub fn new(
        gateway: Arc<G>,
        store: Arc<S>,
        pacer: Arc<RequestPacer>,
        options: CrawlOptions,
    ) -> Self {
        Self {
            gateway,
            store,
            pacer,
            user_creation: Arc::new(Mutex::new(())),
            options,
        }
    }

    /// Runs a full crawl: discovery, selection, concurrent per-repository
    /// crawls.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Discovery`] when phase 1 fails, or a storage
    /// error when the repository list cannot be read. Per-repository crawl
    /// failures are absorbed into the summary instead of propagating.
    pub async fn run(&self) -> Result<CrawlSummary, CrawlError> {
        tracing::info!(
            organization = %self.options.organization,
            workers = self.options.worker_limit,
            "starting crawl"
        );

        self.discover_repositories().await?;

        let repositories = self.store.list_repositories()?;
        let total = repositories.len();
        let selected: Vec<RepositoryRecord> =
            repositories.into_iter().filter(needs_crawl).collect();
        tracing::info!(
            total,
            selected = selected.len(),
            "differential selection complete"
        );

        let summary = self.crawl_selected(selected).await;
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "crawl finished"
        );
        Ok(summary)
    }

    /// Phase 1: paginate the organization's repositories, upserting every
    /// node before the next page is requested.
    async fn discover_repositories(&self) -> Result<(), CrawlError> {
        let mut cursor: Option<String> = None;
        loop {
            let ticket = self.pacer.begin().await?;
            let fetched = self
                .gateway
                .organization_repositories_page(&self.options.organization, cursor.clone())
                .await;
            drop(ticket);

            let page = match fetched {
                Ok(PageFetch::Page(page)) => {
                    self.pacer.note_success();
                    page
                }
                Ok(PageFetch::RetryLater) => {
                    self.pacer.note_throttled().await;
                    continue;
                }
                Ok(PageFetch::NoData) => {
                    tracing::warn!("repository page produced no data; ending discovery");
                    return Ok(());
                }
                Err(source) => return Err(CrawlError::Discovery { source }),
            };

            for node in &page.nodes {
                self.store.upsert_repository(&repository_upsert(node))?;
            }
            tracing::debug!(
                batch = page.nodes.len(),
                has_next = page.page_info.has_next_page,
                "repository page stored"
            );

            if !page.page_info.has_next_page || page.page_info.end_cursor.is_none() {
                return Ok(());
            }
            cursor = page.page_info.end_cursor;
        }
    }

    /// Phase 3: crawl the selected repositories under the worker limit.
    async fn crawl_selected(&self, selected: Vec<RepositoryRecord>) -> CrawlSummary {
        let mut summary = CrawlSummary {
            selected: u64::try_from(selected.len()).unwrap_or(u64::MAX),
            ..CrawlSummary::default()
        };
        let workers = Arc::new(Semaphore::new(self.options.worker_limit));
        let mut tasks: JoinSet<(String, Result<(), CrawlError>)> = JoinSet::new();

        for repository in selected {
            let crawler = RepositoryCrawler {
                gateway: Arc::clone(&self.gateway),
                store: Arc::clone(&self.store),
                pacer: Arc::clone(&self.pacer),
                user_creation: Arc::clone(&self.user_creation),
                organization: self.options.organization.clone(),
                page_delay: self.options.page_delay,
            };
            let workers_for_task = Arc::clone(&workers);
            tasks.spawn(async move {
                let name = repository.name.clone();
                let admitted = workers_for_task.acquire().await;
                let result = match admitted {
                    Ok(_permit) => crawler.crawl(repository).await,
                    Err(_closed) => Err(CrawlError::Internal {
                        message: "worker limiter closed".to_owned(),
                    }),
                };
                (name, result)
            });
        }

        // Once a crawl has started nothing cancels it mid-flight: every
        // outstanding worker is awaited to completion, however long its
        // cooldowns take.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    summary.succeeded += 1;
                    tracing::info!(repository = %name, "repository crawl succeeded");
                }
                Ok((name, Err(error))) => {
                    summary.failed += 1;
                    tracing::error!(repository = %name, %error, "repository crawl failed");
                }
                Err(join_error) => {
                    summary.failed += 1;
                    tracing::error!(%join_error, "repository crawl task aborted");
                }
            }
        }

        // Post-completion teardown of the drained set, bounded by the grace.
        let _wound_down =
            tokio::time::timeout(self.options.shutdown_grace, tasks.shutdown()).await;

        summary
    }
}

fn repository_upsert(node: &RepositoryNode) -> RepositoryUpsert<'_> {
    RepositoryUpsert {
        github_id: node.id.as_str(),
        name: node.name.as_str(),
        url: node.url.as_str(),
        private: node.is_private,
        archived: node.is_archived,
        github_last_updated_at: node.updated_at,
    }
}

/// One repository's crawl, run by a worker task.
struct RepositoryCrawler<G, S> {
    gateway: Arc<G>,
    store: Arc<S>,
    pacer: Arc<RequestPacer>,
    user_creation: Arc<Mutex<()>>,
    organization: String,
    page_delay: Duration,
}

impl<G, S> RepositoryCrawler<G, S>
where
    G: CrawlGateway,
    S: CrawlStore,
{
    /// Paginates one repository's pull requests, applying early termination
    /// against the watermark, and advances the watermark only when the whole
    /// crawl completed without an unrecovered error and without a degraded
    /// page.
    async fn crawl(&self, repository: RepositoryRecord) -> Result<(), CrawlError> {
        let started_at = Utc::now();
        let watermark = repository.last_successful_run;
        let mut cursor: Option<String> = None;
        let mut stored = 0_u64;
        let mut degraded = false;

        'pages: loop {
            let ticket = self.pacer.begin().await?;
            let fetched = self
                .gateway
                .pull_requests_page(&self.organization, &repository.name, cursor.clone())
                .await;
            drop(ticket);

            let page = match fetched {
                Ok(PageFetch::Page(page)) => {
                    self.pacer.note_success();
                    page
                }
                Ok(PageFetch::RetryLater) => {
                    self.pacer.note_throttled().await;
                    continue;
                }
                Ok(PageFetch::NoData) => {
                    // Results this page would have carried were never seen,
                    // so the watermark must not move past them.
                    degraded = true;
                    tracing::warn!(
                        repository = %repository.name,
                        "page degraded to no data; watermark will not advance"
                    );
                    break 'pages;
                }
                Err(error) => return Err(error.into()),
            };

            for node in &page.nodes {
                // Pages arrive newest-update-first, so the first node at or
                // below the watermark means everything after it is already
                // stored.
                if watermark.is_some_and(|mark| node.updated_at <= mark) {
                    tracing::debug!(
                        repository = %repository.name,
                        stored,
                        "early termination: reached already-synced results"
                    );
                    break 'pages;
                }
                self.store_pull_request(&repository, node).await?;
                stored += 1;
            }

            if !page.page_info.has_next_page || page.page_info.end_cursor.is_none() {
                break 'pages;
            }
            cursor = page.page_info.end_cursor;
            tokio::time::sleep(self.page_delay).await;
        }

        if degraded {
            return Ok(());
        }
        self.store
            .update_watermark(&repository.github_id, started_at)?;
        tracing::debug!(
            repository = %repository.name,
            stored,
            "watermark advanced"
        );
        Ok(())
    }

    /// Upserts one PR node and its nested reviews.
    async fn store_pull_request(
        &self,
        repository: &RepositoryRecord,
        node: &PullRequestNode,
    ) -> Result<(), CrawlError> {
        let author_id = self.resolve_author(node.author.as_ref()).await?;
        let pull_request_id = self.store.upsert_pull_request(&PullRequestUpsert {
            github_id: node.id.as_str(),
            repository_id: repository.id,
            author_id,
            number: node.number,
            title: node.title.as_deref(),
            updated_at_github: node.updated_at,
            closed_at: node.closed_at,
            merged_at: node.merged_at,
            additions: node.additions,
            deletions: node.deletions,
            changed_files: node.changed_files,
            commits_count: node.commits.total_count,
        })?;

        for review in &node.reviews.nodes {
            let review_author_id = self.resolve_author(review.author.as_ref()).await?;
            self.store.upsert_review(&ReviewUpsert {
                github_id: review.id.as_str(),
                pull_request_id,
                author_id: review_author_id,
                state: review.state.as_deref(),
                submitted_at: review.submitted_at,
            })?;
        }
        Ok(())
    }

    /// Resolves an author login to a user row id, creating the user inside
    /// the shared critical section when absent.
    ///
    /// A uniqueness violation from a concurrent creator is benign; the
    /// now-existing row is re-read and used.
    async fn resolve_author(&self, author: Option<&Actor>) -> Result<Option<i64>, CrawlError> {
        let Some(actor) = author else {
            return Ok(None);
        };
        let login = actor.login.as_str();

        if let Some(user) = self.store.find_user(login)? {
            return Ok(Some(user.id));
        }

        let _guard = self.user_creation.lock().await;
        if let Some(user) = self.store.find_user(login)? {
            return Ok(Some(user.id));
        }
        match self.store.create_user(login) {
            Ok(user) => Ok(Some(user.id)),
            Err(StorageError::UniqueViolation { .. }) => self
                .store
                .find_user(login)?
                .map(|user| Some(user.id))
                .ok_or_else(|| CrawlError::Internal {
                    message: format!("user {login} vanished after uniqueness conflict"),
                }),
            Err(error) => Err(error.into()),
        }
    }
}
