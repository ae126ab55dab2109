//! Error types for crawl orchestration.

use thiserror::Error;

use crate::github::GithubError;
use crate::storage::StorageError;

/// Errors surfaced while orchestrating a crawl run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CrawlError {
    /// Repository discovery (phase 1) failed. Fatal to the whole run: no
    /// repository list exists without it.
    #[error("repository discovery failed: {source}")]
    Discovery {
        /// Underlying client failure.
        source: GithubError,
    },

    /// A client-level failure during a repository's crawl.
    #[error(transparent)]
    Github(#[from] GithubError),

    /// A storage failure during a crawl.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// An invariant the orchestrator relies on did not hold.
    #[error("crawl internal error: {message}")]
    Internal {
        /// Description of the broken invariant.
        message: String,
    },
}
