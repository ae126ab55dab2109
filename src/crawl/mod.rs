//! Crawl orchestration: discovery, differential selection, and bounded
//! concurrent per-repository crawls.

mod error;
mod orchestrator;
mod pacing;

pub use error::CrawlError;
pub use orchestrator::{CrawlOptions, CrawlOrchestrator, CrawlSummary, needs_crawl};
pub use pacing::{PacerOptions, RequestPacer, RequestTicket};
