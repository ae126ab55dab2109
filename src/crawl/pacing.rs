//! Request admission and inter-request pacing shared across crawl workers.
//!
//! Two independent controls live here. The admission semaphore caps how many
//! API requests are in flight at once, regardless of how many repository
//! workers exist. The pacer state enforces a minimum spacing between
//! consecutive requests anywhere in the system, scaled by a shared backoff
//! factor: the factor resets to 1 after each successful request and doubles
//! (capped at 60) whenever a secondary rate limit is observed, with
//! randomised jitter on the cooldown sleep so retries do not stampede.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::Instant;

use super::error::CrawlError;

/// Tunable knobs for [`RequestPacer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacerOptions {
    /// Maximum concurrent in-flight API requests.
    pub admission_limit: usize,
    /// Base spacing between consecutive requests.
    pub base_spacing: Duration,
    /// Floor applied to the scaled spacing.
    pub min_spacing: Duration,
    /// Cap on the shared backoff factor.
    pub max_backoff_factor: u32,
    /// Upper bound, in whole seconds, of the jitter added to a throttle
    /// cooldown.
    pub max_jitter_seconds: u64,
}

impl Default for PacerOptions {
    fn default() -> Self {
        Self {
            admission_limit: 10,
            base_spacing: Duration::from_secs(1),
            min_spacing: Duration::from_millis(100),
            max_backoff_factor: 60,
            max_jitter_seconds: 5,
        }
    }
}

#[derive(Debug)]
struct PacerState {
    backoff_factor: u32,
    last_request: Option<Instant>,
}

/// A held admission slot. Dropped once the request completes.
#[derive(Debug)]
pub struct RequestTicket<'pacer> {
    _permit: SemaphorePermit<'pacer>,
}

/// Admission limiter plus paced request spacing.
#[derive(Debug)]
pub struct RequestPacer {
    admission: Semaphore,
    state: Mutex<PacerState>,
    options: PacerOptions,
}

impl RequestPacer {
    /// Creates a pacer with the given options.
    #[must_use]
    pub fn new(options: PacerOptions) -> Self {
        Self {
            admission: Semaphore::new(options.admission_limit),
            state: Mutex::new(PacerState {
                backoff_factor: 1,
                last_request: None,
            }),
            options,
        }
    }

    /// Acquires an admission slot and serves the inter-request spacing
    /// sleep. The returned ticket must be held for the duration of the
    /// request.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Internal`] if the admission semaphore has been
    /// closed, which no code path does.
    pub async fn begin(&self) -> Result<RequestTicket<'_>, CrawlError> {
        let permit =
            self.admission
                .acquire()
                .await
                .map_err(|_closed| CrawlError::Internal {
                    message: "admission limiter closed".to_owned(),
                })?;

        if let Some(wait) = self.spacing_wait() {
            tokio::time::sleep(wait).await;
        }
        self.mark_request();

        Ok(RequestTicket { _permit: permit })
    }

    /// Resets the shared backoff factor after a successful request.
    pub fn note_success(&self) {
        let mut state = self.lock_state();
        state.backoff_factor = 1;
    }

    /// Doubles the shared backoff factor (capped) after a secondary
    /// rate-limit observation and sleeps the factor plus jitter.
    pub async fn note_throttled(&self) {
        let factor = {
            let mut state = self.lock_state();
            state.backoff_factor = state
                .backoff_factor
                .saturating_mul(2)
                .min(self.options.max_backoff_factor);
            state.backoff_factor
        };

        let jitter_seconds = rand::thread_rng().gen_range(0..=self.options.max_jitter_seconds);
        let cooldown = Duration::from_secs(u64::from(factor) + jitter_seconds);
        tracing::warn!(
            backoff_factor = factor,
            cooldown_seconds = cooldown.as_secs(),
            "secondary rate limit observed; backing off"
        );
        tokio::time::sleep(cooldown).await;
    }

    /// Current backoff factor, for tests and logging.
    #[must_use]
    pub fn backoff_factor(&self) -> u32 {
        self.lock_state().backoff_factor
    }

    fn spacing_wait(&self) -> Option<Duration> {
        let state = self.lock_state();
        let spacing = self
            .options
            .base_spacing
            .saturating_mul(state.backoff_factor)
            .max(self.options.min_spacing);
        let elapsed = state.last_request?.elapsed();
        (elapsed < spacing).then(|| spacing - elapsed)
    }

    fn mark_request(&self) {
        let mut state = self.lock_state();
        state.last_request = Some(Instant::now());
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PacerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{PacerOptions, RequestPacer};

    fn quick_options() -> PacerOptions {
        PacerOptions {
            admission_limit: 2,
            base_spacing: Duration::from_millis(10),
            min_spacing: Duration::from_millis(1),
            max_backoff_factor: 60,
            max_jitter_seconds: 0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn factor_doubles_on_throttle_and_caps_at_sixty() {
        let pacer = RequestPacer::new(quick_options());
        for _ in 0..8 {
            pacer.note_throttled().await;
        }
        assert_eq!(pacer.backoff_factor(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn factor_resets_after_a_successful_request() {
        let pacer = RequestPacer::new(quick_options());
        pacer.note_throttled().await;
        assert_eq!(pacer.backoff_factor(), 2);
        pacer.note_success();
        assert_eq!(pacer.backoff_factor(), 1);
    }

    #[tokio::test]
    async fn admission_limit_caps_concurrent_tickets() {
        let pacer = RequestPacer::new(quick_options());
        let first = pacer.begin().await.expect("first ticket");
        let second = pacer.begin().await.expect("second ticket");

        let third = tokio::time::timeout(Duration::from_millis(50), pacer.begin()).await;
        assert!(third.is_err(), "third ticket should block at the limit");

        drop(first);
        drop(second);
        let reopened = tokio::time::timeout(Duration::from_millis(500), pacer.begin()).await;
        assert!(reopened.is_ok(), "slot should free after tickets drop");
    }
}
