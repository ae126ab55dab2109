//! Primary rate-limit budget tracking for the GraphQL API.
//!
//! GitHub's GraphQL API charges a point cost per query against an hourly
//! budget and reports the charge in a `rateLimit` envelope on every
//! response. `RateLimitBudget` mirrors that envelope locally so the client
//! can block *before* issuing a request that would overdraw the budget,
//! instead of discovering the overdraft as an error.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

use super::models::RateLimitEnvelope;

/// Points assumed available after a budget-exhaustion wait. Matches the
/// standard GraphQL budget for authenticated tokens.
pub const ASSUMED_FULL_BUDGET: u32 = 5_000;

/// Remaining-point floor below which the client stops issuing requests.
pub const SAFETY_THRESHOLD: u32 = 50;

/// Extra seconds slept past the advertised reset to absorb clock skew.
pub const RESET_MARGIN_SECONDS: i64 = 60;

/// Locally tracked view of the primary rate-limit budget.
///
/// Overwritten wholesale from each response envelope; after a
/// budget-exhaustion wait it is reset to an assumed-full budget rather than
/// re-queried, saving a round-trip whose only purpose would be to confirm
/// the reset happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitBudget {
    remaining: u32,
    reset_at: DateTime<Utc>,
    last_cost: u32,
}

impl RateLimitBudget {
    /// Creates a tracker assuming a full, untouched budget.
    #[must_use]
    pub fn assume_full(now: DateTime<Utc>) -> Self {
        Self {
            remaining: ASSUMED_FULL_BUDGET,
            reset_at: now + ChronoDuration::hours(1),
            last_cost: 0,
        }
    }

    /// Points remaining in the current window, as last reported.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    /// When the current window resets, as last reported.
    #[must_use]
    pub const fn reset_at(&self) -> DateTime<Utc> {
        self.reset_at
    }

    /// Cost of the most recent query.
    #[must_use]
    pub const fn last_cost(&self) -> u32 {
        self.last_cost
    }

    /// Overwrites the tracker from a response envelope. Last writer wins;
    /// calls are already serialised by the client's critical section.
    pub const fn record(&mut self, envelope: &RateLimitEnvelope) {
        self.remaining = envelope.remaining;
        self.reset_at = envelope.reset_at;
        self.last_cost = envelope.cost;
    }

    /// How long the next request must wait before it may proceed.
    ///
    /// Returns `None` when the budget is above the safety threshold.
    /// Otherwise returns the time until `reset_at` plus a fixed margin,
    /// clamped at zero when the reset has already passed.
    #[must_use]
    pub fn gate_wait(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.remaining > SAFETY_THRESHOLD {
            return None;
        }
        let until_reset = self.reset_at + ChronoDuration::seconds(RESET_MARGIN_SECONDS) - now;
        Some(until_reset.to_std().unwrap_or(Duration::ZERO))
    }

    /// Resets to an assumed-full budget after a gate wait completes.
    pub fn reset_after_wait(&mut self, now: DateTime<Utc>) {
        self.remaining = ASSUMED_FULL_BUDGET;
        self.reset_at = now + ChronoDuration::hours(1);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;

    use super::{ASSUMED_FULL_BUDGET, RateLimitBudget, SAFETY_THRESHOLD};
    use crate::github::models::RateLimitEnvelope;

    #[test]
    fn gate_is_open_above_the_safety_threshold() {
        let now = Utc::now();
        let budget = RateLimitBudget::assume_full(now);
        assert_eq!(budget.gate_wait(now), None);
    }

    #[test]
    fn gate_blocks_until_reset_plus_margin_when_low() {
        let now = Utc::now();
        let mut budget = RateLimitBudget::assume_full(now);
        budget.record(&RateLimitEnvelope {
            cost: 1,
            remaining: 10,
            reset_at: now + ChronoDuration::seconds(120),
        });

        let wait = budget.gate_wait(now).expect("gate should block at 10 <= 50");
        assert_eq!(wait, Duration::from_secs(180));
    }

    #[test]
    fn gate_blocks_at_exactly_the_threshold() {
        let now = Utc::now();
        let mut budget = RateLimitBudget::assume_full(now);
        budget.record(&RateLimitEnvelope {
            cost: 1,
            remaining: SAFETY_THRESHOLD,
            reset_at: now,
        });
        assert!(budget.gate_wait(now).is_some());
    }

    #[test]
    fn gate_wait_clamps_to_zero_after_reset_passed() {
        let now = Utc::now();
        let mut budget = RateLimitBudget::assume_full(now);
        budget.record(&RateLimitEnvelope {
            cost: 1,
            remaining: 0,
            reset_at: now - ChronoDuration::seconds(3_600),
        });
        assert_eq!(budget.gate_wait(now), Some(Duration::ZERO));
    }

    #[test]
    fn reset_after_wait_restores_the_assumed_full_budget() {
        let now = Utc::now();
        let mut budget = RateLimitBudget::assume_full(now);
        budget.record(&RateLimitEnvelope {
            cost: 42,
            remaining: 3,
            reset_at: now,
        });

        budget.reset_after_wait(now);
        assert_eq!(budget.remaining(), ASSUMED_FULL_BUDGET);
        assert_eq!(budget.gate_wait(now), None);
        // The last observed cost is informational and survives the reset.
        assert_eq!(budget.last_cost(), 42);
    }
}
