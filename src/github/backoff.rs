//! Retry ladder shared by every transport-level fault class.
//!
//! The ladder is a bounded exponential backoff: attempt `k` (1-based) sleeps
//! `min(base * 2^(k-1), cap)`. Keeping the delay computation pure makes the
//! ladder inspectable in tests without any IO.

use std::time::Duration;

/// Maximum attempts before a fault class reaches its terminal behaviour.
pub const MAX_ATTEMPTS: u32 = 10;

/// Base delay for the first retry.
pub const BASE_DELAY: Duration = Duration::from_secs(3);

/// Ceiling applied to the exponential delay.
pub const CAP_DELAY: Duration = Duration::from_secs(300);

/// Delay to sleep before retrying after failed attempt `attempt` (1-based).
///
/// Attempt numbers beyond the shift range saturate at `cap`.
#[must_use]
pub fn retry_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let factor = 1_u32 << exponent;
    base.saturating_mul(factor).min(cap)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::{BASE_DELAY, CAP_DELAY, MAX_ATTEMPTS, retry_delay};

    #[rstest]
    #[case(1, 3)]
    #[case(2, 6)]
    #[case(3, 12)]
    #[case(4, 24)]
    #[case(5, 48)]
    #[case(6, 96)]
    #[case(7, 192)]
    #[case(8, 300)]
    #[case(9, 300)]
    #[case(10, 300)]
    fn ladder_doubles_from_base_and_caps_at_five_minutes(
        #[case] attempt: u32,
        #[case] expected_seconds: u64,
    ) {
        assert_eq!(
            retry_delay(attempt, BASE_DELAY, CAP_DELAY),
            Duration::from_secs(expected_seconds),
        );
    }

    #[test]
    fn ladder_covers_exactly_ten_attempts() {
        assert_eq!(MAX_ATTEMPTS, 10);
    }

    #[test]
    fn oversized_attempt_numbers_saturate_at_the_cap() {
        assert_eq!(retry_delay(u32::MAX, BASE_DELAY, CAP_DELAY), CAP_DELAY);
    }
}
