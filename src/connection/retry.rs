//! # Reconnection Backoff Policy
//!
//! Pure delay computation for the reconnecting socket client: exponential
//! growth clamped at the configured maximum, with symmetric jitter so
//! clients that lost the same server do not retry in lockstep.

use rand::Rng;
use std::time::Duration;

/// First retry delay; doubles on each subsequent attempt
pub const BACKOFF_BASE_MS: u64 = 1000;

/// Backoff base for a given attempt count: `min(2^attempt * 1000ms, max)`
///
/// Saturates instead of overflowing for absurd attempt counts, so the
/// result is always clamped at `max_delay_ms`.
pub fn base_delay_ms(attempt: u32, max_delay_ms: u64) -> u64 {
    let doubling = match 1u64.checked_shl(attempt) {
        Some(factor) => factor,
        None => u64::MAX,
    };
    doubling.saturating_mul(BACKOFF_BASE_MS).min(max_delay_ms)
}

/// Apply symmetric jitter of +/-10% of the base value, uniformly distributed
pub fn apply_jitter<R: Rng>(base_ms: u64, rng: &mut R) -> u64 {
    let span = base_ms / 10;
    if span == 0 {
        return base_ms;
    }
    base_ms - span + rng.gen_range(0..=span * 2)
}

/// Jittered delay before the retry for `attempt`
pub fn jittered_delay(attempt: u32, max_delay: Duration) -> Duration {
    let base = base_delay_ms(attempt, max_delay.as_millis() as u64);
    Duration::from_millis(apply_jitter(base, &mut rand::thread_rng()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const MAX_DELAY_MS: u64 = 60_000;

    #[test]
    fn test_base_delay_doubles() {
        assert_eq!(base_delay_ms(0, MAX_DELAY_MS), 1000);
        assert_eq!(base_delay_ms(1, MAX_DELAY_MS), 2000);
        assert_eq!(base_delay_ms(2, MAX_DELAY_MS), 4000);
        assert_eq!(base_delay_ms(3, MAX_DELAY_MS), 8000);
    }

    #[test]
    fn test_base_delay_clamped_at_max() {
        assert_eq!(base_delay_ms(6, MAX_DELAY_MS), 60_000);
        assert_eq!(base_delay_ms(7, MAX_DELAY_MS), 60_000);
        assert_eq!(base_delay_ms(63, MAX_DELAY_MS), 60_000);
    }

    #[test]
    fn test_base_delay_monotonic_non_decreasing() {
        let mut previous = 0;
        for attempt in 0..70 {
            let delay = base_delay_ms(attempt, MAX_DELAY_MS);
            assert!(delay >= previous, "delay decreased at attempt {}", attempt);
            previous = delay;
        }
    }

    #[test]
    fn test_base_delay_saturates_on_huge_attempts() {
        // 2^attempt overflows u64 well before attempt 100; the clamp must hold
        assert_eq!(base_delay_ms(100, MAX_DELAY_MS), MAX_DELAY_MS);
        assert_eq!(base_delay_ms(u32::MAX, MAX_DELAY_MS), MAX_DELAY_MS);
    }

    #[test]
    fn test_jitter_within_ten_percent() {
        let mut rng = StdRng::seed_from_u64(42);
        for attempt in 0..8 {
            let base = base_delay_ms(attempt, MAX_DELAY_MS);
            for _ in 0..200 {
                let jittered = apply_jitter(base, &mut rng);
                assert!(jittered >= base - base / 10, "attempt {}: {} below bound", attempt, jittered);
                assert!(jittered <= base + base / 10, "attempt {}: {} above bound", attempt, jittered);
            }
        }
    }

    #[test]
    fn test_jitter_covers_both_directions() {
        let mut rng = StdRng::seed_from_u64(7);
        let base = 10_000;
        let samples: Vec<u64> = (0..500).map(|_| apply_jitter(base, &mut rng)).collect();
        assert!(samples.iter().any(|&sample| sample < base));
        assert!(samples.iter().any(|&sample| sample > base));
    }

    #[test]
    fn test_jittered_delay_respects_small_max() {
        // Small maximums keep test sessions fast; the jitter must not escape them
        let delay = jittered_delay(0, Duration::from_millis(20));
        assert!(delay <= Duration::from_millis(22));
    }
}
