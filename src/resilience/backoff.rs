//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::BackoffProperties;

/// Delay before retry number `attempt` (1-based); zero when backoff is off.
pub fn calculate_backoff(attempt: u32, backoff: &BackoffProperties) -> Duration {
    if attempt == 0 || !backoff.enabled {
        return Duration::ZERO;
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = backoff.min_backoff_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(backoff.max_backoff_ms);

    // Jitter adds up to `jitter * delay`, still capped at the maximum.
    let jitter_range = (capped_delay as f64 * backoff.jitter.clamp(0.0, 1.0)) as u64;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis((capped_delay + jitter).min(backoff.max_backoff_ms))
}
