//! Full-jitter exponential backoff.

use std::time::Duration;

use rand::Rng;

/// Upper bound of the jitter window for `attempt`:
/// `min(max_delay, base_delay * 2^attempt)`, saturating.
#[must_use]
pub fn backoff_cap(attempt: u32, base_delay: Duration, max_delay: Duration) -> Duration {
    let base_ms = u64::try_from(base_delay.as_millis()).unwrap_or(u64::MAX);
    let max_ms = u64::try_from(max_delay.as_millis()).unwrap_or(u64::MAX);
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
}

/// Delay before retry `attempt`.
///
/// A positive `retry_after` is returned verbatim; otherwise the delay is drawn
/// uniformly from `[0, backoff_cap(attempt)]`.
#[must_use]
pub fn full_jitter(
    attempt: u32,
    retry_after: Option<Duration>,
    base_delay: Duration,
    max_delay: Duration,
) -> Duration {
    if let Some(explicit) = retry_after.filter(|d| !d.is_zero()) {
        return explicit;
    }
    let cap = u64::try_from(backoff_cap(attempt, base_delay, max_delay).as_millis())
        .unwrap_or(u64::MAX);
    Duration::from_millis(rand::thread_rng().gen_range(0..=cap))
}
