use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::settings::RetryPolicy;

pub(crate) fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    if matches!(status.as_u16(), 503 | 529) {
        return true;
    }
    let lower = body.to_lowercase();
    [
        "rate limit",
        "rate_limit",
        "too many requests",
        "resource_exhausted",
        "quota",
        "overloaded",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();
    value.parse::<u64>().ok().map(Duration::from_secs)
}

/// Sleeps for `delay` (or the server's `Retry-After`, if longer) and returns
/// the delay to use for the next attempt.
pub(crate) async fn wait_with_backoff(
    provider: &str,
    attempt: usize,
    delay: Duration,
    retry_after: Option<Duration>,
    policy: &RetryPolicy,
) -> Duration {
    let wait = retry_after.map_or(delay, |server| server.max(delay));
    warn!(
        "{} rate limited; retrying in {:.1}s (attempt {}/{})",
        provider,
        wait.as_secs_f32(),
        attempt,
        policy.max_retries
    );
    sleep(wait).await;
    next_delay(delay, policy)
}

pub(crate) fn next_delay(current: Duration, policy: &RetryPolicy) -> Duration {
    current
        .saturating_mul(2)
        .max(policy.base_delay)
        .min(policy.max_delay)
}
