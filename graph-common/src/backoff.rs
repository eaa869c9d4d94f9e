use std::time::Duration;

use tokio_util::sync::CancellationToken;

const MAX_WAIT_ITERATIONS: usize = 50;
const DEFAULT_CAP: Duration = Duration::from_secs(10);

/// Exponential backoff with "full jitter": sleep for a random duration in
/// `[0, min(cap, base * 2^attempt)]`. Behaves well under contention and
/// avoids lockstep retries against the backend.
pub fn full_jitter(base: Duration, cap: Duration, attempt: u32) -> Duration {
    let base_ms = base.as_millis() as u64;
    let cap_ms = cap.as_millis() as u64;

    let pow = if attempt >= 63 {
        u64::MAX
    } else {
        1u64 << attempt
    };

    let exp_ms = base_ms.saturating_mul(pow);
    let upper = exp_ms.min(cap_ms).max(1);

    let jitter_ms = rand::random_range(0..=upper);
    Duration::from_millis(jitter_ms)
}

/// Sleeps through `n` backoff attempts (capped at [`DEFAULT_CAP`]), bailing
/// out early if `cancel` fires. Used by retry loops in the loading
/// strategies and the request coordinator.
pub async fn wait_with_backoff(
    cancel: &CancellationToken,
    n: u32,
    cap: Duration,
) -> Result<(), Cancelled> {
    let n = n.clamp(1, MAX_WAIT_ITERATIONS as u32);
    let base = Duration::from_millis(250);

    for attempt in 0..n {
        let delay = full_jitter(base, cap, attempt);
        tokio::select! {
            _ = cancel.cancelled() => return Err(Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }

    Ok(())
}

pub async fn wait(cancel: &CancellationToken, n: u32) -> Result<(), Cancelled> {
    wait_with_backoff(cancel, n, DEFAULT_CAP).await
}

/// Marker error returned when a wait was cut short by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "wait cancelled")
    }
}

impl std::error::Error for Cancelled {}
