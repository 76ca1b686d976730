use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Timing for [`wait_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Overall deadline.
    pub timeout: Duration,
    /// First sleep between attempts.
    pub period: Duration,
    /// Upper bound on any single sleep.
    pub max_period: Duration,
}

impl PollPolicy {
    pub fn new(timeout: Duration, period: Duration, max_period: Duration) -> Self {
        Self {
            timeout,
            period,
            max_period,
        }
    }

    pub fn from_secs(timeout: u64, period: u64, max_period: u64) -> Self {
        Self::new(
            Duration::from_secs(timeout),
            Duration::from_secs(period),
            Duration::from_secs(max_period),
        )
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_secs(900, 2, 5)
    }
}

/// Re-run `probe` until it reports `true` or `policy.timeout` elapses.
///
/// The sleep grows by half each round, capped at `max_period` and at the time
/// left before the deadline. A probe still running at the deadline is
/// dropped. Returns `false` on timeout; never errors.
pub async fn wait_until<F, Fut>(policy: &PollPolicy, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + policy.timeout;
    let max_period = policy.max_period.max(MIN_PERIOD);
    let mut period = policy.period.clamp(MIN_PERIOD, max_period);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match tokio::time::timeout_at(deadline, probe()).await {
            Ok(true) => {
                trace!(attempt, "poll satisfied");
                return true;
            }
            Ok(false) => {}
            Err(_) => {
                trace!(attempt, "probe still running at deadline");
                return false;
            }
        }

        let now = Instant::now();
        if now >= deadline {
            trace!(attempt, "poll timed out");
            return false;
        }

        tokio::time::sleep(period.min(deadline - now)).await;
        period = (period * 3 / 2).min(max_period);
    }
}
