use std::{future::Future, time::Duration};

use common::error::AppError;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Interval and overall deadline for waiting on a remote computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSettings {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn from_config_values(interval_ms: u64, timeout_secs: u64) -> Self {
        Self::new(
            Duration::from_millis(interval_ms),
            Duration::from_secs(timeout_secs),
        )
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(120))
    }
}

pub enum PollOutcome<T> {
    Pending,
    Ready(T),
}

/// Calls `probe` every `settings.interval` until it reports `Ready`.
///
/// Probe errors are returned as is. Once `settings.timeout` has elapsed the
/// wait is abandoned with `AppError::Timeout`, even mid-probe.
pub async fn poll_until<T, F, Fut>(
    settings: &PollSettings,
    label: &str,
    mut probe: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollOutcome<T>, AppError>>,
{
    let interval = settings.interval;
    let wait = async {
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            if let PollOutcome::Ready(value) = probe().await? {
                debug!(label, attempts, "remote computation reached a final state");
                return Ok::<T, AppError>(value);
            }
            sleep(interval).await;
        }
    };

    match timeout(settings.timeout, wait).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(format!(
            "{label} did not finish within {}s",
            settings.timeout.as_secs_f64()
        ))),
    }
}
