use std::{future::Future, time::Duration};

use mosaic_config::PollConfig;

use crate::error::{ProviderError, Result};

/// Fixed-interval polling bounded by an attempt count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_attempts: 120,
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &PollConfig) -> anyhow::Result<Self> {
        Ok(Self {
            interval: config.interval_duration()?,
            max_attempts: config.max_attempts,
        })
    }

    /// Longest time a job may run before it is declared timed out
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Result of a single status check
#[derive(Debug)]
pub enum PollStatus<T> {
    /// Job has not reached a terminal state yet
    Pending,
    /// Job finished; carries its output
    Done(T),
}

/// Check a job until it reports [`PollStatus::Done`]
///
/// Each attempt waits one interval before calling `check`. An error from
/// `check` ends polling immediately; running out of attempts yields
/// [`ProviderError::Timeout`].
pub async fn poll_until<T, F, Fut>(policy: PollPolicy, mut check: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PollStatus<T>>>,
{
    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;

        match check(attempt).await? {
            PollStatus::Done(value) => return Ok(value),
            PollStatus::Pending => {
                tracing::trace!(attempt, "job still pending");
            }
        }
    }

    Err(ProviderError::Timeout {
        attempts: policy.max_attempts,
    })
}
