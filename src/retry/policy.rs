use crate::config::RetryConfig;
use crate::retry::FailureKind;
use std::time::Duration;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the given delay.
    Retry(Duration),
    /// Stop; the failure becomes terminal.
    GiveUp,
}

/// Exponential backoff policy with caps.
///
/// The same policy is applied to the fetch and the analysis stage, each with
/// its own attempt counter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts per stage (including the first).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on computed backoff delays.
    pub max_delay: Duration,
    /// Randomize computed delays within [delay/2, delay].
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_millis),
            max_delay: Duration::from_millis(config.max_delay_millis),
            jitter: config.jitter,
        }
    }

    /// Decide what to do after `attempt` failed with `kind`.
    ///
    /// `attempt` is 1-based (1 = first attempt). A server-supplied
    /// `retry_after` replaces the computed backoff and is not jittered.
    pub fn decide(
        &self,
        attempt: u32,
        kind: FailureKind,
        retry_after: Option<Duration>,
    ) -> RetryDecision {
        if !kind.is_retryable() || attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }

        if let Some(delay) = retry_after {
            return RetryDecision::Retry(delay);
        }

        let delay = self.backoff(attempt);
        if self.jitter {
            RetryDecision::Retry(jittered(delay))
        } else {
            RetryDecision::Retry(delay)
        }
    }

    /// `base * 2^(attempt-1)`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(exp).min(self.max_delay)
    }
}

fn jittered(delay: Duration) -> Duration {
    let millis = delay.as_millis() as u64;
    if millis < 2 {
        return delay;
    }
    let half = millis / 2;
    Duration::from_millis(half + fastrand::u64(0..=millis - half))
}
