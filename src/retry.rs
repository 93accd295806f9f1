//! Declarative retry policy shared by the backend adapters and the publish
//! pipeline's branch-readiness wait.

use std::time::Duration;

/// How the wait between attempts grows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay every attempt (used by read-only readiness polling)
    Fixed(Duration),
    /// `base * attempt`, clamped to `max`
    Linear { base: Duration, max: Duration },
}

/// A bounded retry loop described as data.
///
/// `attempt` numbers are 1-based; an exhausted policy means `max_attempts`
/// calls were made in total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    retryable: &'static [u16],
}

impl RetryPolicy {
    /// Policy for generation backends: only 429 is transient, linear backoff.
    pub fn rate_limit(max_attempts: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear { base, max },
            retryable: &[429],
        }
    }

    /// Policy for the branch-readiness wait after repository creation: the
    /// ref read 404s until the host finishes initializing, so 404 is the one
    /// retryable status, on a short fixed cadence.
    pub fn branch_readiness() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_secs(2)),
            retryable: &[404],
        }
    }

    /// Whether a status code is worth another attempt under this policy
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable.contains(&status)
    }

    /// Delay before the next attempt. A server-supplied hint wins over the
    /// computed backoff; both are clamped to the policy maximum.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let cap = match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Linear { max, .. } => max,
        };
        if let Some(hinted) = hint {
            return hinted.min(cap);
        }
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Linear { base, max } => base.saturating_mul(attempt.max(1)).min(max),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::rate_limit(3, Duration::from_secs(2), Duration::from_secs(30))
    }
}
