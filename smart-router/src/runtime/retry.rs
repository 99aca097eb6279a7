//! Retry policy and exponential backoff for broker operations.

use std::time::Duration;

const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(50);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(2);
const DEFAULT_PUBLISH_ATTEMPTS: u32 = 5;

/// How broker operations are retried while the broker is unavailable.
///
/// Queue binding retries without limit for as long as the connection lives;
/// publishing gives up after `publish_attempts` tries.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub publish_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            publish_attempts: DEFAULT_PUBLISH_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub(crate) fn backoff(&self) -> Backoff {
        Backoff {
            next: self.initial_backoff,
            max: self.max_backoff.max(self.initial_backoff),
        }
    }
}

/// Doubling delay sequence capped at the policy maximum.
#[derive(Debug)]
pub(crate) struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }
}
