use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::RetryPolicy;
use crate::clock::Clock;

/// Configured shape of a default retry policy.
///
/// Unlike [`RetryPolicy`], which holds an absolute expiry, settings hold a
/// relative time-to-live and are turned into a policy when a bus is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub retries: u32,
    pub ttl_secs: i64,
}

impl RetrySettings {
    pub const DEFAULT_RETRIES: u32 = 5;
    pub const DEFAULT_TTL_SECS: i64 = 24 * 60 * 60;

    pub fn new(retries: u32, ttl: Duration) -> Self {
        Self {
            retries,
            ttl_secs: ttl.num_seconds(),
        }
    }

    /// `ttl_secs` as a duration, saturating where it exceeds what
    /// [`Duration`] can hold.
    pub fn ttl(&self) -> Duration {
        Duration::try_seconds(self.ttl_secs).unwrap_or(if self.ttl_secs < 0 {
            Duration::MIN
        } else {
            Duration::MAX
        })
    }

    pub fn policy(&self, clock: &dyn Clock) -> RetryPolicy {
        RetryPolicy::with_clock(self.retries, self.ttl(), clock)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            retries: Self::DEFAULT_RETRIES,
            ttl_secs: Self::DEFAULT_TTL_SECS,
        }
    }
}
