use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};

/// `9999-12-31T23:59:59Z`, the last instant with a four-digit RFC 3339 year.
const LATEST_EXPIRY_SECS: i64 = 253_402_300_799;
/// `0000-01-01T00:00:00Z`.
const EARLIEST_EXPIRY_SECS: i64 = -62_167_219_200;

fn expiry_bound(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(if secs < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Immutable retry budget: how many redeliveries remain and the absolute
/// instant after which none are attempted.
///
/// The serde form doubles as the persisted retry-policy snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    retries: u32,
    expiry: DateTime<Utc>,
}

impl RetryPolicy {
    /// Policy expiring `ttl` from now on the wall clock.
    ///
    /// A negative `ttl` yields an already-expired policy.
    pub fn new(retries: u32, ttl: Duration) -> Self {
        Self::with_clock(retries, ttl, &SystemClock)
    }

    /// Policy expiring `ttl` after `clock.now()`.
    ///
    /// The expiry saturates at years 0000 and 9999 instead of overflowing.
    pub fn with_clock(retries: u32, ttl: Duration, clock: &dyn Clock) -> Self {
        let earliest = expiry_bound(EARLIEST_EXPIRY_SECS);
        let latest = expiry_bound(LATEST_EXPIRY_SECS);
        let expiry = match clock.now().checked_add_signed(ttl) {
            Some(expiry) => expiry.clamp(earliest, latest),
            None if ttl < Duration::zero() => earliest,
            None => latest,
        };
        Self { retries, expiry }
    }

    /// Restore a policy verbatim, e.g. from persisted state.
    pub fn from_parts(retries: u32, expiry: DateTime<Utc>) -> Self {
        Self { retries, expiry }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    /// Whether `now` is at or past the expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}
