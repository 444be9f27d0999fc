//! Booking locker configuration.

use crate::inventory::LockPolicy;
use chrono::Duration;
use std::env;

/// Default time a hold stays valid before the reclaimer may cancel it
pub const DEFAULT_HOLD_TTL_MINUTES: i64 = 15;

/// Booking locker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockerConfig {
    /// Lifetime of a new hold
    pub hold_ttl: Duration,

    /// Lock wait budget for booking creation
    pub lock_policy: LockPolicy,
}

impl LockerConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `HOLD_TTL_MINUTES`: Hold lifetime in minutes (default: 15)
    /// - `BOOKING_LOCK_TIMEOUT_MS`: Wait this long for inventory locks instead of
    ///   failing immediately (default: unset, no waiting)
    pub fn from_env() -> Self {
        let hold_ttl_minutes = env::var("HOLD_TTL_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|minutes: &i64| *minutes > 0)
            .unwrap_or(DEFAULT_HOLD_TTL_MINUTES);

        let lock_policy = env::var("BOOKING_LOCK_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(|ms| LockPolicy::Bounded(std::time::Duration::from_millis(ms)))
            .unwrap_or(LockPolicy::NoWait);

        Self {
            hold_ttl: Duration::minutes(hold_ttl_minutes),
            lock_policy,
        }
    }

    /// Wait up to `wait` for contended inventory rows
    pub fn with_lock_wait(mut self, wait: std::time::Duration) -> Self {
        self.lock_policy = LockPolicy::Bounded(wait);
        self
    }

    pub fn with_hold_ttl(mut self, ttl: Duration) -> Self {
        self.hold_ttl = ttl;
        self
    }
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            hold_ttl: Duration::minutes(DEFAULT_HOLD_TTL_MINUTES),
            lock_policy: LockPolicy::NoWait,
        }
    }
}
