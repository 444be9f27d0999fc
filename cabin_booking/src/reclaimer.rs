//! Hold reclaimer: cancels holds that outlived their TTL.
//!
//! Each expired hold is canceled in its own transaction through
//! [`BookingLocker::expire_hold`], so one failure never blocks the rest of a pass.
//! Several service instances may sweep at once: the booking row lock and the
//! "still an expired hold" check make the second canceller a no-op.

use crate::booking::{BookingId, BookingResult};
use crate::db::BookingRepository;
use crate::db::timeouts::{DEFAULT_TRANSACTION_TIMEOUT, with_timeout};
use crate::events::BookingEvent;
use crate::locker::BookingLocker;
use chrono::{DateTime, Utc};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use uuid::Uuid;

/// Reclaimer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReclaimerConfig {
    /// Time between passes
    pub interval: Duration,
    /// Maximum holds canceled per pass
    pub batch_size: i64,
}

impl ReclaimerConfig {
    /// Create configuration from environment variables
    ///
    /// - `HOLD_SWEEP_INTERVAL_SECS`: Seconds between passes (default: 60)
    /// - `HOLD_SWEEP_BATCH_SIZE`: Holds per pass (default: 500)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval: env::var("HOLD_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            batch_size: env::var("HOLD_SWEEP_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|size| *size > 0)
                .unwrap_or(defaults.batch_size),
        }
    }
}

impl Default for ReclaimerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            batch_size: 500,
        }
    }
}

/// Outcome of one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sweep_id: Uuid,
    /// Holds canceled by this pass
    pub expired: Vec<BookingId>,
    /// Holds found expired but already handled elsewhere
    pub skipped: Vec<BookingId>,
    /// Holds whose cancellation failed; retried next pass
    pub failed: Vec<BookingId>,
}

/// Hold reclaimer
#[derive(Clone)]
pub struct HoldReclaimer {
    locker: BookingLocker,
    repository: Arc<dyn BookingRepository>,
    config: ReclaimerConfig,
}

impl HoldReclaimer {
    pub fn new(
        locker: BookingLocker,
        repository: Arc<dyn BookingRepository>,
        config: ReclaimerConfig,
    ) -> Self {
        Self {
            locker,
            repository,
            config,
        }
    }

    /// Run one pass against the current time
    pub async fn sweep(&self) -> BookingResult<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Run one pass treating `now` as the current time
    ///
    /// # Errors
    ///
    /// Only the initial query can fail the pass; per-booking failures are logged
    /// and reported in `SweepReport::failed`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> BookingResult<SweepReport> {
        let sweep_id = Uuid::new_v4();
        let expired_ids = self
            .repository
            .find_expired_holds(now, self.config.batch_size)
            .await?;

        let mut report = SweepReport {
            sweep_id,
            ..Default::default()
        };

        for booking_id in expired_ids {
            match with_timeout(
                DEFAULT_TRANSACTION_TIMEOUT,
                self.locker.expire_hold(booking_id, now),
            )
            .await
            {
                Ok(Some(_)) => report.expired.push(booking_id),
                Ok(None) => report.skipped.push(booking_id),
                // Deleted since the query; nothing left to release
                Err(e) if e.is_not_found() => report.skipped.push(booking_id),
                Err(e) => {
                    log::error!("Sweep {sweep_id}: failed to expire hold {booking_id}: {e}");
                    report.failed.push(booking_id);
                }
            }
        }

        if !report.expired.is_empty() || !report.failed.is_empty() {
            log::info!(
                "Sweep {}: {} holds expired, {} skipped, {} failed",
                sweep_id,
                report.expired.len(),
                report.skipped.len(),
                report.failed.len()
            );
        }

        self.locker.notifier().publish(BookingEvent::HoldSweepCompleted {
            sweep_id,
            expired: report.expired.len(),
            failed: report.failed.len(),
        });

        Ok(report)
    }

    /// Sweep on the configured interval until `shutdown` turns true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        log::info!(
            "Hold reclaimer starting (every {:?}, up to {} holds per pass)",
            self.config.interval,
            self.config.batch_size
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        log::error!("Hold sweep failed: {e}");
                    }
                }

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!("Hold reclaimer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReclaimerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.batch_size, 500);
    }
}
