//! Time budgets for booking operations.
//!
//! Row locks taken by creation fail fast on their own; these budgets bound the
//! remaining waits (pool acquisition, blocking locks on owned rows, slow queries).

use crate::booking::{BookingError, BookingResult};
use std::time::Duration;
use tokio::time::timeout;

/// Default budget for one booking transaction (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a booking operation, failing with `BookingError::Timeout` once `duration` passes
///
/// # Example
///
/// ```no_run
/// use cabin_booking::db::timeouts::{with_timeout, DEFAULT_TRANSACTION_TIMEOUT};
/// # use cabin_booking::locker::BookingLocker;
/// # async fn example(locker: &BookingLocker) -> Result<(), Box<dyn std::error::Error>> {
///
/// let booking = with_timeout(DEFAULT_TRANSACTION_TIMEOUT, locker.release_hold(7)).await?;
///
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> BookingResult<T>
where
    F: std::future::Future<Output = BookingResult<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => {
            log::warn!("Booking operation timed out after {duration:?}");
            Err(BookingError::Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_result_passes_through() {
        let value = with_timeout(Duration::from_secs(1), async { Ok::<_, BookingError>(5) }).await;
        assert_eq!(value.unwrap(), 5);

        let err = with_timeout(Duration::from_secs(1), async {
            Err::<(), _>(BookingError::LockContention)
        })
        .await;
        assert!(matches!(err, Err(BookingError::LockContention)));
    }

    #[tokio::test]
    async fn test_slow_operation_times_out() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, BookingError>(())
        })
        .await;
        assert!(matches!(result, Err(BookingError::Timeout)));
    }
}
