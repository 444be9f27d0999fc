//! Refund error types.

use super::models::{PendingRefundId, RefundStatus};
use crate::booking::{BookingError, BookingId, BookingStatus, Money};
use crate::collaborators::PaymentError;
use thiserror::Error;

/// Refund policy lookup errors
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Policy source unreachable
    #[error("Refund policy unavailable: {0}")]
    Unavailable(String),

    /// A stored rule is malformed
    #[error("Invalid refund rule: {0}")]
    InvalidRule(String),
}

/// Refund resolver errors
#[derive(Debug, Error)]
pub enum RefundError {
    /// Locking or persistence failed
    #[error(transparent)]
    Booking(#[from] BookingError),

    /// Only complete bookings go through the resolver
    #[error("Booking {booking_id} is {status} and cannot be canceled with a refund")]
    NotCancelable {
        booking_id: BookingId,
        status: BookingStatus,
    },

    /// Pending refund not found
    #[error("Pending refund not found: {0}")]
    PendingRefundNotFound(PendingRefundId),

    /// The pending refund was already reviewed
    #[error("Pending refund {id} already {status}")]
    AlreadyReviewed {
        id: PendingRefundId,
        status: RefundStatus,
    },

    /// Admin amount is negative or above what was paid
    #[error("Invalid refund amount: {0}")]
    InvalidAmount(i64),

    /// Refund policy lookup failed; nothing was changed
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// The processor rejected or could not execute the refund
    #[error("Refund payment failed: {0}")]
    Payment(#[from] PaymentError),

    /// An immediate refund was not paid; it stays recorded for a retry
    #[error("Refund of {amount} for booking {booking_id} failed after {attempts} attempt(s): {source}")]
    RefundOwed {
        booking_id: BookingId,
        amount: Money,
        payment_reference: Option<String>,
        attempts: i32,
        source: PaymentError,
    },

    /// No immediate refund was recorded for the booking
    #[error("No immediate refund recorded for booking {0}")]
    ImmediateRefundNotFound(BookingId),
}

impl From<sqlx::Error> for RefundError {
    fn from(err: sqlx::Error) -> Self {
        RefundError::Booking(BookingError::from(err))
    }
}

impl RefundError {
    /// Stable machine-readable error code
    pub fn kind(&self) -> &'static str {
        match self {
            RefundError::Booking(e) => e.kind(),
            RefundError::NotCancelable { .. } => "not_cancelable",
            RefundError::PendingRefundNotFound(_) => "pending_refund_not_found",
            RefundError::AlreadyReviewed { .. } => "already_reviewed",
            RefundError::InvalidAmount(_) => "invalid_request",
            RefundError::Policy(_) => "policy_unavailable",
            RefundError::Payment(_) => "payment_failed",
            RefundError::RefundOwed { .. } => "refund_owed",
            RefundError::ImmediateRefundNotFound(_) => "immediate_refund_not_found",
        }
    }
}

/// Result type for refund operations
pub type RefundResult<T> = Result<T, RefundError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_errors_keep_their_kind() {
        let err: RefundError = BookingError::BookingNotFound(4).into();
        assert_eq!(err.kind(), "booking_not_found");

        let err: RefundError = PaymentError::MissingPaymentReference.into();
        assert_eq!(err.kind(), "payment_failed");
    }

    #[test]
    fn test_owed_refund_keeps_amount_and_cause() {
        let err = RefundError::RefundOwed {
            booking_id: 12,
            amount: Money::new(18_000, "USD"),
            payment_reference: Some("pay_12".to_string()),
            attempts: 2,
            source: PaymentError::Unavailable("timeout".to_string()),
        };
        assert_eq!(err.kind(), "refund_owed");
        assert_eq!(
            err.to_string(),
            "Refund of 18000 USD for booking 12 failed after 2 attempt(s): \
             Payment processor unavailable: timeout"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
