//! Payment collaborator.

use crate::booking::Money;
use async_trait::async_trait;
use thiserror::Error;

/// Payment errors
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The processor refused the refund
    #[error("Refund declined: {0}")]
    Declined(String),

    /// No payment is attached to the booking
    #[error("Booking has no payment reference")]
    MissingPaymentReference,

    /// Processor unreachable
    #[error("Payment processor unavailable: {0}")]
    Unavailable(String),
}

/// Payment processor operations used by the booking core
///
/// Charge and capture happen before `confirm_booking` and are not part of this
/// interface.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Refund `amount` against a captured payment, returning the processor's refund id
    async fn refund(&self, payment_reference: &str, amount: &Money) -> Result<String, PaymentError>;
}
