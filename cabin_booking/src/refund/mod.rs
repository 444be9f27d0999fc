//! Cancellation refunds.
//!
//! Canceling a complete booking frees its inventory in one transaction. The
//! refund is then either recorded for manual review, when a policy rule covers
//! the cancellation date, or paid out immediately through the payment gateway.
//! An immediate refund is recorded with the cancellation and stays owed until the
//! processor accepts it.

pub mod errors;
pub mod models;
pub mod policy;
pub mod resolver;
pub mod store;

pub use errors::{PolicyError, RefundError, RefundResult};
pub use models::{
    Cancellation, ImmediateRefund, ImmediateRefundStatus, PendingRefund, PendingRefundId,
    RefundOutcome, RefundRule, RefundStatus, days_before_checkin,
};
pub use policy::{CachedRefundPolicy, PgRefundPolicy, RefundPolicyLookup, select_rule};
pub use resolver::RefundResolver;
