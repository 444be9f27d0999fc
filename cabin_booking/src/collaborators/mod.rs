//! Narrow interfaces to systems outside the booking core.
//!
//! - [`PriceLookup`]: read-only nightly prices, queried before any lock is taken
//! - [`PaymentGateway`]: refunds, called only after commit
//! - [`BookingNotifier`]: fire-and-forget lifecycle events
//!
//! The refund policy lookup lives in [`crate::refund::policy`].

pub mod notifier;
pub mod payment;
pub mod pricing;

pub use notifier::{BookingNotifier, ChannelNotifier, FanoutNotifier, LogNotifier};
pub use payment::{PaymentError, PaymentGateway};
pub use pricing::{FlatRatePricing, PriceLookup, PriceQuery, PriceUnit, PricingError};
