//! Booking lifecycle.
//!
//! ```text
//! draft ──> hold ──> complete ──> canceled
//!             │          └──────> refunded
//!             └──> canceled
//! ```
//!
//! `canceled` and `refunded` are terminal. The locker creates bookings directly in
//! `hold`; nothing skips `hold` on the way to `complete`. The `draft` edges and
//! `complete -> refunded` are reserved for checkout flows outside this crate: no
//! operation here takes them, but stored rows may carry those statuses.

use super::errors::{BookingError, BookingResult};
use super::models::BookingStatus;

/// Whether `from -> to` is a lifecycle edge
pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;

    matches!(
        (from, to),
        (Draft, Hold)
            | (Draft, Canceled)
            | (Hold, Complete)
            | (Hold, Canceled)
            | (Complete, Canceled)
            | (Complete, Refunded)
    )
}

/// Validate a transition, returning the target status
pub fn transition(from: BookingStatus, to: BookingStatus) -> BookingResult<BookingStatus> {
    if can_transition(from, to) {
        Ok(to)
    } else {
        Err(BookingError::InvalidTransition { from, to })
    }
}

/// Whether a booking in this status still occupies inventory
pub fn holds_inventory(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::Hold | BookingStatus::Complete)
}
