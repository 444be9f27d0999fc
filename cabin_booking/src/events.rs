//! Booking lifecycle events published after commit.

use crate::booking::{Booking, BookingId, BookingMode, Money, Property};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event emitted once the corresponding transaction has committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingEvent {
    /// A new hold was taken
    Created {
        booking_id: BookingId,
        reference: String,
        property: Property,
        mode: BookingMode,
    },
    /// A hold was confirmed after payment
    Confirmed {
        booking_id: BookingId,
        reference: String,
    },
    /// A hold was released on request
    Released { booking_id: BookingId },
    /// A hold ran past its expiry and was reclaimed
    HoldExpired { booking_id: BookingId },
    /// One reclaimer pass finished
    HoldSweepCompleted {
        sweep_id: Uuid,
        expired: usize,
        failed: usize,
    },
    /// A complete booking was canceled
    Canceled {
        booking_id: BookingId,
        reason: String,
    },
    /// A refund is waiting for review
    RefundPending {
        booking_id: BookingId,
        pending_refund_id: i64,
        amount: Money,
    },
    /// A refund was sent to the payment processor
    RefundIssued { booking_id: BookingId, amount: Money },
}

impl BookingEvent {
    pub fn created(booking: &Booking) -> Self {
        BookingEvent::Created {
            booking_id: booking.id,
            reference: booking.reference.clone(),
            property: booking.property,
            mode: booking.mode,
        }
    }

    pub fn confirmed(booking: &Booking) -> Self {
        BookingEvent::Confirmed {
            booking_id: booking.id,
            reference: booking.reference.clone(),
        }
    }

    /// Short name used for logs and metric labels
    pub fn name(&self) -> &'static str {
        match self {
            BookingEvent::Created { .. } => "booking_created",
            BookingEvent::Confirmed { .. } => "booking_confirmed",
            BookingEvent::Released { .. } => "hold_released",
            BookingEvent::HoldExpired { .. } => "hold_expired",
            BookingEvent::HoldSweepCompleted { .. } => "hold_sweep_completed",
            BookingEvent::Canceled { .. } => "booking_canceled",
            BookingEvent::RefundPending { .. } => "refund_pending",
            BookingEvent::RefundIssued { .. } => "refund_issued",
        }
    }

    pub fn booking_id(&self) -> Option<BookingId> {
        match self {
            BookingEvent::Created { booking_id, .. }
            | BookingEvent::Confirmed { booking_id, .. }
            | BookingEvent::Released { booking_id }
            | BookingEvent::HoldExpired { booking_id }
            | BookingEvent::Canceled { booking_id, .. }
            | BookingEvent::RefundPending { booking_id, .. }
            | BookingEvent::RefundIssued { booking_id, .. } => Some(*booking_id),
            BookingEvent::HoldSweepCompleted { .. } => None,
        }
    }
}
