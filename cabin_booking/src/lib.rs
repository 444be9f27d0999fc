//! # Cabin Booking
//!
//! Concurrency-safe booking core for two lodging properties.
//!
//! Guests reserve inventory in one of three modes that compete for the same nights:
//! specific rooms, shared per-guest capacity, or a whole-property buyout. Every
//! reservation starts as a time-limited hold and is confirmed after payment.
//! PostgreSQL row locks on per-day inventory rows decide every race, so any number
//! of service instances can run against the same database.
//!
//! ## Components
//!
//! - **Booking Locker**: takes holds, confirms, releases and cancels, one
//!   transaction per operation
//! - **Inventory Store**: per-day room and property rows, the unit of locking
//! - **Hold Reclaimer**: cancels holds past their expiry on a fixed interval
//! - **Refund Resolver**: cancels complete bookings and decides between an
//!   immediate refund and manual review
//!
//! ## Core Modules
//!
//! - [`booking`]: Booking records, errors and the lifecycle state machine
//! - [`inventory`]: Inventory rows and the queries that lock them
//! - [`locker`]: The Booking Locker
//! - [`reclaimer`]: The Hold Reclaimer
//! - [`refund`]: Refund policy and the Refund Resolver
//! - [`collaborators`]: Pricing, payment and notification interfaces
//! - [`db`]: Connection pool, migrations and the read repository
//!
//! ## Example
//!
//! ```
//! use cabin_booking::booking::{BookingStatus, state_machine};
//!
//! assert!(state_machine::can_transition(BookingStatus::Hold, BookingStatus::Complete));
//! assert!(!state_machine::can_transition(BookingStatus::Canceled, BookingStatus::Hold));
//! ```

/// Booking records, errors and lifecycle.
pub mod booking;
pub use booking::{
    Booking, BookingError, BookingId, BookingMode, BookingResult, BookingStatus, Money, Party,
    Property, StayDates,
};

/// Per-day inventory rows and locking queries.
pub mod inventory;

/// Transactional hold, confirm, release and cancel.
pub mod locker;
pub use locker::{BookingLocker, HoldRequest, LockerConfig};

/// Expired hold cleanup.
pub mod reclaimer;
pub use reclaimer::{HoldReclaimer, ReclaimerConfig, SweepReport};

/// Cancellation refunds.
pub mod refund;
pub use refund::{RefundError, RefundResolver};

/// External collaborator interfaces.
pub mod collaborators;

/// Lifecycle events.
pub mod events;
pub use events::BookingEvent;

/// Database access.
pub mod db;
