//! Booking error types.

use super::models::{BookingId, BookingStatus, Property, RoomId};
use chrono::NaiveDate;
use thiserror::Error;

/// SQLSTATE raised by `NOWAIT` and `lock_timeout`
const LOCK_NOT_AVAILABLE: &str = "55P03";
/// SQLSTATE for serialization failures
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for detected deadlocks
const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE for unique violations (reference collision)
const UNIQUE_VIOLATION: &str = "23505";

/// Booking errors
#[derive(Debug, Error)]
pub enum BookingError {
    /// A targeted room is already held or booked, or the property is bought out
    #[error("Room {room_id} is unavailable on {day}")]
    RoomUnavailable { room_id: RoomId, day: NaiveDate },

    /// The property has a conflicting reservation of another mode
    #[error("Property {property} is unavailable on {day}")]
    PropertyUnavailable { property: Property, day: NaiveDate },

    /// Not enough per-guest capacity left
    #[error("Capacity exceeded on {day}: available {available}, requested {requested}")]
    CapacityExceeded {
        day: NaiveDate,
        available: i32,
        requested: i32,
    },

    /// Another transaction holds an inventory row lock
    #[error("Inventory is locked by a concurrent booking")]
    LockContention,

    /// Booking not found
    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),

    /// Room not found
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    /// Property has no inventory configuration
    #[error("Property not configured: {0}")]
    PropertyNotFound(Property),

    /// Checkout must be strictly after checkin
    #[error("Invalid date range: checkin {checkin}, checkout {checkout}")]
    InvalidDateRange {
        checkin: NaiveDate,
        checkout: NaiveDate,
    },

    /// Guest counts are inconsistent
    #[error("Invalid guest count: {0}")]
    InvalidGuestCount(String),

    /// Room mode needs at least one room
    #[error("Room booking requires at least one room")]
    EmptyRoomSelection,

    /// All rooms of a booking must belong to one property
    #[error("Rooms belong to more than one property")]
    RoomsSpanProperties,

    /// Status change not allowed by the booking lifecycle
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    /// Price lookup failed before any lock was taken
    #[error("Pricing failed: {0}")]
    Pricing(String),

    /// Transaction aborted for reasons unrelated to booking invariants
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Operation exceeded its time budget
    #[error("Booking operation timed out")]
    Timeout,

    /// Database error
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        let code = err
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .map(|code| code.into_owned());

        match code.as_deref() {
            Some(LOCK_NOT_AVAILABLE) => BookingError::LockContention,
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) | Some(UNIQUE_VIOLATION) => {
                BookingError::Transient(err.to_string())
            }
            _ => BookingError::Database(err),
        }
    }
}

impl BookingError {
    /// Stable machine-readable error code
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::RoomUnavailable { .. } => "room_unavailable",
            BookingError::PropertyUnavailable { .. } => "property_unavailable",
            BookingError::CapacityExceeded { .. } => "capacity_exceeded",
            BookingError::LockContention => "lock_contention",
            BookingError::BookingNotFound(_) => "booking_not_found",
            BookingError::RoomNotFound(_) => "room_not_found",
            BookingError::PropertyNotFound(_) => "property_not_found",
            BookingError::InvalidDateRange { .. }
            | BookingError::InvalidGuestCount(_)
            | BookingError::EmptyRoomSelection
            | BookingError::RoomsSpanProperties => "invalid_request",
            BookingError::InvalidTransition { .. } => "invalid_transition",
            BookingError::Pricing(_) => "pricing_failed",
            BookingError::Transient(_) | BookingError::Timeout => "transient",
            BookingError::Database(_) => "database",
        }
    }

    /// Availability conflicts, lock contention included
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            BookingError::RoomUnavailable { .. }
                | BookingError::PropertyUnavailable { .. }
                | BookingError::CapacityExceeded { .. }
                | BookingError::LockContention
        )
    }

    /// Whether repeating the whole operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingError::LockContention | BookingError::Transient(_) | BookingError::Timeout
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BookingError::BookingNotFound(_)
                | BookingError::RoomNotFound(_)
                | BookingError::PropertyNotFound(_)
        )
    }

    /// Get a client-safe error message that doesn't leak internal details
    pub fn client_message(&self) -> String {
        match self {
            BookingError::Database(_) | BookingError::Transient(_) => {
                "Internal server error".to_string()
            }
            BookingError::LockContention => {
                "Those dates are being booked by someone else, please try again".to_string()
            }
            BookingError::BookingNotFound(_) => "Booking not found".to_string(),
            BookingError::Pricing(_) => "Price is not available for those dates".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for booking operations
pub type BookingResult<T> = Result<T, BookingError>;
