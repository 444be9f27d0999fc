//! Booking records and their lifecycle.
//!
//! A booking reserves inventory in one of three modes:
//! - **Room**: specific rooms for every night of the stay
//! - **Per-guest**: shared capacity counted in heads per night
//! - **Buyout**: the whole property, excluding every other mode

pub mod errors;
pub mod models;
pub mod state_machine;
pub mod store;

pub use errors::{BookingError, BookingResult};
pub use models::{
    Booking, BookingId, BookingMode, BookingStatus, Guest, Money, Party, Property, RoomId,
    StayDates, UserId, generate_reference,
};
