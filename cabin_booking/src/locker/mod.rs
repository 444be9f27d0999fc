//! Booking locker: the transactional coordinator for holds.
//!
//! ## Example
//!
//! ```no_run
//! use cabin_booking::booking::{Party, Property, StayDates};
//! use cabin_booking::collaborators::{FlatRatePricing, LogNotifier};
//! use cabin_booking::db::Database;
//! use cabin_booking::locker::{BookingLocker, LockerConfig};
//! use chrono::NaiveDate;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let locker = BookingLocker::new(
//!         Arc::new(db.pool().clone()),
//!         Arc::new(FlatRatePricing::default()),
//!         Arc::new(LogNotifier),
//!         LockerConfig::from_env(),
//!     );
//!
//!     let stay = StayDates::new(
//!         NaiveDate::from_ymd_opt(2026, 7, 3).unwrap(),
//!         NaiveDate::from_ymd_opt(2026, 7, 6).unwrap(),
//!     );
//!     let hold = locker
//!         .create_per_guest_booking(42, Property::Ridge, stay, Party::of(4, 1))
//!         .await?;
//!
//!     // After payment capture
//!     let booking = locker.confirm_booking_with_payment(hold.id, "pay_123").await?;
//!     println!("Booking {} is {}", booking.reference, booking.status);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod manager;
pub mod request;

pub use config::LockerConfig;
pub use manager::BookingLocker;
pub use request::{BuyoutHold, HoldDetails, HoldRequest, HoldTarget, PerGuestHold, RoomHold};
