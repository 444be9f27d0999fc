//! Repository trait definitions for testability and dependency injection.
//!
//! Read-only access to bookings and inventory. Nothing here takes a lock or writes;
//! every state change goes through [`crate::locker::BookingLocker`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::booking::{
    Booking, BookingError, BookingId, BookingResult, Guest, Property, RoomId, StayDates, store,
};
use crate::inventory::{PropertyInventory, RoomInventory, store as inventory};

/// Trait for booking and inventory reads
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Get a booking by id
    async fn get_booking(&self, booking_id: BookingId) -> BookingResult<Booking>;

    /// Find a booking by its human-facing reference
    async fn find_by_reference(&self, reference: &str) -> BookingResult<Option<Booking>>;

    /// Guests recorded on a booking
    async fn guests(&self, booking_id: BookingId) -> BookingResult<Vec<Guest>>;

    /// Holds expired at `now`, oldest first, at most `limit`
    async fn find_expired_holds(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> BookingResult<Vec<BookingId>>;

    /// Property inventory rows that exist for a stay
    async fn property_inventory(
        &self,
        property: Property,
        stay: StayDates,
    ) -> BookingResult<Vec<PropertyInventory>>;

    /// Room inventory rows that exist for a stay
    async fn room_inventory(
        &self,
        room_id: RoomId,
        stay: StayDates,
    ) -> BookingResult<Vec<RoomInventory>>;
}

/// Default PostgreSQL implementation of `BookingRepository`
#[derive(Clone)]
pub struct PgBookingRepository {
    pool: Arc<PgPool>,
}

impl PgBookingRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn get_booking(&self, booking_id: BookingId) -> BookingResult<Booking> {
        let mut conn = self.pool.acquire().await?;
        store::fetch(&mut conn, booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))
    }

    async fn find_by_reference(&self, reference: &str) -> BookingResult<Option<Booking>> {
        let mut conn = self.pool.acquire().await?;
        store::fetch_by_reference(&mut conn, reference).await
    }

    async fn guests(&self, booking_id: BookingId) -> BookingResult<Vec<Guest>> {
        let mut conn = self.pool.acquire().await?;
        store::guests(&mut conn, booking_id).await
    }

    async fn find_expired_holds(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> BookingResult<Vec<BookingId>> {
        let mut conn = self.pool.acquire().await?;
        store::expired_hold_ids(&mut conn, now, limit).await
    }

    async fn property_inventory(
        &self,
        property: Property,
        stay: StayDates,
    ) -> BookingResult<Vec<PropertyInventory>> {
        inventory::property_days(self.pool.as_ref(), property, stay).await
    }

    async fn room_inventory(
        &self,
        room_id: RoomId,
        stay: StayDates,
    ) -> BookingResult<Vec<RoomInventory>> {
        inventory::room_days(self.pool.as_ref(), room_id, stay).await
    }
}
