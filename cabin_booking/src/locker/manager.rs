//! Booking locker: transactional hold, confirm, release and cancel.
//!
//! Each public operation is one database transaction. Booking creation locks its
//! inventory rows with the configured [`LockPolicy`] (no waiting by default), in a
//! fixed order: property rows by day, then room rows by room id and day. All
//! invariants are checked against locked rows before anything is written, and
//! events are published only after commit.

use super::config::LockerConfig;
use super::request::{BuyoutHold, HoldDetails, HoldRequest, HoldTarget, PerGuestHold, RoomHold};
use crate::booking::{
    Booking, BookingError, BookingId, BookingMode, BookingResult, BookingStatus, Party, Property,
    RoomId, StayDates, UserId, generate_reference, store,
};
use crate::collaborators::{BookingNotifier, PriceLookup, pricing};
use crate::events::BookingEvent;
use crate::inventory::{LockPolicy, RowLock, store as inventory};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;

/// Booking locker
#[derive(Clone)]
pub struct BookingLocker {
    pool: Arc<PgPool>,
    pricing: Arc<dyn PriceLookup>,
    notifier: Arc<dyn BookingNotifier>,
    config: LockerConfig,
}

impl BookingLocker {
    /// Create a new booking locker
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `pricing` - Nightly price source, queried before locks are taken
    /// * `notifier` - Receives events after commit
    /// * `config` - Hold lifetime and lock policy
    pub fn new(
        pool: Arc<PgPool>,
        pricing: Arc<dyn PriceLookup>,
        notifier: Arc<dyn BookingNotifier>,
        config: LockerConfig,
    ) -> Self {
        Self {
            pool,
            pricing,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &LockerConfig {
        &self.config
    }

    pub(crate) fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }

    pub(crate) fn notifier(&self) -> &dyn BookingNotifier {
        self.notifier.as_ref()
    }

    /// Hold specific rooms for a stay
    ///
    /// # Errors
    ///
    /// * `BookingError::RoomUnavailable` - A room is taken on some night, or the
    ///   property is bought out
    /// * `BookingError::LockContention` - A concurrent booking holds a row lock
    /// * `BookingError::RoomNotFound` - Unknown room
    pub async fn create_room_booking(
        &self,
        user_id: UserId,
        room_ids: Vec<RoomId>,
        stay: StayDates,
        party: Party,
    ) -> BookingResult<Booking> {
        let details = HoldDetails::new(user_id, stay, party);
        self.create_booking(RoomHold::new(details, room_ids).into())
            .await
    }

    /// Hold per-guest capacity for a stay
    ///
    /// # Errors
    ///
    /// * `BookingError::CapacityExceeded` - Not enough places left on some night
    /// * `BookingError::PropertyUnavailable` - The property is bought out
    /// * `BookingError::LockContention` - A concurrent booking holds a row lock
    pub async fn create_per_guest_booking(
        &self,
        user_id: UserId,
        property: Property,
        stay: StayDates,
        party: Party,
    ) -> BookingResult<Booking> {
        let details = HoldDetails::new(user_id, stay, party);
        self.create_booking(PerGuestHold { details, property }.into())
            .await
    }

    /// Hold a whole property for a stay
    ///
    /// # Errors
    ///
    /// * `BookingError::PropertyUnavailable` - Any room, per-guest place or buyout
    ///   is already taken on some night
    /// * `BookingError::LockContention` - A concurrent booking holds a row lock
    pub async fn create_buyout_booking(
        &self,
        user_id: UserId,
        property: Property,
        stay: StayDates,
        party: Party,
    ) -> BookingResult<Booking> {
        let details = HoldDetails::new(user_id, stay, party);
        self.create_booking(BuyoutHold { details, property }.into())
            .await
    }

    /// Take a hold for any booking mode
    pub async fn create_booking(&self, request: HoldRequest) -> BookingResult<Booking> {
        request.validate()?;

        let property = self.resolve_property(&request).await?;
        let stay = request.details().stay;

        // Missing rows are created outside the locking transaction so that the
        // transaction itself never waits on another's uncommitted insert
        inventory::ensure_property_days(self.pool(), property, stay).await?;
        match &request {
            HoldRequest::Room(hold) => {
                inventory::ensure_room_days(self.pool(), hold.room_ids(), stay).await?
            }
            HoldRequest::Buyout(_) => {
                inventory::ensure_property_room_days(self.pool(), property, stay).await?
            }
            HoldRequest::PerGuest(_) => {}
        }

        let total_price = pricing::quote(
            self.pricing.as_ref(),
            property,
            request.mode(),
            &request.price_units(),
            request.price_quantity(),
            stay.days(),
        )
        .await
        .map_err(|e| BookingError::Pricing(e.to_string()))?;

        let details = request.details();
        let reference = details
            .reference
            .clone()
            .unwrap_or_else(generate_reference);
        let hold_expires_at = Utc::now() + self.config.hold_ttl;
        let policy = self.config.lock_policy;

        let mut tx = self.pool.begin().await?;
        inventory::apply_lock_policy(&mut tx, policy).await?;

        match &request {
            HoldRequest::Room(hold) => check_room_hold(&mut tx, property, hold, policy).await?,
            HoldRequest::PerGuest(hold) => check_per_guest_hold(&mut tx, hold, policy).await?,
            HoldRequest::Buyout(hold) => check_buyout_hold(&mut tx, hold, policy).await?,
        }

        let room_ids: &[RoomId] = match &request {
            HoldRequest::Room(hold) => hold.room_ids(),
            _ => &[],
        };

        let booking = store::insert(
            &mut tx,
            store::NewBooking {
                reference: &reference,
                user_id: details.user_id,
                property,
                mode: request.mode(),
                stay,
                guests_count: details.party.guests_count,
                children_count: details.party.children_count,
                total_price: &total_price,
                status: BookingStatus::Hold,
                hold_expires_at: Some(hold_expires_at),
                room_ids,
                guests: &details.party.guests,
            },
        )
        .await?;

        match &request {
            HoldRequest::Room(hold) => {
                inventory::hold_rooms(&mut tx, booking.id, hold.room_ids(), stay).await?;
            }
            HoldRequest::PerGuest(_) => {
                inventory::shift_capacity(&mut tx, property, stay, details.party.guests_count, 0)
                    .await?;
            }
            HoldRequest::Buyout(_) => {
                inventory::set_buyout(&mut tx, property, stay, true, false).await?;
            }
        }

        tx.commit().await?;

        log::info!(
            "Booking {} ({}) held: {} at {} from {} to {}",
            booking.id,
            booking.reference,
            booking.mode,
            booking.property,
            booking.checkin_date,
            booking.checkout_date
        );
        self.notifier.publish(BookingEvent::created(&booking));

        Ok(booking)
    }

    /// Confirm a hold after payment
    ///
    /// Confirming a booking that is already `complete` returns it unchanged.
    pub async fn confirm_booking(&self, booking_id: BookingId) -> BookingResult<Booking> {
        self.confirm(booking_id, None).await
    }

    /// Confirm a hold and attach the captured payment
    pub async fn confirm_booking_with_payment(
        &self,
        booking_id: BookingId,
        payment_reference: &str,
    ) -> BookingResult<Booking> {
        self.confirm(booking_id, Some(payment_reference)).await
    }

    async fn confirm(
        &self,
        booking_id: BookingId,
        payment_reference: Option<&str>,
    ) -> BookingResult<Booking> {
        let mut tx = self.pool.begin().await?;

        // Blocking lock: a racing confirmation waits here and then sees `complete`
        let mut booking = store::lock(&mut tx, booking_id).await?;

        match booking.status {
            BookingStatus::Complete => {
                tx.rollback().await?;
                log::debug!("Booking {booking_id} already complete, confirmation ignored");
                return Ok(booking);
            }
            BookingStatus::Hold => {}
            other => {
                return Err(BookingError::InvalidTransition {
                    from: other,
                    to: BookingStatus::Complete,
                });
            }
        }

        let Some(updated_at) =
            store::transition(&mut tx, booking_id, BookingStatus::Hold, BookingStatus::Complete)
                .await?
        else {
            // Unreachable while the row lock is held; report what is stored
            tx.rollback().await?;
            return self.current(booking_id).await;
        };

        match booking.mode {
            BookingMode::Room => {
                inventory::lock_booking_rooms(&mut tx, booking_id).await?;
                inventory::book_held_rooms(&mut tx, booking_id).await?;
            }
            BookingMode::PerGuest => {
                let stay = booking.stay();
                inventory::lock_property_days(
                    &mut tx,
                    booking.property,
                    stay,
                    RowLock::NoKeyUpdate,
                    LockPolicy::Block,
                )
                .await?;
                inventory::shift_capacity(
                    &mut tx,
                    booking.property,
                    stay,
                    -booking.guests_count,
                    booking.guests_count,
                )
                .await?;
            }
            BookingMode::Buyout => {
                let stay = booking.stay();
                inventory::lock_property_days(
                    &mut tx,
                    booking.property,
                    stay,
                    RowLock::Update,
                    LockPolicy::Block,
                )
                .await?;
                inventory::set_buyout(&mut tx, booking.property, stay, false, true).await?;
            }
        }

        if let Some(payment_reference) = payment_reference {
            store::set_payment_reference(&mut tx, booking_id, payment_reference).await?;
            booking.payment_reference = Some(payment_reference.to_string());
        }

        tx.commit().await?;

        booking.status = BookingStatus::Complete;
        booking.hold_expires_at = None;
        booking.updated_at = updated_at;

        log::info!("Booking {} ({}) confirmed", booking.id, booking.reference);
        self.notifier.publish(BookingEvent::confirmed(&booking));

        Ok(booking)
    }

    /// Release a hold on request, freeing its inventory
    pub async fn release_hold(&self, booking_id: BookingId) -> BookingResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let booking = store::lock(&mut tx, booking_id).await?;

        if booking.status != BookingStatus::Hold {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Canceled,
            });
        }

        let booking = cancel_locked(&mut tx, booking).await?;
        tx.commit().await?;

        log::info!("Booking {} ({}) hold released", booking.id, booking.reference);
        self.notifier
            .publish(BookingEvent::Released { booking_id: booking.id });

        Ok(booking)
    }

    /// Cancel a hold only if it is still a hold and expired at `now`
    ///
    /// Returns `None` when the booking was confirmed, released or extended in the
    /// meantime.
    pub async fn expire_hold(
        &self,
        booking_id: BookingId,
        now: DateTime<Utc>,
    ) -> BookingResult<Option<Booking>> {
        let mut tx = self.pool.begin().await?;
        let booking = store::lock(&mut tx, booking_id).await?;

        if !booking.hold_expired_at(now) {
            tx.rollback().await?;
            return Ok(None);
        }

        let booking = cancel_locked(&mut tx, booking).await?;
        tx.commit().await?;

        log::info!("Booking {} ({}) hold expired", booking.id, booking.reference);
        self.notifier
            .publish(BookingEvent::HoldExpired { booking_id: booking.id });

        Ok(Some(booking))
    }

    /// Cancel a confirmed booking, freeing its inventory
    ///
    /// Refund handling is left to [`crate::refund::RefundResolver`].
    pub async fn cancel_complete_booking(&self, booking_id: BookingId) -> BookingResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let booking = self.cancel_complete_in(&mut tx, booking_id).await?;
        tx.commit().await?;

        log::info!("Booking {} ({}) canceled", booking.id, booking.reference);
        self.notifier.publish(BookingEvent::Canceled {
            booking_id: booking.id,
            reason: String::new(),
        });

        Ok(booking)
    }

    /// Cancel a complete booking inside the caller's transaction
    pub(crate) async fn cancel_complete_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        booking_id: BookingId,
    ) -> BookingResult<Booking> {
        let booking = store::lock(tx, booking_id).await?;

        if booking.status != BookingStatus::Complete {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Canceled,
            });
        }

        cancel_locked(tx, booking).await
    }

    /// Record that the guests of a confirmed booking have arrived
    pub async fn mark_checked_in(&self, booking_id: BookingId) -> BookingResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let mut booking = store::lock(&mut tx, booking_id).await?;

        if booking.status != BookingStatus::Complete {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Complete,
            });
        }

        if !booking.checked_in {
            store::set_checked_in(&mut tx, booking_id).await?;
            booking.checked_in = true;
        }
        tx.commit().await?;

        Ok(booking)
    }

    async fn current(&self, booking_id: BookingId) -> BookingResult<Booking> {
        let mut conn = self.pool.acquire().await?;
        store::fetch(&mut conn, booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))
    }

    async fn resolve_property(&self, request: &HoldRequest) -> BookingResult<Property> {
        match request {
            HoldRequest::Room(hold) => {
                let rooms = inventory::room_properties(self.pool(), hold.room_ids()).await?;
                let Some(&(_, property)) = rooms.first() else {
                    return Err(BookingError::EmptyRoomSelection);
                };
                if rooms.iter().any(|(_, p)| *p != property) {
                    return Err(BookingError::RoomsSpanProperties);
                }
                Ok(property)
            }
            HoldRequest::PerGuest(hold) => Ok(hold.property),
            HoldRequest::Buyout(hold) => Ok(hold.property),
        }
    }
}

/// Report a lost lock race on exclusive inventory as the conflict it stands for
///
/// Room and buyout rows are only ever locked by a booking about to claim them, so
/// losing the race means the inventory is being taken. Per-guest contention is not
/// mapped: the winner may leave enough capacity behind.
fn contention_as(err: BookingError, conflict: impl FnOnce() -> BookingError) -> BookingError {
    match err {
        BookingError::LockContention => conflict(),
        other => other,
    }
}

/// Lock and check everything a room hold touches
async fn check_room_hold(
    tx: &mut Transaction<'_, Postgres>,
    property: Property,
    hold: &RoomHold,
    policy: LockPolicy,
) -> BookingResult<()> {
    let stay = hold.details.stay;

    let taken = || BookingError::RoomUnavailable {
        room_id: hold.room_ids()[0],
        day: stay.checkin,
    };

    // Key-share keeps buyouts out without serializing against other room holds
    let days = inventory::lock_property_days(tx, property, stay, RowLock::KeyShare, policy)
        .await
        .map_err(|e| contention_as(e, taken))?;
    if let Some(day) = days.iter().find(|d| d.is_bought_out()) {
        return Err(BookingError::RoomUnavailable {
            room_id: hold.room_ids()[0],
            day: day.day,
        });
    }

    let rows = inventory::lock_room_days(tx, hold.room_ids(), stay, policy)
        .await
        .map_err(|e| contention_as(e, taken))?;
    if let Some(row) = rows.iter().find(|r| r.is_occupied()) {
        return Err(BookingError::RoomUnavailable {
            room_id: row.room_id,
            day: row.day,
        });
    }

    let expected = hold.room_ids().len() as i64 * stay.nights();
    if (rows.len() as i64) < expected {
        let missing = hold
            .room_ids()
            .iter()
            .find(|id| !rows.iter().any(|r| r.room_id == **id))
            .copied()
            .unwrap_or(hold.room_ids()[0]);
        return Err(BookingError::RoomNotFound(missing));
    }

    Ok(())
}

/// Lock the property nights and check there is room for the party
async fn check_per_guest_hold(
    tx: &mut Transaction<'_, Postgres>,
    hold: &PerGuestHold,
    policy: LockPolicy,
) -> BookingResult<()> {
    let requested = hold.details.party.guests_count;
    let days = inventory::lock_property_days(
        tx,
        hold.property,
        hold.details.stay,
        RowLock::NoKeyUpdate,
        policy,
    )
    .await?;

    for day in &days {
        if day.is_bought_out() {
            return Err(BookingError::PropertyUnavailable {
                property: hold.property,
                day: day.day,
            });
        }
        if !day.can_admit(requested) {
            return Err(BookingError::CapacityExceeded {
                day: day.day,
                available: day.available().max(0),
                requested,
            });
        }
    }

    Ok(())
}

/// Lock the property nights and every room, and check all are free
async fn check_buyout_hold(
    tx: &mut Transaction<'_, Postgres>,
    hold: &BuyoutHold,
    policy: LockPolicy,
) -> BookingResult<()> {
    let stay = hold.details.stay;
    let taken = || BookingError::PropertyUnavailable {
        property: hold.property,
        day: stay.checkin,
    };

    let days = inventory::lock_property_days(tx, hold.property, stay, RowLock::Update, policy)
        .await
        .map_err(|e| contention_as(e, taken))?;

    if let Some(day) = days
        .iter()
        .find(|d| d.is_bought_out() || d.has_guest_usage())
    {
        return Err(BookingError::PropertyUnavailable {
            property: hold.property,
            day: day.day,
        });
    }

    let rooms = inventory::lock_property_room_days(tx, hold.property, stay, policy)
        .await
        .map_err(|e| contention_as(e, taken))?;
    if let Some(row) = rooms.iter().find(|r| r.is_occupied()) {
        return Err(BookingError::PropertyUnavailable {
            property: hold.property,
            day: row.day,
        });
    }

    Ok(())
}

/// Cancel a locked `hold` or `complete` booking and free its inventory
async fn cancel_locked(
    tx: &mut Transaction<'_, Postgres>,
    mut booking: Booking,
) -> BookingResult<Booking> {
    let from = booking.status;
    let stay = booking.stay();

    let Some(updated_at) = store::transition(tx, booking.id, from, BookingStatus::Canceled).await?
    else {
        return Err(BookingError::InvalidTransition {
            from,
            to: BookingStatus::Canceled,
        });
    };

    match booking.mode {
        BookingMode::Room => {
            inventory::lock_booking_rooms(tx, booking.id).await?;
            inventory::clear_rooms(tx, booking.id).await?;
        }
        BookingMode::PerGuest => {
            inventory::lock_property_days(
                tx,
                booking.property,
                stay,
                RowLock::NoKeyUpdate,
                LockPolicy::Block,
            )
            .await?;
            let (held, booked) = match from {
                BookingStatus::Hold => (-booking.guests_count, 0),
                _ => (0, -booking.guests_count),
            };
            inventory::shift_capacity(tx, booking.property, stay, held, booked).await?;
        }
        BookingMode::Buyout => {
            inventory::lock_property_days(
                tx,
                booking.property,
                stay,
                RowLock::Update,
                LockPolicy::Block,
            )
            .await?;
            inventory::set_buyout(tx, booking.property, stay, false, false).await?;
        }
    }

    booking.status = BookingStatus::Canceled;
    booking.hold_expires_at = None;
    booking.updated_at = updated_at;
    Ok(booking)
}
