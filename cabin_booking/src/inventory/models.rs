//! Inventory row models.

use crate::booking::{BookingId, Property, RoomId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-room, per-day inventory row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInventory {
    pub room_id: RoomId,
    pub day: NaiveDate,
    pub held: bool,
    pub booked: bool,
    /// Booking occupying the row while `held` or `booked`
    pub booking_id: Option<BookingId>,
}

impl RoomInventory {
    pub fn is_occupied(&self) -> bool {
        self.held || self.booked
    }
}

/// Per-property, per-day inventory row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyInventory {
    pub property: Property,
    pub day: NaiveDate,
    pub capacity_total: i32,
    pub capacity_held: i32,
    pub capacity_booked: i32,
    pub buyout_held: bool,
    pub buyout_booked: bool,
}

impl PropertyInventory {
    /// Per-guest places still free
    pub fn available(&self) -> i32 {
        self.capacity_total - self.capacity_held - self.capacity_booked
    }

    pub fn is_bought_out(&self) -> bool {
        self.buyout_held || self.buyout_booked
    }

    /// Whether any per-guest capacity is in use
    pub fn has_guest_usage(&self) -> bool {
        self.capacity_held > 0 || self.capacity_booked > 0
    }

    pub fn can_admit(&self, guests: i32) -> bool {
        !self.is_bought_out() && self.capacity_held + self.capacity_booked + guests <= self.capacity_total
    }
}

/// Row lock strength taken on inventory rows
///
/// Room bookings only read the buyout flags of a property row, per-guest bookings
/// update its counters, and buyouts claim it outright. `KeyShare` and `NoKeyUpdate`
/// are compatible with each other and both conflict with `Update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLock {
    KeyShare,
    NoKeyUpdate,
    Update,
}

impl RowLock {
    pub fn clause(&self) -> &'static str {
        match self {
            RowLock::KeyShare => "FOR KEY SHARE",
            RowLock::NoKeyUpdate => "FOR NO KEY UPDATE",
            RowLock::Update => "FOR UPDATE",
        }
    }
}

/// How long a transaction may wait for an inventory row lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockPolicy {
    /// Fail immediately when a row is locked (`NOWAIT`)
    #[default]
    NoWait,
    /// Wait at most this long (`SET LOCAL lock_timeout`)
    Bounded(Duration),
    /// Wait for the lock; only for rows owned by the booking being changed
    Block,
}

impl LockPolicy {
    /// Suffix appended to a locking clause
    pub fn wait_clause(&self) -> &'static str {
        match self {
            LockPolicy::NoWait => " NOWAIT",
            LockPolicy::Bounded(_) | LockPolicy::Block => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(total: i32, held: i32, booked: i32) -> PropertyInventory {
        PropertyInventory {
            property: Property::Ridge,
            day: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            capacity_total: total,
            capacity_held: held,
            capacity_booked: booked,
            buyout_held: false,
            buyout_booked: false,
        }
    }

    #[test]
    fn test_admission_respects_capacity() {
        let inventory = row(10, 3, 4);
        assert_eq!(inventory.available(), 3);
        assert!(inventory.can_admit(3));
        assert!(!inventory.can_admit(4));
    }

    #[test]
    fn test_buyout_blocks_admission() {
        let mut inventory = row(10, 0, 0);
        inventory.buyout_booked = true;
        assert!(inventory.is_bought_out());
        assert!(!inventory.can_admit(1));
    }

    #[test]
    fn test_lock_clauses() {
        assert_eq!(
            format!("{}{}", RowLock::Update.clause(), LockPolicy::NoWait.wait_clause()),
            "FOR UPDATE NOWAIT"
        );
        assert_eq!(
            format!(
                "{}{}",
                RowLock::KeyShare.clause(),
                LockPolicy::Bounded(Duration::from_millis(200)).wait_clause()
            ),
            "FOR KEY SHARE"
        );
    }
}
