//! Hold requests, one variant per booking mode.

use crate::booking::{
    BookingError, BookingMode, BookingResult, Party, Property, RoomId, StayDates, UserId,
};
use crate::collaborators::PriceUnit;
use enum_dispatch::enum_dispatch;

/// Fields shared by every hold request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldDetails {
    pub user_id: UserId,
    pub stay: StayDates,
    pub party: Party,
    /// Human-facing reference; generated when absent
    pub reference: Option<String>,
}

impl HoldDetails {
    pub fn new(user_id: UserId, stay: StayDates, party: Party) -> Self {
        Self {
            user_id,
            stay,
            party,
            reference: None,
        }
    }

    fn validate(&self) -> BookingResult<()> {
        if !self.stay.is_valid() {
            return Err(BookingError::InvalidDateRange {
                checkin: self.stay.checkin,
                checkout: self.stay.checkout,
            });
        }

        let party = &self.party;
        if party.guests_count <= 0 {
            return Err(BookingError::InvalidGuestCount(
                "at least one guest is required".to_string(),
            ));
        }
        if party.children_count < 0 || party.children_count > party.guests_count {
            return Err(BookingError::InvalidGuestCount(format!(
                "{} children in a party of {}",
                party.children_count, party.guests_count
            )));
        }
        if party.guests.len() > party.guests_count as usize {
            return Err(BookingError::InvalidGuestCount(format!(
                "{} named guests in a party of {}",
                party.guests.len(),
                party.guests_count
            )));
        }
        let named_children = party.guests.iter().filter(|g| g.is_child).count();
        if named_children > party.children_count as usize {
            return Err(BookingError::InvalidGuestCount(format!(
                "{named_children} named children but only {} declared",
                party.children_count
            )));
        }

        Ok(())
    }
}

/// Mode-specific behaviour of a hold request
#[enum_dispatch]
pub trait HoldTarget {
    fn mode(&self) -> BookingMode;

    fn details(&self) -> &HoldDetails;

    /// Units priced for every night
    fn price_units(&self) -> Vec<PriceUnit>;

    /// Multiplier applied to each unit's nightly price
    fn price_quantity(&self) -> i64 {
        1
    }

    /// Check the request before any database work
    fn validate(&self) -> BookingResult<()>;
}

/// Specific rooms for the whole stay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomHold {
    pub details: HoldDetails,
    /// Ascending, without duplicates; only set through [`RoomHold::new`]
    room_ids: Vec<RoomId>,
}

impl RoomHold {
    pub fn new(details: HoldDetails, mut room_ids: Vec<RoomId>) -> Self {
        room_ids.sort_unstable();
        room_ids.dedup();
        Self { details, room_ids }
    }

    /// Targeted rooms, ascending and distinct
    pub fn room_ids(&self) -> &[RoomId] {
        &self.room_ids
    }
}

impl HoldTarget for RoomHold {
    fn mode(&self) -> BookingMode {
        BookingMode::Room
    }

    fn details(&self) -> &HoldDetails {
        &self.details
    }

    fn price_units(&self) -> Vec<PriceUnit> {
        self.room_ids.iter().copied().map(PriceUnit::Room).collect()
    }

    fn validate(&self) -> BookingResult<()> {
        if self.room_ids.is_empty() {
            return Err(BookingError::EmptyRoomSelection);
        }
        self.details.validate()
    }
}

/// Shared per-guest capacity of a property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerGuestHold {
    pub details: HoldDetails,
    pub property: Property,
}

impl HoldTarget for PerGuestHold {
    fn mode(&self) -> BookingMode {
        BookingMode::PerGuest
    }

    fn details(&self) -> &HoldDetails {
        &self.details
    }

    fn price_units(&self) -> Vec<PriceUnit> {
        vec![PriceUnit::Guest]
    }

    fn price_quantity(&self) -> i64 {
        i64::from(self.details.party.guests_count)
    }

    fn validate(&self) -> BookingResult<()> {
        self.details.validate()
    }
}

/// Exclusive use of a whole property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyoutHold {
    pub details: HoldDetails,
    pub property: Property,
}

impl HoldTarget for BuyoutHold {
    fn mode(&self) -> BookingMode {
        BookingMode::Buyout
    }

    fn details(&self) -> &HoldDetails {
        &self.details
    }

    fn price_units(&self) -> Vec<PriceUnit> {
        vec![PriceUnit::Property]
    }

    fn validate(&self) -> BookingResult<()> {
        self.details.validate()
    }
}

/// A request to hold inventory
#[enum_dispatch(HoldTarget)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldRequest {
    Room(RoomHold),
    PerGuest(PerGuestHold),
    Buyout(BuyoutHold),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::Guest;
    use chrono::NaiveDate;

    fn details(guests: i32, children: i32) -> HoldDetails {
        HoldDetails::new(
            9,
            StayDates::new(
                NaiveDate::from_ymd_opt(2026, 10, 2).unwrap(),
                NaiveDate::from_ymd_opt(2026, 10, 4).unwrap(),
            ),
            Party::of(guests, children),
        )
    }

    #[test]
    fn test_room_ids_are_sorted_and_deduplicated() {
        let hold = RoomHold::new(details(2, 0), vec![7, 3, 7, 5]);
        assert_eq!(hold.room_ids(), &[3, 5, 7]);

        let request: HoldRequest = RoomHold::new(details(2, 0), vec![4, 4]).into();
        assert_eq!(request.price_units(), vec![PriceUnit::Room(4)]);
    }

    #[test]
    fn test_dispatch_by_mode() {
        let requests: Vec<HoldRequest> = vec![
            RoomHold::new(details(2, 0), vec![1, 2]).into(),
            PerGuestHold {
                details: details(4, 1),
                property: Property::Ridge,
            }
            .into(),
            BuyoutHold {
                details: details(12, 3),
                property: Property::Lakeshore,
            }
            .into(),
        ];

        let modes: Vec<_> = requests.iter().map(HoldTarget::mode).collect();
        assert_eq!(
            modes,
            vec![BookingMode::Room, BookingMode::PerGuest, BookingMode::Buyout]
        );
        assert_eq!(requests[0].price_units().len(), 2);
        assert_eq!(requests[1].price_quantity(), 4);
        assert_eq!(requests[2].price_quantity(), 1);
    }

    #[test]
    fn test_validation_rejects_bad_requests() {
        let empty: HoldRequest = RoomHold::new(details(2, 0), vec![]).into();
        assert!(matches!(empty.validate(), Err(BookingError::EmptyRoomSelection)));

        let no_guests: HoldRequest = PerGuestHold {
            details: details(0, 0),
            property: Property::Ridge,
        }
        .into();
        assert!(matches!(
            no_guests.validate(),
            Err(BookingError::InvalidGuestCount(_))
        ));

        let mut reversed = details(2, 0);
        reversed.stay = StayDates::new(reversed.stay.checkout, reversed.stay.checkin);
        let reversed: HoldRequest = BuyoutHold {
            details: reversed,
            property: Property::Ridge,
        }
        .into();
        assert!(matches!(
            reversed.validate(),
            Err(BookingError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn test_named_children_must_be_declared() {
        let mut details = details(2, 0);
        details.party.guests = vec![Guest {
            full_name: "Ada".to_string(),
            is_child: true,
        }];
        let request: HoldRequest = PerGuestHold {
            details,
            property: Property::Lakeshore,
        }
        .into();
        assert!(request.validate().is_err());
    }
}
