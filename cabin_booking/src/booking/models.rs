//! Booking data models.

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Booking ID type
pub type BookingId = i64;

/// Room ID type
pub type RoomId = i64;

/// User ID type
pub type UserId = i64;

/// Prefix of generated booking references
pub const REFERENCE_PREFIX: &str = "CB";

/// Number of random characters in a generated booking reference
pub const REFERENCE_LENGTH: usize = 8;

/// Alphabet for generated references (no 0/O or 1/I to keep them readable over the phone)
const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// The two bookable properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    Lakeshore,
    Ridge,
}

impl Property {
    /// Database code of the property
    pub fn as_str(&self) -> &'static str {
        match self {
            Property::Lakeshore => "lakeshore",
            Property::Ridge => "ridge",
        }
    }
}

impl std::fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Property {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lakeshore" => Ok(Property::Lakeshore),
            "ridge" => Ok(Property::Ridge),
            other => Err(format!("unknown property '{other}'")),
        }
    }
}

/// How a booking consumes inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingMode {
    /// Specific named rooms for the full stay
    Room,
    /// A quantity of shared per-guest capacity
    PerGuest,
    /// The entire property, exclusively
    Buyout,
}

impl BookingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingMode::Room => "room",
            BookingMode::PerGuest => "per_guest",
            BookingMode::Buyout => "buyout",
        }
    }
}

impl std::fmt::Display for BookingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "room" => Ok(BookingMode::Room),
            "per_guest" => Ok(BookingMode::PerGuest),
            "buyout" => Ok(BookingMode::Buyout),
            other => Err(format!("unknown booking mode '{other}'")),
        }
    }
}

/// Booking lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Draft,
    Hold,
    Complete,
    Canceled,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Draft => "draft",
            BookingStatus::Hold => "hold",
            BookingStatus::Complete => "complete",
            BookingStatus::Canceled => "canceled",
            BookingStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(BookingStatus::Draft),
            "hold" => Ok(BookingStatus::Hold),
            "complete" => Ok(BookingStatus::Complete),
            "canceled" => Ok(BookingStatus::Canceled),
            "refunded" => Ok(BookingStatus::Refunded),
            other => Err(format!("unknown booking status '{other}'")),
        }
    }
}

/// Currency-tagged integer amount (minor units)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: i64,
    pub currency: String,
}

impl Money {
    pub fn new(amount: i64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Self::new(0, currency)
    }

    /// Scale by a whole percentage, rounding down to the minor unit
    pub fn percent(&self, percentage: i32) -> Self {
        let scaled = i128::from(self.amount) * i128::from(percentage) / 100;
        Self::new(scaled as i64, self.currency.clone())
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Guest entry attached to a booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub full_name: String,
    pub is_child: bool,
}

/// Party travelling on a booking
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Total head count, children included
    pub guests_count: i32,
    pub children_count: i32,
    pub guests: Vec<Guest>,
}

impl Party {
    /// Party described only by counts
    pub fn of(guests_count: i32, children_count: i32) -> Self {
        Self {
            guests_count,
            children_count,
            guests: Vec::new(),
        }
    }
}

/// Half-open stay `[checkin, checkout)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayDates {
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
}

impl StayDates {
    pub fn new(checkin: NaiveDate, checkout: NaiveDate) -> Self {
        Self { checkin, checkout }
    }

    pub fn is_valid(&self) -> bool {
        self.checkout > self.checkin
    }

    pub fn nights(&self) -> i64 {
        (self.checkout - self.checkin).num_days()
    }

    /// Every occupied night, ascending
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let checkout = self.checkout;
        self.checkin.iter_days().take_while(move |day| *day < checkout)
    }

    pub fn overlaps(&self, other: &StayDates) -> bool {
        self.checkin < other.checkout && other.checkin < self.checkout
    }
}

/// Booking record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub reference: String,
    pub user_id: UserId,
    pub property: Property,
    pub mode: BookingMode,
    pub checkin_date: NaiveDate,
    pub checkout_date: NaiveDate,
    pub guests_count: i32,
    pub children_count: i32,
    pub total_price: Money,
    pub status: BookingStatus,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub checked_in: bool,
    pub payment_reference: Option<String>,
    /// Rooms, ascending; empty unless `mode` is `Room`
    pub room_ids: Vec<RoomId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn stay(&self) -> StayDates {
        StayDates::new(self.checkin_date, self.checkout_date)
    }

    /// Whether a hold has passed its expiry at `now`
    pub fn hold_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Hold && self.hold_expires_at.is_some_and(|at| at <= now)
    }
}

/// Generate a human-facing booking reference such as `CB-7K3QX9MA`
pub fn generate_reference() -> String {
    let mut rng = rand::rng();
    let code: String = (0..REFERENCE_LENGTH)
        .map(|_| REFERENCE_ALPHABET[rng.random_range(0..REFERENCE_ALPHABET.len())] as char)
        .collect();
    format!("{REFERENCE_PREFIX}-{code}")
}
