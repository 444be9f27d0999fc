//! Price lookup collaborator.

use crate::booking::{BookingMode, Money, Property, RoomId};
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

/// Pricing errors
#[derive(Debug, Error)]
pub enum PricingError {
    /// No price configured for the query
    #[error("No price for {mode} at {property} on {night}")]
    NoPrice {
        property: Property,
        mode: BookingMode,
        night: NaiveDate,
    },

    /// Currencies of the nightly prices disagree
    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: String, got: String },

    /// A nightly price is negative
    #[error("Invalid price {amount} on {night}")]
    InvalidPrice { night: NaiveDate, amount: i64 },

    /// The total does not fit in the amount type
    #[error("Price total overflows")]
    Overflow,

    /// Price source unavailable
    #[error("Price source unavailable: {0}")]
    Unavailable(String),
}

/// What a nightly price is charged for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceUnit {
    /// One specific room
    Room(RoomId),
    /// One guest of per-guest capacity
    Guest,
    /// The whole property
    Property,
}

/// Price query for a single night
///
/// The season is resolved by the price source from `night`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceQuery {
    pub property: Property,
    pub mode: BookingMode,
    pub unit: PriceUnit,
    pub night: NaiveDate,
}

/// Read-only nightly price source
///
/// Implementations may serve from a versioned cache; a briefly stale price never
/// affects inventory correctness.
#[async_trait]
pub trait PriceLookup: Send + Sync {
    /// Price of one unit for one night
    async fn get_price(&self, query: &PriceQuery) -> Result<Money, PricingError>;
}

/// Same nightly rate every night, per unit kind
#[derive(Debug, Clone)]
pub struct FlatRatePricing {
    pub currency: String,
    pub room_nightly: i64,
    pub guest_nightly: i64,
    pub buyout_nightly: i64,
}

impl FlatRatePricing {
    pub fn new(currency: impl Into<String>, room: i64, guest: i64, buyout: i64) -> Self {
        Self {
            currency: currency.into(),
            room_nightly: room,
            guest_nightly: guest,
            buyout_nightly: buyout,
        }
    }
}

impl Default for FlatRatePricing {
    fn default() -> Self {
        Self::new("USD", 18_000, 4_500, 250_000)
    }
}

#[async_trait]
impl PriceLookup for FlatRatePricing {
    async fn get_price(&self, query: &PriceQuery) -> Result<Money, PricingError> {
        let amount = match query.unit {
            PriceUnit::Room(_) => self.room_nightly,
            PriceUnit::Guest => self.guest_nightly,
            PriceUnit::Property => self.buyout_nightly,
        };
        Ok(Money::new(amount, self.currency.clone()))
    }
}

/// Sum nightly prices of `quantity` units over the given nights
pub(crate) async fn quote(
    lookup: &dyn PriceLookup,
    property: Property,
    mode: BookingMode,
    units: &[PriceUnit],
    quantity: i64,
    nights: impl Iterator<Item = NaiveDate>,
) -> Result<Money, PricingError> {
    let mut total: Option<Money> = None;

    for night in nights {
        for unit in units {
            let price = lookup
                .get_price(&PriceQuery {
                    property,
                    mode,
                    unit: *unit,
                    night,
                })
                .await?;

            if price.amount < 0 {
                return Err(PricingError::InvalidPrice {
                    night,
                    amount: price.amount,
                });
            }
            let line = price
                .amount
                .checked_mul(quantity)
                .ok_or(PricingError::Overflow)?;

            match total.as_mut() {
                None => total = Some(Money::new(line, price.currency)),
                Some(sum) if sum.currency == price.currency => {
                    sum.amount = sum.amount.checked_add(line).ok_or(PricingError::Overflow)?;
                }
                Some(sum) => {
                    return Err(PricingError::CurrencyMismatch {
                        expected: sum.currency.clone(),
                        got: price.currency,
                    });
                }
            }
        }
    }

    total.ok_or_else(|| PricingError::Unavailable("empty stay".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::StayDates;

    #[tokio::test]
    async fn test_quote_sums_units_and_nights() {
        let pricing = FlatRatePricing::new("USD", 100, 10, 1_000);
        let stay = StayDates::new(
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 6, 4).unwrap(),
        );

        let rooms = quote(
            &pricing,
            Property::Lakeshore,
            BookingMode::Room,
            &[PriceUnit::Room(1), PriceUnit::Room(2)],
            1,
            stay.days(),
        )
        .await
        .unwrap();
        assert_eq!(rooms, Money::new(600, "USD"));

        let guests = quote(
            &pricing,
            Property::Ridge,
            BookingMode::PerGuest,
            &[PriceUnit::Guest],
            5,
            stay.days(),
        )
        .await
        .unwrap();
        assert_eq!(guests, Money::new(150, "USD"));
    }

    #[tokio::test]
    async fn test_quote_rejects_overflowing_and_negative_prices() {
        let stay = StayDates::new(
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 6, 3).unwrap(),
        );

        let huge = FlatRatePricing::new("USD", 100, i64::MAX / 2, 1_000);
        let err = quote(
            &huge,
            Property::Ridge,
            BookingMode::PerGuest,
            &[PriceUnit::Guest],
            3,
            stay.days(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PricingError::Overflow));

        // Each night fits on its own; the sum of two does not
        let per_night = FlatRatePricing::new("USD", 100, 10, i64::MAX - 1);
        let err = quote(
            &per_night,
            Property::Ridge,
            BookingMode::Buyout,
            &[PriceUnit::Property],
            1,
            stay.days(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PricingError::Overflow));

        let negative = FlatRatePricing::new("USD", -5, 10, 1_000);
        let err = quote(
            &negative,
            Property::Lakeshore,
            BookingMode::Room,
            &[PriceUnit::Room(1)],
            1,
            stay.days(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PricingError::InvalidPrice { amount: -5, .. }));
    }
}
