//! Booking row persistence.
#![allow(clippy::needless_raw_string_hashes)]

use super::errors::{BookingError, BookingResult};
use super::models::{
    Booking, BookingId, BookingMode, BookingStatus, Guest, Money, Property, RoomId, StayDates,
    UserId,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{PgConnection, Row, postgres::PgRow};

const BOOKING_COLUMNS: &str = "id, reference, user_id, property, booking_mode, checkin_date, \
     checkout_date, guests_count, children_count, total_amount, currency, status, \
     hold_expires_at, checked_in, payment_reference, created_at, updated_at";

fn decode<T: std::str::FromStr<Err = String>>(value: &str) -> BookingResult<T> {
    value
        .parse()
        .map_err(|e: String| BookingError::Database(sqlx::Error::Decode(e.into())))
}

fn booking_from_row(row: &PgRow, room_ids: Vec<RoomId>) -> BookingResult<Booking> {
    Ok(Booking {
        id: row.get("id"),
        reference: row.get("reference"),
        user_id: row.get("user_id"),
        property: decode(row.get::<&str, _>("property"))?,
        mode: decode(row.get::<&str, _>("booking_mode"))?,
        checkin_date: row.get("checkin_date"),
        checkout_date: row.get("checkout_date"),
        guests_count: row.get("guests_count"),
        children_count: row.get("children_count"),
        total_price: Money::new(row.get("total_amount"), row.get::<String, _>("currency")),
        status: decode(row.get::<&str, _>("status"))?,
        hold_expires_at: row
            .get::<Option<NaiveDateTime>, _>("hold_expires_at")
            .map(|at| at.and_utc()),
        checked_in: row.get("checked_in"),
        payment_reference: row.get("payment_reference"),
        room_ids,
        created_at: row.get::<NaiveDateTime, _>("created_at").and_utc(),
        updated_at: row.get::<NaiveDateTime, _>("updated_at").and_utc(),
    })
}

async fn booking_room_ids(conn: &mut PgConnection, booking_id: BookingId) -> BookingResult<Vec<RoomId>> {
    let ids = sqlx::query_scalar(
        "SELECT room_id FROM booking_rooms WHERE booking_id = $1 ORDER BY room_id",
    )
    .bind(booking_id)
    .fetch_all(conn)
    .await?;
    Ok(ids)
}

async fn load(conn: &mut PgConnection, row: Option<PgRow>) -> BookingResult<Option<Booking>> {
    match row {
        Some(row) => {
            let id: BookingId = row.get("id");
            let room_ids = booking_room_ids(conn, id).await?;
            Ok(Some(booking_from_row(&row, room_ids)?))
        }
        None => Ok(None),
    }
}

/// Fetch a booking without locking it
pub async fn fetch(conn: &mut PgConnection, booking_id: BookingId) -> BookingResult<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
    let row = sqlx::query(&sql)
        .bind(booking_id)
        .fetch_optional(&mut *conn)
        .await?;
    load(conn, row).await
}

/// Fetch a booking by its human-facing reference
pub async fn fetch_by_reference(
    conn: &mut PgConnection,
    reference: &str,
) -> BookingResult<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE reference = $1");
    let row = sqlx::query(&sql)
        .bind(reference)
        .fetch_optional(&mut *conn)
        .await?;
    load(conn, row).await
}

/// Lock a booking row for the rest of the transaction, waiting if needed
///
/// # Errors
///
/// * `BookingError::BookingNotFound` - No such booking
pub async fn lock(conn: &mut PgConnection, booking_id: BookingId) -> BookingResult<Booking> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE");
    let row = sqlx::query(&sql)
        .bind(booking_id)
        .fetch_optional(&mut *conn)
        .await?;
    load(conn, row)
        .await?
        .ok_or(BookingError::BookingNotFound(booking_id))
}

/// Ids of holds whose expiry is at or before `now`, oldest first
pub async fn expired_hold_ids(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
    limit: i64,
) -> BookingResult<Vec<BookingId>> {
    let ids = sqlx::query_scalar(
        r#"
        SELECT id FROM bookings
        WHERE status = 'hold' AND hold_expires_at <= $1
        ORDER BY hold_expires_at, id
        LIMIT $2
        "#,
    )
    .bind(now.naive_utc())
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(ids)
}

/// Values of a booking about to be inserted
#[derive(Debug, Clone)]
pub struct NewBooking<'a> {
    pub reference: &'a str,
    pub user_id: UserId,
    pub property: Property,
    pub mode: BookingMode,
    pub stay: StayDates,
    pub guests_count: i32,
    pub children_count: i32,
    pub total_price: &'a Money,
    pub status: BookingStatus,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub room_ids: &'a [RoomId],
    pub guests: &'a [Guest],
}

/// Insert a booking with its rooms and guests
pub async fn insert(conn: &mut PgConnection, new: NewBooking<'_>) -> BookingResult<Booking> {
    let sql = format!(
        r#"
        INSERT INTO bookings (reference, user_id, property, booking_mode, checkin_date,
            checkout_date, guests_count, children_count, total_amount, currency, status,
            hold_expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING {BOOKING_COLUMNS}
        "#
    );

    let row = sqlx::query(&sql)
        .bind(new.reference)
        .bind(new.user_id)
        .bind(new.property.as_str())
        .bind(new.mode.as_str())
        .bind(new.stay.checkin)
        .bind(new.stay.checkout)
        .bind(new.guests_count)
        .bind(new.children_count)
        .bind(new.total_price.amount)
        .bind(&new.total_price.currency)
        .bind(new.status.as_str())
        .bind(new.hold_expires_at.map(|at| at.naive_utc()))
        .fetch_one(&mut *conn)
        .await?;

    let booking_id: BookingId = row.get("id");

    if !new.room_ids.is_empty() {
        sqlx::query(
            "INSERT INTO booking_rooms (booking_id, room_id) SELECT $1, unnest($2::bigint[])",
        )
        .bind(booking_id)
        .bind(new.room_ids)
        .execute(&mut *conn)
        .await?;
    }

    for guest in new.guests {
        sqlx::query("INSERT INTO booking_guests (booking_id, full_name, is_child) VALUES ($1, $2, $3)")
            .bind(booking_id)
            .bind(&guest.full_name)
            .bind(guest.is_child)
            .execute(&mut *conn)
            .await?;
    }

    booking_from_row(&row, new.room_ids.to_vec())
}

/// Move a booking from `from` to `to` only if it is still in `from`
///
/// Returns `None` when the booking was no longer in `from`, which lets racing
/// callers tell whether they performed the transition.
pub async fn transition(
    conn: &mut PgConnection,
    booking_id: BookingId,
    from: BookingStatus,
    to: BookingStatus,
) -> BookingResult<Option<DateTime<Utc>>> {
    super::state_machine::transition(from, to)?;

    let row = sqlx::query(
        r#"
        UPDATE bookings
        SET status = $3,
            hold_expires_at = CASE WHEN $3 = 'hold' THEN hold_expires_at ELSE NULL END,
            updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING updated_at
        "#,
    )
    .bind(booking_id)
    .bind(from.as_str())
    .bind(to.as_str())
    .fetch_optional(conn)
    .await?;

    Ok(row.map(|row| row.get::<NaiveDateTime, _>("updated_at").and_utc()))
}

/// Attach the captured payment to a booking
pub async fn set_payment_reference(
    conn: &mut PgConnection,
    booking_id: BookingId,
    payment_reference: &str,
) -> BookingResult<()> {
    sqlx::query("UPDATE bookings SET payment_reference = $2 WHERE id = $1")
        .bind(booking_id)
        .bind(payment_reference)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_checked_in(conn: &mut PgConnection, booking_id: BookingId) -> BookingResult<()> {
    sqlx::query("UPDATE bookings SET checked_in = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(booking_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Guests recorded on a booking
pub async fn guests(conn: &mut PgConnection, booking_id: BookingId) -> BookingResult<Vec<Guest>> {
    let rows = sqlx::query(
        "SELECT full_name, is_child FROM booking_guests WHERE booking_id = $1 ORDER BY id",
    )
    .bind(booking_id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Guest {
            full_name: row.get("full_name"),
            is_child: row.get("is_child"),
        })
        .collect())
}
