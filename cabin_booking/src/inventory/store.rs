//! Inventory queries.
//!
//! Everything that mutates inventory takes the caller's transaction; the only
//! statements run outside one are the `ensure_*` upserts that materialize missing
//! rows before the locking transaction starts.
#![allow(clippy::needless_raw_string_hashes)]

use super::models::{LockPolicy, PropertyInventory, RoomInventory, RowLock};
use crate::booking::{BookingError, BookingId, BookingResult, Property, RoomId, StayDates};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

pub(crate) fn parse_property(code: &str) -> BookingResult<Property> {
    code.parse()
        .map_err(|e: String| BookingError::Database(sqlx::Error::Decode(e.into())))
}

fn property_row(row: &PgRow) -> BookingResult<PropertyInventory> {
    Ok(PropertyInventory {
        property: parse_property(row.get::<&str, _>("property"))?,
        day: row.get("day"),
        capacity_total: row.get("capacity_total"),
        capacity_held: row.get("capacity_held"),
        capacity_booked: row.get("capacity_booked"),
        buyout_held: row.get("buyout_held"),
        buyout_booked: row.get("buyout_booked"),
    })
}

fn room_row(row: &PgRow) -> RoomInventory {
    RoomInventory {
        room_id: row.get("room_id"),
        day: row.get("day"),
        held: row.get("held"),
        booked: row.get("booked"),
        booking_id: row.get("booking_id"),
    }
}

/// Apply the lock wait budget to the current transaction
pub async fn apply_lock_policy(
    tx: &mut Transaction<'_, Postgres>,
    policy: LockPolicy,
) -> BookingResult<()> {
    if let LockPolicy::Bounded(wait) = policy {
        // SET does not take bind parameters
        let statement = format!("SET LOCAL lock_timeout = '{}ms'", wait.as_millis().max(1));
        sqlx::query(&statement).execute(&mut **tx).await?;
    }
    Ok(())
}

/// Look up the property of each room, ascending by room id
///
/// # Errors
///
/// * `BookingError::RoomNotFound` - One of the rooms does not exist
pub async fn room_properties(
    pool: &PgPool,
    room_ids: &[RoomId],
) -> BookingResult<Vec<(RoomId, Property)>> {
    let rows = sqlx::query("SELECT id, property FROM rooms WHERE id = ANY($1) ORDER BY id")
        .bind(room_ids)
        .fetch_all(pool)
        .await?;

    let mut found = Vec::with_capacity(rows.len());
    for row in &rows {
        found.push((row.get::<i64, _>("id"), parse_property(row.get("property"))?));
    }

    if let Some(missing) = room_ids
        .iter()
        .find(|id| !found.iter().any(|(found_id, _)| found_id == *id))
    {
        return Err(BookingError::RoomNotFound(*missing));
    }

    Ok(found)
}

/// Create any missing property rows for the stay with the configured capacity
///
/// # Errors
///
/// * `BookingError::PropertyNotFound` - The property has no configuration row
pub async fn ensure_property_days(
    pool: &PgPool,
    property: Property,
    stay: StayDates,
) -> BookingResult<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO property_inventory (property, day, capacity_total)
        SELECT p.code, d::date, p.per_guest_capacity
        FROM properties p
        CROSS JOIN generate_series($2::date::timestamp, ($3::date - 1)::timestamp, INTERVAL '1 day') AS d
        WHERE p.code = $1
        ON CONFLICT (property, day) DO NOTHING
        "#,
    )
    .bind(property.as_str())
    .bind(stay.checkin)
    .bind(stay.checkout)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let configured = sqlx::query("SELECT 1 FROM properties WHERE code = $1")
            .bind(property.as_str())
            .fetch_optional(pool)
            .await?;
        if configured.is_none() {
            return Err(BookingError::PropertyNotFound(property));
        }
    }

    Ok(())
}

/// Create any missing room rows for the stay, not held and not booked
pub async fn ensure_room_days(
    pool: &PgPool,
    room_ids: &[RoomId],
    stay: StayDates,
) -> BookingResult<()> {
    sqlx::query(
        r#"
        INSERT INTO room_inventory (room_id, day)
        SELECT r, d::date
        FROM unnest($1::bigint[]) AS r
        CROSS JOIN generate_series($2::date::timestamp, ($3::date - 1)::timestamp, INTERVAL '1 day') AS d
        ON CONFLICT (room_id, day) DO NOTHING
        "#,
    )
    .bind(room_ids)
    .bind(stay.checkin)
    .bind(stay.checkout)
    .execute(pool)
    .await?;
    Ok(())
}

/// Create missing room rows for every room of a property
pub async fn ensure_property_room_days(
    pool: &PgPool,
    property: Property,
    stay: StayDates,
) -> BookingResult<()> {
    sqlx::query(
        r#"
        INSERT INTO room_inventory (room_id, day)
        SELECT r.id, d::date
        FROM rooms r
        CROSS JOIN generate_series($2::date::timestamp, ($3::date - 1)::timestamp, INTERVAL '1 day') AS d
        WHERE r.property = $1
        ON CONFLICT (room_id, day) DO NOTHING
        "#,
    )
    .bind(property.as_str())
    .bind(stay.checkin)
    .bind(stay.checkout)
    .execute(pool)
    .await?;
    Ok(())
}

/// Lock the property rows of a stay, ascending by day
///
/// # Errors
///
/// * `BookingError::LockContention` - A row is locked and the policy does not wait
/// * `BookingError::PropertyNotFound` - Rows are missing for some night
pub async fn lock_property_days(
    tx: &mut Transaction<'_, Postgres>,
    property: Property,
    stay: StayDates,
    strength: RowLock,
    policy: LockPolicy,
) -> BookingResult<Vec<PropertyInventory>> {
    let sql = format!(
        r#"
        SELECT property, day, capacity_total, capacity_held, capacity_booked,
               buyout_held, buyout_booked
        FROM property_inventory
        WHERE property = $1 AND day >= $2 AND day < $3
        ORDER BY day
        {}{}
        "#,
        strength.clause(),
        policy.wait_clause()
    );

    let rows = sqlx::query(&sql)
        .bind(property.as_str())
        .bind(stay.checkin)
        .bind(stay.checkout)
        .fetch_all(&mut **tx)
        .await?;

    if (rows.len() as i64) < stay.nights() {
        return Err(BookingError::PropertyNotFound(property));
    }

    rows.iter().map(property_row).collect()
}

/// Lock the given rooms' rows for a stay, ascending by room then day
pub async fn lock_room_days(
    tx: &mut Transaction<'_, Postgres>,
    room_ids: &[RoomId],
    stay: StayDates,
    policy: LockPolicy,
) -> BookingResult<Vec<RoomInventory>> {
    let sql = format!(
        r#"
        SELECT room_id, day, held, booked, booking_id
        FROM room_inventory
        WHERE room_id = ANY($1) AND day >= $2 AND day < $3
        ORDER BY room_id, day
        FOR UPDATE{}
        "#,
        policy.wait_clause()
    );

    let rows = sqlx::query(&sql)
        .bind(room_ids)
        .bind(stay.checkin)
        .bind(stay.checkout)
        .fetch_all(&mut **tx)
        .await?;

    Ok(rows.iter().map(room_row).collect())
}

/// Lock every room row of a property for a stay, ascending by room then day
pub async fn lock_property_room_days(
    tx: &mut Transaction<'_, Postgres>,
    property: Property,
    stay: StayDates,
    policy: LockPolicy,
) -> BookingResult<Vec<RoomInventory>> {
    let sql = format!(
        r#"
        SELECT ri.room_id, ri.day, ri.held, ri.booked, ri.booking_id
        FROM room_inventory ri
        JOIN rooms r ON r.id = ri.room_id
        WHERE r.property = $1 AND ri.day >= $2 AND ri.day < $3
        ORDER BY ri.room_id, ri.day
        FOR UPDATE OF ri{}
        "#,
        policy.wait_clause()
    );

    let rows = sqlx::query(&sql)
        .bind(property.as_str())
        .bind(stay.checkin)
        .bind(stay.checkout)
        .fetch_all(&mut **tx)
        .await?;

    Ok(rows.iter().map(room_row).collect())
}

/// Lock the rows a booking occupies, ascending by room then day
pub async fn lock_booking_rooms(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: BookingId,
) -> BookingResult<Vec<RoomInventory>> {
    let rows = sqlx::query(
        r#"
        SELECT room_id, day, held, booked, booking_id
        FROM room_inventory
        WHERE booking_id = $1
        ORDER BY room_id, day
        FOR UPDATE
        "#,
    )
    .bind(booking_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows.iter().map(room_row).collect())
}

/// Mark the rooms held by `booking_id` for every night
pub async fn hold_rooms(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: BookingId,
    room_ids: &[RoomId],
    stay: StayDates,
) -> BookingResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE room_inventory
        SET held = TRUE, booked = FALSE, booking_id = $1, updated_at = NOW()
        WHERE room_id = ANY($2) AND day >= $3 AND day < $4
        "#,
    )
    .bind(booking_id)
    .bind(room_ids)
    .bind(stay.checkin)
    .bind(stay.checkout)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

/// Flip a booking's room rows from held to booked
pub async fn book_held_rooms(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: BookingId,
) -> BookingResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE room_inventory
        SET held = FALSE, booked = TRUE, updated_at = NOW()
        WHERE booking_id = $1 AND held
        "#,
    )
    .bind(booking_id)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

/// Free every room row a booking occupies
pub async fn clear_rooms(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: BookingId,
) -> BookingResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE room_inventory
        SET held = FALSE, booked = FALSE, booking_id = NULL, updated_at = NOW()
        WHERE booking_id = $1
        "#,
    )
    .bind(booking_id)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

/// Shift per-guest counters on every night of a stay
///
/// `held_delta` and `booked_delta` are added to the counters; the table's CHECK
/// constraints reject any result below zero or above capacity.
pub async fn shift_capacity(
    tx: &mut Transaction<'_, Postgres>,
    property: Property,
    stay: StayDates,
    held_delta: i32,
    booked_delta: i32,
) -> BookingResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE property_inventory
        SET capacity_held = capacity_held + $4,
            capacity_booked = capacity_booked + $5,
            updated_at = NOW()
        WHERE property = $1 AND day >= $2 AND day < $3
        "#,
    )
    .bind(property.as_str())
    .bind(stay.checkin)
    .bind(stay.checkout)
    .bind(held_delta)
    .bind(booked_delta)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

/// Set the buyout flags on every night of a stay
pub async fn set_buyout(
    tx: &mut Transaction<'_, Postgres>,
    property: Property,
    stay: StayDates,
    held: bool,
    booked: bool,
) -> BookingResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE property_inventory
        SET buyout_held = $4, buyout_booked = $5, updated_at = NOW()
        WHERE property = $1 AND day >= $2 AND day < $3
        "#,
    )
    .bind(property.as_str())
    .bind(stay.checkin)
    .bind(stay.checkout)
    .bind(held)
    .bind(booked)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

/// Read property rows for a stay without locking
pub async fn property_days(
    pool: &PgPool,
    property: Property,
    stay: StayDates,
) -> BookingResult<Vec<PropertyInventory>> {
    let rows = sqlx::query(
        r#"
        SELECT property, day, capacity_total, capacity_held, capacity_booked,
               buyout_held, buyout_booked
        FROM property_inventory
        WHERE property = $1 AND day >= $2 AND day < $3
        ORDER BY day
        "#,
    )
    .bind(property.as_str())
    .bind(stay.checkin)
    .bind(stay.checkout)
    .fetch_all(pool)
    .await?;

    rows.iter().map(property_row).collect()
}

/// Read a room's rows for a stay without locking
pub async fn room_days(
    pool: &PgPool,
    room_id: RoomId,
    stay: StayDates,
) -> BookingResult<Vec<RoomInventory>> {
    let rows = sqlx::query(
        r#"
        SELECT room_id, day, held, booked, booking_id
        FROM room_inventory
        WHERE room_id = $1 AND day >= $2 AND day < $3
        ORDER BY day
        "#,
    )
    .bind(room_id)
    .bind(stay.checkin)
    .bind(stay.checkout)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(room_row).collect())
}
